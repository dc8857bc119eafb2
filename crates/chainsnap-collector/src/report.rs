//! 실행 결과 보고 구조체.

use chrono::NaiveDate;
use serde::Serialize;
use std::time::Duration;

/// 심볼별 최종 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolStatus {
    /// 전체 계약 저장 완료
    Persisted,
    /// 저장 완료했으나 일부 계약이 폐기됨
    PersistedPartial,
    /// 수집 또는 저장 실패
    Failed,
}

/// 심볼 하나의 실행 결과.
#[derive(Debug, Clone, Serialize)]
pub struct SymbolOutcome {
    /// 기초자산 심볼
    pub symbol: String,
    /// 최종 상태
    pub status: SymbolStatus,
    /// 저장된 계약 수
    pub written: usize,
    /// 폐기된 계약 수
    pub dropped: usize,
    /// 실패 사유
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SymbolOutcome {
    /// 저장 성공 결과 생성. 폐기가 있으면 부분 성공으로 기록합니다.
    pub fn persisted(symbol: impl Into<String>, written: usize, dropped: usize) -> Self {
        let status = if dropped > 0 {
            SymbolStatus::PersistedPartial
        } else {
            SymbolStatus::Persisted
        };
        Self {
            symbol: symbol.into(),
            status,
            written,
            dropped,
            error: None,
        }
    }

    /// 실패 결과 생성.
    pub fn failed(symbol: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            status: SymbolStatus::Failed,
            written: 0,
            dropped: 0,
            error: Some(error.into()),
        }
    }
}

/// 실행 한 번의 집계 보고서.
///
/// 실행이 끝나면 이 보고서가 유일한 최종 상태입니다. 프로세스 재시작 간에
/// 이어지는 중간 상태는 없습니다.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// 스냅샷 기준 거래일
    pub snapshot_date: NaiveDate,
    /// 심볼별 결과
    pub outcomes: Vec<SymbolOutcome>,
    /// 소요 시간
    #[serde(skip)]
    pub elapsed: Duration,
}

impl RunReport {
    /// 새 보고서 생성.
    pub fn new(snapshot_date: NaiveDate) -> Self {
        Self {
            snapshot_date,
            outcomes: Vec::new(),
            elapsed: Duration::ZERO,
        }
    }

    /// 심볼 결과 기록.
    pub fn record(&mut self, outcome: SymbolOutcome) {
        self.outcomes.push(outcome);
    }

    /// 처리한 심볼 수.
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    /// 전체 저장 성공 심볼 수.
    pub fn persisted_count(&self) -> usize {
        self.count_status(SymbolStatus::Persisted)
    }

    /// 부분 저장 심볼 수.
    pub fn partial_count(&self) -> usize {
        self.count_status(SymbolStatus::PersistedPartial)
    }

    /// 실패 심볼 수.
    pub fn failed_count(&self) -> usize {
        self.count_status(SymbolStatus::Failed)
    }

    /// 저장된 총 계약 수.
    pub fn total_written(&self) -> usize {
        self.outcomes.iter().map(|o| o.written).sum()
    }

    /// 폐기된 총 계약 수.
    pub fn total_dropped(&self) -> usize {
        self.outcomes.iter().map(|o| o.dropped).sum()
    }

    /// 실패한 심볼이 있는지 확인. 종료 코드 결정에 사용합니다.
    pub fn has_failures(&self) -> bool {
        self.failed_count() > 0
    }

    /// 성공률 계산 (%).
    pub fn success_rate(&self) -> f64 {
        if self.total() == 0 {
            0.0
        } else {
            let ok = self.persisted_count() + self.partial_count();
            (ok as f64 / self.total() as f64) * 100.0
        }
    }

    /// 실패한 심볼 목록.
    pub fn failed_symbols(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| o.status == SymbolStatus::Failed)
            .map(|o| o.symbol.as_str())
            .collect()
    }

    /// 보고서 요약 로그 출력.
    pub fn log_summary(&self, operation: &str) {
        tracing::info!(
            operation = operation,
            snapshot_date = %self.snapshot_date,
            total = self.total(),
            persisted = self.persisted_count(),
            partial = self.partial_count(),
            failed = self.failed_count(),
            contracts_written = self.total_written(),
            contracts_dropped = self.total_dropped(),
            success_rate = format!("{:.1}%", self.success_rate()),
            elapsed = format!("{:.1}s", self.elapsed.as_secs_f64()),
            "수집 완료"
        );

        for outcome in &self.outcomes {
            if let Some(ref error) = outcome.error {
                tracing::warn!(symbol = %outcome.symbol, error = %error, "심볼 실패");
            }
        }
    }

    fn count_status(&self, status: SymbolStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 5).unwrap()
    }

    #[test]
    fn test_outcome_partial_when_dropped() {
        let clean = SymbolOutcome::persisted("AAPL", 120, 0);
        assert_eq!(clean.status, SymbolStatus::Persisted);

        let partial = SymbolOutcome::persisted("AAPL", 119, 1);
        assert_eq!(partial.status, SymbolStatus::PersistedPartial);
    }

    #[test]
    fn test_report_accounting() {
        let mut report = RunReport::new(snapshot());
        report.record(SymbolOutcome::persisted("AAPL", 100, 0));
        report.record(SymbolOutcome::persisted("SPX", 250, 3));
        report.record(SymbolOutcome::failed("ZZZZ", "Not found: ZZZZ"));

        assert_eq!(report.total(), 3);
        assert_eq!(report.persisted_count(), 1);
        assert_eq!(report.partial_count(), 1);
        assert_eq!(report.failed_count(), 1);
        assert_eq!(report.total_written(), 350);
        assert_eq!(report.total_dropped(), 3);
        assert!(report.has_failures());
        assert_eq!(report.failed_symbols(), vec!["ZZZZ"]);
    }

    #[test]
    fn test_success_rate() {
        let mut report = RunReport::new(snapshot());
        assert_eq!(report.success_rate(), 0.0);

        report.record(SymbolOutcome::persisted("AAPL", 10, 0));
        report.record(SymbolOutcome::persisted("MSFT", 10, 1));
        report.record(SymbolOutcome::failed("BAD", "boom"));
        report.record(SymbolOutcome::failed("WORSE", "boom"));

        assert_eq!(report.success_rate(), 50.0);
    }
}
