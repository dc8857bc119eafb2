//! 옵션 계약 레코드 타입.
//!
//! 이 모듈은 수집 파이프라인의 표준 레코드를 정의합니다:
//! - `OptionContract` - 정규화된 옵션 계약 스냅샷 (저장 단위)
//! - `OptionType` - 콜/풋 구분
//! - `Greeks` - 민감도 지표 (델타/감마/세타/베가/로)
//!
//! 업스트림 응답의 원시 필드 해석은 정규화 계층에서 수행하며,
//! 이 타입은 검증을 통과한 값만 담습니다.

use crate::types::decimal::Price;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 옵션 유형 (콜/풋).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionType {
    /// 콜 옵션
    Call,
    /// 풋 옵션
    Put,
}

impl OptionType {
    /// 저장용 문자열 반환.
    pub fn as_str(&self) -> &'static str {
        match self {
            OptionType::Call => "call",
            OptionType::Put => "put",
        }
    }

    /// 업스트림 표기에서 파싱 ("CALL", "PUT", "C", "P").
    pub fn from_vendor(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "CALL" | "C" => Some(OptionType::Call),
            "PUT" | "P" => Some(OptionType::Put),
            _ => None,
        }
    }
}

impl std::str::FromStr for OptionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_vendor(s).ok_or_else(|| format!("Unknown option type: {}", s))
    }
}

impl std::fmt::Display for OptionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 옵션 민감도 지표.
///
/// 업스트림이 제공하지 않는 값은 `None`으로 유지합니다.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Greeks {
    /// 델타
    pub delta: Option<Decimal>,
    /// 감마
    pub gamma: Option<Decimal>,
    /// 세타
    pub theta: Option<Decimal>,
    /// 베가
    pub vega: Option<Decimal>,
    /// 로
    pub rho: Option<Decimal>,
}

/// 계약 불변 조건 위반.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ContractViolation {
    /// 행사가가 0 이하
    #[error("strike must be positive")]
    NonPositiveStrike,
    /// 만기가 스냅샷 일자보다 과거
    #[error("expiration precedes snapshot date")]
    ExpirationBeforeSnapshot,
}

/// 정규화된 옵션 계약 스냅샷.
///
/// `(symbol, expiration, strike, option_type, snapshot_date)`가 저장 키이며,
/// 한 번 기록된 레코드는 변경되지 않습니다 (재실행 시 키 단위 교체).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionContract {
    /// 기초자산 심볼
    pub symbol: String,
    /// 만기일
    pub expiration: NaiveDate,
    /// 행사가
    pub strike: Price,
    /// 콜/풋 구분
    pub option_type: OptionType,
    /// 매수 호가
    pub bid: Option<Price>,
    /// 매도 호가
    pub ask: Option<Price>,
    /// 마지막 체결가
    pub last: Option<Price>,
    /// 거래량
    pub volume: Option<i64>,
    /// 미결제약정
    pub open_interest: Option<i64>,
    /// 내재 변동성
    pub implied_volatility: Option<Decimal>,
    /// 민감도 지표
    pub greeks: Greeks,
    /// 스냅샷 시점의 기초자산 가격
    pub underlying_price: Option<Price>,
    /// 업스트림 호가 시각
    pub quote_time: Option<DateTime<Utc>>,
    /// 스냅샷 기준 거래일 (저장 키의 일부)
    pub snapshot_date: NaiveDate,
}

impl OptionContract {
    /// 불변 조건 검증.
    ///
    /// 정규화 계층은 검증에 실패한 계약을 저장하지 않고 폐기합니다.
    pub fn validate(&self) -> Result<(), ContractViolation> {
        if self.strike <= Decimal::ZERO {
            return Err(ContractViolation::NonPositiveStrike);
        }
        if self.expiration < self.snapshot_date {
            return Err(ContractViolation::ExpirationBeforeSnapshot);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample_contract() -> OptionContract {
        OptionContract {
            symbol: "AAPL".to_string(),
            expiration: NaiveDate::from_ymd_opt(2024, 1, 19).unwrap(),
            strike: dec!(185.0),
            option_type: OptionType::Call,
            bid: Some(dec!(1.25)),
            ask: Some(dec!(1.35)),
            last: Some(dec!(1.30)),
            volume: Some(1200),
            open_interest: Some(5400),
            implied_volatility: Some(dec!(0.21)),
            greeks: Greeks {
                delta: Some(dec!(0.45)),
                gamma: Some(dec!(0.03)),
                theta: Some(dec!(-0.08)),
                vega: Some(dec!(0.12)),
                rho: Some(dec!(0.01)),
            },
            underlying_price: Some(dec!(184.20)),
            quote_time: None,
            snapshot_date: NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
        }
    }

    #[test]
    fn test_valid_contract_passes() {
        assert!(sample_contract().validate().is_ok());
    }

    #[test]
    fn test_non_positive_strike_rejected() {
        let mut contract = sample_contract();
        contract.strike = dec!(0);
        assert_eq!(
            contract.validate(),
            Err(ContractViolation::NonPositiveStrike)
        );

        contract.strike = dec!(-5.0);
        assert_eq!(
            contract.validate(),
            Err(ContractViolation::NonPositiveStrike)
        );
    }

    #[test]
    fn test_expiration_before_snapshot_rejected() {
        let mut contract = sample_contract();
        contract.expiration = NaiveDate::from_ymd_opt(2024, 1, 4).unwrap();
        assert_eq!(
            contract.validate(),
            Err(ContractViolation::ExpirationBeforeSnapshot)
        );

        // 만기 당일 스냅샷은 유효하다 (0DTE)
        contract.expiration = contract.snapshot_date;
        assert!(contract.validate().is_ok());
    }

    #[test]
    fn test_option_type_from_vendor() {
        assert_eq!(OptionType::from_vendor("CALL"), Some(OptionType::Call));
        assert_eq!(OptionType::from_vendor("put"), Some(OptionType::Put));
        assert_eq!(OptionType::from_vendor("P"), Some(OptionType::Put));
        assert_eq!(OptionType::from_vendor("STRADDLE"), None);
    }

    #[test]
    fn test_option_type_storage_string() {
        assert_eq!(OptionType::Call.as_str(), "call");
        assert_eq!(OptionType::Put.to_string(), "put");
    }
}
