//! 저장된 스냅샷의 CSV 내보내기.
//!
//! 백테스트 도구에서 바로 읽을 수 있도록 `(symbol, snapshot_date)` 파티션
//! 하나를 평평한 CSV 파일로 덤프합니다.

use anyhow::{Context, Result};
use chainsnap_core::OptionContract;
use chainsnap_store::ContractSink;
use chrono::NaiveDate;
use std::fmt::Display;
use std::fs::File;
use std::io::{BufWriter, Write};
use tracing::{info, warn};

/// CSV 헤더.
const CSV_HEADER: &str = "symbol,snapshot_date,expiration,strike,option_type,bid,ask,last,\
volume,open_interest,implied_volatility,delta,gamma,theta,vega,rho,underlying_price,quote_time";

/// 스냅샷 하나를 CSV 파일로 내보냅니다. 기록한 행 수를 반환합니다.
pub async fn export_snapshot<S: ContractSink>(
    sink: &S,
    symbol: &str,
    snapshot_date: NaiveDate,
    output_path: &str,
) -> Result<usize> {
    let contracts = sink
        .fetch_snapshot(symbol, snapshot_date)
        .await
        .with_context(|| format!("스냅샷 조회 실패: {} {}", symbol, snapshot_date))?;

    if contracts.is_empty() {
        warn!(symbol, snapshot_date = %snapshot_date, "내보낼 계약이 없습니다");
    }

    let file = File::create(output_path)
        .with_context(|| format!("파일 생성 실패: {}", output_path))?;
    let mut writer = BufWriter::new(file);

    writeln!(writer, "{}", CSV_HEADER)?;
    for contract in &contracts {
        writeln!(writer, "{}", format_contract_row(contract))?;
    }
    writer.flush()?;

    info!(
        symbol,
        snapshot_date = %snapshot_date,
        rows = contracts.len(),
        output_path,
        "CSV 내보내기 완료"
    );

    Ok(contracts.len())
}

/// 계약 하나를 CSV 행으로 변환.
fn format_contract_row(contract: &OptionContract) -> String {
    format!(
        "{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{}",
        contract.symbol,
        contract.snapshot_date,
        contract.expiration,
        contract.strike,
        contract.option_type,
        opt(&contract.bid),
        opt(&contract.ask),
        opt(&contract.last),
        opt(&contract.volume),
        opt(&contract.open_interest),
        opt(&contract.implied_volatility),
        opt(&contract.greeks.delta),
        opt(&contract.greeks.gamma),
        opt(&contract.greeks.theta),
        opt(&contract.greeks.vega),
        opt(&contract.greeks.rho),
        opt(&contract.underlying_price),
        opt(&contract.quote_time.map(|t| t.to_rfc3339())),
    )
}

/// 값이 없으면 빈 칸으로 출력.
fn opt<T: Display>(value: &Option<T>) -> String {
    match value {
        Some(v) => v.to_string(),
        None => String::new(),
    }
}
