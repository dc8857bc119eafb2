//! 원시 체인 페이로드 정규화.
//!
//! 업스트림의 계약 하나하나를 개별적으로 해석합니다. 필수 필드가 없거나
//! 숫자 형식이 깨졌거나 불변 조건에 어긋나는 계약은 폐기하고 집계할 뿐,
//! 페이지 전체를 실패시키지 않습니다.
//!
//! 단위/형식 보정:
//! - 가격류: JSON 숫자 또는 숫자 문자열 → `Decimal`
//! - 만기일: `"YYYY-MM-DD"` 또는 `"YYYY-MM-DD:dte"` → `NaiveDate`
//! - 그릭스/변동성: 업스트림 결측 표기(-999 이하) → `None`
//! - 호가 시각: epoch 밀리초 → `DateTime<Utc>`

use chainsnap_core::{Greeks, OptionContract, OptionType};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use std::str::FromStr;
use tracing::debug;

/// 그릭스/변동성 결측 표기 하한. 이 값 이하는 값이 없는 것으로 본다.
const MISSING_SENTINEL: i64 = -999;

/// 업스트림 계약 페이로드 (lenient).
///
/// 숫자 필드는 숫자와 문자열을 모두 허용하기 위해 `Value`로 받는다.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawContract {
    put_call: Option<String>,
    strike_price: Option<Value>,
    expiration_date: Option<String>,
    bid: Option<Value>,
    ask: Option<Value>,
    last: Option<Value>,
    total_volume: Option<Value>,
    open_interest: Option<Value>,
    volatility: Option<Value>,
    delta: Option<Value>,
    gamma: Option<Value>,
    theta: Option<Value>,
    vega: Option<Value>,
    rho: Option<Value>,
    quote_time_in_long: Option<i64>,
}

/// 정규화 결과 페이지.
#[derive(Debug, Clone, Default)]
pub struct NormalizedPage {
    /// 검증을 통과한 계약
    pub contracts: Vec<OptionContract>,
    /// 폐기된 계약 수
    pub dropped: usize,
}

impl NormalizedPage {
    /// 다른 페이지의 결과를 합칩니다.
    pub fn merge(&mut self, other: NormalizedPage) {
        self.contracts.extend(other.contracts);
        self.dropped += other.dropped;
    }
}

/// 원시 계약 목록을 표준 레코드로 정규화합니다.
///
/// 순수 변환입니다. 폐기 사유는 debug 레벨로 기록합니다.
pub fn normalize_page(
    raw_contracts: &[Value],
    symbol: &str,
    snapshot_date: NaiveDate,
    underlying_price: Option<Decimal>,
) -> NormalizedPage {
    let mut page = NormalizedPage::default();

    for raw in raw_contracts {
        match parse_contract(raw, symbol, snapshot_date, underlying_price) {
            Ok(contract) => page.contracts.push(contract),
            Err(reason) => {
                page.dropped += 1;
                debug!(symbol, reason, "계약 폐기");
            }
        }
    }

    page
}

/// 계약 하나를 해석합니다. 실패 시 폐기 사유를 반환합니다.
fn parse_contract(
    raw: &Value,
    symbol: &str,
    snapshot_date: NaiveDate,
    underlying_price: Option<Decimal>,
) -> Result<OptionContract, String> {
    let raw: RawContract = serde_json::from_value(raw.clone())
        .map_err(|e| format!("역직렬화 실패: {}", e))?;

    let option_type = raw
        .put_call
        .as_deref()
        .and_then(OptionType::from_vendor)
        .ok_or_else(|| "putCall 누락 또는 알 수 없는 값".to_string())?;

    let strike = decimal_field(&raw.strike_price).ok_or_else(|| "strikePrice 누락".to_string())?;

    let expiration = raw
        .expiration_date
        .as_deref()
        .ok_or_else(|| "expirationDate 누락".to_string())
        .and_then(parse_expiration)?;

    let contract = OptionContract {
        symbol: symbol.to_string(),
        expiration,
        strike,
        option_type,
        bid: decimal_field(&raw.bid),
        ask: decimal_field(&raw.ask),
        last: decimal_field(&raw.last),
        volume: int_field(&raw.total_volume),
        open_interest: int_field(&raw.open_interest),
        implied_volatility: measure_field(&raw.volatility),
        greeks: Greeks {
            delta: measure_field(&raw.delta),
            gamma: measure_field(&raw.gamma),
            theta: measure_field(&raw.theta),
            vega: measure_field(&raw.vega),
            rho: measure_field(&raw.rho),
        },
        underlying_price,
        quote_time: raw
            .quote_time_in_long
            .and_then(|ms| DateTime::<Utc>::from_timestamp_millis(ms)),
        snapshot_date,
    };

    contract.validate().map_err(|e| e.to_string())?;

    Ok(contract)
}

/// `"YYYY-MM-DD"` 또는 `"YYYY-MM-DD:dte"` 형식의 만기일 파싱.
fn parse_expiration(s: &str) -> Result<NaiveDate, String> {
    let date_part = s.split(':').next().unwrap_or(s);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .map_err(|e| format!("expirationDate 형식 오류 ({}): {}", s, e))
}

/// 숫자 또는 숫자 문자열에서 Decimal 추출.
fn decimal_field(value: &Option<Value>) -> Option<Decimal> {
    match value {
        Some(Value::Number(n)) => Decimal::from_str(&n.to_string()).ok(),
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Decimal::from_str(trimmed).ok()
            }
        }
        _ => None,
    }
}

/// 그릭스/변동성 필드: 결측 표기를 걸러낸 Decimal.
fn measure_field(value: &Option<Value>) -> Option<Decimal> {
    decimal_field(value).filter(|d| *d > Decimal::from(MISSING_SENTINEL))
}

/// 숫자 또는 숫자 문자열에서 정수 추출 (거래량, 미결제약정).
fn int_field(value: &Option<Value>) -> Option<i64> {
    match value {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    }
}
