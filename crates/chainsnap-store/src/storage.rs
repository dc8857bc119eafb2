//! 옵션 계약 스냅샷 저장소.
//!
//! 저장 단위는 `(symbol, snapshot_date)` 파티션입니다. 같은 키로 다시 쓰면
//! 기존 행을 교체하므로 같은 날 재실행해도 행이 중복되지 않습니다.
//! 교체는 단일 트랜잭션(DELETE 후 INSERT)으로 수행되어, 중간에 실패하면
//! 이전 상태가 그대로 유지됩니다.

use crate::error::{Result, StoreError};
use async_trait::async_trait;
use chainsnap_core::{Greeks, OptionContract, OptionType};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgPool;
use sqlx::FromRow;
use tracing::{debug, info};

/// 계약 스냅샷 저장 인터페이스.
///
/// 수집 파이프라인과 저장 백엔드 사이의 경계입니다. 테스트는 인메모리
/// 구현을 주입해 DB 없이 파이프라인을 검증합니다.
#[async_trait]
pub trait ContractSink: Send + Sync {
    /// `(symbol, snapshot_date)` 파티션을 주어진 계약들로 교체합니다.
    ///
    /// 전부 쓰이거나 전혀 쓰이지 않습니다. 저장된 행 수를 반환합니다.
    async fn replace_snapshot(
        &self,
        symbol: &str,
        snapshot_date: NaiveDate,
        contracts: &[OptionContract],
    ) -> Result<u64>;

    /// 파티션의 저장된 계약을 조회합니다.
    async fn fetch_snapshot(
        &self,
        symbol: &str,
        snapshot_date: NaiveDate,
    ) -> Result<Vec<OptionContract>>;
}

/// 옵션 계약 데이터베이스 레코드.
#[derive(Debug, Clone, FromRow)]
struct ContractRow {
    symbol: String,
    expiration: NaiveDate,
    strike: Decimal,
    option_type: String,
    bid: Option<Decimal>,
    ask: Option<Decimal>,
    last: Option<Decimal>,
    volume: Option<i64>,
    open_interest: Option<i64>,
    implied_volatility: Option<Decimal>,
    delta: Option<Decimal>,
    gamma: Option<Decimal>,
    theta: Option<Decimal>,
    vega: Option<Decimal>,
    rho: Option<Decimal>,
    underlying_price: Option<Decimal>,
    quote_time: Option<DateTime<Utc>>,
    snapshot_date: NaiveDate,
}

impl ContractRow {
    /// 도메인 레코드로 변환.
    fn into_contract(self) -> Result<OptionContract> {
        let option_type = OptionType::from_vendor(&self.option_type).ok_or_else(|| {
            StoreError::InvalidData(format!("Unknown option_type: {}", self.option_type))
        })?;

        Ok(OptionContract {
            symbol: self.symbol,
            expiration: self.expiration,
            strike: self.strike,
            option_type,
            bid: self.bid,
            ask: self.ask,
            last: self.last,
            volume: self.volume,
            open_interest: self.open_interest,
            implied_volatility: self.implied_volatility,
            greeks: Greeks {
                delta: self.delta,
                gamma: self.gamma,
                theta: self.theta,
                vega: self.vega,
                rho: self.rho,
            },
            underlying_price: self.underlying_price,
            quote_time: self.quote_time,
            snapshot_date: self.snapshot_date,
        })
    }
}

/// PostgreSQL 계약 저장소.
#[derive(Clone)]
pub struct PgContractStore {
    pool: PgPool,
}

impl PgContractStore {
    /// 기존 연결 풀로 저장소 생성 (스키마 보장 포함).
    pub async fn new(pool: PgPool) -> Result<Self> {
        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    /// 데이터베이스에 연결하고 스키마를 보장합니다.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| StoreError::ConnectionError(e.to_string()))?;
        Self::new(pool).await
    }

    /// 스냅샷 테이블과 인덱스 생성 (이미 있으면 무시).
    async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS option_contracts (
                symbol             TEXT        NOT NULL,
                expiration         DATE        NOT NULL,
                strike             NUMERIC     NOT NULL,
                option_type        TEXT        NOT NULL,
                bid                NUMERIC,
                ask                NUMERIC,
                last               NUMERIC,
                volume             BIGINT,
                open_interest      BIGINT,
                implied_volatility NUMERIC,
                delta              NUMERIC,
                gamma              NUMERIC,
                theta              NUMERIC,
                vega               NUMERIC,
                rho                NUMERIC,
                underlying_price   NUMERIC,
                quote_time         TIMESTAMPTZ,
                snapshot_date      DATE        NOT NULL,
                fetched_at         TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                PRIMARY KEY (symbol, expiration, strike, option_type, snapshot_date)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_option_contracts_symbol_snapshot
                ON option_contracts (symbol, snapshot_date)
            "#,
        )
        .execute(&self.pool)
        .await?;

        debug!("option_contracts 스키마 확인 완료");
        Ok(())
    }
}

#[async_trait]
impl ContractSink for PgContractStore {
    async fn replace_snapshot(
        &self,
        symbol: &str,
        snapshot_date: NaiveDate,
        contracts: &[OptionContract],
    ) -> Result<u64> {
        let mut tx = self.pool.begin().await?;

        let deleted = sqlx::query(
            r#"
            DELETE FROM option_contracts
            WHERE symbol = $1 AND snapshot_date = $2
            "#,
        )
        .bind(symbol)
        .bind(snapshot_date)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        for contract in contracts {
            sqlx::query(
                r#"
                INSERT INTO option_contracts (
                    symbol, expiration, strike, option_type,
                    bid, ask, last, volume, open_interest,
                    implied_volatility, delta, gamma, theta, vega, rho,
                    underlying_price, quote_time, snapshot_date
                )
                VALUES (
                    $1, $2, $3, $4, $5, $6, $7, $8, $9,
                    $10, $11, $12, $13, $14, $15, $16, $17, $18
                )
                "#,
            )
            .bind(&contract.symbol)
            .bind(contract.expiration)
            .bind(contract.strike)
            .bind(contract.option_type.as_str())
            .bind(contract.bid)
            .bind(contract.ask)
            .bind(contract.last)
            .bind(contract.volume)
            .bind(contract.open_interest)
            .bind(contract.implied_volatility)
            .bind(contract.greeks.delta)
            .bind(contract.greeks.gamma)
            .bind(contract.greeks.theta)
            .bind(contract.greeks.vega)
            .bind(contract.greeks.rho)
            .bind(contract.underlying_price)
            .bind(contract.quote_time)
            .bind(contract.snapshot_date)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        info!(
            symbol,
            snapshot_date = %snapshot_date,
            replaced = deleted,
            written = contracts.len(),
            "스냅샷 저장 완료"
        );

        Ok(contracts.len() as u64)
    }

    async fn fetch_snapshot(
        &self,
        symbol: &str,
        snapshot_date: NaiveDate,
    ) -> Result<Vec<OptionContract>> {
        let rows: Vec<ContractRow> = sqlx::query_as(
            r#"
            SELECT symbol, expiration, strike, option_type,
                   bid, ask, last, volume, open_interest,
                   implied_volatility, delta, gamma, theta, vega, rho,
                   underlying_price, quote_time, snapshot_date
            FROM option_contracts
            WHERE symbol = $1 AND snapshot_date = $2
            ORDER BY expiration, strike, option_type
            "#,
        )
        .bind(symbol)
        .bind(snapshot_date)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ContractRow::into_contract).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample_row() -> ContractRow {
        ContractRow {
            symbol: "AAPL".to_string(),
            expiration: NaiveDate::from_ymd_opt(2024, 1, 19).unwrap(),
            strike: dec!(185.0),
            option_type: "call".to_string(),
            bid: Some(dec!(1.25)),
            ask: Some(dec!(1.35)),
            last: None,
            volume: Some(1200),
            open_interest: None,
            implied_volatility: Some(dec!(0.21)),
            delta: Some(dec!(0.45)),
            gamma: None,
            theta: None,
            vega: None,
            rho: None,
            underlying_price: Some(dec!(184.20)),
            quote_time: None,
            snapshot_date: NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
        }
    }

    #[test]
    fn test_row_converts_to_domain_record() {
        let contract = sample_row().into_contract().unwrap();
        assert_eq!(contract.option_type, OptionType::Call);
        assert_eq!(contract.strike, dec!(185.0));
        assert_eq!(contract.greeks.delta, Some(dec!(0.45)));
        assert!(contract.validate().is_ok());
    }

    #[test]
    fn test_row_with_unknown_option_type_rejected() {
        let mut row = sample_row();
        row.option_type = "straddle".to_string();
        assert!(matches!(
            row.into_contract(),
            Err(StoreError::InvalidData(_))
        ));
    }
}
