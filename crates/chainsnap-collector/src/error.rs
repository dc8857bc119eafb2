//! 에러 타입 정의.

use chainsnap_broker::BrokerError;
use chainsnap_store::StoreError;
use std::fmt;

/// Collector 에러 타입.
#[derive(Debug)]
pub enum CollectorError {
    /// 데이터베이스 에러
    Database(sqlx::Error),
    /// 설정 에러
    Config(String),
    /// 브로커 API 에러 (수집 중단 사유가 된 경우)
    Broker(BrokerError),
    /// 저장 에러
    Store(StoreError),
    /// 일반 에러
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl fmt::Display for CollectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Database(e) => write!(f, "Database error: {}", e),
            Self::Config(msg) => write!(f, "Configuration error: {}", msg),
            Self::Broker(e) => write!(f, "Broker error: {}", e),
            Self::Store(e) => write!(f, "Store error: {}", e),
            Self::Other(e) => write!(f, "Error: {}", e),
        }
    }
}

impl std::error::Error for CollectorError {}

impl From<sqlx::Error> for CollectorError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(err)
    }
}

impl From<BrokerError> for CollectorError {
    fn from(err: BrokerError) -> Self {
        Self::Broker(err)
    }
}

impl From<StoreError> for CollectorError {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}

impl From<std::env::VarError> for CollectorError {
    fn from(err: std::env::VarError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<Box<dyn std::error::Error + Send + Sync>> for CollectorError {
    fn from(err: Box<dyn std::error::Error + Send + Sync>) -> Self {
        Self::Other(err)
    }
}

/// Result 타입 별칭.
pub type Result<T> = std::result::Result<T, CollectorError>;
