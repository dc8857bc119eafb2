//! 저장 모듈 오류 타입.

use thiserror::Error;

/// 저장 관련 오류.
#[derive(Debug, Error)]
pub enum StoreError {
    /// 데이터베이스 연결 오류
    #[error("Database connection error: {0}")]
    ConnectionError(String),

    /// 쿼리 실행 오류
    #[error("Query error: {0}")]
    QueryError(String),

    /// 레코드를 찾을 수 없음
    #[error("Record not found: {0}")]
    NotFound(String),

    /// 중복 레코드
    #[error("Duplicate record: {0}")]
    DuplicateError(String),

    /// 잘못된 데이터 형식
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StoreError::NotFound("Row not found".to_string()),
            sqlx::Error::PoolTimedOut => {
                StoreError::ConnectionError("Connection pool exhausted".to_string())
            }
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().unwrap_or_default();
                if code == "23505" {
                    // PostgreSQL 고유 제약 조건 위반
                    StoreError::DuplicateError(db_err.message().to_string())
                } else {
                    StoreError::QueryError(db_err.message().to_string())
                }
            }
            _ => StoreError::QueryError(err.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
