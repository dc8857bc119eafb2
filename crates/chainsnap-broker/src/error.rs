//! 브로커 에러 타입.

use thiserror::Error;

/// 브로커 API 관련 에러.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// 네트워크/연결 에러 (5xx 포함)
    #[error("Network error: {0}")]
    NetworkError(String),

    /// 요청 타임아웃
    #[error("Request timeout: {0}")]
    Timeout(String),

    /// 인증/권한 에러 (토큰 갱신 후에도 거부되면 치명적)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// 요청 한도 초과
    #[error("Rate limit exceeded")]
    RateLimited {
        /// 서버가 지시한 대기 시간 (Retry-After 헤더, 밀리초)
        retry_after_ms: Option<u64>,
    },

    /// 심볼/리소스를 찾을 수 없음
    #[error("Not found: {0}")]
    NotFound(String),

    /// API 에러 응답
    #[error("API error {code}: {message}")]
    ApiError { code: i32, message: String },

    /// 파싱/역직렬화 에러
    #[error("Parse error: {0}")]
    ParseError(String),
}

impl BrokerError {
    /// 재시도 가능한 에러인지 확인.
    ///
    /// 인증 실패와 4xx 계열은 재시도하지 않고 즉시 호출자에게 전달합니다.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BrokerError::NetworkError(_)
                | BrokerError::Timeout(_)
                | BrokerError::RateLimited { .. }
        )
    }

    /// 서버가 지시한 재시도 대기 시간(밀리초) 반환.
    ///
    /// 지시가 없으면 `None`이며, 호출자는 지수 백오프를 사용합니다.
    pub fn retry_delay_ms(&self) -> Option<u64> {
        match self {
            BrokerError::RateLimited { retry_after_ms } => *retry_after_ms,
            _ => None,
        }
    }

    /// 인증 에러인지 확인.
    pub fn is_auth_error(&self) -> bool {
        matches!(self, BrokerError::Unauthorized(_))
    }
}

impl From<reqwest::Error> for BrokerError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            BrokerError::Timeout(err.to_string())
        } else if err.is_decode() {
            BrokerError::ParseError(err.to_string())
        } else {
            BrokerError::NetworkError(err.to_string())
        }
    }
}

impl From<serde_json::Error> for BrokerError {
    fn from(err: serde_json::Error) -> Self {
        BrokerError::ParseError(err.to_string())
    }
}
