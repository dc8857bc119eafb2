//! 브로커 API 설정.
//!
//! 브로커 API는 client_id와 refresh token을 사용한 OAuth 2.0 인증이
//! 필요합니다. rate limit 상태 코드와 Retry-After 헤더 이름은 제공자마다
//! 다르므로 하드코딩하지 않고 설정으로 둡니다.

use crate::retry::RetryConfig;
use serde::{Deserialize, Serialize};

/// 기본 REST API URL.
const DEFAULT_BASE_URL: &str = "https://api.tdameritrade.com";

/// 브로커 API 설정.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// REST API 기본 URL
    pub base_url: String,
    /// OAuth 클라이언트 ID (앱키)
    pub client_id: String,
    /// OAuth refresh token (장기 자격증명)
    pub refresh_token: String,
    /// 요청 타임아웃 (초)
    pub timeout_secs: u64,
    /// 한 심볼당 따라갈 최대 페이지 수 (무한 페이지네이션 방지)
    pub max_pages: u32,
    /// rate limit으로 해석할 HTTP 상태 코드 목록
    pub rate_limit_statuses: Vec<u16>,
    /// 서버 지시 대기 시간이 담긴 응답 헤더 이름
    pub retry_after_header: String,
    /// 재시도 정책
    #[serde(skip)]
    pub retry: RetryConfig,
}

impl BrokerConfig {
    /// 새 브로커 설정 생성.
    pub fn new(client_id: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            client_id: client_id.into(),
            refresh_token: refresh_token.into(),
            timeout_secs: 30,
            max_pages: 50,
            rate_limit_statuses: vec![429],
            retry_after_header: "Retry-After".to_string(),
            retry: RetryConfig::default(),
        }
    }

    /// 기본 URL 교체 (테스트 및 대체 엔드포인트용).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// 토큰 발급 엔드포인트 URL 반환.
    pub fn token_url(&self) -> String {
        format!("{}/v1/oauth2/token", self.base_url)
    }

    /// 옵션 체인 조회 엔드포인트 URL 반환.
    pub fn chains_url(&self) -> String {
        format!("{}/v1/marketdata/chains", self.base_url)
    }

    /// 해당 상태 코드가 rate limit 응답인지 확인.
    pub fn is_rate_limit_status(&self, status: u16) -> bool {
        self.rate_limit_statuses.contains(&status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_urls() {
        let config = BrokerConfig::new("client-id", "refresh-token")
            .with_base_url("http://127.0.0.1:9999");
        assert_eq!(config.token_url(), "http://127.0.0.1:9999/v1/oauth2/token");
        assert_eq!(
            config.chains_url(),
            "http://127.0.0.1:9999/v1/marketdata/chains"
        );
    }

    #[test]
    fn test_rate_limit_status_from_config() {
        let mut config = BrokerConfig::new("id", "token");
        assert!(config.is_rate_limit_status(429));
        assert!(!config.is_rate_limit_status(503));

        config.rate_limit_statuses = vec![429, 430];
        assert!(config.is_rate_limit_status(430));
    }
}
