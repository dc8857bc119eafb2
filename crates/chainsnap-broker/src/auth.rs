//! OAuth 2.0 인증 모듈.
//!
//! 처리 기능:
//! - 접근 토큰 발급 및 갱신 (POST /v1/oauth2/token, refresh_token grant)
//! - 만료 임박 토큰의 선제 갱신
//! - 동시 401에 대한 갱신 병합: 한 요청만 업스트림을 호출하고
//!   나머지는 새 토큰을 재사용

use crate::config::BrokerConfig;
use crate::error::BrokerError;
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

/// 토큰 갱신 임계값 (남은 시간이 이 값보다 적으면 갱신).
const TOKEN_REFRESH_THRESHOLD_SECS: i64 = 60;

/// OAuth 토큰 응답.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    /// 접근 토큰
    pub access_token: String,
    /// 토큰 타입 (일반적으로 "Bearer")
    pub token_type: String,
    /// 토큰 만료 시간 (초)
    pub expires_in: i64,
}

/// OAuth 에러 응답 (토큰 발급 실패 시).
#[derive(Debug, Clone, Deserialize)]
struct OAuthErrorResponse {
    error: String,
}

/// 만료 추적이 포함된 토큰 상태.
#[derive(Debug, Clone)]
pub struct TokenState {
    /// 접근 토큰
    pub access_token: String,
    /// 토큰 타입
    pub token_type: String,
    /// 만료 시각
    pub expires_at: DateTime<Utc>,
}

impl TokenState {
    /// 새 토큰 상태 생성.
    pub fn new(access_token: String, token_type: String, expires_at: DateTime<Utc>) -> Self {
        Self {
            access_token,
            token_type,
            expires_at,
        }
    }

    /// 토큰이 만료되었거나 곧 만료되는지 확인.
    pub fn is_expired_or_expiring(&self) -> bool {
        let threshold = Utc::now() + Duration::seconds(TOKEN_REFRESH_THRESHOLD_SECS);
        self.expires_at <= threshold
    }

    /// 토큰이 유효한지 확인.
    pub fn is_valid(&self) -> bool {
        self.expires_at > Utc::now()
    }

    /// 인증 헤더 값 반환.
    pub fn auth_header(&self) -> String {
        format!("{} {}", self.token_type, self.access_token)
    }
}

/// OAuth 인증 관리자.
///
/// 토큰 수명 주기를 관리합니다. 토큰 자체는 실행 중에만 메모리에 유지되며
/// 프로세스 간에 공유되지 않습니다.
pub struct SessionAuth {
    config: BrokerConfig,
    client: Client,
    token: Arc<RwLock<Option<TokenState>>>,
    refresh_guard: Arc<Mutex<()>>,
}

impl SessionAuth {
    /// 새로운 인증 관리자 생성.
    ///
    /// # Errors
    /// HTTP 클라이언트 생성에 실패하면 `BrokerError::NetworkError`를 반환합니다.
    pub fn new(config: BrokerConfig) -> Result<Self, BrokerError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| BrokerError::NetworkError(format!("HTTP client 생성 실패: {}", e)))?;

        Ok(Self {
            config,
            client,
            token: Arc::new(RwLock::new(None)),
            refresh_guard: Arc::new(Mutex::new(())),
        })
    }

    /// 초기 토큰 설정 (테스트 및 외부에서 발급된 토큰 재사용).
    pub async fn set_cached_token(&self, token: TokenState) {
        if token.is_valid() {
            let mut token_guard = self.token.write().await;
            *token_guard = Some(token);
        } else {
            debug!("만료된 토큰은 캐시하지 않음");
        }
    }

    /// 유효한 접근 토큰 반환, 필요시 갱신.
    pub async fn get_token(&self) -> Result<TokenState, BrokerError> {
        {
            let token_guard = self.token.read().await;
            if let Some(ref token) = *token_guard {
                if !token.is_expired_or_expiring() {
                    return Ok(token.clone());
                }
                warn!(expires_at = %token.expires_at, "토큰 만료 임박, 갱신 필요");
            } else {
                info!("캐시된 토큰 없음, 새 토큰 발급");
            }
        }

        // 만료 경로에서도 동시 갱신은 한 번으로 병합
        let _guard = self.refresh_guard.lock().await;
        {
            let token_guard = self.token.read().await;
            if let Some(ref token) = *token_guard {
                if !token.is_expired_or_expiring() {
                    return Ok(token.clone());
                }
            }
        }
        self.request_token().await
    }

    /// 401 거부 이후의 토큰 갱신.
    ///
    /// 거부된 토큰과 현재 토큰을 비교해, 다른 작업이 이미 갱신을 마쳤으면
    /// 업스트림 호출 없이 새 토큰을 재사용합니다. 동시에 여러 요청이 401을
    /// 받아도 `refresh_token` 호출은 한 번만 발생합니다.
    pub async fn refresh_after_reject(
        &self,
        rejected_token: &str,
    ) -> Result<TokenState, BrokerError> {
        let _guard = self.refresh_guard.lock().await;
        {
            let token_guard = self.token.read().await;
            if let Some(ref current) = *token_guard {
                if current.access_token != rejected_token && current.is_valid() {
                    debug!("다른 작업이 이미 토큰을 갱신함, 재사용");
                    return Ok(current.clone());
                }
            }
        }
        self.request_token().await
    }

    /// 접근 토큰 강제 갱신.
    pub async fn refresh_token(&self) -> Result<TokenState, BrokerError> {
        let _guard = self.refresh_guard.lock().await;
        self.request_token().await
    }

    /// 토큰 엔드포인트 호출. 호출자는 `refresh_guard`를 잡고 있어야 합니다.
    async fn request_token(&self) -> Result<TokenState, BrokerError> {
        if self.config.client_id.is_empty() || self.config.refresh_token.is_empty() {
            return Err(BrokerError::Unauthorized(
                "BROKER_CLIENT_ID / BROKER_REFRESH_TOKEN이 설정되지 않았습니다".to_string(),
            ));
        }

        info!(
            client_id_prefix = %self.config.client_id.chars().take(8).collect::<String>(),
            "접근 토큰 요청"
        );

        let response = self
            .client
            .post(self.config.token_url())
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", self.config.refresh_token.as_str()),
                ("client_id", self.config.client_id.as_str()),
            ])
            .send()
            .await
            .map_err(|e| BrokerError::NetworkError(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| BrokerError::NetworkError(e.to_string()))?;

        if !status.is_success() {
            // OAuth 에러 응답 파싱 시도
            if let Ok(oauth_error) = serde_json::from_str::<OAuthErrorResponse>(&body) {
                return Err(BrokerError::Unauthorized(format!(
                    "토큰 발급 거부: {}",
                    oauth_error.error
                )));
            }
            return Err(BrokerError::Unauthorized(format!(
                "토큰 발급 실패 ({}): {}",
                status, body
            )));
        }

        let token_resp: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| BrokerError::ParseError(format!("토큰 응답 파싱 실패: {}", e)))?;

        let token_state = TokenState::new(
            token_resp.access_token,
            token_resp.token_type,
            Utc::now() + Duration::seconds(token_resp.expires_in),
        );

        {
            let mut token_guard = self.token.write().await;
            *token_guard = Some(token_state.clone());
        }

        info!(expires_at = %token_state.expires_at, "접근 토큰 발급 완료");

        Ok(token_state)
    }
}
