//! 옵션 체인 조회 클라이언트.
//!
//! 모든 요청에 bearer 토큰을 부착하고, 401 응답에는 병합 갱신 후 원 요청을
//! 한 번만 재시도합니다. rate limit과 일시적 네트워크 오류는 제한된 지수
//! 백오프로 재시도하며, 그 외의 HTTP 오류는 즉시 호출자에게 전달합니다.
//!
//! 페이지네이션은 일회성 lazy 스트림으로 표현합니다. 응답의 커서를 따라
//! 다음 페이지를 요청하고, 설정된 최대 페이지 수에서 중단합니다.

use crate::auth::{SessionAuth, TokenState};
use crate::config::BrokerConfig;
use crate::error::BrokerError;
use crate::retry::with_retry;
use chrono::NaiveDate;
use futures::Stream;
use reqwest::{Client, Response, StatusCode};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};

/// 체인 조회 시 계약 유형 필터.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContractType {
    /// 콜만
    Call,
    /// 풋만
    Put,
    /// 전체
    #[default]
    All,
}

impl ContractType {
    /// 업스트림 쿼리 파라미터 값.
    pub fn as_query(&self) -> &'static str {
        match self {
            ContractType::Call => "CALL",
            ContractType::Put => "PUT",
            ContractType::All => "ALL",
        }
    }

    /// 설정 문자열에서 파싱.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "call" => Some(ContractType::Call),
            "put" => Some(ContractType::Put),
            "all" => Some(ContractType::All),
            _ => None,
        }
    }
}

/// 옵션 체인 조회 요청.
///
/// 심볼 하나의 페이지네이션이 끝나면 폐기됩니다.
#[derive(Debug, Clone)]
pub struct ChainRequest {
    /// 기초자산 심볼
    pub symbol: String,
    /// 만기 하한 (서버측 필터)
    pub from_date: Option<NaiveDate>,
    /// 만기 상한 (서버측 필터)
    pub to_date: Option<NaiveDate>,
    /// 계약 유형 필터
    pub contract_type: ContractType,
    /// 페이지네이션 커서
    pub cursor: Option<String>,
}

impl ChainRequest {
    /// 새 체인 요청 생성.
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            from_date: None,
            to_date: None,
            contract_type: ContractType::All,
            cursor: None,
        }
    }

    /// 만기 범위 필터 설정.
    pub fn with_expiration_window(
        mut self,
        from_date: Option<NaiveDate>,
        to_date: Option<NaiveDate>,
    ) -> Self {
        self.from_date = from_date;
        self.to_date = to_date;
        self
    }

    /// 계약 유형 필터 설정.
    pub fn with_contract_type(mut self, contract_type: ContractType) -> Self {
        self.contract_type = contract_type;
        self
    }

    /// 다음 페이지 요청 생성.
    fn with_cursor(&self, cursor: String) -> Self {
        Self {
            cursor: Some(cursor),
            ..self.clone()
        }
    }
}

/// 옵션 체인 응답 페이지 (원시).
///
/// 개별 계약은 정규화 전까지 `serde_json::Value`로 유지합니다.
/// 깨진 계약 하나가 페이지 전체 역직렬화를 실패시키지 않아야 합니다.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainPage {
    /// 기초자산 심볼
    #[serde(default)]
    pub symbol: String,
    /// 업스트림 상태 필드 ("SUCCESS" / "FAILED")
    #[serde(default)]
    pub status: Option<String>,
    /// 기초자산 현재가
    #[serde(default)]
    pub underlying_price: Option<Decimal>,
    /// 원시 계약 페이로드
    #[serde(default)]
    pub contracts: Vec<serde_json::Value>,
    /// 다음 페이지 커서 (없으면 마지막 페이지)
    #[serde(default)]
    pub next_cursor: Option<String>,
}

/// 브로커 API 클라이언트.
///
/// 토큰 상태는 내부의 `SessionAuth`가 소유하며, 클라이언트를 공유하는
/// 모든 동시 요청이 같은 토큰을 사용합니다.
pub struct BrokerClient {
    config: BrokerConfig,
    client: Client,
    auth: Arc<SessionAuth>,
}

impl BrokerClient {
    /// 새 클라이언트 생성.
    pub fn new(config: BrokerConfig) -> Result<Self, BrokerError> {
        let auth = Arc::new(SessionAuth::new(config.clone())?);
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| BrokerError::NetworkError(format!("HTTP client 생성 실패: {}", e)))?;

        Ok(Self {
            config,
            client,
            auth,
        })
    }

    /// 인증 관리자 참조 (테스트에서 토큰 시딩용).
    pub fn auth(&self) -> &SessionAuth {
        &self.auth
    }

    /// 체인 페이지 한 장 조회 (재시도 정책 적용).
    pub async fn fetch_page(&self, request: &ChainRequest) -> Result<ChainPage, BrokerError> {
        with_retry(&self.config.retry, || self.fetch_page_once(request)).await
    }

    /// 심볼 하나의 전체 체인을 페이지 스트림으로 반환.
    ///
    /// lazy하고 유한하며 재시작할 수 없습니다. 다시 읽으려면 새 스트림을
    /// 만들어야 합니다. 세션 오류는 스트림의 에러 항목으로 끝납니다.
    pub fn chain_pages(
        &self,
        request: ChainRequest,
    ) -> impl Stream<Item = Result<ChainPage, BrokerError>> + '_ {
        let max_pages = self.config.max_pages;
        futures::stream::try_unfold((Some(request), 0u32), move |(pending, fetched)| async move {
            let Some(req) = pending else {
                return Ok(None);
            };
            if fetched >= max_pages {
                warn!(
                    symbol = %req.symbol,
                    max_pages,
                    "최대 페이지 수 도달, 페이지네이션 중단"
                );
                return Ok(None);
            }

            let page = self.fetch_page(&req).await?;
            let next = page
                .next_cursor
                .as_ref()
                .map(|cursor| req.with_cursor(cursor.clone()));
            Ok(Some((page, (next, fetched + 1))))
        })
    }

    /// 단일 시도: 토큰 부착 → 전송 → 401이면 병합 갱신 후 한 번 재전송.
    async fn fetch_page_once(&self, request: &ChainRequest) -> Result<ChainPage, BrokerError> {
        let token = self.auth.get_token().await?;
        let response = self.send_chain_request(&token, request).await?;

        let response = if response.status() == StatusCode::UNAUTHORIZED {
            warn!(symbol = %request.symbol, "401 응답, 토큰 갱신 후 재시도");
            let refreshed = self.auth.refresh_after_reject(&token.access_token).await?;
            let retried = self.send_chain_request(&refreshed, request).await?;
            if retried.status() == StatusCode::UNAUTHORIZED {
                return Err(BrokerError::Unauthorized(
                    "토큰 갱신 후에도 요청이 거부되었습니다".to_string(),
                ));
            }
            retried
        } else {
            response
        };

        self.parse_chain_response(request, response).await
    }

    async fn send_chain_request(
        &self,
        token: &TokenState,
        request: &ChainRequest,
    ) -> Result<Response, BrokerError> {
        let mut query: Vec<(&str, String)> = vec![
            ("symbol", request.symbol.clone()),
            ("contractType", request.contract_type.as_query().to_string()),
        ];
        if let Some(from_date) = request.from_date {
            query.push(("fromDate", from_date.format("%Y-%m-%d").to_string()));
        }
        if let Some(to_date) = request.to_date {
            query.push(("toDate", to_date.format("%Y-%m-%d").to_string()));
        }
        if let Some(ref cursor) = request.cursor {
            query.push(("cursor", cursor.clone()));
        }

        debug!(symbol = %request.symbol, cursor = ?request.cursor, "체인 페이지 요청");

        let response = self
            .client
            .get(self.config.chains_url())
            .header("Authorization", token.auth_header())
            .query(&query)
            .send()
            .await?;

        Ok(response)
    }

    /// 상태 코드 분류 및 페이로드 파싱.
    async fn parse_chain_response(
        &self,
        request: &ChainRequest,
        response: Response,
    ) -> Result<ChainPage, BrokerError> {
        let status = response.status();

        if self.config.is_rate_limit_status(status.as_u16()) {
            let retry_after_ms = response
                .headers()
                .get(self.config.retry_after_header.as_str())
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(|secs| secs * 1000);
            return Err(BrokerError::RateLimited { retry_after_ms });
        }

        let body = response
            .text()
            .await
            .map_err(|e| BrokerError::NetworkError(e.to_string()))?;

        if status == StatusCode::NOT_FOUND {
            return Err(BrokerError::NotFound(request.symbol.clone()));
        }
        if status.is_server_error() {
            return Err(BrokerError::NetworkError(format!(
                "서버 오류 {}: {}",
                status, body
            )));
        }
        if !status.is_success() {
            return Err(BrokerError::ApiError {
                code: status.as_u16() as i32,
                message: body,
            });
        }

        let page: ChainPage = serde_json::from_str(&body)
            .map_err(|e| BrokerError::ParseError(format!("체인 응답 파싱 실패: {}", e)))?;

        // 업스트림이 200과 함께 실패 상태를 내려주는 경우
        if page.status.as_deref() == Some("FAILED") {
            return Err(BrokerError::ApiError {
                code: -1,
                message: format!("체인 조회 실패 상태 응답 (symbol: {})", request.symbol),
            });
        }

        Ok(page)
    }
}
