//! 환경변수 기반 설정 모듈.

use crate::Result;
use chainsnap_broker::{BrokerConfig, ContractType, RetryConfig};
use std::time::Duration;

/// Collector 전체 설정.
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// 데이터베이스 URL
    pub database_url: String,
    /// 수집할 기초자산 유니버스
    pub universe: Vec<String>,
    /// 체인 수집 설정
    pub chain: ChainCollectConfig,
    /// 브로커 API 설정
    pub broker: BrokerConfig,
    /// 데몬 모드 설정
    pub daemon: DaemonConfig,
}

/// 체인 수집 설정.
#[derive(Debug, Clone)]
pub struct ChainCollectConfig {
    /// 만기까지 남은 일수 하한 (스냅샷 일자 기준)
    pub min_dte: i64,
    /// 만기까지 남은 일수 상한
    pub max_dte: i64,
    /// 계약 유형 필터 (call/put/all)
    pub contract_type: ContractType,
    /// 동시에 처리할 심볼 수
    pub concurrency: usize,
    /// 심볼 처리 간 딜레이 (밀리초)
    pub request_delay_ms: u64,
}

/// 데몬 모드 설정.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// 워크플로우 실행 주기 (분 단위)
    pub interval_minutes: u64,
}

impl CollectorConfig {
    /// 환경변수에서 설정 로드.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = std::env::var("DATABASE_URL").map_err(|_| {
            crate::error::CollectorError::Config(
                "DATABASE_URL 환경변수가 설정되지 않았습니다".to_string(),
            )
        })?;

        let client_id = std::env::var("BROKER_CLIENT_ID").map_err(|_| {
            crate::error::CollectorError::Config(
                "BROKER_CLIENT_ID 환경변수가 설정되지 않았습니다".to_string(),
            )
        })?;
        let refresh_token = std::env::var("BROKER_REFRESH_TOKEN").map_err(|_| {
            crate::error::CollectorError::Config(
                "BROKER_REFRESH_TOKEN 환경변수가 설정되지 않았습니다".to_string(),
            )
        })?;

        let mut broker = BrokerConfig::new(client_id, refresh_token);
        if let Ok(base_url) = std::env::var("BROKER_BASE_URL") {
            broker.base_url = base_url;
        }
        broker.timeout_secs = env_var_parse("BROKER_TIMEOUT_SECS", 30);
        broker.max_pages = env_var_parse("BROKER_MAX_PAGES", 50);
        broker.rate_limit_statuses = env_var_status_list("BROKER_RATE_LIMIT_STATUS", vec![429]);
        if let Ok(header) = std::env::var("BROKER_RETRY_AFTER_HEADER") {
            broker.retry_after_header = header;
        }
        broker.retry = RetryConfig {
            max_attempts: env_var_parse("BROKER_RETRY_MAX_ATTEMPTS", 4),
            base_delay_ms: env_var_parse("BROKER_RETRY_BASE_DELAY_MS", 500),
            max_delay_ms: env_var_parse("BROKER_RETRY_MAX_DELAY_MS", 30_000),
        };

        Ok(Self {
            database_url,
            universe: env_var_symbol_list("CHAINSNAP_UNIVERSE", "SPX"),
            chain: ChainCollectConfig {
                min_dte: env_var_parse("CHAIN_MIN_DTE", 0),
                max_dte: env_var_parse("CHAIN_MAX_DTE", 60),
                contract_type: std::env::var("CHAIN_CONTRACT_TYPE")
                    .ok()
                    .and_then(|s| ContractType::from_str(&s))
                    .unwrap_or_default(),
                concurrency: env_var_parse("CHAIN_CONCURRENCY", 2),
                request_delay_ms: env_var_parse("CHAIN_REQUEST_DELAY_MS", 500),
            },
            broker,
            daemon: DaemonConfig {
                interval_minutes: env_var_parse("DAEMON_INTERVAL_MINUTES", 1440),
            },
        })
    }
}

impl ChainCollectConfig {
    /// 심볼 처리 간 딜레이를 Duration으로 반환.
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }
}

impl DaemonConfig {
    /// 워크플로우 실행 주기를 Duration으로 반환.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_minutes * 60)
    }
}

/// 환경변수에서 값을 파싱 (실패 시 기본값 사용).
fn env_var_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// 쉼표로 구분된 심볼 목록 파싱.
fn env_var_symbol_list(key: &str, default: &str) -> Vec<String> {
    let raw = std::env::var(key).unwrap_or_else(|_| default.to_string());
    parse_symbol_list(&raw)
}

/// 쉼표로 구분된 상태 코드 목록 파싱.
fn env_var_status_list(key: &str, default: Vec<u16>) -> Vec<u16> {
    match std::env::var(key) {
        Ok(raw) => {
            let parsed: Vec<u16> = raw
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            if parsed.is_empty() {
                default
            } else {
                parsed
            }
        }
        Err(_) => default,
    }
}

/// 쉼표로 구분된 심볼 문자열을 정리된 목록으로 변환.
pub fn parse_symbol_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect()
}
