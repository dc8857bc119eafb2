//! 제한된 재시도 및 지수 백오프.
//!
//! 재시도 가능한 에러(네트워크, 타임아웃, rate limit)에 한해 시도 횟수
//! 한도 내에서 재시도합니다. 대기 시간은 기본 지연에서 시작해 시도마다
//! 두 배로 늘어나며 상한에서 잘립니다. 서버가 Retry-After로 대기 시간을
//! 지시한 경우 그 값을 우선합니다.

use crate::error::BrokerError;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// 재시도 정책 설정.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// 최대 시도 횟수 (최초 시도 포함)
    pub max_attempts: u32,
    /// 첫 재시도 전 대기 시간 (밀리초)
    pub base_delay_ms: u64,
    /// 대기 시간 상한 (밀리초)
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay_ms: 500,
            max_delay_ms: 30_000,
        }
    }
}

impl RetryConfig {
    /// 해당 시도 이후의 백오프 대기 시간 계산.
    fn backoff_ms(&self, attempt: u32) -> u64 {
        // 1u64 << 63 이상으로 넘치지 않도록 지수를 제한
        let exp = attempt.saturating_sub(1).min(16);
        self.base_delay_ms
            .saturating_mul(1u64 << exp)
            .min(self.max_delay_ms)
    }
}

/// 재시도 한도 내에서 비동기 작업을 실행합니다.
///
/// 재시도 불가능한 에러는 즉시 반환하며, 한도를 소진하면 마지막 에러를
/// 반환합니다.
pub async fn with_retry<T, F, Fut>(config: &RetryConfig, mut op: F) -> Result<T, BrokerError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, BrokerError>>,
{
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt < config.max_attempts => {
                let delay_ms = err
                    .retry_delay_ms()
                    .unwrap_or_else(|| config.backoff_ms(attempt))
                    .min(config.max_delay_ms);

                warn!(
                    attempt,
                    max_attempts = config.max_attempts,
                    delay_ms,
                    error = %err,
                    "요청 실패, 재시도 대기"
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
            Err(err) => return Err(err),
        }
    }
}
