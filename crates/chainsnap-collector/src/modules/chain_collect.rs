//! 옵션 체인 수집 워크플로우.
//!
//! 유니버스의 심볼마다 조회 → 정규화 → 저장 파이프라인을 실행합니다.
//! 심볼 단위 실패는 보고서에 기록될 뿐 실행을 중단시키지 않습니다.
//! 유일한 예외는 인증 소진(토큰 갱신 실패)으로, 실행 전체를 중단합니다.

use crate::config::{parse_symbol_list, ChainCollectConfig, CollectorConfig};
use crate::error::CollectorError;
use crate::report::{RunReport, SymbolOutcome};
use crate::Result;
use chainsnap_broker::{BrokerClient, ChainRequest};
use chainsnap_store::{normalize_page, ContractSink, NormalizedPage};
use chrono::{Duration, NaiveDate};
use futures::{StreamExt, TryStreamExt};
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// 옵션 체인 스냅샷 수집.
///
/// `symbols`가 주어지면 설정된 유니버스 대신 해당 심볼만 수집합니다.
pub async fn collect_chains<S: ContractSink>(
    client: &BrokerClient,
    sink: &S,
    config: &CollectorConfig,
    symbols: Option<String>,
    snapshot_date: NaiveDate,
) -> Result<RunReport> {
    let start = Instant::now();
    let mut report = RunReport::new(snapshot_date);

    // 수집할 심볼 목록 결정
    let universe = match symbols {
        Some(ref raw) => {
            let list = parse_symbol_list(raw);
            info!(count = list.len(), "특정 심볼 수집");
            list
        }
        None => config.universe.clone(),
    };

    if universe.is_empty() {
        warn!("수집할 심볼이 없습니다");
        report.elapsed = start.elapsed();
        return Ok(report);
    }

    // 만기 범위 계산 (스냅샷 일자 기준 DTE 범위)
    let from_date = snapshot_date + Duration::days(config.chain.min_dte);
    let to_date = snapshot_date + Duration::days(config.chain.max_dte);

    info!(
        symbols = universe.len(),
        snapshot_date = %snapshot_date,
        from_date = %from_date,
        to_date = %to_date,
        concurrency = config.chain.concurrency,
        "옵션 체인 수집 시작"
    );

    let chain_config = &config.chain;
    let results = futures::stream::iter(universe)
        .map(|symbol| async move {
            let outcome = process_symbol(
                client,
                sink,
                chain_config,
                &symbol,
                snapshot_date,
                from_date,
                to_date,
            )
            .await;

            // Rate limiting: 심볼 사이에 설정된 딜레이를 둔다
            tokio::time::sleep(chain_config.request_delay()).await;
            outcome
        })
        .buffer_unordered(config.chain.concurrency.max(1));

    futures::pin_mut!(results);
    while let Some(result) = results.next().await {
        // 인증 소진은 실행 전체를 중단시킨다
        report.record(result?);
    }

    report.elapsed = start.elapsed();
    Ok(report)
}

/// 심볼 하나의 조회 → 정규화 → 저장 파이프라인.
///
/// 심볼 단위 실패는 `SymbolOutcome::failed`로 흡수됩니다. 인증 에러만
/// `Err`로 전파되어 실행을 중단합니다.
async fn process_symbol<S: ContractSink>(
    client: &BrokerClient,
    sink: &S,
    config: &ChainCollectConfig,
    symbol: &str,
    snapshot_date: NaiveDate,
    from_date: NaiveDate,
    to_date: NaiveDate,
) -> Result<SymbolOutcome> {
    debug!(symbol, "수집 시작");

    let request = ChainRequest::new(symbol)
        .with_expiration_window(Some(from_date), Some(to_date))
        .with_contract_type(config.contract_type);

    let pages = client.chain_pages(request);
    futures::pin_mut!(pages);

    let mut normalized = NormalizedPage::default();
    let mut page_count = 0usize;

    loop {
        match pages.try_next().await {
            Ok(Some(page)) => {
                page_count += 1;
                normalized.merge(normalize_page(
                    &page.contracts,
                    symbol,
                    snapshot_date,
                    page.underlying_price,
                ));
            }
            Ok(None) => break,
            Err(e) if e.is_auth_error() => {
                error!(symbol, error = %e, "인증 소진, 실행 중단");
                return Err(CollectorError::Broker(e));
            }
            Err(e) => {
                warn!(symbol, error = %e, "체인 조회 실패");
                return Ok(SymbolOutcome::failed(symbol, e.to_string()));
            }
        }
    }

    // 업스트림이 만기 필터를 무시한 경우를 대비한 클라이언트측 재확인
    let before = normalized.contracts.len();
    normalized
        .contracts
        .retain(|c| c.expiration >= from_date && c.expiration <= to_date);
    let out_of_window = before - normalized.contracts.len();
    if out_of_window > 0 {
        debug!(symbol, out_of_window, "만기 범위 밖 계약 제외");
    }

    match sink
        .replace_snapshot(symbol, snapshot_date, &normalized.contracts)
        .await
    {
        Ok(written) => {
            info!(
                symbol,
                pages = page_count,
                written,
                dropped = normalized.dropped,
                "수집 및 저장 완료"
            );
            Ok(SymbolOutcome::persisted(
                symbol,
                written as usize,
                normalized.dropped,
            ))
        }
        Err(e) => {
            error!(symbol, error = %e, "저장 실패");
            Ok(SymbolOutcome::failed(symbol, e.to_string()))
        }
    }
}
