//! 수집 워크플로우 통합 테스트.
//!
//! mockito로 브로커 API를 흉내 내고, 인메모리 sink로 DB 없이
//! 조회 → 정규화 → 저장 파이프라인 전체를 검증한다.

use async_trait::async_trait;
use chainsnap_broker::{BrokerClient, BrokerConfig, BrokerError, ContractType, RetryConfig, TokenState};
use chainsnap_collector::{
    modules, ChainCollectConfig, CollectorConfig, CollectorError, DaemonConfig, SymbolStatus,
};
use chainsnap_core::OptionContract;
use chainsnap_store::ContractSink;
use chrono::{NaiveDate, Utc};
use mockito::Matcher;
use std::collections::HashMap;
use tokio::sync::Mutex;

/// 테스트용 인메모리 sink. 파티션 교체 의미론을 그대로 따른다.
#[derive(Default)]
struct MemorySink {
    snapshots: Mutex<HashMap<(String, NaiveDate), Vec<OptionContract>>>,
}

impl MemorySink {
    async fn stored(&self, symbol: &str, snapshot_date: NaiveDate) -> Vec<OptionContract> {
        self.snapshots
            .lock()
            .await
            .get(&(symbol.to_string(), snapshot_date))
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl ContractSink for MemorySink {
    async fn replace_snapshot(
        &self,
        symbol: &str,
        snapshot_date: NaiveDate,
        contracts: &[OptionContract],
    ) -> chainsnap_store::Result<u64> {
        let mut snapshots = self.snapshots.lock().await;
        snapshots.insert((symbol.to_string(), snapshot_date), contracts.to_vec());
        Ok(contracts.len() as u64)
    }

    async fn fetch_snapshot(
        &self,
        symbol: &str,
        snapshot_date: NaiveDate,
    ) -> chainsnap_store::Result<Vec<OptionContract>> {
        Ok(self.stored(symbol, snapshot_date).await)
    }
}

fn snapshot_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 5).unwrap()
}

fn test_config(server_url: &str, universe: &[&str]) -> CollectorConfig {
    let mut broker =
        BrokerConfig::new("test-client-id", "test-refresh-token").with_base_url(server_url);
    broker.retry = RetryConfig {
        max_attempts: 2,
        base_delay_ms: 1,
        max_delay_ms: 2,
    };

    CollectorConfig {
        database_url: "postgres://unused".to_string(),
        universe: universe.iter().map(|s| s.to_string()).collect(),
        chain: ChainCollectConfig {
            min_dte: 0,
            max_dte: 60,
            contract_type: ContractType::All,
            concurrency: 2,
            request_delay_ms: 0,
        },
        broker,
        daemon: DaemonConfig {
            interval_minutes: 1440,
        },
    }
}

async fn seeded_client(config: &CollectorConfig) -> BrokerClient {
    let client = BrokerClient::new(config.broker.clone()).unwrap();
    client
        .auth()
        .set_cached_token(TokenState::new(
            "tok-valid".to_string(),
            "Bearer".to_string(),
            Utc::now() + chrono::Duration::hours(1),
        ))
        .await;
    client
}

fn contract_json(put_call: &str, strike: f64) -> String {
    format!(
        r#"{{"putCall":"{}","strikePrice":{},"expirationDate":"2024-01-19:14",
           "bid":1.25,"ask":1.35,"last":1.30,"totalVolume":1200,"openInterest":5400,
           "volatility":21.5,"delta":0.45,"gamma":0.03,"theta":-0.08,"vega":0.12,"rho":0.01}}"#,
        put_call, strike
    )
}

fn page_json(symbol: &str, contracts: &[String], next_cursor: Option<&str>) -> String {
    let cursor = match next_cursor {
        Some(c) => format!(r#","nextCursor":"{}""#, c),
        None => String::new(),
    };
    format!(
        r#"{{"symbol":"{}","status":"SUCCESS","underlyingPrice":184.25,"contracts":[{}]{}}}"#,
        symbol,
        contracts.join(","),
        cursor
    )
}

#[tokio::test]
async fn test_end_to_end_partial_snapshot() {
    let mut server = mockito::Server::new_async().await;

    // 2 페이지, 계약 3개 (그중 1개는 행사가가 음수로 깨짐)
    let first_mock = server
        .mock("GET", "/v1/marketdata/chains")
        .match_query(Matcher::UrlEncoded("symbol".into(), "AAPL".into()))
        .with_status(200)
        .with_body(page_json(
            "AAPL",
            &[contract_json("CALL", 185.0), contract_json("CALL", -5.0)],
            Some("page-2"),
        ))
        .expect(1)
        .create_async()
        .await;
    let second_mock = server
        .mock("GET", "/v1/marketdata/chains")
        .match_query(Matcher::UrlEncoded("cursor".into(), "page-2".into()))
        .with_status(200)
        .with_body(page_json("AAPL", &[contract_json("PUT", 180.0)], None))
        .expect(1)
        .create_async()
        .await;

    let config = test_config(&server.url(), &["AAPL"]);
    let client = seeded_client(&config).await;
    let sink = MemorySink::default();

    let report = modules::collect_chains(&client, &sink, &config, None, snapshot_date())
        .await
        .unwrap();

    assert_eq!(report.total(), 1);
    let outcome = &report.outcomes[0];
    assert_eq!(outcome.symbol, "AAPL");
    assert_eq!(outcome.status, SymbolStatus::PersistedPartial);
    assert_eq!(outcome.written, 2);
    assert_eq!(outcome.dropped, 1);
    assert!(!report.has_failures());

    let stored = sink.stored("AAPL", snapshot_date()).await;
    assert_eq!(stored.len(), 2);
    assert!(stored.iter().all(|c| c.validate().is_ok()));

    first_mock.assert_async().await;
    second_mock.assert_async().await;
}

#[tokio::test]
async fn test_failed_symbol_does_not_abort_siblings() {
    let mut server = mockito::Server::new_async().await;

    for symbol in ["AAA", "CCC"] {
        server
            .mock("GET", "/v1/marketdata/chains")
            .match_query(Matcher::UrlEncoded("symbol".into(), symbol.into()))
            .with_status(200)
            .with_body(page_json(symbol, &[contract_json("CALL", 100.0)], None))
            .create_async()
            .await;
    }
    server
        .mock("GET", "/v1/marketdata/chains")
        .match_query(Matcher::UrlEncoded("symbol".into(), "BBB".into()))
        .with_status(404)
        .create_async()
        .await;

    let config = test_config(&server.url(), &[]);
    let client = seeded_client(&config).await;
    let sink = MemorySink::default();

    let report = modules::collect_chains(
        &client,
        &sink,
        &config,
        Some("AAA,BBB,CCC".to_string()),
        snapshot_date(),
    )
    .await
    .unwrap();

    assert_eq!(report.total(), 3);
    assert_eq!(report.persisted_count(), 2);
    assert_eq!(report.failed_count(), 1);
    assert_eq!(report.failed_symbols(), vec!["BBB"]);
    assert!(report.has_failures());

    assert_eq!(sink.stored("AAA", snapshot_date()).await.len(), 1);
    assert_eq!(sink.stored("CCC", snapshot_date()).await.len(), 1);
    assert!(sink.stored("BBB", snapshot_date()).await.is_empty());
}

#[tokio::test]
async fn test_rerun_replaces_instead_of_duplicating() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/v1/marketdata/chains")
        .match_query(Matcher::UrlEncoded("symbol".into(), "AAPL".into()))
        .with_status(200)
        .with_body(page_json("AAPL", &[contract_json("CALL", 185.0)], None))
        .expect(2)
        .create_async()
        .await;

    let config = test_config(&server.url(), &["AAPL"]);
    let client = seeded_client(&config).await;
    let sink = MemorySink::default();

    for _ in 0..2 {
        let report = modules::collect_chains(&client, &sink, &config, None, snapshot_date())
            .await
            .unwrap();
        assert_eq!(report.persisted_count(), 1);
    }

    // 같은 날 두 번 실행해도 행이 누적되지 않는다
    assert_eq!(sink.stored("AAPL", snapshot_date()).await.len(), 1);
}

#[tokio::test]
async fn test_credential_exhaustion_aborts_run() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/v1/oauth2/token")
        .with_status(400)
        .with_body(r#"{"error":"invalid_grant"}"#)
        .create_async()
        .await;

    let config = test_config(&server.url(), &["AAPL"]);
    // 토큰을 시딩하지 않아 첫 요청부터 갱신이 필요하고, 갱신은 실패한다
    let client = BrokerClient::new(config.broker.clone()).unwrap();
    let sink = MemorySink::default();

    let result = modules::collect_chains(&client, &sink, &config, None, snapshot_date()).await;

    assert!(matches!(
        result,
        Err(CollectorError::Broker(BrokerError::Unauthorized(_)))
    ));
    assert!(sink.stored("AAPL", snapshot_date()).await.is_empty());
}

#[tokio::test]
async fn test_export_snapshot_to_csv() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/v1/marketdata/chains")
        .match_query(Matcher::UrlEncoded("symbol".into(), "AAPL".into()))
        .with_status(200)
        .with_body(page_json(
            "AAPL",
            &[contract_json("CALL", 185.0), contract_json("PUT", 180.0)],
            None,
        ))
        .create_async()
        .await;

    let config = test_config(&server.url(), &["AAPL"]);
    let client = seeded_client(&config).await;
    let sink = MemorySink::default();

    modules::collect_chains(&client, &sink, &config, None, snapshot_date())
        .await
        .unwrap();

    let output_path = std::env::temp_dir().join("chainsnap_export_test.csv");
    let output = output_path.to_str().unwrap();

    let rows = modules::export_snapshot(&sink, "AAPL", snapshot_date(), output)
        .await
        .unwrap();
    assert_eq!(rows, 2);

    let content = std::fs::read_to_string(output).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("symbol,snapshot_date,expiration,strike,option_type"));
    assert!(lines[1..].iter().all(|line| line.contains("AAPL")));

    std::fs::remove_file(output).ok();
}
