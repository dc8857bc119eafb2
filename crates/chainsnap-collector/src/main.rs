//! EOD 옵션 체인 수집기 CLI.

use chainsnap_broker::BrokerClient;
use chainsnap_core::logging::{init_logging, LogConfig};
use chainsnap_store::PgContractStore;
use chrono::NaiveDate;
use chrono_tz::America::New_York;
use clap::{Parser, Subcommand};
use chainsnap_collector::{modules, CollectorConfig};

#[derive(Parser)]
#[command(name = "chainsnap-collector")]
#[command(about = "ChainSnap EOD Options-Chain Snapshot Collector", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 로그 레벨 (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// 옵션 체인 스냅샷 수집
    Collect {
        /// 특정 심볼만 수집 (쉼표로 구분, 예: "AAPL,MSFT")
        #[arg(long)]
        symbols: Option<String>,

        /// 스냅샷 기준일 (YYYY-MM-DD, 기본: 미 동부 기준 오늘)
        #[arg(long)]
        date: Option<String>,
    },

    /// 저장된 스냅샷을 CSV로 내보내기
    Export {
        /// 기초자산 심볼
        #[arg(long)]
        symbol: String,

        /// 스냅샷 기준일 (YYYY-MM-DD)
        #[arg(long)]
        date: String,

        /// 출력 파일 경로
        #[arg(long)]
        output: String,
    },

    /// 데몬 모드: 주기적으로 수집 워크플로우 실행
    Daemon,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // 로깅 초기화 (RUST_LOG가 있으면 우선)
    init_logging(LogConfig::new(format!(
        "chainsnap_collector={level},chainsnap_broker={level},chainsnap_store={level}",
        level = cli.log_level
    )))?;

    tracing::info!("ChainSnap Collector 시작");

    // 설정 로드
    let config = CollectorConfig::from_env()?;
    tracing::debug!(universe = ?config.universe, "설정 로드 완료");

    // DB 연결 및 스키마 보장
    let store = PgContractStore::connect(&config.database_url).await?;
    tracing::info!("데이터베이스 연결 성공");

    match cli.command {
        Commands::Collect { symbols, date } => {
            let snapshot_date = resolve_snapshot_date(date)?;
            let client = BrokerClient::new(config.broker.clone())?;

            let report =
                modules::collect_chains(&client, &store, &config, symbols, snapshot_date).await?;
            report.log_summary("옵션 체인 수집");

            if report.has_failures() {
                tracing::error!(failed = ?report.failed_symbols(), "일부 심볼 수집 실패");
                std::process::exit(1);
            }
        }
        Commands::Export {
            symbol,
            date,
            output,
        } => {
            let snapshot_date = parse_date(&date)?;
            let rows =
                modules::export_snapshot(&store, &symbol.to_uppercase(), snapshot_date, &output)
                    .await?;
            tracing::info!(rows, output, "내보내기 완료");
        }
        Commands::Daemon => {
            tracing::info!(
                "=== 데몬 모드 시작 (주기: {}분) ===",
                config.daemon.interval_minutes
            );

            let client = BrokerClient::new(config.broker.clone())?;
            let mut interval = tokio::time::interval(config.daemon.interval());
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {
                        tracing::info!("종료 신호 수신, 데몬 종료 중...");
                        break;
                    }
                    _ = interval.tick() => {
                        let snapshot_date = today_in_new_york();
                        tracing::info!(snapshot_date = %snapshot_date, "=== 수집 워크플로우 시작 ===");

                        match modules::collect_chains(&client, &store, &config, None, snapshot_date)
                            .await
                        {
                            Ok(report) => {
                                report.log_summary("옵션 체인 수집");
                            }
                            Err(e) => {
                                tracing::error!("수집 실패: {}", e);
                            }
                        }

                        tracing::info!(
                            "=== 워크플로우 완료, 다음 실행: {}분 후 ===",
                            config.daemon.interval_minutes
                        );
                    }
                }
            }
        }
    }

    tracing::info!("ChainSnap Collector 종료");

    Ok(())
}

/// CLI 인자 또는 거래소 시간대 기준 오늘로 스냅샷 일자 결정.
fn resolve_snapshot_date(date: Option<String>) -> Result<NaiveDate, Box<dyn std::error::Error>> {
    match date {
        Some(s) => Ok(parse_date(&s)?),
        None => Ok(today_in_new_york()),
    }
}

fn parse_date(s: &str) -> Result<NaiveDate, Box<dyn std::error::Error>> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| format!("날짜 형식 오류 ({}): {}", s, e).into())
}

/// 미 동부(거래소) 시간대 기준 오늘 날짜.
fn today_in_new_york() -> NaiveDate {
    chrono::Utc::now().with_timezone(&New_York).date_naive()
}
