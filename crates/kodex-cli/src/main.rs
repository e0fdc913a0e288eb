//! KodeX 마켓 데이터 CLI.
//!
//! # 사용 예시
//!
//! ```bash
//! # BTCUSDT 1분봉 최근 100개
//! kodex klines -s BTCUSDT -i 1m -l 100
//!
//! # 시도 기록 포함
//! kodex klines -s ETHUSDT -i 4h --trace
//!
//! # 여러 심볼 동시 조회
//! kodex batch -s BTCUSDT,ETHUSDT,SOLUSDT -i 1h
//!
//! # 호가창 / 호스트 상태
//! kodex depth -s BTCUSDT -l 20
//! kodex ping
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use kodex_cli::commands::{
    klines::{self, KlinesConfig},
    quotes, status, MarketData,
};
use kodex_core::{init_logging, AppConfig, LogConfig, LogFormat};
use serde_json::Value;
use tracing::info;

#[derive(Parser)]
#[command(name = "kodex")]
#[command(about = "KodeX market-data relay CLI - 다중 호스트 Binance 시세 조회", long_about = None)]
#[command(version)]
struct Cli {
    /// 설정 파일 (TOML). 환경 변수 KODEX__* 가 우선합니다.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// 호스트 목록 덮어쓰기 (쉼표 구분)
    #[arg(long, global = true, value_delimiter = ',')]
    hosts: Option<Vec<String>>,

    /// 로그 형식 (pretty, json, compact)
    #[arg(long, global = true)]
    log_format: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 캔들(OHLCV) 조회
    Klines {
        /// 심볼 (예: BTCUSDT)
        #[arg(short, long)]
        symbol: String,

        /// 간격 (1m, 5m, 1h, 1d ...)
        #[arg(short, long, default_value = "1m")]
        interval: String,

        /// 캔들 수 (기본 200, 최대 1000)
        #[arg(short, long, allow_negative_numbers = true)]
        limit: Option<i64>,

        /// 시작 시각 (epoch 밀리초)
        #[arg(long)]
        start_time: Option<i64>,

        /// 호스트 시도 기록 포함
        #[arg(long, default_value = "false")]
        trace: bool,
    },

    /// 여러 심볼 캔들 동시 조회
    Batch {
        /// 쉼표로 구분한 심볼 목록
        #[arg(short, long)]
        symbols: String,

        #[arg(short, long, default_value = "1m")]
        interval: String,

        #[arg(short, long, allow_negative_numbers = true)]
        limit: Option<i64>,

        #[arg(long)]
        start_time: Option<i64>,
    },

    /// 최근 체결가
    Ticker {
        #[arg(short, long)]
        symbol: String,
    },

    /// 호가창 스냅샷
    Depth {
        #[arg(short, long)]
        symbol: String,

        /// 호가 단계 수 (5 ~ 5000)
        #[arg(short, long, default_value = "20")]
        limit: u32,
    },

    /// 최우선 호가
    BookTicker {
        #[arg(short, long)]
        symbol: String,
    },

    /// 평균가
    AvgPrice {
        #[arg(short, long)]
        symbol: String,
    },

    /// 업스트림 서버 시각
    Time,

    /// 응답하는 호스트 확인
    Ping,

    /// 설정된 호스트와 구성요소 상태
    Hosts,
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env 는 선택 사항
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let mut config = AppConfig::load_optional(cli.config.as_deref())
        .context("failed to load configuration")?;
    if let Some(hosts) = cli.hosts.clone() {
        config.market_data.hosts = hosts;
    }

    let mut log_config = LogConfig::from(&config.logging);
    if let Some(format) = cli.log_format.as_deref() {
        let format: LogFormat = format
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid log format: {}", e))?;
        log_config = log_config.with_format(format);
    }
    init_logging(log_config).map_err(|e| anyhow::anyhow!("failed to initialize logging: {}", e))?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        hosts = config.market_data.hosts.len(),
        "kodex 시작"
    );

    let market = MarketData::init(&config.market_data);
    let output = run(cli.command, &market).await?;

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn run(command: Commands, market: &MarketData) -> Result<Value> {
    let value = match command {
        Commands::Klines {
            symbol,
            interval,
            limit,
            start_time,
            trace,
        } => {
            klines::fetch_klines(
                market.client()?,
                KlinesConfig {
                    symbol,
                    interval,
                    limit,
                    start_time,
                    trace,
                },
            )
            .await?
        }

        Commands::Batch {
            symbols,
            interval,
            limit,
            start_time,
        } => klines::fetch_batch(market.client()?, &symbols, &interval, limit, start_time).await?,

        Commands::Ticker { symbol } => quotes::ticker(market.client()?, &symbol).await?,

        Commands::Depth { symbol, limit } => quotes::depth(market.client()?, &symbol, limit).await?,

        Commands::BookTicker { symbol } => quotes::book_ticker(market.client()?, &symbol).await?,

        Commands::AvgPrice { symbol } => quotes::avg_price(market.client()?, &symbol).await?,

        Commands::Time => status::server_time(market).await?,

        Commands::Ping => status::ping(market).await?,

        Commands::Hosts => status::hosts(market),
    };

    Ok(value)
}
