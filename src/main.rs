use anyhow::Context;
use clap::Parser;
use dipbot::config::{BotConfig, EngineConfig, ExecutionMode};
use dipbot::execution::{
    FallbackOracle, FanoutSink, JsonLinesSink, PaperExecutor, PositionEngine, PriceOracle,
    QuoteExecutor, SwapExecutor, TickSink, TracingSink,
};
use dipbot::JupiterClient;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "dipbot")]
#[command(
    about = "Buys configured tokens on dips and exits on stop, trailing stop or profit target",
    long_about = None
)]
struct Args {
    /// TOML config file (defaults to ./dipbot.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log filter, e.g. "dipbot=debug" (overrides RUST_LOG)
    #[arg(long)]
    log_level: Option<String>,

    /// Only monitor these symbols or mints (repeatable)
    #[arg(short, long)]
    instrument: Vec<String>,

    /// Force paper execution regardless of config
    #[arg(long)]
    paper: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    setup_logging(args.log_level.as_deref());

    tracing::info!("🚀 DipBot starting");

    let mut config = BotConfig::load(args.config.as_deref()).context("loading configuration")?;
    if args.paper {
        config.engine.execution_mode = ExecutionMode::Paper;
    }

    let instruments: Vec<_> = config
        .instruments
        .iter()
        .filter(|i| {
            args.instrument.is_empty()
                || args.instrument.iter().any(|f| f == &i.symbol || f == &i.mint)
        })
        .cloned()
        .collect();
    if instruments.is_empty() {
        anyhow::bail!("no configured instrument matches {:?}", args.instrument);
    }

    let oracle: Arc<dyn PriceOracle> = Arc::new(FallbackOracle::from_config(&config.engine)?);
    let executor = build_executor(&config.engine);
    let sink = build_sink(&config.engine);
    let timings = config.engine.timings();

    tracing::info!("\n📊 Configuration:");
    tracing::info!("  Price sources: {:?}", config.engine.price_sources);
    tracing::info!(
        "  Execution: {} (slippage {} bps)",
        executor.name(),
        config.engine.slippage_bps
    );
    tracing::info!("  Poll interval: {:?}", timings.poll_interval);
    for i in &instruments {
        tracing::info!(
            "    - {} ({}) buy ≤ {} | target ×{}",
            i.symbol,
            i.mint,
            i.strategy.buy_trigger_price,
            i.strategy.profit_multiplier
        );
    }

    let (stop_tx, stop_rx) = watch::channel(false);
    let mut tasks = Vec::with_capacity(instruments.len());

    for instrument in instruments {
        let engine = PositionEngine::new(
            instrument.instrument(),
            instrument.strategy.clone(),
            timings,
            oracle.clone(),
            executor.clone(),
            sink.clone(),
        );
        let stop = stop_rx.clone();
        tasks.push(tokio::spawn(async move { engine.run(stop).await }));
    }
    drop(stop_rx);

    tokio::signal::ctrl_c()
        .await
        .context("listening for Ctrl+C")?;
    tracing::info!("\n⚠️  Received Ctrl+C, shutting down...");
    stop_tx.send_replace(true);

    for task in tasks {
        if let Err(e) = task.await {
            tracing::error!("Engine task failed: {}", e);
        }
    }

    tracing::info!("👋 DipBot stopped");
    Ok(())
}

fn setup_logging(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("dipbot=info"))
        }
    };

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn build_executor(engine: &EngineConfig) -> Arc<dyn SwapExecutor> {
    match engine.execution_mode {
        ExecutionMode::Paper => Arc::new(PaperExecutor::new(engine.slippage_bps)),
        ExecutionMode::Quote => Arc::new(QuoteExecutor::new(
            JupiterClient::new(),
            &engine.quote_mint,
            engine.quote_decimals,
            engine.slippage_bps,
        )),
    }
}

fn build_sink(engine: &EngineConfig) -> Arc<dyn TickSink> {
    match &engine.journal_path {
        Some(path) => {
            tracing::info!("📝 Journaling ticks to {}", path.display());
            Arc::new(FanoutSink::new(vec![
                Arc::new(TracingSink),
                Arc::new(JsonLinesSink::new(path)),
            ]))
        }
        None => Arc::new(TracingSink),
    }
}
