use dipbot::api::{DexScreenerClient, JupiterClient};
use dipbot::config::{BotConfig, StrategyConfig};
use dipbot::execution::{
    FallbackOracle, FanoutSink, JsonLinesSink, MemorySink, PaperExecutor, PositionEngine,
    PriceOracle, TickRecord, TickResult,
};
use dipbot::*;
use mockito::Matcher;
use std::sync::Arc;

const BONK: &str = "DezXAZ8z7PnrnRJjz3wXBoRgixCa6xjnB7YaB1pPB263";

fn jupiter_price_body(price: &str) -> String {
    format!(
        r#"{{"data":{{"{}":{{"id":"{}","type":"derivedPrice","price":"{}"}}}},"timeTaken":0.001}}"#,
        BONK, BONK, price
    )
}

#[tokio::test]
async fn test_e2e_workflow() {
    // Initialize logging
    let _ = tracing_subscriber::fmt::try_init();

    println!("=== Starting E2E Test ===\n");

    // 1. Config
    println!("1. Loading configuration...");
    let config = BotConfig::from_toml_str(&format!(
        r#"
        [engine]
        poll_interval_secs = 1
        price_sources = ["jupiter", "dexscreener"]
        slippage_bps = 0

        [[instruments]]
        symbol = "BONK"
        mint = "{}"
        decimals = 5

        [instruments.strategy]
        buy_trigger_price = 0.05
        profit_multiplier = 1.2
        buy_size_base = 80.0
        sell_size_base = 2000.0
        "#,
        BONK
    ))
    .unwrap();
    let instrument = config.instruments[0].instrument();
    println!(
        "   ✓ {} with trigger {}",
        instrument, config.instruments[0].strategy.buy_trigger_price
    );

    // 2. Price feeds against a local server
    println!("\n2. Wiring price feeds...");
    let mut server = mockito::Server::new_async().await;
    let dex_mock = server
        .mock("GET", format!("/tokens/{}", BONK).as_str())
        .with_status(500)
        .expect(0)
        .create_async()
        .await;
    let dip = server
        .mock("GET", "/price")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(jupiter_price_body("0.04"))
        .create_async()
        .await;

    let price_url = format!("{}/price", server.url());
    let jupiter = JupiterClient::with_base_urls(&server.url(), &price_url);
    let dexscreener = DexScreenerClient::with_base_url(&server.url());
    let oracle = FallbackOracle::new(vec![Arc::new(jupiter), Arc::new(dexscreener)]);
    assert_eq!(oracle.source_names(), vec!["jupiter", "dexscreener"]);
    assert_eq!(oracle.get_price(&instrument).await.unwrap(), Some(0.04));
    println!("   ✓ Jupiter price: 0.04");

    // 3. Engine with paper fills and a JSON journal
    println!("\n3. Running the engine...");
    let dir = tempfile::tempdir().unwrap();
    let journal_path = dir.path().join("ticks.jsonl");
    let memory = Arc::new(MemorySink::new());
    let sink = FanoutSink::new(vec![
        memory.clone(),
        Arc::new(JsonLinesSink::new(&journal_path)),
    ]);

    let engine = PositionEngine::new(
        instrument.clone(),
        config.instruments[0].strategy.clone(),
        config.engine.timings(),
        Arc::new(oracle),
        Arc::new(PaperExecutor::new(config.engine.slippage_bps)),
        Arc::new(sink),
    );

    let buy = engine.tick().await;
    assert!(buy.is_filled());
    assert_eq!(engine.state().entry_price(), Some(0.04));
    println!("   ✓ Bought the dip at 0.04");

    dip.remove_async().await;
    server
        .mock("GET", "/price")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(jupiter_price_body("0.05"))
        .create_async()
        .await;

    let sell = engine.tick().await;
    assert_eq!(sell.exit_reason, Some(ExitReason::ProfitTarget));
    assert_eq!(engine.state().phase(), PositionPhase::Flat);
    println!("   ✓ Sold at the profit target");

    // 4. Journal
    println!("\n4. Checking the journal...");
    let lines: Vec<TickRecord> = std::fs::read_to_string(&journal_path)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines, memory.records());
    assert!(matches!(lines[0].result, TickResult::Filled(_)));
    assert_eq!(lines[1].phase_after, PositionPhase::Flat);
    println!("   ✓ {} records written", lines.len());

    // Jupiter answered every time, so DexScreener was never asked
    dex_mock.assert_async().await;

    println!("\n=== E2E Test Complete ===");
}

#[test]
fn test_default_strategy_is_valid() {
    assert!(StrategyConfig::default().validate().is_ok());
}
