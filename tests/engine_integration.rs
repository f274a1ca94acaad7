use std::sync::Arc;

use signal_engine::application::engine::{EngineConfig, TradingEngine};
use signal_engine::application::risk_management::{RiskManager, RiskManagerConfig};
use signal_engine::application::strategies::{GridConfig, GridStrategy};
use signal_engine::domain::trading::MarketDataEvent;
use signal_engine::infrastructure::PaperExchange;

fn grid_engine(levels: usize) -> TradingEngine {
    let exchange = Arc::new(PaperExchange::new("BTC", 1000.0));
    let strategy = Box::new(GridStrategy::new(GridConfig {
        symbol: "BTC".to_string(),
        levels,
        range_pct: 10.0,
        total_allocation: 400.0,
        min_price: None,
        max_price: None,
        rebalance_threshold_pct: 5.0,
        take_profit_pct: 0.05,
        stop_loss_pct: 0.05,
        max_usd_per_trade: None,
    }));
    let risk_manager = RiskManager::new(RiskManagerConfig::default());
    TradingEngine::new(EngineConfig::new("BTC"), exchange, strategy, risk_manager, None)
}

fn tick(price: f64) -> MarketDataEvent {
    MarketDataEvent { price, volume_24h: 0.0, timestamp: 0 }
}

#[tokio::test]
async fn grid_engine_initializes_levels_and_trades_on_first_tick() {
    let mut engine = grid_engine(4);
    engine.initialize().await.unwrap();
    engine.on_price(tick(100.0)).await.unwrap();
    assert!(engine.total_trades() > 0);
}

#[tokio::test]
async fn grid_engine_rebalances_on_large_price_move() {
    let mut engine = grid_engine(4);
    engine.initialize().await.unwrap();
    engine.on_price(tick(100.0)).await.unwrap();
    let trades_after_init = engine.total_trades();

    engine.on_price(tick(102.0)).await.unwrap();
    assert_eq!(engine.total_trades(), trades_after_init, "small move must not rebalance");

    engine.on_price(tick(130.0)).await.unwrap();
    assert!(engine.total_trades() > trades_after_init, "large move must trigger rebalance trades");
}

#[tokio::test]
async fn stop_is_idempotent_across_full_wiring() {
    let mut engine = grid_engine(4);
    engine.initialize().await.unwrap();
    engine.on_price(tick(100.0)).await.unwrap();
    engine.stop().await.unwrap();
    engine.stop().await.unwrap();
}

#[tokio::test]
async fn housekeeping_does_not_disturb_fresh_orders() {
    let mut engine = grid_engine(2);
    engine.initialize().await.unwrap();
    engine.on_price(tick(100.0)).await.unwrap();
    engine.run_housekeeping(1_000);
    // paper exchange fills immediately, so nothing should remain pending.
    engine.run_housekeeping(10_000_000);
}
