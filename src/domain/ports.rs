use async_trait::async_trait;

use super::errors::TradingError;
use super::market::{Candle, Timeframe};
use super::trading::{AccountMetrics, Balance, MlSignal, Order, Position, TradingSignal};

/// Read-only access to a time-ordered OHLCV series. Writes are an external
/// ingestion concern outside this pipeline.
#[async_trait]
pub trait CandleStore: Send + Sync {
    async fn load_recent(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Candle>, TradingError>;

    async fn range(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<Vec<Candle>, TradingError>;
}

/// Capability set an order-execution venue must expose. Strategies and the
/// engine depend only on this abstraction, never on a concrete adapter.
#[async_trait]
pub trait ExchangeAdapter: Send + Sync {
    async fn connect(&self) -> Result<bool, TradingError>;
    async fn disconnect(&self) -> Result<(), TradingError>;
    async fn get_balance(&self, asset: &str) -> Result<Balance, TradingError>;
    async fn get_market_price(&self, asset: &str) -> Result<f64, TradingError>;
    async fn place_order(&self, order: &Order) -> Result<String, TradingError>;
    async fn cancel_order(&self, exchange_order_id: &str) -> Result<bool, TradingError>;
    async fn cancel_all_orders(&self) -> Result<u32, TradingError>;
    async fn get_order_status(&self, exchange_order_id: &str) -> Result<Order, TradingError>;
    async fn get_positions(&self) -> Result<Vec<(String, Position)>, TradingError>;
    async fn close_position(&self, asset: &str, size: Option<f64>) -> Result<bool, TradingError>;
    async fn get_account_metrics(&self) -> Result<AccountMetrics, TradingError>;

    /// Informational price feed for paper adapters; real adapters no-op.
    async fn update_price(&self, _asset: &str, _price: f64) {}
}

/// An opaque binary classifier: `predict_proba(features) -> (p0, p1)`.
/// The loader is free to use any model format; feature-vector layout is
/// the contract, not the model representation.
pub trait PredictBinary: Send + Sync {
    fn predict_proba(&self, features: &[f64]) -> Result<(f64, f64), TradingError>;
    fn name(&self) -> &str;
}

/// `generate_signals` is pure with respect to internal state: identical
/// inputs after identical history produce identical outputs.
pub trait TradingStrategy: Send {
    fn generate_signals(
        &mut self,
        market_data: &super::trading::MarketDataEvent,
        positions: &[Position],
        balance: f64,
    ) -> Vec<TradingSignal>;

    fn on_trade_executed(&mut self, signal: &TradingSignal, executed_price: f64, executed_size: f64);

    fn update_context(&mut self, ml_signal: &MlSignal);

    fn on_error(&mut self, _error: &TradingError) {}

    fn set_active(&mut self, active: bool);
    fn is_active(&self) -> bool;
    fn name(&self) -> &str;
}
