//! Orchestrates one price update end to end: risk checks, ML evaluation,
//! gating, and strategy execution. Owned exclusively by its `start()` loop —
//! `on_price` takes `&mut self` and is never called concurrently for the same
//! engine.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::application::ml::MlSignalService;
use crate::application::risk_management::{RiskAction, RiskManager};
use crate::domain::errors::TradingError;
use crate::domain::pattern_bias::Bias;
use crate::domain::ports::{ExchangeAdapter, TradingStrategy};
use crate::domain::trading::{CloseAction, MarketDataEvent, MlSignal, Order, OrderSide, Position, TradingSignal};

#[derive(Debug, Clone, Copy)]
pub struct IndicatorFilterConfig {
    pub enabled: bool,
    pub rsi_buy_min: f64,
    pub rsi_sell_max: f64,
    pub macd_margin: f64,
    pub ema_ratio_buffer: f64,
    pub volume_ratio_min: f64,
    pub bb_width_min: f64,
}

impl Default for IndicatorFilterConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            rsi_buy_min: 0.0,
            rsi_sell_max: 100.0,
            macd_margin: 0.0,
            ema_ratio_buffer: 0.0,
            volume_ratio_min: 0.0,
            bb_width_min: 0.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub symbol: String,
    pub eval_interval: Duration,
    pub enter_threshold: f64,
    pub pattern_confirmation: u32,
    pub indicator_filter: IndicatorFilterConfig,
    pub housekeeping_interval: Duration,
    pub pending_order_ttl: Duration,
}

impl EngineConfig {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            eval_interval: Duration::from_secs(60),
            enter_threshold: 0.6,
            pattern_confirmation: 1,
            indicator_filter: IndicatorFilterConfig::default(),
            housekeeping_interval: Duration::from_secs(60),
            pending_order_ttl: Duration::from_secs(3600),
        }
    }
}

struct PatternConfirmState {
    name: String,
    count: u32,
}

/// Orchestrator wiring an exchange adapter, a strategy, a risk manager, and
/// an optional ML service into the per-tick decision procedure.
pub struct TradingEngine {
    config: EngineConfig,
    exchange: Arc<dyn ExchangeAdapter>,
    strategy: Box<dyn TradingStrategy>,
    risk_manager: RiskManager,
    ml_service: Option<Arc<MlSignalService>>,
    pending_orders: HashMap<String, Order>,
    cached_signal: Option<(MlSignal, Instant)>,
    pattern_confirm: Option<PatternConfirmState>,
    context_logged: bool,
    total_trades: u64,
    running: Arc<AtomicBool>,
}

impl TradingEngine {
    pub fn new(
        config: EngineConfig,
        exchange: Arc<dyn ExchangeAdapter>,
        strategy: Box<dyn TradingStrategy>,
        risk_manager: RiskManager,
        ml_service: Option<Arc<MlSignalService>>,
    ) -> Self {
        Self {
            config,
            exchange,
            strategy,
            risk_manager,
            ml_service,
            pending_orders: HashMap::new(),
            cached_signal: None,
            pattern_confirm: None,
            context_logged: false,
            total_trades: 0,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn total_trades(&self) -> u64 {
        self.total_trades
    }

    pub async fn initialize(&self) -> Result<(), TradingError> {
        self.exchange.connect().await?;
        Ok(())
    }

    /// Runs the full nine-step decision procedure for one incoming bar.
    pub async fn on_price(&mut self, bar: MarketDataEvent) -> Result<(), TradingError> {
        self.exchange.update_price(&self.config.symbol, bar.price).await;

        let positions = self.exchange.get_positions().await?;
        let balance = self.exchange.get_balance("USD").await?;
        let metrics = self.exchange.get_account_metrics().await?;

        let mut market_data = HashMap::new();
        market_data.insert(self.config.symbol.clone(), bar);
        let risk_events = self.risk_manager.evaluate_risks(&positions, &market_data, &metrics);
        for event in &risk_events {
            self.execute_risk_action(event.asset.clone(), event.action).await?;
        }

        let ml_signal = match self.evaluate_ml_signal().await {
            Ok(signal) => signal,
            Err(TradingError::NotEnoughData { .. }) => None,
            Err(e) => return Err(e),
        };

        let Some(ml_signal) = ml_signal else {
            let position_values: Vec<Position> = positions.into_iter().map(|(_, p)| p).collect();
            self.dispatch_signals(&bar, &position_values, balance.asset_available).await?;
            return Ok(());
        };

        self.strategy.update_context(&ml_signal);
        if !self.context_logged {
            info!(
                probability = ml_signal.probability,
                best_pattern = ?ml_signal.best_pattern,
                "ml context established"
            );
            self.context_logged = true;
        }

        let decision_prob = ml_signal.decision_probability();
        if decision_prob < self.config.enter_threshold {
            self.pattern_confirm = None;
            debug!(decision_prob, threshold = self.config.enter_threshold, "waiting for signal strength");
            return Ok(());
        }

        if !self.pattern_confirmation_gate(&ml_signal) {
            return Ok(());
        }

        if !self.indicator_filter_gate(&ml_signal) {
            return Ok(());
        }

        let position_values: Vec<Position> = positions.into_iter().map(|(_, p)| p).collect();
        self.dispatch_signals(&bar, &position_values, balance.asset_available).await
    }

    async fn evaluate_ml_signal(&mut self) -> Result<Option<MlSignal>, TradingError> {
        let Some(service) = self.ml_service.clone() else {
            return Ok(None);
        };
        let now_ms = chrono::Utc::now().timestamp_millis();

        if let Some((cached, at)) = &self.cached_signal {
            if at.elapsed() < self.config.eval_interval {
                return Ok(Some(cached.clone()));
            }
        }

        let signal = service.evaluate_signal(now_ms).await?;
        self.cached_signal = Some((signal.clone(), Instant::now()));
        Ok(Some(signal))
    }

    fn pattern_confirmation_gate(&mut self, ml_signal: &MlSignal) -> bool {
        let r = self.config.pattern_confirmation;
        if r <= 1 {
            return true;
        }
        let Some(name) = &ml_signal.best_pattern else {
            self.pattern_confirm = None;
            return false;
        };
        match &mut self.pattern_confirm {
            Some(state) if &state.name == name => {
                state.count = (state.count + 1).min(r);
            }
            _ => {
                self.pattern_confirm = Some(PatternConfirmState {
                    name: name.clone(),
                    count: 1,
                });
            }
        }
        self.pattern_confirm.as_ref().unwrap().count >= r
    }

    fn indicator_filter_gate(&self, ml_signal: &MlSignal) -> bool {
        let filter = &self.config.indicator_filter;
        if !filter.enabled {
            return true;
        }
        if ml_signal.indicator_snapshot.is_empty() {
            warn!("indicator filter enabled but snapshot is empty");
            return false;
        }
        let Some(bias) = ml_signal.pattern_bias else {
            return false;
        };
        let snapshot = &ml_signal.indicator_snapshot;

        let directional_ok = match bias {
            Bias::Bullish => {
                snapshot.rsi_14 >= filter.rsi_buy_min
                    && snapshot.macd >= filter.macd_margin
                    && snapshot.ema_ratio >= 1.0 + filter.ema_ratio_buffer
            }
            Bias::Bearish => {
                snapshot.rsi_14 <= filter.rsi_sell_max
                    && snapshot.macd <= -filter.macd_margin
                    && snapshot.ema_ratio <= 1.0 - filter.ema_ratio_buffer
            }
        };
        if !directional_ok {
            debug!(?bias, "indicator filter rejected signal");
            return false;
        }

        if filter.volume_ratio_min > 0.0 && ml_signal.volume_ratio < filter.volume_ratio_min {
            debug!(volume_ratio = ml_signal.volume_ratio, "volume ratio below filter minimum");
            return false;
        }
        if filter.bb_width_min > 0.0 && snapshot.bb_width < filter.bb_width_min {
            debug!(bb_width = snapshot.bb_width, "bollinger width below filter minimum");
            return false;
        }
        true
    }

    async fn dispatch_signals(
        &mut self,
        bar: &MarketDataEvent,
        positions: &[Position],
        balance: f64,
    ) -> Result<(), TradingError> {
        let signals = self.strategy.generate_signals(bar, positions, balance);
        for signal in signals {
            if let Err(e) = self.execute_signal(&signal, bar.timestamp).await {
                self.strategy.on_error(&e);
                warn!(error = %e, "signal execution failed, skipping");
            }
        }
        Ok(())
    }

    async fn execute_signal(&mut self, signal: &TradingSignal, now_ms: i64) -> Result<(), TradingError> {
        match signal {
            TradingSignal::Buy { asset, size, price } | TradingSignal::Sell { asset, size, price } => {
                let side = if matches!(signal, TradingSignal::Buy { .. }) {
                    OrderSide::Buy
                } else {
                    OrderSide::Sell
                };
                let order = Order::new(
                    format!("order-{now_ms}-{}", self.pending_orders.len()),
                    asset.clone(),
                    side,
                    *size,
                    *price,
                    now_ms,
                );
                let result = self.exchange.place_order(&order).await?;
                if result == "filled" {
                    let executed_price = order.price.unwrap_or(0.0);
                    self.strategy.on_trade_executed(signal, executed_price, order.size);
                    self.total_trades += 1;
                } else {
                    self.pending_orders.insert(order.id.clone(), order);
                }
            }
            TradingSignal::Close { action: CloseAction::CancelAll } => {
                self.exchange.cancel_all_orders().await?;
            }
        }
        Ok(())
    }

    async fn execute_risk_action(&mut self, asset: String, action: RiskAction) -> Result<(), TradingError> {
        match action {
            RiskAction::ClosePosition => {
                self.exchange.close_position(&asset, None).await?;
            }
            RiskAction::ReducePosition => {
                let positions = self.exchange.get_positions().await?;
                if let Some((_, position)) = positions.into_iter().find(|(a, _)| a == &asset) {
                    self.exchange.close_position(&asset, Some(position.size.abs() * 0.5)).await?;
                }
            }
            RiskAction::CancelOrders => {
                self.exchange.cancel_all_orders().await?;
            }
            RiskAction::PauseTrading => {
                self.strategy.set_active(false);
            }
            RiskAction::EmergencyExit => {
                warn!(asset = %asset, "emergency exit triggered");
                self.exchange.cancel_all_orders().await?;
                self.exchange.close_position(&asset, None).await?;
                self.strategy.set_active(false);
            }
        }
        Ok(())
    }

    /// Purges pending orders older than the configured TTL and logs
    /// cumulative fills; run on the 60s housekeeping cadence.
    pub fn run_housekeeping(&mut self, now_ms: i64) {
        let ttl_ms = self.config.pending_order_ttl.as_millis() as i64;
        self.pending_orders.retain(|_, order| now_ms - order.created_at < ttl_ms);
        if self.total_trades > 0 {
            info!(total_trades = self.total_trades, "housekeeping tick");
        }
    }

    pub fn mark_running(&self, running: bool) {
        self.running.store(running, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Stops the strategy, fetches positions for visibility only, cancels
    /// all pending orders, and disconnects — idempotent.
    pub async fn stop(&mut self) -> Result<(), TradingError> {
        self.mark_running(false);
        self.strategy.set_active(false);
        let _ = self.exchange.get_positions().await?;
        self.exchange.cancel_all_orders().await?;
        self.exchange.disconnect().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::risk_management::RiskManagerConfig;
    use crate::application::strategies::{GridConfig, GridStrategy};
    use crate::infrastructure::PaperExchange;

    fn engine(symbol: &str) -> TradingEngine {
        let exchange = Arc::new(PaperExchange::new(symbol, 1000.0));
        let strategy = Box::new(GridStrategy::new(GridConfig {
            symbol: symbol.to_string(),
            levels: 1,
            range_pct: 10.0,
            total_allocation: 100.0,
            min_price: None,
            max_price: None,
            rebalance_threshold_pct: 5.0,
            take_profit_pct: 0.05,
            stop_loss_pct: 0.05,
            max_usd_per_trade: None,
        }));
        let risk_manager = RiskManager::new(RiskManagerConfig::default());
        TradingEngine::new(EngineConfig::new(symbol), exchange, strategy, risk_manager, None)
    }

    #[tokio::test]
    async fn on_price_without_ml_service_still_dispatches_strategy() {
        let mut e = engine("BTC");
        e.initialize().await.unwrap();
        e.on_price(MarketDataEvent { price: 100.0, volume_24h: 0.0, timestamp: 0 })
            .await
            .unwrap();
        // single-trade strategy has no bias yet, so no orders were placed.
        assert_eq!(e.total_trades(), 0);
    }

    #[tokio::test]
    async fn housekeeping_purges_stale_pending_orders() {
        let mut e = engine("BTC");
        e.pending_orders.insert(
            "stale".to_string(),
            Order::new("stale".into(), "BTC".into(), OrderSide::Buy, 1.0, Some(10.0), 0),
        );
        e.run_housekeeping(3_700_000);
        assert!(e.pending_orders.is_empty());
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let mut e = engine("BTC");
        e.initialize().await.unwrap();
        e.stop().await.unwrap();
        e.stop().await.unwrap();
        assert!(!e.is_running());
    }

    #[test]
    fn pattern_confirmation_gate_passes_immediately_when_disabled() {
        let mut e = engine("BTC");
        e.config.pattern_confirmation = 1;
        let signal = MlSignal {
            probability: 0.9,
            patterns: Default::default(),
            pattern_predictions: Default::default(),
            indicator_snapshot: Default::default(),
            pattern_bias: None,
            best_pattern: None,
            context_summary: None,
            volume_ratio: 1.0,
            timestamp: 0,
        };
        assert!(e.pattern_confirmation_gate(&signal));
    }

    #[test]
    fn indicator_filter_blocks_then_passes_matching_concrete_scenario() {
        let mut e = engine("BTC");
        e.config.indicator_filter = IndicatorFilterConfig {
            enabled: true,
            rsi_buy_min: 55.0,
            rsi_sell_max: 50.0,
            macd_margin: 0.1,
            ema_ratio_buffer: 0.0,
            volume_ratio_min: 0.0,
            bb_width_min: 0.0,
        };
        let blocked = MlSignal {
            probability: 0.75,
            patterns: Default::default(),
            pattern_predictions: Default::default(),
            indicator_snapshot: crate::domain::indicators::IndicatorSnapshot {
                ema_12: 1.0,
                ema_26: 1.0,
                ema_ratio: 1.00,
                rsi_14: 48.0,
                macd: 0.05,
                atr_14: 0.0,
                bb_upper: 0.0,
                bb_lower: 0.0,
                bb_width: 0.0,
            },
            pattern_bias: Some(Bias::Bullish),
            best_pattern: Some("double_bottom".to_string()),
            context_summary: None,
            volume_ratio: 1.0,
            timestamp: 0,
        };
        assert!(!e.indicator_filter_gate(&blocked));

        let passing = MlSignal {
            indicator_snapshot: crate::domain::indicators::IndicatorSnapshot {
                ema_ratio: 1.01,
                rsi_14: 60.0,
                macd: 0.2,
                ..blocked.indicator_snapshot
            },
            ..blocked
        };
        assert!(e.indicator_filter_gate(&passing));
    }

    #[test]
    fn pattern_confirmation_gate_requires_repeated_same_pattern() {
        let mut e = engine("BTC");
        e.config.pattern_confirmation = 2;
        let signal = MlSignal {
            probability: 0.9,
            patterns: Default::default(),
            pattern_predictions: Default::default(),
            indicator_snapshot: Default::default(),
            pattern_bias: None,
            best_pattern: Some("hammer".to_string()),
            context_summary: None,
            volume_ratio: 1.0,
            timestamp: 0,
        };
        assert!(!e.pattern_confirmation_gate(&signal));
        assert!(e.pattern_confirmation_gate(&signal));
    }
}
