//! Grid strategy (levels >= 2) and single-trade strategy (levels == 1),
//! unified behind one `TradingStrategy` implementation since the mode is
//! fully determined by `levels` and the two share configuration shape.

use crate::domain::pattern_bias::Bias;
use crate::domain::ports::TradingStrategy;
use crate::domain::trading::{
    ActiveTrade, CloseAction, GridLevel, MarketBias, MarketDataEvent, MlSignal, Position,
    TradingSignal,
};
use crate::domain::TradingError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridState {
    Initializing,
    Active,
    Rebalancing,
    Stopped,
}

#[derive(Debug, Clone)]
pub struct GridConfig {
    pub symbol: String,
    pub levels: usize,
    pub range_pct: f64,
    pub total_allocation: f64,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub rebalance_threshold_pct: f64,
    pub take_profit_pct: f64,
    pub stop_loss_pct: f64,
    pub max_usd_per_trade: Option<f64>,
}

pub struct GridStrategy {
    config: GridConfig,
    state: GridState,
    center_price: f64,
    levels: Vec<GridLevel>,
    last_rebalance_time: i64,
    active_trade: Option<ActiveTrade>,
    market_bias: Option<MarketBias>,
    active: bool,
}

impl GridStrategy {
    pub fn new(config: GridConfig) -> Self {
        Self {
            config,
            state: GridState::Initializing,
            center_price: 0.0,
            levels: Vec::new(),
            last_rebalance_time: 0,
            active_trade: None,
            market_bias: None,
            active: true,
        }
    }

    pub fn state(&self) -> GridState {
        self.state
    }

    pub fn levels(&self) -> &[GridLevel] {
        &self.levels
    }

    pub fn active_trade(&self) -> Option<ActiveTrade> {
        self.active_trade
    }

    fn is_grid_mode(&self) -> bool {
        self.config.levels >= 2
    }

    fn initialize_levels(&mut self, price: f64) -> Vec<TradingSignal> {
        let n = self.config.levels;
        let min = self
            .config
            .min_price
            .unwrap_or_else(|| price * (1.0 - self.config.range_pct / 100.0));
        let max = self
            .config
            .max_price
            .unwrap_or_else(|| price * (1.0 + self.config.range_pct / 100.0));

        self.center_price = price;
        self.levels = (0..n)
            .map(|i| {
                let exponent = if n > 1 { i as f64 / (n - 1) as f64 } else { 0.0 };
                let level_price = min * (max / min).powf(exponent);
                let size = (self.config.total_allocation / n as f64) / level_price;
                GridLevel {
                    price: level_price,
                    size,
                    level_index: i,
                    is_buy_level: level_price < price,
                    is_filled: false,
                }
            })
            .collect();

        self.levels
            .iter()
            .map(|level| {
                if level.is_buy_level {
                    TradingSignal::Buy {
                        asset: self.config.symbol.clone(),
                        size: level.size,
                        price: Some(level.price),
                    }
                } else {
                    TradingSignal::Sell {
                        asset: self.config.symbol.clone(),
                        size: level.size,
                        price: Some(level.price),
                    }
                }
            })
            .collect()
    }

    fn generate_grid_signals(&mut self, price: f64, now_ms: i64) -> Vec<TradingSignal> {
        match self.state {
            GridState::Initializing | GridState::Stopped => {
                let signals = self.initialize_levels(price);
                self.state = GridState::Active;
                signals
            }
            GridState::Active | GridState::Rebalancing => {
                let drift_pct = (price - self.center_price).abs() / self.center_price * 100.0;
                if drift_pct > self.config.rebalance_threshold_pct {
                    self.state = GridState::Rebalancing;
                    let mut signals = vec![TradingSignal::Close {
                        action: CloseAction::CancelAll,
                    }];
                    signals.extend(self.initialize_levels(price));
                    self.state = GridState::Active;
                    self.last_rebalance_time = now_ms;
                    signals
                } else {
                    Vec::new()
                }
            }
        }
    }

    fn generate_single_trade_signals(&mut self, price: f64) -> Vec<TradingSignal> {
        if let Some(trade) = self.active_trade {
            let crossed_target = match trade.bias {
                MarketBias::Bullish => price >= trade.target_price,
                MarketBias::Bearish => price <= trade.target_price,
            };
            let crossed_stop = match trade.bias {
                MarketBias::Bullish => price <= trade.stop_price,
                MarketBias::Bearish => price >= trade.stop_price,
            };
            if crossed_target || crossed_stop {
                let exit_side_is_sell = trade.bias == MarketBias::Bullish;
                let signal = if exit_side_is_sell {
                    TradingSignal::Sell {
                        asset: self.config.symbol.clone(),
                        size: trade.size,
                        price: None,
                    }
                } else {
                    TradingSignal::Buy {
                        asset: self.config.symbol.clone(),
                        size: trade.size,
                        price: None,
                    }
                };
                return vec![signal];
            }
            return Vec::new();
        }

        let Some(bias) = self.market_bias else {
            return Vec::new();
        };
        let allocation = self
            .config
            .max_usd_per_trade
            .map(|max_usd| self.config.total_allocation.min(max_usd))
            .unwrap_or(self.config.total_allocation);
        let size = allocation / price;

        let signal = match bias {
            MarketBias::Bullish => TradingSignal::Buy {
                asset: self.config.symbol.clone(),
                size,
                price: None,
            },
            MarketBias::Bearish => TradingSignal::Sell {
                asset: self.config.symbol.clone(),
                size,
                price: None,
            },
        };
        vec![signal]
    }
}

impl TradingStrategy for GridStrategy {
    fn generate_signals(
        &mut self,
        market_data: &MarketDataEvent,
        _positions: &[Position],
        _balance: f64,
    ) -> Vec<TradingSignal> {
        if !self.active {
            return Vec::new();
        }
        if self.is_grid_mode() {
            self.generate_grid_signals(market_data.price, market_data.timestamp)
        } else {
            self.generate_single_trade_signals(market_data.price)
        }
    }

    fn on_trade_executed(&mut self, signal: &TradingSignal, executed_price: f64, executed_size: f64) {
        if self.is_grid_mode() {
            if let TradingSignal::Buy { .. } | TradingSignal::Sell { .. } = signal {
                if let Some(level) = self
                    .levels
                    .iter_mut()
                    .min_by(|a, b| {
                        (a.price - executed_price)
                            .abs()
                            .partial_cmp(&(b.price - executed_price).abs())
                            .unwrap()
                    })
                {
                    level.is_filled = true;
                }
            }
            return;
        }

        // Single-trade mode: no active trade yet means this fill is the
        // entry; an existing active trade means this fill is the exit.
        match self.active_trade {
            None => {
                let bias = match signal {
                    TradingSignal::Buy { .. } => MarketBias::Bullish,
                    TradingSignal::Sell { .. } => MarketBias::Bearish,
                    TradingSignal::Close { .. } => return,
                };
                let (target_price, stop_price) = match bias {
                    MarketBias::Bullish => (
                        executed_price * (1.0 + self.config.take_profit_pct),
                        executed_price * (1.0 - self.config.stop_loss_pct),
                    ),
                    MarketBias::Bearish => (
                        executed_price * (1.0 - self.config.take_profit_pct),
                        executed_price * (1.0 + self.config.stop_loss_pct),
                    ),
                };
                self.active_trade = Some(ActiveTrade {
                    bias,
                    size: executed_size,
                    entry_price: executed_price,
                    target_price,
                    stop_price,
                });
            }
            Some(_) => {
                self.active_trade = None;
                self.state = GridState::Initializing;
            }
        }
    }

    fn update_context(&mut self, ml_signal: &MlSignal) {
        self.market_bias = ml_signal.pattern_bias.map(|bias| match bias {
            Bias::Bullish => MarketBias::Bullish,
            Bias::Bearish => MarketBias::Bearish,
        });
    }

    fn on_error(&mut self, _error: &TradingError) {}

    fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn name(&self) -> &str {
        "grid_or_single_trade"
    }
}
