use serde::{Deserialize, Serialize};

use crate::domain::indicators::IndicatorSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn opposite(&self) -> OrderSide {
        match self {
            OrderSide::Buy => OrderSide::Sell,
            OrderSide::Sell => OrderSide::Buy,
        }
    }

    pub fn sign(&self) -> f64 {
        match self {
            OrderSide::Buy => 1.0,
            OrderSide::Sell => -1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    Market,
    Limit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Created,
    Submitted,
    Filled,
    Cancelled,
    Rejected,
    Expired,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub asset: String,
    pub side: OrderSide,
    pub size: f64,
    pub order_type: OrderType,
    pub price: Option<f64>,
    pub status: OrderStatus,
    pub created_at: i64,
    pub exchange_order_id: Option<String>,
}

impl Order {
    pub fn new(id: String, asset: String, side: OrderSide, size: f64, price: Option<f64>, created_at: i64) -> Self {
        Self {
            id,
            asset,
            side,
            size,
            order_type: if price.is_some() {
                OrderType::Limit
            } else {
                OrderType::Market
            },
            price,
            status: OrderStatus::Created,
            created_at,
            exchange_order_id: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    pub asset_available: f64,
    pub locked: f64,
    pub total: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub size: f64,
    pub entry_price: f64,
    pub current_value: f64,
    pub unrealized_pnl: f64,
    pub timestamp: i64,
}

impl Position {
    pub fn is_long(&self) -> bool {
        self.size > 0.0
    }

    pub fn is_short(&self) -> bool {
        self.size < 0.0
    }

    pub fn is_flat(&self) -> bool {
        self.size == 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarketDataEvent {
    pub price: f64,
    pub volume_24h: f64,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AccountMetrics {
    pub total_value: f64,
    pub total_pnl: f64,
    pub unrealized_pnl: f64,
    pub realized_pnl: f64,
    pub drawdown_pct: f64,
    pub positions_count: u32,
    pub largest_position_pct: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridLevel {
    pub price: f64,
    pub size: f64,
    pub level_index: usize,
    pub is_buy_level: bool,
    pub is_filled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketBias {
    Bullish,
    Bearish,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActiveTrade {
    pub bias: MarketBias,
    pub size: f64,
    pub entry_price: f64,
    pub target_price: f64,
    pub stop_price: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    Alta,
    Baixa,
    Lateral,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContextSummary {
    pub candles: usize,
    pub total_return: f64,
    pub volatility: f64,
    pub avg_volume: f64,
    pub high: f64,
    pub low: f64,
    pub trend: Trend,
}

/// A strategy's intent for a single tick; the engine turns this into an
/// `Order` (Buy/Sell) or a cancel-all request (`Close`).
#[derive(Debug, Clone)]
pub enum TradingSignal {
    Buy { asset: String, size: f64, price: Option<f64> },
    Sell { asset: String, size: f64, price: Option<f64> },
    Close { action: CloseAction },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseAction {
    CancelAll,
}

#[derive(Debug, Clone)]
pub struct MlSignal {
    pub probability: f64,
    pub patterns: crate::domain::patterns::PatternFlags,
    pub pattern_predictions: std::collections::HashMap<String, f64>,
    pub indicator_snapshot: IndicatorSnapshot,
    pub pattern_bias: Option<crate::domain::pattern_bias::Bias>,
    pub best_pattern: Option<String>,
    pub context_summary: Option<ContextSummary>,
    pub volume_ratio: f64,
    pub timestamp: i64,
}

impl MlSignal {
    /// `max(pattern_predictions)` if non-empty, else `probability`.
    pub fn decision_probability(&self) -> f64 {
        self.pattern_predictions
            .values()
            .cloned()
            .fold(None, |acc: Option<f64>, v| match acc {
                Some(cur) if cur >= v => Some(cur),
                _ => Some(v),
            })
            .unwrap_or(self.probability)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_type_inferred_from_price_presence() {
        let limit = Order::new("1".into(), "BTC".into(), OrderSide::Buy, 1.0, Some(100.0), 0);
        let market = Order::new("2".into(), "BTC".into(), OrderSide::Sell, 1.0, None, 0);
        assert_eq!(limit.order_type, OrderType::Limit);
        assert_eq!(market.order_type, OrderType::Market);
    }

    #[test]
    fn position_sign_classifiers() {
        let long = Position {
            size: 1.0,
            entry_price: 100.0,
            current_value: 100.0,
            unrealized_pnl: 0.0,
            timestamp: 0,
        };
        assert!(long.is_long());
        assert!(!long.is_flat());
    }

    #[test]
    fn decision_probability_prefers_pattern_predictions() {
        let mut predictions = std::collections::HashMap::new();
        predictions.insert("double_bottom".to_string(), 0.72);
        let signal = MlSignal {
            probability: 0.5,
            patterns: Default::default(),
            pattern_predictions: predictions,
            indicator_snapshot: Default::default(),
            pattern_bias: None,
            best_pattern: Some("double_bottom".to_string()),
            context_summary: None,
            volume_ratio: 1.0,
            timestamp: 0,
        };
        assert_eq!(signal.decision_probability(), 0.72);
    }

    #[test]
    fn decision_probability_falls_back_to_main_probability() {
        let signal = MlSignal {
            probability: 0.4,
            patterns: Default::default(),
            pattern_predictions: std::collections::HashMap::new(),
            indicator_snapshot: Default::default(),
            pattern_bias: None,
            best_pattern: None,
            context_summary: None,
            volume_ratio: 1.0,
            timestamp: 0,
        };
        assert_eq!(signal.decision_probability(), 0.4);
    }
}
