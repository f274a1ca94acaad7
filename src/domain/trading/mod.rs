pub mod types;

pub use types::{
    AccountMetrics, ActiveTrade, Balance, CloseAction, ContextSummary, GridLevel, MarketBias,
    MarketDataEvent, MlSignal, Order, OrderSide, OrderStatus, OrderType, Position, TradingSignal,
    Trend,
};
