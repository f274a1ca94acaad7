use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::domain::errors::TradingError;
use crate::domain::ports::ExchangeAdapter;
use crate::domain::trading::{AccountMetrics, Balance, Order, OrderSide, OrderStatus, OrderType, Position};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRecord {
    pub timestamp: i64,
    pub side: OrderSide,
    pub size: f64,
    pub price: f64,
    pub cash: f64,
    pub position: f64,
    pub realized_pnl: f64,
    pub equity: f64,
}

#[derive(Debug, Serialize)]
struct SessionReport {
    symbol: String,
    initial_balance: f64,
    cash: f64,
    equity: f64,
    position_size: f64,
    position_price: f64,
    last_price: Option<f64>,
    realized_pnl: f64,
    unrealized_pnl: f64,
    trade_count: usize,
    trades: Vec<TradeRecord>,
}

struct PaperState {
    cash: f64,
    position_size: f64,
    position_price: f64,
    last_price: Option<f64>,
    realized_pnl: f64,
    trade_log: Vec<TradeRecord>,
}

/// In-memory simulated exchange mirroring real-exchange accounting: signed
/// position, volume-weighted average entry, realized PnL booked on any move
/// toward zero, session report persisted on disconnect.
pub struct PaperExchange {
    symbol: String,
    initial_balance: f64,
    reports_dir: PathBuf,
    connected: AtomicBool,
    state: Mutex<PaperState>,
}

impl PaperExchange {
    pub fn new(symbol: impl Into<String>, initial_balance: f64) -> Self {
        Self {
            symbol: symbol.into(),
            initial_balance,
            reports_dir: PathBuf::from("paper_reports"),
            connected: AtomicBool::new(false),
            state: Mutex::new(PaperState {
                cash: initial_balance,
                position_size: 0.0,
                position_price: 0.0,
                last_price: None,
                realized_pnl: 0.0,
                trade_log: Vec::new(),
            }),
        }
    }

    pub fn with_reports_dir(mut self, dir: PathBuf) -> Self {
        self.reports_dir = dir;
        self
    }

    fn equity(state: &PaperState) -> f64 {
        let exposure = state.last_price.map(|p| state.position_size * p).unwrap_or(0.0);
        state.cash + exposure
    }

    fn unrealized_pnl(state: &PaperState) -> f64 {
        match state.last_price {
            Some(price) if state.position_size != 0.0 => (price - state.position_price) * state.position_size,
            _ => 0.0,
        }
    }
}

#[async_trait]
impl ExchangeAdapter for PaperExchange {
    async fn connect(&self) -> Result<bool, TradingError> {
        self.connected.store(true, Ordering::SeqCst);
        Ok(true)
    }

    async fn disconnect(&self) -> Result<(), TradingError> {
        self.connected.store(false, Ordering::SeqCst);
        std::fs::create_dir_all(&self.reports_dir)
            .map_err(|e| TradingError::AdapterUnavailable(e.to_string()))?;

        let state = self.state.lock().await;
        let report = SessionReport {
            symbol: self.symbol.clone(),
            initial_balance: self.initial_balance,
            cash: state.cash,
            equity: Self::equity(&state),
            position_size: state.position_size,
            position_price: state.position_price,
            last_price: state.last_price,
            realized_pnl: state.realized_pnl,
            unrealized_pnl: Self::unrealized_pnl(&state),
            trade_count: state.trade_log.len(),
            trades: state.trade_log.clone(),
        };
        let filename = format!("session_{}.json", Utc::now().format("%Y%m%d-%H%M%S"));
        let path = self.reports_dir.join(filename);
        let bytes = serde_json::to_vec_pretty(&report)
            .map_err(|e| TradingError::AdapterUnavailable(e.to_string()))?;
        std::fs::write(path, bytes).map_err(|e| TradingError::AdapterUnavailable(e.to_string()))?;
        Ok(())
    }

    async fn get_balance(&self, asset: &str) -> Result<Balance, TradingError> {
        if asset.eq_ignore_ascii_case("USD") {
            let state = self.state.lock().await;
            Ok(Balance {
                asset_available: state.cash,
                locked: 0.0,
                total: state.cash,
            })
        } else {
            Ok(Balance {
                asset_available: 0.0,
                locked: 0.0,
                total: 0.0,
            })
        }
    }

    async fn get_market_price(&self, asset: &str) -> Result<f64, TradingError> {
        let state = self.state.lock().await;
        state
            .last_price
            .ok_or_else(|| TradingError::PriceUnavailable { asset: asset.to_string() })
    }

    async fn place_order(&self, order: &Order) -> Result<String, TradingError> {
        let mut state = self.state.lock().await;
        let price = order
            .price
            .or(state.last_price)
            .ok_or_else(|| TradingError::PriceUnavailable {
                asset: order.asset.clone(),
            })?;

        let signed = order.size * order.side.sign();
        state.cash -= price * signed;

        let previous_price = state.position_price;
        let previous_size = state.position_size;
        let new_size = previous_size + signed;

        if previous_size == 0.0 || previous_size * signed > 0.0 {
            let total = previous_size.abs() + signed.abs();
            if total > 0.0 {
                state.position_price =
                    (previous_price * previous_size.abs() + price * signed.abs()) / total;
            }
        } else {
            let closing = signed.abs().min(previous_size.abs());
            let pnl = if closing > 0.0 {
                if previous_size > 0.0 {
                    closing * (price - previous_price)
                } else {
                    closing * (previous_price - price)
                }
            } else {
                0.0
            };
            state.realized_pnl += pnl;
            if new_size == 0.0 {
                state.position_price = 0.0;
            } else if previous_size * new_size < 0.0 {
                state.position_price = price;
            } else {
                state.position_price = previous_price;
            }
        }

        state.position_size = new_size;
        let equity = Self::equity(&state);
        state.trade_log.push(TradeRecord {
            timestamp: order.created_at,
            side: order.side,
            size: order.size,
            price,
            cash: state.cash,
            position: state.position_size,
            realized_pnl: state.realized_pnl,
            equity,
        });
        Ok("filled".to_string())
    }

    async fn cancel_order(&self, _exchange_order_id: &str) -> Result<bool, TradingError> {
        Ok(true)
    }

    async fn cancel_all_orders(&self) -> Result<u32, TradingError> {
        Ok(0)
    }

    async fn get_order_status(&self, exchange_order_id: &str) -> Result<Order, TradingError> {
        Ok(Order {
            id: exchange_order_id.to_string(),
            asset: self.symbol.clone(),
            side: OrderSide::Buy,
            size: 0.0,
            order_type: OrderType::Market,
            price: None,
            status: OrderStatus::Filled,
            created_at: 0,
            exchange_order_id: Some(exchange_order_id.to_string()),
        })
    }

    async fn get_positions(&self) -> Result<Vec<(String, Position)>, TradingError> {
        let state = self.state.lock().await;
        if state.position_size == 0.0 || state.last_price.is_none() {
            return Ok(Vec::new());
        }
        let last_price = state.last_price.unwrap();
        Ok(vec![(
            self.symbol.clone(),
            Position {
                size: state.position_size,
                entry_price: state.position_price,
                current_value: state.position_size.abs() * last_price,
                unrealized_pnl: Self::unrealized_pnl(&state),
                timestamp: 0,
            },
        )])
    }

    async fn close_position(&self, asset: &str, size: Option<f64>) -> Result<bool, TradingError> {
        let (position_size, last_price) = {
            let state = self.state.lock().await;
            (state.position_size, state.last_price)
        };
        if asset != self.symbol || position_size == 0.0 {
            return Ok(true);
        }
        let last_price = last_price.ok_or_else(|| TradingError::PriceUnavailable {
            asset: asset.to_string(),
        })?;
        let close_amount = size.map(|s| s.min(position_size.abs())).unwrap_or(position_size.abs());
        let side = if position_size > 0.0 { OrderSide::Sell } else { OrderSide::Buy };
        let order = Order::new(
            format!("paper-close-{}", chrono::Utc::now().timestamp_millis()),
            self.symbol.clone(),
            side,
            close_amount,
            Some(last_price),
            chrono::Utc::now().timestamp_millis(),
        );
        self.place_order(&order).await?;
        Ok(true)
    }

    async fn get_account_metrics(&self) -> Result<AccountMetrics, TradingError> {
        let state = self.state.lock().await;
        let equity = Self::equity(&state);
        let unrealized = Self::unrealized_pnl(&state);
        let largest_position_pct = if equity > 0.0 && state.last_price.is_some() {
            (state.position_size * state.last_price.unwrap()).abs() / equity
        } else {
            0.0
        };
        Ok(AccountMetrics {
            total_value: equity,
            total_pnl: state.realized_pnl + unrealized,
            unrealized_pnl: unrealized,
            realized_pnl: state.realized_pnl,
            drawdown_pct: 0.0,
            positions_count: if state.position_size != 0.0 { 1 } else { 0 },
            largest_position_pct,
        })
    }

    async fn update_price(&self, asset: &str, price: f64) {
        if asset != self.symbol {
            return;
        }
        let mut state = self.state.lock().await;
        state.last_price = Some(price);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(side: OrderSide, size: f64, price: f64) -> Order {
        Order::new("1".into(), "BTC".into(), side, size, Some(price), 0)
    }

    #[tokio::test]
    async fn paper_round_trip_matches_scenario() {
        let exchange = PaperExchange::new("BTC", 100.0);
        exchange.update_price("BTC", 50000.0).await;

        exchange.place_order(&order(OrderSide::Buy, 0.001, 50000.0)).await.unwrap();
        {
            let state = exchange.state.lock().await;
            assert!((state.cash - 50.0).abs() < 1e-9);
            assert!((state.position_size - 0.001).abs() < 1e-9);
            assert_eq!(state.realized_pnl, 0.0);
        }

        exchange.place_order(&order(OrderSide::Sell, 0.001, 51000.0)).await.unwrap();
        let state = exchange.state.lock().await;
        assert!((state.cash - 101.0).abs() < 1e-6);
        assert!((state.position_size - 0.0).abs() < 1e-9);
        assert!((state.realized_pnl - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn opening_then_closing_same_size_and_price_yields_zero_pnl() {
        let exchange = PaperExchange::new("ETH", 1000.0);
        exchange.update_price("ETH", 2000.0).await;
        exchange.place_order(&order(OrderSide::Buy, 1.0, 2000.0)).await.unwrap();
        exchange.place_order(&order(OrderSide::Sell, 1.0, 2000.0)).await.unwrap();
        let metrics = exchange.get_account_metrics().await.unwrap();
        assert_eq!(metrics.realized_pnl, 0.0);
    }

    #[tokio::test]
    async fn market_price_fails_without_last_price() {
        let exchange = PaperExchange::new("BTC", 100.0);
        let result = exchange.get_market_price("BTC").await;
        assert!(matches!(result, Err(TradingError::PriceUnavailable { .. })));
    }

    #[tokio::test]
    async fn equity_equals_cash_plus_exposure() {
        let exchange = PaperExchange::new("BTC", 1000.0);
        exchange.update_price("BTC", 100.0).await;
        exchange.place_order(&order(OrderSide::Buy, 2.0, 100.0)).await.unwrap();
        let metrics = exchange.get_account_metrics().await.unwrap();
        assert!((metrics.total_value - 1000.0).abs() < 1e-9);
    }
}
