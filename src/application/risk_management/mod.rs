//! Maps account/position metrics to a sequence of risk events; the engine
//! executes each sequentially, before any strategy signal for that tick.

use crate::domain::trading::{AccountMetrics, MarketDataEvent, Position};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskAction {
    ClosePosition,
    ReducePosition,
    CancelOrders,
    PauseTrading,
    EmergencyExit,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RiskEvent {
    pub rule_name: String,
    pub asset: String,
    pub action: RiskAction,
    pub reason: String,
}

#[derive(Debug, Clone, Copy)]
pub struct RiskManagerConfig {
    pub max_drawdown_pct: f64,
    pub stop_loss_enabled: bool,
    pub stop_loss_pct: f64,
    pub take_profit_enabled: bool,
    pub take_profit_pct: f64,
    pub max_position_concentration_pct: f64,
}

impl Default for RiskManagerConfig {
    fn default() -> Self {
        Self {
            max_drawdown_pct: 20.0,
            stop_loss_enabled: true,
            stop_loss_pct: 10.0,
            take_profit_enabled: false,
            take_profit_pct: 20.0,
            max_position_concentration_pct: 80.0,
        }
    }
}

pub struct RiskManager {
    config: RiskManagerConfig,
}

impl RiskManager {
    pub fn new(config: RiskManagerConfig) -> Self {
        Self { config }
    }

    pub fn evaluate_risks(
        &self,
        positions: &[(String, Position)],
        _market_data: &std::collections::HashMap<String, MarketDataEvent>,
        metrics: &AccountMetrics,
    ) -> Vec<RiskEvent> {
        let mut events = Vec::new();

        if metrics.drawdown_pct > self.config.max_drawdown_pct {
            events.push(RiskEvent {
                rule_name: "max_drawdown".to_string(),
                asset: "*".to_string(),
                action: RiskAction::EmergencyExit,
                reason: format!(
                    "drawdown {:.2}% exceeds max {:.2}%",
                    metrics.drawdown_pct, self.config.max_drawdown_pct
                ),
            });
            return events;
        }

        for (asset, position) in positions {
            if position.is_flat() || position.current_value == 0.0 {
                continue;
            }
            let pnl_pct = position.unrealized_pnl / position.current_value.abs() * 100.0;

            if self.config.stop_loss_enabled && pnl_pct <= -self.config.stop_loss_pct {
                events.push(RiskEvent {
                    rule_name: "stop_loss".to_string(),
                    asset: asset.clone(),
                    action: RiskAction::ClosePosition,
                    reason: format!(
                        "unrealized pnl {pnl_pct:.2}% breaches stop-loss {:.2}%",
                        self.config.stop_loss_pct
                    ),
                });
                continue;
            }

            if self.config.take_profit_enabled && pnl_pct >= self.config.take_profit_pct {
                events.push(RiskEvent {
                    rule_name: "take_profit".to_string(),
                    asset: asset.clone(),
                    action: RiskAction::ClosePosition,
                    reason: format!(
                        "unrealized pnl {pnl_pct:.2}% reaches take-profit {:.2}%",
                        self.config.take_profit_pct
                    ),
                });
                continue;
            }

            if metrics.total_value > 0.0 {
                let concentration = position.current_value.abs() / metrics.total_value * 100.0;
                if concentration > self.config.max_position_concentration_pct {
                    events.push(RiskEvent {
                        rule_name: "position_concentration".to_string(),
                        asset: asset.clone(),
                        action: RiskAction::ReducePosition,
                        reason: format!(
                            "position is {concentration:.2}% of equity, exceeds {:.2}%",
                            self.config.max_position_concentration_pct
                        ),
                    });
                }
            }
        }

        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(unrealized_pnl: f64, current_value: f64) -> Position {
        Position {
            size: 1.0,
            entry_price: 100.0,
            current_value,
            unrealized_pnl,
            timestamp: 0,
        }
    }

    #[test]
    fn drawdown_breach_produces_emergency_exit_and_short_circuits() {
        let manager = RiskManager::new(RiskManagerConfig::default());
        let metrics = AccountMetrics {
            drawdown_pct: 25.0,
            total_value: 1000.0,
            ..Default::default()
        };
        let positions = vec![("BTC".to_string(), position(-500.0, 500.0))];
        let events = manager.evaluate_risks(&positions, &Default::default(), &metrics);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].action, RiskAction::EmergencyExit);
    }

    #[test]
    fn stop_loss_breach_produces_close_position() {
        let manager = RiskManager::new(RiskManagerConfig::default());
        let metrics = AccountMetrics {
            drawdown_pct: 2.0,
            total_value: 1000.0,
            ..Default::default()
        };
        let positions = vec![("BTC".to_string(), position(-150.0, 1000.0))];
        let events = manager.evaluate_risks(&positions, &Default::default(), &metrics);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].action, RiskAction::ClosePosition);
        assert_eq!(events[0].rule_name, "stop_loss");
    }

    #[test]
    fn healthy_position_produces_no_events() {
        let manager = RiskManager::new(RiskManagerConfig::default());
        let metrics = AccountMetrics {
            drawdown_pct: 1.0,
            total_value: 1000.0,
            ..Default::default()
        };
        let positions = vec![("BTC".to_string(), position(10.0, 500.0))];
        let events = manager.evaluate_risks(&positions, &Default::default(), &metrics);
        assert!(events.is_empty());
    }
}
