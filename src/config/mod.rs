//! Environment-driven bootstrap, mirroring the teacher's `config::Config`
//! aggregator: one struct per subsystem, each validated against the same
//! ranges the external YAML contract specifies.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::application::engine::{EngineConfig, IndicatorFilterConfig};
use crate::application::risk_management::RiskManagerConfig;
use crate::application::strategies::GridConfig;
use crate::domain::errors::TradingError;

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> Result<T> {
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|_| TradingError::InvalidConfig(format!("{key}: invalid value '{raw}'")).into()),
        Err(_) => Ok(default),
    }
}

fn require_range(key: &str, value: f64, min: f64, max: f64) -> Result<f64> {
    if value < min || value > max {
        return Err(TradingError::InvalidConfig(format!(
            "{key}={value} out of range [{min}, {max}]"
        ))
        .into());
    }
    Ok(value)
}

#[derive(Debug, Clone)]
pub struct MlConfig {
    pub model_path: PathBuf,
    pub lookback: usize,
    pub enter_threshold: f64,
    pub exit_threshold: f64,
    pub eval_interval: Duration,
    pub pattern_models: HashMap<String, PathBuf>,
    pub pattern_gain_pct: f64,
    pub pattern_stop_pct: f64,
    pub pattern_horizon: u32,
    pub context_days: u32,
    pub pattern_confirmations: u32,
    pub filter: IndicatorFilterConfig,
}

#[derive(Debug, Clone)]
pub struct PaperConfig {
    pub enabled: bool,
    pub initial_balance: f64,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub grid: GridConfig,
    pub risk: RiskManagerConfig,
    pub ml: MlConfig,
    pub paper: PaperConfig,
    pub engine: EngineConfig,
}

fn parse_pattern_models(raw: &str) -> Result<HashMap<String, PathBuf>> {
    let mut map = HashMap::new();
    if raw.is_empty() {
        return Ok(map);
    }
    for entry in raw.split(';').filter(|s| !s.is_empty()) {
        let (name, path) = entry.split_once('=').ok_or_else(|| {
            TradingError::InvalidConfig(format!("ML_PATTERN_MODELS entry '{entry}' missing '='"))
        })?;
        map.insert(name.to_string(), PathBuf::from(path));
    }
    Ok(map)
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let symbol = env_string("GRID_SYMBOL", "BTC-USD");

        let levels: usize = env_parse("GRID_LEVELS", 1usize)?;
        if !(1..=50).contains(&levels) {
            return Err(TradingError::InvalidConfig(format!("GRID_LEVELS={levels} out of range [1, 50]")).into());
        }
        let range_pct = require_range("GRID_RANGE_PCT", env_parse("GRID_RANGE_PCT", 10.0)?, 1.0, 50.0)?;
        let total_allocation: f64 = env_parse("GRID_TOTAL_ALLOCATION", 100.0)?;
        let rebalance_threshold_pct = require_range(
            "GRID_REBALANCE_THRESHOLD_PCT",
            env_parse("GRID_REBALANCE_THRESHOLD_PCT", 5.0)?,
            1.0,
            50.0,
        )?;
        let grid_take_profit_pct: f64 = env_parse("GRID_TAKE_PROFIT_PCT", 0.05)?;
        let grid_stop_loss_pct: f64 = env_parse("GRID_STOP_LOSS_PCT", 0.05)?;
        let grid_max_usd: Option<f64> = match std::env::var("GRID_MAX_USD") {
            Ok(raw) => Some(
                raw.parse::<f64>()
                    .map_err(|_| TradingError::InvalidConfig(format!("GRID_MAX_USD: invalid value '{raw}'")))?,
            ),
            Err(_) => None,
        };

        let grid = GridConfig {
            symbol: symbol.clone(),
            levels,
            range_pct,
            total_allocation,
            min_price: None,
            max_price: None,
            rebalance_threshold_pct,
            take_profit_pct: grid_take_profit_pct,
            stop_loss_pct: grid_stop_loss_pct,
            max_usd_per_trade: grid_max_usd,
        };

        let max_drawdown_pct = require_range(
            "RISK_MAX_DRAWDOWN_PCT",
            env_parse("RISK_MAX_DRAWDOWN_PCT", 20.0)?,
            5.0,
            50.0,
        )?;
        let stop_loss_enabled: bool = env_parse("RISK_STOP_LOSS_ENABLED", true)?;
        let stop_loss_pct = if stop_loss_enabled {
            require_range("RISK_STOP_LOSS_PCT", env_parse("RISK_STOP_LOSS_PCT", 10.0)?, 1.0, 20.0)?
        } else {
            env_parse("RISK_STOP_LOSS_PCT", 10.0)?
        };
        let take_profit_enabled: bool = env_parse("RISK_TAKE_PROFIT_ENABLED", false)?;
        let take_profit_pct = if take_profit_enabled {
            require_range("RISK_TAKE_PROFIT_PCT", env_parse("RISK_TAKE_PROFIT_PCT", 20.0)?, 5.0, 100.0)?
        } else {
            env_parse("RISK_TAKE_PROFIT_PCT", 20.0)?
        };
        let max_position_concentration_pct: f64 = env_parse("RISK_MAX_POSITION_CONCENTRATION_PCT", 80.0)?;

        let risk = RiskManagerConfig {
            max_drawdown_pct,
            stop_loss_enabled,
            stop_loss_pct,
            take_profit_enabled,
            take_profit_pct,
            max_position_concentration_pct,
        };

        let model_path = PathBuf::from(env_string("ML_MODEL_PATH", "models/main.json"));
        let lookback: usize = env_parse("ML_LOOKBACK", 60usize)?;
        let enter_threshold: f64 = env_parse("ML_ENTER_THRESHOLD", 0.6)?;
        let exit_threshold: f64 = env_parse("ML_EXIT_THRESHOLD", 0.4)?;
        let eval_interval_secs: u64 = env_parse("ML_EVAL_INTERVAL", 60u64)?;
        let pattern_models = parse_pattern_models(&env_string("ML_PATTERN_MODELS", ""))?;
        let pattern_gain_pct: f64 = env_parse("ML_PATTERN_GAIN_PCT", 0.02)?;
        let pattern_stop_pct: f64 = env_parse("ML_PATTERN_STOP_PCT", 0.01)?;
        let pattern_horizon: u32 = env_parse("ML_PATTERN_HORIZON", 10u32)?;
        let context_days: u32 = env_parse("ML_CONTEXT_DAYS", 1u32)?;
        let pattern_confirmations: u32 = env_parse("ML_PATTERN_CONFIRMATIONS", 1u32)?;
        let filter_enabled: bool = env_parse("ML_FILTER_ENABLED", false)?;
        let filter = IndicatorFilterConfig {
            enabled: filter_enabled,
            rsi_buy_min: env_parse("ML_FILTER_RSI_BUY_MIN", 50.0)?,
            rsi_sell_max: env_parse("ML_FILTER_RSI_SELL_MAX", 50.0)?,
            macd_margin: env_parse("ML_FILTER_MACD_MARGIN", 0.0)?,
            ema_ratio_buffer: env_parse("ML_FILTER_EMA_RATIO_BUFFER", 0.0)?,
            volume_ratio_min: env_parse("ML_FILTER_VOLUME_RATIO_MIN", 0.0)?,
            bb_width_min: env_parse("ML_FILTER_BB_WIDTH_MIN", 0.0)?,
        };

        let ml = MlConfig {
            model_path,
            lookback,
            enter_threshold,
            exit_threshold,
            eval_interval: Duration::from_secs(eval_interval_secs),
            pattern_models,
            pattern_gain_pct,
            pattern_stop_pct,
            pattern_horizon,
            context_days,
            pattern_confirmations,
            filter,
        };

        let paper = PaperConfig {
            enabled: env_parse("PAPER_TRADING", true)?,
            initial_balance: env_parse("PAPER_INITIAL_BALANCE", 1000.0)?,
        };

        let mut engine = EngineConfig::new(symbol);
        engine.eval_interval = ml.eval_interval;
        engine.enter_threshold = ml.enter_threshold;
        engine.pattern_confirmation = ml.pattern_confirmations;
        engine.indicator_filter = ml.filter;

        Ok(Self { grid, risk, ml, paper, engine })
    }
}

pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn defaults_produce_a_valid_config() {
        let _guard = ENV_LOCK.lock().unwrap();
        for (k, _) in std::env::vars() {
            if k.starts_with("GRID_") || k.starts_with("RISK_") || k.starts_with("ML_") || k.starts_with("PAPER_") {
                std::env::remove_var(k);
            }
        }
        let config = Config::from_env().unwrap();
        assert_eq!(config.grid.levels, 1);
        assert!(config.risk.stop_loss_enabled);
        assert!(config.paper.enabled);
    }

    #[test]
    fn out_of_range_levels_is_rejected() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("GRID_LEVELS", "0");
        let result = Config::from_env();
        std::env::remove_var("GRID_LEVELS");
        assert!(result.is_err());
    }

    #[test]
    fn pattern_models_parses_name_equals_path_pairs() {
        let map = parse_pattern_models("hammer=models/hammer.json;doji=models/doji.json").unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map.get("hammer").unwrap(), &PathBuf::from("models/hammer.json"));
    }
}
