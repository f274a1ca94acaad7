pub mod smartcore_predictor;

use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::errors::TradingError;
use crate::domain::indicators::compute_indicators;
use crate::domain::market::{Candle, Timeframe};
use crate::domain::pattern_bias::{classify_pattern, infer_bias};
use crate::domain::patterns::detect_patterns;
use crate::domain::ports::{CandleStore, PredictBinary};
use crate::domain::trading::{ContextSummary, MlSignal, Trend};

pub use smartcore_predictor::SmartCorePredictorModel;

/// Loads a main classifier plus optional per-pattern classifiers and
/// produces the full [`MlSignal`] for the configured symbol/timeframe.
pub struct MlSignalService {
    candle_store: Arc<dyn CandleStore>,
    main_model: Arc<dyn PredictBinary>,
    pattern_models: HashMap<String, Arc<dyn PredictBinary>>,
    symbol: String,
    timeframe: Timeframe,
    lookback: usize,
    context_days: u32,
    pattern_gain_pct: f64,
    pattern_stop_pct: f64,
    pattern_horizon: u32,
}

impl MlSignalService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        candle_store: Arc<dyn CandleStore>,
        main_model: Arc<dyn PredictBinary>,
        pattern_models: HashMap<String, Arc<dyn PredictBinary>>,
        symbol: String,
        timeframe: Timeframe,
        lookback: usize,
        context_days: u32,
        pattern_gain_pct: f64,
        pattern_stop_pct: f64,
        pattern_horizon: u32,
    ) -> Self {
        Self {
            candle_store,
            main_model,
            pattern_models,
            symbol,
            timeframe,
            lookback,
            context_days,
            pattern_gain_pct,
            pattern_stop_pct,
            pattern_horizon,
        }
    }

    pub async fn evaluate_signal(&self, now_ms: i64) -> Result<MlSignal, TradingError> {
        let limit = self
            .lookback
            .saturating_add(20)
            .max((self.context_days as usize) * 96 + 20);

        let candles = self
            .candle_store
            .load_recent(&self.symbol, self.timeframe, limit)
            .await?;

        if candles.len() < self.lookback {
            return Err(TradingError::NotEnoughData {
                requested: self.lookback,
                available: candles.len(),
            });
        }

        let window = candles[candles.len() - self.lookback..].to_vec();
        let main_model = Arc::clone(&self.main_model);
        let pattern_models: HashMap<String, Arc<dyn PredictBinary>> = self.pattern_models.clone();
        let context_days = self.context_days;
        let pattern_gain_pct = self.pattern_gain_pct;
        let pattern_stop_pct = self.pattern_stop_pct;
        let pattern_horizon = self.pattern_horizon;
        let lookback = self.lookback;

        tokio::task::spawn_blocking(move || {
            evaluate_blocking(
                &candles,
                &window,
                main_model.as_ref(),
                &pattern_models,
                context_days,
                pattern_gain_pct,
                pattern_stop_pct,
                pattern_horizon,
                lookback,
                now_ms,
            )
        })
        .await
        .map_err(|e| TradingError::InvalidConfig(format!("ml evaluation task panicked: {e}")))?
    }
}

/// Feature vector for the main classifier: 6 derived statistics, the
/// 9-value indicator snapshot, then the 18 pattern booleans as 0/1 — 33
/// values total, in fixed order.
/// Ratio of the most recent bar's volume to the mean of the preceding bars;
/// `1.0` when there is no prior volume to compare against.
fn volume_ratio(window: &[Candle]) -> f64 {
    let n = window.len();
    let last_volume = window.last().map(|c| c.volume).unwrap_or(0.0);
    let mean_prior_volume = if n > 1 {
        window[..n - 1].iter().map(|c| c.volume).sum::<f64>() / (n - 1) as f64
    } else {
        0.0
    };
    if mean_prior_volume > 0.0 {
        last_volume / mean_prior_volume
    } else {
        1.0
    }
}

fn main_feature_vector(window: &[Candle]) -> Vec<f64> {
    let closes: Vec<f64> = window.iter().map(|c| c.close).collect();
    let n = closes.len();

    let momentum = if n >= 2 {
        let prev_close = closes[n - 2];
        (closes[n - 1] - prev_close) / prev_close.abs().max(1e-9)
    } else {
        0.0
    };
    let total_return = if n >= 2 {
        (closes[n - 1] - closes[0]) / closes[0].abs().max(1e-9)
    } else {
        0.0
    };
    let mean_close = closes.iter().sum::<f64>() / n as f64;
    let close_stddev = (closes.iter().map(|c| (c - mean_close).powi(2)).sum::<f64>() / n as f64).sqrt();

    let body_ratios: Vec<f64> = window
        .iter()
        .map(|c| c.body() / c.close.abs().max(1e-9))
        .collect();
    let mean_body_ratio = if body_ratios.is_empty() {
        0.0
    } else {
        body_ratios.iter().sum::<f64>() / body_ratios.len() as f64
    };

    let range_ratios: Vec<f64> = window
        .iter()
        .filter(|c| c.close != 0.0)
        .map(|c| c.range() / c.close.abs())
        .collect();
    let mean_range_ratio = if range_ratios.is_empty() {
        0.0
    } else {
        range_ratios.iter().sum::<f64>() / range_ratios.len() as f64
    };

    let volume_ratio = volume_ratio(window);

    let indicators = compute_indicators(window);
    let patterns = detect_patterns(window);

    let mut features = vec![
        momentum,
        total_return,
        close_stddev,
        mean_body_ratio,
        mean_range_ratio,
        volume_ratio,
    ];
    features.extend_from_slice(&indicators.as_ordered_values());
    for name in crate::domain::patterns::PATTERN_KEYS {
        features.push(if patterns.get(name).unwrap_or(false) { 1.0 } else { 0.0 });
    }
    features
}

#[allow(clippy::too_many_arguments)]
fn evaluate_blocking(
    candles: &[Candle],
    window: &[Candle],
    main_model: &dyn PredictBinary,
    pattern_models: &HashMap<String, Arc<dyn PredictBinary>>,
    context_days: u32,
    pattern_gain_pct: f64,
    pattern_stop_pct: f64,
    pattern_horizon: u32,
    lookback: usize,
    now_ms: i64,
) -> Result<MlSignal, TradingError> {
    let main_features = main_feature_vector(window);
    let (_, probability) = main_model.predict_proba(&main_features)?;

    let patterns = detect_patterns(window);
    let indicators = compute_indicators(window);

    let mut pattern_predictions = HashMap::new();
    for name in patterns.active_names() {
        if let Some(model) = pattern_models.get(name) {
            let mut features = indicators.as_ordered_values().to_vec();
            features.push(pattern_gain_pct);
            features.push(pattern_stop_pct);
            features.push(lookback as f64);
            features.push(pattern_horizon as f64);
            let (_, p1) = model.predict_proba(&features)?;
            pattern_predictions.insert(name.to_string(), p1);
        }
    }

    let context_summary = build_context_summary(candles, context_days);

    let best_pattern = pattern_predictions
        .iter()
        .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
        .map(|(name, _)| name.clone());

    let pattern_bias = best_pattern
        .as_deref()
        .and_then(classify_pattern)
        .or_else(|| infer_bias(patterns.active_names()));

    Ok(MlSignal {
        probability,
        patterns,
        pattern_predictions,
        indicator_snapshot: indicators,
        pattern_bias,
        best_pattern,
        context_summary: Some(context_summary),
        volume_ratio: volume_ratio(window),
        timestamp: now_ms,
    })
}

fn build_context_summary(candles: &[Candle], context_days: u32) -> ContextSummary {
    let target = (context_days as usize) * 96;
    let ctx_len = candles.len().min(target.max(1));
    let tail = &candles[candles.len() - ctx_len..];

    let first = tail.first().map(|c| c.close).unwrap_or(0.0);
    let last = tail.last().map(|c| c.close).unwrap_or(0.0);
    let total_return = if first != 0.0 { (last - first) / first } else { 0.0 };

    let closes: Vec<f64> = tail.iter().map(|c| c.close).collect();
    let mean_close = closes.iter().sum::<f64>() / closes.len().max(1) as f64;
    let volatility = (closes.iter().map(|c| (c - mean_close).powi(2)).sum::<f64>()
        / closes.len().max(1) as f64)
        .sqrt();

    let avg_volume = tail.iter().map(|c| c.volume).sum::<f64>() / tail.len().max(1) as f64;
    let high = tail.iter().map(|c| c.high).fold(f64::MIN, f64::max);
    let low = tail.iter().map(|c| c.low).fold(f64::MAX, f64::min);

    let trend = if total_return > 0.02 {
        Trend::Alta
    } else if total_return < -0.02 {
        Trend::Baixa
    } else {
        Trend::Lateral
    };

    ContextSummary {
        candles: ctx_len,
        total_return,
        volatility,
        avg_volume,
        high,
        low,
        trend,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candle(close: f64) -> Candle {
        Candle {
            open_time: 0,
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 10.0,
        }
    }

    #[test]
    fn main_feature_vector_has_thirty_three_entries() {
        let window: Vec<Candle> = (0..30).map(|i| candle(100.0 + i as f64)).collect();
        let features = main_feature_vector(&window);
        assert_eq!(features.len(), 33);
    }

    #[test]
    fn context_summary_classifies_uptrend() {
        let candles: Vec<Candle> = (0..100).map(|i| candle(100.0 + i as f64 * 2.0)).collect();
        let summary = build_context_summary(&candles, 1);
        assert_eq!(summary.trend, Trend::Alta);
        assert!(summary.total_return > 0.02);
    }

    #[test]
    fn context_summary_window_is_bounded_by_context_days() {
        let candles: Vec<Candle> = (0..500).map(|i| candle(100.0 + i as f64)).collect();
        let summary = build_context_summary(&candles, 2);
        assert_eq!(summary.candles, 192);
    }
}
