//! Fixed-order technical indicator vector computed over a candle window.
//!
//! Key order is part of the contract: downstream feature vectors concatenate
//! `IndicatorSnapshot::as_ordered_values` positionally.

use super::market::Candle;

pub const INDICATOR_KEYS: [&str; 9] = [
    "ema_12",
    "ema_26",
    "ema_ratio",
    "rsi_14",
    "macd",
    "atr_14",
    "bb_upper",
    "bb_lower",
    "bb_width",
];

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct IndicatorSnapshot {
    pub ema_12: f64,
    pub ema_26: f64,
    pub ema_ratio: f64,
    pub rsi_14: f64,
    pub macd: f64,
    pub atr_14: f64,
    pub bb_upper: f64,
    pub bb_lower: f64,
    pub bb_width: f64,
}

impl IndicatorSnapshot {
    /// Values in the exact order of [`INDICATOR_KEYS`].
    pub fn as_ordered_values(&self) -> [f64; 9] {
        [
            self.ema_12,
            self.ema_26,
            self.ema_ratio,
            self.rsi_14,
            self.macd,
            self.atr_14,
            self.bb_upper,
            self.bb_lower,
            self.bb_width,
        ]
    }

    pub fn is_empty(&self) -> bool {
        *self == IndicatorSnapshot::default()
    }
}

fn ema(values: &[f64], period: usize) -> f64 {
    if values.len() < period {
        return *values.last().unwrap_or(&0.0);
    }
    let window = &values[values.len() - period..];
    // exp(linspace(-1, 0, period)) normalized to sum to 1
    let weights: Vec<f64> = (0..period)
        .map(|i| {
            let t = if period == 1 {
                0.0
            } else {
                -1.0 + i as f64 / (period - 1) as f64
            };
            t.exp()
        })
        .collect();
    let total: f64 = weights.iter().sum();
    window
        .iter()
        .zip(weights.iter())
        .map(|(v, w)| v * (w / total))
        .sum()
}

fn rsi(values: &[f64], period: usize) -> f64 {
    if values.len() < period + 1 {
        return 50.0;
    }
    let window = &values[values.len() - (period + 1)..];
    let deltas: Vec<f64> = window.windows(2).map(|w| w[1] - w[0]).collect();
    let gains: Vec<f64> = deltas.iter().map(|d| d.max(0.0)).collect();
    let losses: Vec<f64> = deltas.iter().map(|d| (-d).max(0.0)).collect();
    let avg_gain = gains.iter().sum::<f64>() / gains.len() as f64;
    let avg_loss = losses.iter().sum::<f64>() / losses.len() as f64;
    if avg_loss == 0.0 {
        return 100.0;
    }
    let rs = avg_gain / avg_loss;
    100.0 - (100.0 / (1.0 + rs))
}

fn macd(values: &[f64]) -> f64 {
    if values.len() < 26 {
        return 0.0;
    }
    ema(values, 12) - ema(values, 26)
}

fn atr(candles: &[Candle], period: usize) -> f64 {
    if candles.len() < 2 {
        return 0.0;
    }
    let period = period.min(candles.len() - 1);
    let mut true_ranges = Vec::with_capacity(period);
    for i in (candles.len() - period)..candles.len() {
        let cur = &candles[i];
        let prev_close = candles[i - 1].close;
        let tr = (cur.high - cur.low)
            .max((cur.high - prev_close).abs())
            .max((cur.low - prev_close).abs());
        true_ranges.push(tr);
    }
    if true_ranges.is_empty() {
        0.0
    } else {
        true_ranges.iter().sum::<f64>() / true_ranges.len() as f64
    }
}

struct Bollinger {
    upper: f64,
    lower: f64,
    width: f64,
}

fn bollinger(values: &[f64], period: usize) -> Bollinger {
    if values.len() < period {
        let last = *values.last().unwrap_or(&0.0);
        return Bollinger {
            upper: last,
            lower: last,
            width: 0.0,
        };
    }
    let window = &values[values.len() - period..];
    let mean = window.iter().sum::<f64>() / period as f64;
    let variance = window.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / period as f64;
    let std = variance.sqrt();
    let upper = mean + 2.0 * std;
    let lower = mean - 2.0 * std;
    let width = (upper - lower) / mean.abs().max(1e-9);
    Bollinger { upper, lower, width }
}

/// Computes the full fixed-order indicator snapshot over a candle window.
/// Degrades gracefully on short windows instead of failing.
pub fn compute_indicators(window: &[Candle]) -> IndicatorSnapshot {
    if window.is_empty() {
        return IndicatorSnapshot::default();
    }
    let closes: Vec<f64> = window.iter().map(|c| c.close).collect();

    let ema_12 = ema(&closes, 12);
    let ema_26 = ema(&closes, 26);
    let ema_ratio = if ema_26 != 0.0 { ema_12 / ema_26 } else { 1.0 };
    let rsi_14 = rsi(&closes, 14);
    let macd_value = macd(&closes);
    let atr_14 = atr(window, 14);
    let bb = bollinger(&closes, 20);

    IndicatorSnapshot {
        ema_12,
        ema_26,
        ema_ratio,
        rsi_14,
        macd: macd_value,
        atr_14,
        bb_upper: bb.upper,
        bb_lower: bb.lower,
        bb_width: bb.width,
    }
}
