//! Candlestick and chart pattern detection over a fixed 18-pattern catalog.
//! Each detector is a pure boolean predicate over OHLC slices.

use super::market::Candle;

pub const PATTERN_KEYS: [&str; 18] = [
    "hammer",
    "hanging_man",
    "doji",
    "bullish_engulfing",
    "bearish_engulfing",
    "pin_bar",
    "morning_star",
    "evening_star",
    "double_bottom",
    "double_top",
    "head_and_shoulders",
    "inverse_head_and_shoulders",
    "triangle",
    "ascending_triangle",
    "descending_triangle",
    "flag",
    "pennant",
    "channel",
];

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PatternFlags {
    pub hammer: bool,
    pub hanging_man: bool,
    pub doji: bool,
    pub bullish_engulfing: bool,
    pub bearish_engulfing: bool,
    pub pin_bar: bool,
    pub morning_star: bool,
    pub evening_star: bool,
    pub double_bottom: bool,
    pub double_top: bool,
    pub head_and_shoulders: bool,
    pub inverse_head_and_shoulders: bool,
    pub triangle: bool,
    pub ascending_triangle: bool,
    pub descending_triangle: bool,
    pub flag: bool,
    pub pennant: bool,
    pub channel: bool,
}

impl PatternFlags {
    /// Names of the patterns currently flagged true, in catalog order.
    pub fn active_names(&self) -> Vec<&'static str> {
        let values = [
            self.hammer,
            self.hanging_man,
            self.doji,
            self.bullish_engulfing,
            self.bearish_engulfing,
            self.pin_bar,
            self.morning_star,
            self.evening_star,
            self.double_bottom,
            self.double_top,
            self.head_and_shoulders,
            self.inverse_head_and_shoulders,
            self.triangle,
            self.ascending_triangle,
            self.descending_triangle,
            self.flag,
            self.pennant,
            self.channel,
        ];
        PATTERN_KEYS
            .iter()
            .zip(values.iter())
            .filter(|(_, flag)| **flag)
            .map(|(name, _)| *name)
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<bool> {
        match name {
            "hammer" => Some(self.hammer),
            "hanging_man" => Some(self.hanging_man),
            "doji" => Some(self.doji),
            "bullish_engulfing" => Some(self.bullish_engulfing),
            "bearish_engulfing" => Some(self.bearish_engulfing),
            "pin_bar" => Some(self.pin_bar),
            "morning_star" => Some(self.morning_star),
            "evening_star" => Some(self.evening_star),
            "double_bottom" => Some(self.double_bottom),
            "double_top" => Some(self.double_top),
            "head_and_shoulders" => Some(self.head_and_shoulders),
            "inverse_head_and_shoulders" => Some(self.inverse_head_and_shoulders),
            "triangle" => Some(self.triangle),
            "ascending_triangle" => Some(self.ascending_triangle),
            "descending_triangle" => Some(self.descending_triangle),
            "flag" => Some(self.flag),
            "pennant" => Some(self.pennant),
            "channel" => Some(self.channel),
            _ => None,
        }
    }
}

fn trend_strength(closes: &[f64]) -> f64 {
    if closes.len() < 2 {
        return 0.0;
    }
    let (start, end) = (closes[0], closes[closes.len() - 1]);
    if start == 0.0 {
        0.0
    } else {
        (end - start) / start.abs()
    }
}

pub fn is_hammer(c: &Candle) -> bool {
    let rng = c.range();
    if rng == 0.0 {
        return false;
    }
    let body = c.body();
    c.lower_shadow() >= body * 2.0 && c.upper_shadow() <= body * 0.5 && body / rng <= 0.4
}

pub fn is_hanging_man(prev_closes: &[f64], c: &Candle) -> bool {
    trend_strength(prev_closes) > 0.03 && is_hammer(c)
}

pub fn is_doji(c: &Candle, threshold: f64) -> bool {
    let rng = c.range();
    rng > 0.0 && c.body() <= rng * threshold
}

pub fn is_pin_bar(c: &Candle) -> bool {
    let body = c.body();
    (c.upper_shadow() >= body * 2.0) != (c.lower_shadow() >= body * 2.0)
}

pub fn detect_bullish_engulfing(prev: &Candle, cur: &Candle) -> bool {
    prev.is_bearish()
        && cur.is_bullish()
        && cur.close >= prev.open
        && cur.open <= prev.close
        && cur.body() > prev.body()
}

pub fn detect_bearish_engulfing(prev: &Candle, cur: &Candle) -> bool {
    prev.is_bullish()
        && cur.is_bearish()
        && cur.open >= prev.close
        && cur.close <= prev.open
        && cur.body() > prev.body()
}

pub fn detect_morning_star(window: &[Candle]) -> bool {
    if window.len() != 3 {
        return false;
    }
    let (first, second, third) = (&window[0], &window[1], &window[2]);
    first.is_bearish()
        && is_doji(second, 0.2)
        && third.is_bullish()
        && third.close >= (first.open + first.close) / 2.0
}

pub fn detect_evening_star(window: &[Candle]) -> bool {
    if window.len() != 3 {
        return false;
    }
    let (first, second, third) = (&window[0], &window[1], &window[2]);
    first.is_bullish()
        && is_doji(second, 0.2)
        && third.is_bearish()
        && third.close <= (first.open + first.close) / 2.0
}

pub fn detect_double_bottom(closes: &[f64], tolerance: f64) -> bool {
    if closes.len() < 5 {
        return false;
    }
    let mut sorted = closes.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let lows = &sorted[..2];
    (lows[0] - lows[1]).abs() / lows[0].abs().max(1.0) <= tolerance
}

pub fn detect_double_top(closes: &[f64], tolerance: f64) -> bool {
    if closes.len() < 5 {
        return false;
    }
    let mut sorted = closes.to_vec();
    sorted.sort_by(|a, b| b.partial_cmp(a).unwrap());
    let highs = &sorted[..2];
    (highs[0] - highs[1]).abs() / highs[0].abs().max(1.0) <= tolerance
}

pub fn detect_head_and_shoulders(highs: &[f64]) -> bool {
    if highs.len() < 7 {
        return false;
    }
    let n = highs.len();
    let left = highs[..n / 3].iter().cloned().fold(f64::MIN, f64::max);
    let head = highs[n / 3..2 * n / 3]
        .iter()
        .cloned()
        .fold(f64::MIN, f64::max);
    let right = highs[2 * n / 3..].iter().cloned().fold(f64::MIN, f64::max);
    head > left && head > right && (left - right).abs() / head <= 0.05
}

pub fn detect_inverse_head_and_shoulders(lows: &[f64]) -> bool {
    if lows.len() < 7 {
        return false;
    }
    let n = lows.len();
    let left = lows[..n / 3].iter().cloned().fold(f64::MAX, f64::min);
    let head = lows[n / 3..2 * n / 3].iter().cloned().fold(f64::MAX, f64::min);
    let right = lows[2 * n / 3..].iter().cloned().fold(f64::MAX, f64::min);
    head < left && head < right && (left - right).abs() / head.abs() <= 0.05
}

pub fn detect_triangle(highs: &[f64], lows: &[f64]) -> bool {
    if highs.len() < 5 || lows.len() < 5 {
        return false;
    }
    let upper_trend = highs[highs.len() - 1] - highs[0];
    let lower_trend = lows[lows.len() - 1] - lows[0];
    upper_trend < 0.0 && lower_trend > 0.0
}

pub fn detect_ascending_triangle(highs: &[f64], lows: &[f64]) -> bool {
    if highs.len() < 5 || lows.len() < 5 {
        return false;
    }
    let max_high = highs.iter().cloned().fold(f64::MIN, f64::max);
    let min_high = highs.iter().cloned().fold(f64::MAX, f64::min);
    (max_high - min_high).abs() <= max_high * 0.01 && lows[lows.len() - 1] > lows[0]
}

pub fn detect_descending_triangle(highs: &[f64], lows: &[f64]) -> bool {
    if highs.len() < 5 || lows.len() < 5 {
        return false;
    }
    let max_low = lows.iter().cloned().fold(f64::MIN, f64::max);
    let min_low = lows.iter().cloned().fold(f64::MAX, f64::min);
    (max_low - min_low).abs() <= max_low.max(1.0) * 0.01 && highs[highs.len() - 1] < highs[0]
}

pub fn detect_flag(closes: &[f64]) -> bool {
    if closes.len() < 10 {
        return false;
    }
    let up_move = trend_strength(&closes[..5]);
    let consolidation = trend_strength(&closes[5..]).abs();
    up_move.abs() > 0.05 && consolidation < 0.01
}

pub fn detect_pennant(highs: &[f64], lows: &[f64]) -> bool {
    if highs.len() < 6 || lows.len() < 6 {
        return false;
    }
    detect_triangle(&highs[highs.len() - 6..], &lows[lows.len() - 6..])
}

pub fn detect_channel(highs: &[f64], lows: &[f64], tolerance: f64) -> bool {
    if highs.len() < 6 || lows.len() < 6 {
        return false;
    }
    let high_slope = (highs[highs.len() - 1] - highs[0]) / highs.len() as f64;
    let low_slope = (lows[lows.len() - 1] - lows[0]) / lows.len() as f64;
    (high_slope - low_slope).abs() <= tolerance * high_slope.abs().max(1.0)
}

/// Runs the full catalog over a window, mirroring the exact slice sizes
/// used by each detector (last 20/30/12 bars as appropriate).
pub fn detect_patterns(window: &[Candle]) -> PatternFlags {
    if window.is_empty() {
        return PatternFlags::default();
    }

    let closes: Vec<f64> = window.iter().map(|c| c.close).collect();
    let highs: Vec<f64> = window.iter().map(|c| c.high).collect();
    let lows: Vec<f64> = window.iter().map(|c| c.low).collect();
    let current = window.last().unwrap();

    let mut flags = PatternFlags {
        hammer: is_hammer(current),
        doji: is_doji(current, 0.1),
        pin_bar: is_pin_bar(current),
        ..Default::default()
    };

    if closes.len() > 1 {
        flags.hanging_man = is_hanging_man(&closes[..closes.len() - 1], current);
    }
    if window.len() >= 2 {
        let prev = &window[window.len() - 2];
        flags.bullish_engulfing = detect_bullish_engulfing(prev, current);
        flags.bearish_engulfing = detect_bearish_engulfing(prev, current);
    }
    if window.len() >= 3 {
        let last3 = &window[window.len() - 3..];
        flags.morning_star = detect_morning_star(last3);
        flags.evening_star = detect_evening_star(last3);
    }

    let tail = |values: &[f64], n: usize| {
        let start = values.len().saturating_sub(n);
        values[start..].to_vec()
    };

    flags.double_bottom = detect_double_bottom(&tail(&closes, 20), 0.01);
    flags.double_top = detect_double_top(&tail(&closes, 20), 0.01);
    flags.head_and_shoulders = detect_head_and_shoulders(&tail(&highs, 30));
    flags.inverse_head_and_shoulders = detect_inverse_head_and_shoulders(&tail(&lows, 30));
    flags.triangle = detect_triangle(&tail(&highs, 20), &tail(&lows, 20));
    flags.ascending_triangle = detect_ascending_triangle(&tail(&highs, 20), &tail(&lows, 20));
    flags.descending_triangle = detect_descending_triangle(&tail(&highs, 20), &tail(&lows, 20));
    flags.flag = detect_flag(&tail(&closes, 20));
    flags.pennant = detect_pennant(&tail(&highs, 12), &tail(&lows, 12));
    flags.channel = detect_channel(&tail(&highs, 20), &tail(&lows, 20), 0.02);

    flags
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candle(open: f64, high: f64, low: f64, close: f64) -> Candle {
        Candle {
            open_time: 0,
            open,
            high,
            low,
            close,
            volume: 1.0,
        }
    }

    #[test]
    fn hammer_requires_long_lower_shadow_and_small_body() {
        let c = candle(100.0, 101.0, 90.0, 100.5);
        assert!(is_hammer(&c));
    }

    #[test]
    fn hammer_rejects_zero_range_candle() {
        let c = candle(100.0, 100.0, 100.0, 100.0);
        assert!(!is_hammer(&c));
    }

    #[test]
    fn doji_uses_threshold_fraction_of_range() {
        let c = candle(100.0, 102.0, 98.0, 100.3);
        assert!(is_doji(&c, 0.1));
        assert!(!is_doji(&c, 0.01));
    }

    #[test]
    fn bullish_engulfing_requires_larger_enclosing_body() {
        let prev = candle(100.0, 101.0, 95.0, 96.0);
        let cur = candle(95.0, 105.0, 94.0, 102.0);
        assert!(detect_bullish_engulfing(&prev, &cur));
        assert!(!detect_bearish_engulfing(&prev, &cur));
    }

    #[test]
    fn double_bottom_needs_five_closes_within_tolerance() {
        let closes = vec![100.0, 95.0, 99.0, 94.8, 101.0];
        assert!(detect_double_bottom(&closes, 0.01));
        assert!(!detect_double_bottom(&closes[..4], 0.01));
    }

    #[test]
    fn head_and_shoulders_needs_strictly_higher_middle_third() {
        let highs = vec![
            10.0, 11.0, 10.5, 20.0, 21.0, 19.0, 10.2, 10.8, 10.3,
        ];
        assert!(detect_head_and_shoulders(&highs));
    }

    #[test]
    fn triangle_requires_converging_slopes() {
        let highs = vec![110.0, 109.0, 108.0, 107.0, 106.0];
        let lows = vec![90.0, 91.0, 92.0, 93.0, 94.0];
        assert!(detect_triangle(&highs, &lows));
    }

    #[test]
    fn analyze_patterns_handles_short_window_without_panicking() {
        let window = vec![candle(100.0, 101.0, 99.0, 100.5)];
        let flags = detect_patterns(&window);
        assert!(!flags.double_bottom);
        assert!(flags.active_names().len() <= PATTERN_KEYS.len());
    }
}
