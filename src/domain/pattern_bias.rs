//! Static bullish/bearish classification of the pattern catalog.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bias {
    Bullish,
    Bearish,
}

const BULLISH_PATTERNS: [&str; 10] = [
    "hammer",
    "bullish_engulfing",
    "morning_star",
    "double_bottom",
    "inverse_head_and_shoulders",
    "ascending_triangle",
    "pennant",
    "triangle",
    "doji",
    "pin_bar",
];

const BEARISH_PATTERNS: [&str; 6] = [
    "bearish_engulfing",
    "evening_star",
    "double_top",
    "head_and_shoulders",
    "descending_triangle",
    "hanging_man",
];

/// Looks up a single pattern's bias. `flag` and `channel` are
/// direction-agnostic and intentionally absent from both tables — their
/// bias, if any, comes from co-occurring directional patterns via
/// [`infer_bias`].
pub fn classify_pattern(pattern: &str) -> Option<Bias> {
    if BULLISH_PATTERNS.contains(&pattern) {
        Some(Bias::Bullish)
    } else if BEARISH_PATTERNS.contains(&pattern) {
        Some(Bias::Bearish)
    } else {
        None
    }
}

/// Infers an overall bias from a set of currently active pattern names,
/// returning the bias of the first one (in iteration order) that has one.
pub fn infer_bias<'a>(active: impl IntoIterator<Item = &'a str>) -> Option<Bias> {
    active.into_iter().find_map(classify_pattern)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_known_patterns() {
        assert_eq!(classify_pattern("hammer"), Some(Bias::Bullish));
        assert_eq!(classify_pattern("evening_star"), Some(Bias::Bearish));
        assert_eq!(classify_pattern("pennant"), Some(Bias::Bullish));
        assert_eq!(classify_pattern("flag"), None);
    }

    #[test]
    fn infers_bias_from_first_active_match() {
        let active = ["doji", "evening_star"];
        assert_eq!(infer_bias(active), Some(Bias::Bullish));
    }

    #[test]
    fn skips_direction_agnostic_patterns_to_find_first_match() {
        let active = ["flag", "channel", "hanging_man"];
        assert_eq!(infer_bias(active), Some(Bias::Bearish));
    }

    #[test]
    fn empty_active_set_yields_no_bias() {
        let active: [&str; 0] = [];
        assert_eq!(infer_bias(active), None);
    }
}
