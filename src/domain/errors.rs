use thiserror::Error;

/// Errors surfaced by the signal-to-execution pipeline.
#[derive(Debug, Error)]
pub enum TradingError {
    #[error("not enough data: requested {requested}, available {available}")]
    NotEnoughData { requested: usize, available: usize },

    #[error("adapter unavailable: {0}")]
    AdapterUnavailable(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("artifact missing: {0}")]
    ArtifactMissing(String),

    #[error("insufficient balance: need {needed}, have {available}")]
    InsufficientBalance { needed: f64, available: f64 },

    #[error("price unavailable for {asset}")]
    PriceUnavailable { asset: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_not_enough_data() {
        let err = TradingError::NotEnoughData {
            requested: 120,
            available: 40,
        };
        assert_eq!(
            err.to_string(),
            "not enough data: requested 120, available 40"
        );
    }

    #[test]
    fn formats_price_unavailable() {
        let err = TradingError::PriceUnavailable {
            asset: "BTC".to_string(),
        };
        assert_eq!(err.to_string(), "price unavailable for BTC");
    }
}
