use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::domain::errors::TradingError;
use crate::domain::market::{Candle, SeriesKey, Timeframe};
use crate::domain::ports::CandleStore;

/// Append-only OHLCV store keyed by symbol/timeframe, sorted by `open_time`.
/// Ingestion (append) is a separate concern from this pipeline; tests and
/// the paper-trading binary populate it directly via [`InMemoryCandleStore::append`].
#[derive(Default)]
pub struct InMemoryCandleStore {
    series: RwLock<HashMap<SeriesKey, Vec<Candle>>>,
}

impl InMemoryCandleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, symbol: &str, timeframe: Timeframe, candle: Candle) {
        let key = SeriesKey {
            symbol: symbol.to_string(),
            timeframe,
        };
        let mut series = self.series.write().expect("candle store lock poisoned");
        let bars = series.entry(key).or_default();
        match bars.binary_search_by_key(&candle.open_time, |c| c.open_time) {
            Ok(idx) => bars[idx] = candle,
            Err(idx) => bars.insert(idx, candle),
        }
    }

    pub fn extend(&self, symbol: &str, timeframe: Timeframe, candles: impl IntoIterator<Item = Candle>) {
        for candle in candles {
            self.append(symbol, timeframe, candle);
        }
    }
}

#[async_trait]
impl CandleStore for InMemoryCandleStore {
    async fn load_recent(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Candle>, TradingError> {
        let key = SeriesKey {
            symbol: symbol.to_string(),
            timeframe,
        };
        let series = self.series.read().expect("candle store lock poisoned");
        let bars = series.get(&key).map(Vec::as_slice).unwrap_or(&[]);
        if bars.len() < limit {
            return Err(TradingError::NotEnoughData {
                requested: limit,
                available: bars.len(),
            });
        }
        Ok(bars[bars.len() - limit..].to_vec())
    }

    async fn range(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<Vec<Candle>, TradingError> {
        let key = SeriesKey {
            symbol: symbol.to_string(),
            timeframe,
        };
        let series = self.series.read().expect("candle store lock poisoned");
        let bars = series.get(&key).map(Vec::as_slice).unwrap_or(&[]);
        Ok(bars
            .iter()
            .filter(|c| c.open_time >= start_ms && c.open_time <= end_ms)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candle(open_time: i64, close: f64) -> Candle {
        Candle {
            open_time,
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 1.0,
        }
    }

    #[tokio::test]
    async fn load_recent_fails_when_insufficient() {
        let store = InMemoryCandleStore::new();
        store.append("BTC", Timeframe::FifteenMin, candle(0, 100.0));
        let err = store.load_recent("BTC", Timeframe::FifteenMin, 5).await.unwrap_err();
        assert!(matches!(err, TradingError::NotEnoughData { requested: 5, available: 1 }));
    }

    #[tokio::test]
    async fn load_recent_returns_tail_in_order() {
        let store = InMemoryCandleStore::new();
        for i in 0..10 {
            store.append("BTC", Timeframe::FifteenMin, candle(i * 900_000, 100.0 + i as f64));
        }
        let recent = store.load_recent("BTC", Timeframe::FifteenMin, 3).await.unwrap();
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].close, 107.0);
        assert_eq!(recent[2].close, 109.0);
    }

    #[tokio::test]
    async fn append_replaces_candle_with_same_open_time() {
        let store = InMemoryCandleStore::new();
        store.append("BTC", Timeframe::FifteenMin, candle(0, 100.0));
        store.append("BTC", Timeframe::FifteenMin, candle(0, 105.0));
        let recent = store.load_recent("BTC", Timeframe::FifteenMin, 1).await.unwrap();
        assert_eq!(recent[0].close, 105.0);
    }

    #[tokio::test]
    async fn range_filters_by_open_time_bounds() {
        let store = InMemoryCandleStore::new();
        for i in 0..5 {
            store.append("BTC", Timeframe::FifteenMin, candle(i * 1000, 100.0 + i as f64));
        }
        let bars = store.range("BTC", Timeframe::FifteenMin, 1000, 3000).await.unwrap();
        assert_eq!(bars.len(), 3);
    }
}
