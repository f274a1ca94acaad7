pub mod candle;
pub mod timeframe;

pub use candle::{Candle, SeriesKey};
pub use timeframe::Timeframe;
