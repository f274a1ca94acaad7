//! Price/size rounding rules applied by real adapters, sign-preserving.

/// Truncates BTC prices to whole dollars; rounds other assets to 2 decimals.
pub fn round_price(price: f64, symbol: &str) -> f64 {
    if symbol.eq_ignore_ascii_case("BTC") {
        price.trunc()
    } else {
        (price * 100.0).round() / 100.0
    }
}

/// Rounds to 5 decimals, then floors the magnitude at 0.0001, sign preserved.
pub fn round_size(size: f64) -> f64 {
    let sign = if size < 0.0 { -1.0 } else { 1.0 };
    let magnitude = size.abs();
    let rounded = (magnitude * 100_000.0).round() / 100_000.0;
    let floored = rounded.max(0.0001);
    sign * floored
}
