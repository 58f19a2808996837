//! Windowed numeric primitives over a bar-indexed series.
//!
//! Every function reads `src[bar..]`, where index 0 is the newest bar and
//! larger indices are older, and never looks at bars newer than `bar`.

/// Mean of `length` bars from `bar` back. Falls back to the bar's own value
/// when fewer than `length` bars exist.
pub fn sma(src: &[f64], bar: usize, length: usize) -> f64 {
    match window(src, bar, length) {
        Some(values) => values.iter().sum::<f64>() / length as f64,
        None => value_at(src, bar),
    }
}

/// Exponential average with `k = 2 / (length + 1)`. `previous` is this
/// average one bar older; when it is NaN the average is seeded with `sma`.
pub fn ema(src: &[f64], bar: usize, length: usize, previous: f64) -> f64 {
    if previous.is_nan() {
        return sma(src, bar, length);
    }
    let k = 2.0 / (length as f64 + 1.0);
    value_at(src, bar) * k + previous * (1.0 - k)
}

/// Simple-average RSI over `length` bar-to-bar deltas. 50 when the window
/// is short or holds any `na`.
pub fn rsi(src: &[f64], bar: usize, length: usize) -> f64 {
    let Some(values) = window(src, bar, length + 1) else {
        return 50.0;
    };
    if values.iter().any(|value| value.is_nan()) {
        return 50.0;
    }

    let mut gains = 0.0;
    let mut losses = 0.0;
    for pair in values.windows(2) {
        let delta = pair[0] - pair[1];
        if delta > 0.0 {
            gains += delta;
        } else {
            losses -= delta;
        }
    }

    let average_gain = gains / length as f64;
    let average_loss = losses / length as f64;
    if average_loss == 0.0 {
        return 100.0;
    }
    let rs = average_gain / average_loss;
    100.0 - 100.0 / (1.0 + rs)
}

/// Population standard deviation, 0 without enough history.
pub fn stdev(src: &[f64], bar: usize, length: usize) -> f64 {
    let Some(values) = window(src, bar, length) else {
        return 0.0;
    };
    let mean = values.iter().sum::<f64>() / length as f64;
    let variance = values
        .iter()
        .map(|value| (value - mean) * (value - mean))
        .sum::<f64>()
        / length as f64;
    variance.sqrt()
}

/// Maximum over up to `length` bars, clamped to the available history.
pub fn highest(src: &[f64], bar: usize, length: usize) -> f64 {
    clamped(src, bar, length)
        .iter()
        .copied()
        .filter(|value| !value.is_nan())
        .reduce(f64::max)
        .unwrap_or(f64::NAN)
}

/// Minimum over up to `length` bars, clamped to the available history.
pub fn lowest(src: &[f64], bar: usize, length: usize) -> f64 {
    clamped(src, bar, length)
        .iter()
        .copied()
        .filter(|value| !value.is_nan())
        .reduce(f64::min)
        .unwrap_or(f64::NAN)
}

/// `a` crossed above `b` between the previous bar and this one.
pub fn crossover(a: &[f64], b: &[f64], bar: usize) -> bool {
    match (pair(a, bar), pair(b, bar)) {
        (Some((a_now, a_prev)), Some((b_now, b_prev))) => a_now > b_now && a_prev <= b_prev,
        _ => false,
    }
}

/// `a` crossed below `b` between the previous bar and this one.
pub fn crossunder(a: &[f64], b: &[f64], bar: usize) -> bool {
    match (pair(a, bar), pair(b, bar)) {
        (Some((a_now, a_prev)), Some((b_now, b_prev))) => a_now < b_now && a_prev >= b_prev,
        _ => false,
    }
}

/// Difference from the value `length` bars earlier; NaN without that bar.
pub fn change(src: &[f64], bar: usize, length: usize) -> f64 {
    match bar.checked_add(length).and_then(|older| src.get(older)) {
        Some(older) => value_at(src, bar) - older,
        None => f64::NAN,
    }
}

fn value_at(src: &[f64], bar: usize) -> f64 {
    src.get(bar).copied().unwrap_or(f64::NAN)
}

/// Exactly `length` bars starting at `bar`, or `None` if history is short.
fn window(src: &[f64], bar: usize, length: usize) -> Option<&[f64]> {
    if length == 0 {
        return None;
    }
    let end = bar.checked_add(length)?;
    src.get(bar..end)
}

fn clamped(src: &[f64], bar: usize, length: usize) -> &[f64] {
    let end = bar.saturating_add(length).min(src.len());
    src.get(bar..end).unwrap_or(&[])
}

fn pair(src: &[f64], bar: usize) -> Option<(f64, f64)> {
    let now = *src.get(bar)?;
    let previous = *src.get(bar.checked_add(1)?)?;
    Some((now, previous))
}
