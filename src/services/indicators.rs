/// Exponential Moving Average (EMA)
/// Uses scan to carry previous EMA as state.
/// - seeded with the first value
/// - returns `None` until `window` values have been seen
pub fn ema(values: &[f64], window: usize) -> Vec<Option<f64>> {
    if values.is_empty() || window == 0 {
        return vec![None; values.len()];
    }

    let alpha = 2.0 / (window as f64 + 1.0);

    values
        .iter()
        .enumerate()
        .scan(values[0], move |prev_ema, (i, &v)| {
            let next = alpha * v + (1.0 - alpha) * *prev_ema;
            *prev_ema = next;

            let out = if i + 1 >= window { Some(next) } else { None };
            Some(out)
        })
        .collect()
}

/// Relative Strength Index (RSI) over a chronological series (oldest first).
///
/// Wilder's method: the first average gain/loss is the simple mean of the
/// first `period` changes, later averages are smoothed with `alpha = 1 / period`.
///
/// Boundary values:
/// - no losses: 100
/// - no gains: 0
/// - no gains and no losses: `None`, the ratio is undefined
///
/// Returns `None` for the first `period` values, then `Some(rsi)` where defined.
pub fn rsi(prices: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut result = vec![None; prices.len()];
    if period == 0 || prices.len() <= period {
        return result;
    }

    let changes: Vec<f64> = prices
        .windows(2)
        .map(|w| w[1] - w[0])
        .collect();

    let gains: Vec<f64> = changes.iter().map(|&c| c.max(0.0)).collect();
    let losses: Vec<f64> = changes.iter().map(|&c| (-c).max(0.0)).collect();

    let alpha = 1.0 / period as f64;
    let mut avg_gain = gains[..period].iter().sum::<f64>() / period as f64;
    let mut avg_loss = losses[..period].iter().sum::<f64>() / period as f64;

    result[period] = rsi_from_averages(avg_gain, avg_loss);

    for i in period..changes.len() {
        avg_gain = alpha * gains[i] + (1.0 - alpha) * avg_gain;
        avg_loss = alpha * losses[i] + (1.0 - alpha) * avg_loss;
        result[i + 1] = rsi_from_averages(avg_gain, avg_loss);
    }

    result
}

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> Option<f64> {
    match (avg_gain > 0.0, avg_loss > 0.0) {
        (false, false) => None,
        (true, false) => Some(100.0),
        (false, true) => Some(0.0),
        (true, true) => Some(100.0 - 100.0 / (1.0 + avg_gain / avg_loss)),
    }
}

/// RSI as of the head of a latest-first price list.
pub fn latest_rsi(period: usize, prices_desc: &[f64]) -> Option<f64> {
    let chronological: Vec<f64> = prices_desc.iter().rev().copied().collect();
    rsi(&chronological, period).last().copied().flatten()
}

/// Rolling `n`-day fractional changes over a latest-first price list.
///
/// Element `i` is `prices[i] / prices[i + n] - 1`, the change into day `i`
/// from `n` trading days earlier.
pub fn rolling_changes(n: usize, prices_desc: &[f64]) -> Vec<f64> {
    if n == 0 {
        return Vec::new();
    }
    prices_desc
        .iter()
        .zip(prices_desc.iter().skip(n))
        .map(|(now, then)| now / then - 1.0)
        .collect()
}

/// Empirical quantile with linear interpolation between order statistics
/// (the `(n - 1) * p` rule numpy and pandas use by default).
///
/// Non-finite values are ignored; `None` if nothing is left.
pub fn quantile(p: f64, values: &[f64]) -> Option<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(|a, b| a.total_cmp(b));

    let pos = p.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    if lower == upper {
        Some(sorted[lower])
    } else {
        Some(sorted[lower] + (sorted[upper] - sorted[lower]) * (pos - lower as f64))
    }
}

/// Trend steepness: percentage change of EMA(`n`) across the last `n` trading days.
///
/// Works on the most recent `3n` prices of a latest-first list, so the EMA gets
/// `n` days of warm-up before the comparison point. Needs at least `2n` prices.
/// The result is independent of price level and zero for a flat series.
pub fn steepness(n: usize, prices_desc: &[f64]) -> Option<f64> {
    if n == 0 || prices_desc.len() < 2 * n {
        return None;
    }

    let window = &prices_desc[..prices_desc.len().min(3 * n)];
    let chronological: Vec<f64> = window.iter().rev().copied().collect();
    let smoothed = ema(&chronological, n);

    let last = chronological.len() - 1;
    let now = smoothed[last]?;
    let before = smoothed[last - n]?;
    if before == 0.0 {
        return None;
    }
    Some((now / before - 1.0) * 100.0)
}

/// Rounds to `places` decimals, passing `None` through.
pub fn round_to(value: Option<f64>, places: i32) -> Option<f64> {
    let factor = 10f64.powi(places);
    value.map(|v| (v * factor).round() / factor)
}
