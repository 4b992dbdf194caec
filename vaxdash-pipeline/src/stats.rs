//! Series statistics: pure functions over daily series.
//!
//! Every function is a pure function: slice in, values out. Windows that are
//! not yet full and undefined results come back as `None` rather than NaN.

/// Trailing mean over `window` values. `None` until the window is full or
/// while any value in it is missing.
pub fn rolling_mean(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    if window == 0 {
        return vec![None; values.len()];
    }
    (0..values.len())
        .map(|i| {
            if i + 1 < window {
                return None;
            }
            let slice = &values[i + 1 - window..=i];
            let sum: Option<f64> = slice.iter().copied().sum();
            sum.map(|s| s / window as f64)
        })
        .collect()
}

/// Day-over-day change in percent. `None` for the first value and wherever
/// the previous value is missing or zero.
pub fn pct_change(values: &[Option<f64>]) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| {
            let prev = i.checked_sub(1).and_then(|p| values[p])?;
            let cur = values[i]?;
            if prev == 0.0 {
                None
            } else {
                Some((cur - prev) / prev * 100.0)
            }
        })
        .collect()
}

/// Pearson correlation coefficient. `None` with fewer than two pairs or when
/// either side has zero variance.
pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    let n = xs.len().min(ys.len());
    if n < 2 {
        return None;
    }
    let (xs, ys) = (&xs[..n], &ys[..n]);
    let mean_x = xs.iter().sum::<f64>() / n as f64;
    let mean_y = ys.iter().sum::<f64>() / n as f64;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    if var_x == 0.0 || var_y == 0.0 {
        return None;
    }
    Some(cov / (var_x.sqrt() * var_y.sqrt()))
}

/// Descending competition rank: the largest value is 1, ties share the
/// lowest rank, and the next distinct value skips accordingly (1, 2, 2, 4).
pub fn rank_descending(values: &[f64]) -> Vec<u32> {
    values
        .iter()
        .map(|v| values.iter().filter(|other| *other > v).count() as u32 + 1)
        .collect()
}

pub fn round_to(x: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (x * factor).round() / factor
}
