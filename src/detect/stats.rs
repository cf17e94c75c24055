/// Linearly interpolated percentile (`q` in 0..=1) over the finite values.
pub fn percentile(values: &[f64], q: f64) -> Option<f64> {
    let mut sorted = values
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .collect::<Vec<_>>();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(|a, b| a.total_cmp(b));
    let pos = (sorted.len() - 1) as f64 * q.clamp(0.0, 1.0);
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let lower = sorted[lo];
    let upper = sorted[hi];
    Some(lower + (upper - lower) * (pos - lo as f64))
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population standard deviation.
pub fn std_dev(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    Some(variance.sqrt())
}

/// Standard scores over the whole series, or `None` when the series has fewer than
/// two distinct values and the score is undefined.
pub fn z_scores(values: &[f64]) -> Option<Vec<f64>> {
    let first = *values.first()?;
    if values.iter().all(|v| *v == first) {
        return None;
    }
    let m = mean(values)?;
    let sd = std_dev(values)?;
    if !sd.is_finite() || sd <= 0.0 {
        return None;
    }
    Some(values.iter().map(|v| (v - m) / sd).collect())
}
