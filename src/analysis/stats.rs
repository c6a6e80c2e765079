//! Small descriptive statistics shared by the extractors.

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population standard deviation.
pub fn std_dev(values: &[f64]) -> Option<f64> {
    let mean = mean(values)?;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    Some(variance.sqrt())
}

/// `100 - coefficient of variation * 100`; 0 when the mean is not positive.
pub fn stability_percent(values: &[f64]) -> f64 {
    match (mean(values), std_dev(values)) {
        (Some(mean), Some(std)) if mean > 0.0 => 100.0 - std / mean * 100.0,
        _ => 0.0,
    }
}

pub fn min_max(values: &[f64]) -> Option<(f64, f64)> {
    let first = *values.first()?;
    Some(
        values
            .iter()
            .fold((first, first), |(lo, hi), &v| (lo.min(v), hi.max(v))),
    )
}
