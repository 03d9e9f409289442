use itertools::Itertools;

pub(crate) const NUMERICAL_EPSILON: f64 = 1e-3;

/// Mean of a nonempty slice.
pub(crate) fn mean(values: &[f64]) -> f64 {
    assert!(!values.is_empty(), "bug: mean of empty slice");
    values.iter().sum::<f64>() / values.len() as f64
}

/// Empirical quantile by nearest-rank on an already sorted slice.
pub(crate) fn percentile(sorted: &[f64], q: f64) -> f64 {
    assert!(!sorted.is_empty(), "bug: percentile of empty slice");
    assert!((0.0..=1.0).contains(&q), "bug: quantile out of range");
    let idx = ((sorted.len() - 1) as f64 * q).round() as usize;
    sorted[idx]
}

/// Sort a sample of draws and summarize it as (mean, 2.5%, 97.5%).
pub(crate) fn summarize_draws(draws: &[f64]) -> (f64, f64, f64) {
    let sorted = draws
        .iter()
        .cloned()
        .sorted_by(|a, b| a.partial_cmp(b).expect("bug: NaN draw"))
        .collect_vec();
    (
        mean(&sorted),
        percentile(&sorted, 0.025),
        percentile(&sorted, 0.975),
    )
}
