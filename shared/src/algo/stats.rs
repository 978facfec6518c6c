//! Robust statistics used for sky estimation and thresholding.

/// Scale factor from median absolute deviation to Gaussian sigma.
pub const MAD_TO_SIGMA: f64 = 1.4826;

/// Calculate the median of a slice, ignoring NaN values
///
/// # Arguments
///
/// * `values` - Slice of f64 values to compute median from
///
/// # Returns
///
/// * `Ok(median)` - The median value
/// * `Err(message)` - If no valid values remain after filtering NaN
pub fn median(values: &[f64]) -> Result<f64, String> {
    let mut valid_values: Vec<f64> = values.iter().filter(|v| !v.is_nan()).copied().collect();

    if valid_values.is_empty() {
        return Err(format!(
            "Insufficient data points to compute median: {} total values, 0 valid (all NaN)",
            values.len()
        ));
    }

    valid_values.sort_by(|a, b| a.total_cmp(b));

    let median_value = if valid_values.len() % 2 == 0 {
        let mid = valid_values.len() / 2;
        (valid_values[mid - 1] + valid_values[mid]) / 2.0
    } else {
        valid_values[valid_values.len() / 2]
    };

    Ok(median_value)
}

/// Median ignoring NaN, or NaN when nothing finite is left.
pub fn nan_median(values: &[f64]) -> f64 {
    median(values).unwrap_or(f64::NAN)
}

/// Median absolute deviation about the median.
///
/// Returns `(median, mad)`.
pub fn median_absolute_deviation(values: &[f64]) -> Result<(f64, f64), String> {
    let center = median(values)?;
    let deviations: Vec<f64> = values
        .iter()
        .filter(|v| !v.is_nan())
        .map(|v| (v - center).abs())
        .collect();
    let mad = median(&deviations)?;
    Ok((center, mad))
}
