//! NaN-aware statistics shared by the reducer and the outlier remover

use num_traits::Float;

/// Mean of the finite values; NaN when there are none
pub fn nan_mean<T: Float>(values: impl IntoIterator<Item = T>) -> T {
    let mut sum = 0.0f64;
    let mut count = 0usize;
    for v in values {
        if v.is_finite() {
            sum += v.to_f64().unwrap_or(0.0);
            count += 1;
        }
    }

    if count == 0 {
        T::nan()
    } else {
        T::from(sum / count as f64).unwrap_or_else(T::nan)
    }
}

/// Population standard deviation of the finite values (two-pass)
pub fn nan_std<T: Float>(values: &[T]) -> T {
    let finite: Vec<f64> = values
        .iter()
        .filter(|v| v.is_finite())
        .filter_map(|v| v.to_f64())
        .collect();

    if finite.is_empty() {
        return T::nan();
    }

    let n = finite.len() as f64;
    let mean = finite.iter().sum::<f64>() / n;
    let variance = finite.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
    T::from(variance.sqrt()).unwrap_or_else(T::nan)
}

/// Median of a window; NaN if any value is missing
pub fn strict_median<T: Float>(window: &[T]) -> T {
    if window.is_empty() || window.iter().any(|v| v.is_nan()) {
        return T::nan();
    }

    let mut sorted = window.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        sorted[mid]
    } else {
        (sorted[mid - 1] + sorted[mid]) / (T::one() + T::one())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_nan_mean() {
        assert_relative_eq!(nan_mean(vec![1.0f32, 2.0, 3.0, 4.0]), 2.5);
        assert_relative_eq!(nan_mean(vec![1.0f64, f64::NAN, 3.0]), 2.0);
        assert!(nan_mean(vec![f32::NAN, f32::NAN]).is_nan());
        assert!(nan_mean(Vec::<f64>::new()).is_nan());
    }

    #[test]
    fn test_nan_std_is_population() {
        assert_relative_eq!(nan_std(&[1.0f64, 2.0, 1.0, 2.0]), 0.5);
        assert_relative_eq!(nan_std(&[2.0f64, f64::NAN, 4.0]), 1.0);
        assert!(nan_std::<f64>(&[]).is_nan());
    }

    #[test]
    fn test_strict_median() {
        assert_eq!(strict_median(&[2.0f64, 50.0, 1.0]), 2.0);
        assert_eq!(strict_median(&[4.0f64, 1.0, 3.0, 2.0]), 2.5);
        assert!(strict_median(&[1.0f64, f64::NAN, 3.0]).is_nan());
    }
}
