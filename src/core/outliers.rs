//! Rolling-median spike removal along the time axis
//!
//! A value is a candidate when it departs from the centred rolling median by
//! more than `factor` standard deviations of its series. Candidates are only
//! confirmed when they also fall outside their immediate neighbours:
//! below `mean(left, right) - cutoff` or above `max(left, right) + cutoff`.
//! Confirmed values become missing; the time axis itself is never changed.
//!
//! The cutoff is recomputed from whatever is present, so removing a large
//! spike shrinks it. A second pass is a no-op only when every remaining
//! value also passes the tighter cutoff; smaller spikes masked by a larger
//! one are caught on the next pass.

use chrono::{Datelike, NaiveDate};
use ndarray::s;

use crate::core::cube::ConcreteCube;
use crate::core::stats::{nan_std, strict_median};
use crate::types::{TimeSeries, VegError, VegResult};

/// Centred rolling window for a series of `n_times` steps spanning
/// `n_years` calendar years. Always odd and at least 3.
pub fn rolling_window_size(n_times: usize, n_years: usize) -> usize {
    let window = (n_times / 7) / n_years.max(1);
    if window < 3 {
        3
    } else if window % 2 == 0 {
        window + 1
    } else {
        window
    }
}

/// Number of calendar years between the first and last date, inclusive
pub fn years_spanned(dates: &[NaiveDate]) -> usize {
    match (dates.first(), dates.last()) {
        (Some(first), Some(last)) => (last.year() - first.year()).unsigned_abs() as usize + 1,
        _ => 0,
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutlierRemover {
    factor: f64,
}

impl OutlierRemover {
    /// `factor` scales the per-series standard deviation into the cutoff
    pub fn new(factor: f64) -> VegResult<Self> {
        if !factor.is_finite() || factor <= 0.0 {
            return Err(VegError::InvalidParameter(format!(
                "Outlier factor must be positive, got {}",
                factor
            )));
        }
        Ok(Self { factor })
    }

    pub fn factor(&self) -> f64 {
        self.factor
    }

    pub fn window_for(&self, dates: &[NaiveDate]) -> usize {
        let n_years = years_spanned(dates);
        let window = rolling_window_size(dates.len(), n_years);
        log::debug!(
            "Rolling window of {} for {} steps over {} year(s)",
            window,
            dates.len(),
            n_years
        );
        window
    }

    /// Remove spikes from a reduced time series
    pub fn apply_series(&self, series: &TimeSeries) -> VegResult<TimeSeries> {
        log::info!("Removing outliers (factor: {})", self.factor);
        if series.is_empty() {
            return Ok(series.clone());
        }

        let dates = series.dates();
        let window = self.window_for(&dates);
        let cleaned = self.despike(&series.values_nan(), window);

        let result = TimeSeries::from_parts(&dates, &cleaned)?;
        log::info!(
            "Nulled {} outlier(s) with window {}",
            series.valid_count() - result.valid_count(),
            window
        );
        Ok(result)
    }

    /// Remove spikes from every pixel's time series of one band
    pub fn apply_cube(&self, cube: &ConcreteCube, band: &str) -> VegResult<ConcreteCube> {
        log::info!("Removing per-pixel outliers from {} (factor: {})", band, self.factor);
        let b = cube.band_index(band)?;
        let values = cube.band(band)?;
        let (_, height, width) = values.dim();
        let window = self.window_for(&cube.dates);

        let pixels: Vec<(usize, usize)> = (0..height)
            .flat_map(|r| (0..width).map(move |c| (r, c)))
            .collect();

        let despike_pixel = |&(r, c): &(usize, usize)| {
            let series: Vec<f64> = values.slice(s![.., r, c]).iter().map(|&v| v as f64).collect();
            self.despike(&series, window)
        };

        #[cfg(feature = "parallel")]
        let cleaned: Vec<Vec<f64>> = {
            use rayon::prelude::*;
            pixels.par_iter().map(despike_pixel).collect()
        };
        #[cfg(not(feature = "parallel"))]
        let cleaned: Vec<Vec<f64>> = pixels.iter().map(despike_pixel).collect();

        let mut data = cube.data.clone();
        for (&(r, c), series) in pixels.iter().zip(cleaned.iter()) {
            for (t, &v) in series.iter().enumerate() {
                data[[t, b, r, c]] = v as f32;
            }
        }

        Ok(ConcreteCube {
            data,
            ..cube.clone()
        })
    }

    /// Core detector over one series; NaN marks missing values
    pub fn despike(&self, values: &[f64], window: usize) -> Vec<f64> {
        let n = values.len();
        let cutoff = nan_std(values) * self.factor;
        if !cutoff.is_finite() {
            return values.to_vec();
        }

        // Centred rolling median, full windows only
        let half = window / 2;
        let mut median = vec![f64::NAN; n];
        if n >= window {
            for i in half..n - half {
                median[i] = strict_median(&values[i - half..=i + half]);
            }
        }

        // Restore values lost only to the window edges
        for (m, &v) in median.iter_mut().zip(values) {
            if m.is_nan() && !v.is_nan() {
                *m = v;
            }
        }

        let candidate: Vec<bool> = values
            .iter()
            .zip(&median)
            .map(|(v, m)| (v - m).abs() > cutoff)
            .collect();

        let mut output = values.to_vec();
        for i in (0..n).filter(|&i| candidate[i]) {
            let left = if i > 0 { values[i - 1] } else { f64::NAN };
            let right = values.get(i + 1).copied().unwrap_or(f64::NAN);
            let mean = (left + right) / 2.0;
            let max = left.max(right);

            let v = values[i];
            if v < mean - cutoff || v > max + cutoff {
                output[i] = f64::NAN;
            }
        }

        output
    }
}
