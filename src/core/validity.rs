//! Scene validity filter
//!
//! Drops whole time slices whose quality mask has too few valid pixels.
//! Only the mask band is materialized.

use ndarray::{ArrayView3, Axis};

use crate::core::cube::RasterCube;
use crate::core::materialize::Materializer;
use crate::io::asset_reader::AssetReader;
use crate::types::{VegError, VegResult};

#[derive(Debug, Clone, PartialEq)]
pub struct ValidityParams {
    pub mask_band: String,
    /// Mask codes counted as valid
    pub valid_codes: Vec<u16>,
    /// Minimum valid fraction in [0, 1]; a slice is kept at or above it
    pub min_fraction: f64,
    pub drop_mask: bool,
}

impl Default for ValidityParams {
    fn default() -> Self {
        Self {
            mask_band: "mask".to_string(),
            valid_codes: vec![1, 4, 5],
            min_fraction: 1.0,
            drop_mask: true,
        }
    }
}

/// Fraction of pixels per time slice carrying a valid code.
/// NaN (missing) pixels are invalid; a zero-pixel grid yields NaN.
pub fn valid_fractions(mask: ArrayView3<'_, f32>, valid_codes: &[u16]) -> Vec<f64> {
    let codes: Vec<f32> = valid_codes.iter().map(|&c| c as f32).collect();

    mask.axis_iter(Axis(0))
        .map(|slice| {
            let total = slice.len();
            if total == 0 {
                return f64::NAN;
            }
            let valid = slice.iter().filter(|v| codes.contains(v)).count();
            valid as f64 / total as f64
        })
        .collect()
}

pub struct ValidityFilter {
    params: ValidityParams,
}

impl ValidityFilter {
    pub fn new(params: ValidityParams) -> VegResult<Self> {
        if !(0.0..=1.0).contains(&params.min_fraction) {
            return Err(VegError::InvalidParameter(format!(
                "Minimum valid fraction must lie in [0, 1], got {}",
                params.min_fraction
            )));
        }
        Ok(Self { params })
    }

    pub fn params(&self) -> &ValidityParams {
        &self.params
    }

    /// Indices of the slices whose fraction reaches the threshold
    pub fn retained(&self, fractions: &[f64]) -> Vec<usize> {
        fractions
            .iter()
            .enumerate()
            .filter(|(_, &f)| f >= self.params.min_fraction)
            .map(|(i, _)| i)
            .collect()
    }

    /// Remove slices below the threshold, keeping the order of the rest
    pub fn apply<R: AssetReader>(&self, cube: RasterCube, materializer: &Materializer<R>) -> VegResult<RasterCube> {
        log::info!(
            "Removing invalid scenes (mask: {}, min valid fraction: {})",
            self.params.mask_band,
            self.params.min_fraction
        );

        let mask = materializer.materialize_band(&cube, &self.params.mask_band)?;
        let fractions = valid_fractions(mask.view(), &self.params.valid_codes);
        for (slice, fraction) in cube.slices.iter().zip(fractions.iter()) {
            log::debug!("{}: {:.1}% valid", slice.date, fraction * 100.0);
        }

        let keep = self.retained(&fractions);
        let mut filtered = cube.select_times(&keep);
        if self.params.drop_mask {
            filtered = filtered.drop_band(&self.params.mask_band)?;
        }

        log::info!("Retained {} of {} scenes", filtered.n_times(), cube.n_times());
        Ok(filtered)
    }
}
