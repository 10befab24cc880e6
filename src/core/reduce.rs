//! Temporal reduction: one spatial mean per time slice

use ndarray::Axis;

use crate::core::cube::ConcreteCube;
use crate::core::stats::nan_mean;
use crate::types::{TimeSeries, VegError, VegResult};

pub struct TemporalReducer;

impl TemporalReducer {
    /// Reduce a single-band cube
    pub fn reduce(cube: &ConcreteCube) -> VegResult<TimeSeries> {
        match cube.band_names.as_slice() {
            [band] => Self::reduce_band(cube, band),
            names => Err(VegError::InvalidParameter(format!(
                "Temporal reduction needs exactly one band, cube has {:?}",
                names
            ))),
        }
    }

    /// Mean of the finite pixels of `band` in every slice.
    /// A slice with no finite pixel yields a missing value.
    pub fn reduce_band(cube: &ConcreteCube, band: &str) -> VegResult<TimeSeries> {
        let values: Vec<f64> = cube
            .band(band)?
            .axis_iter(Axis(0))
            .map(|slice| nan_mean(slice.iter().map(|&v| v as f64)))
            .collect();

        log::info!("Reduced {} time slice(s) of {}", values.len(), band);
        TimeSeries::from_parts(&cube.dates, &values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cube::GridSpec;
    use crate::types::{BoundingBox, Crs};
    use approx::assert_relative_eq;
    use chrono::NaiveDate;
    use ndarray::Array4;

    fn cube(values: Vec<f32>, n_times: usize, bands: &[&str]) -> ConcreteCube {
        let bbox = BoundingBox::wgs84(0.0, 0.0, 2.0, 2.0).unwrap();
        ConcreteCube {
            grid: GridSpec::from_bbox(&bbox, Crs::WGS84, 1.0).unwrap(),
            dates: (1..=n_times as u32)
                .map(|d| NaiveDate::from_ymd_opt(2020, 1, d).unwrap())
                .collect(),
            band_names: bands.iter().map(|b| b.to_string()).collect(),
            data: Array4::from_shape_vec((n_times, bands.len(), 2, 2), values).unwrap(),
        }
    }

    #[test]
    fn test_mean_of_slice() {
        let series = TemporalReducer::reduce(&cube(vec![1.0, 2.0, 3.0, 4.0], 1, &["veg_idx"])).unwrap();
        assert_eq!(series.len(), 1);
        assert_relative_eq!(series.observations[0].value.unwrap(), 2.5);
    }

    #[test]
    fn test_missing_pixels() {
        let nan = f32::NAN;
        let series =
            TemporalReducer::reduce(&cube(vec![1.0, nan, 3.0, nan, nan, nan, nan, nan], 2, &["veg_idx"])).unwrap();
        assert_relative_eq!(series.observations[0].value.unwrap(), 2.0);
        assert_eq!(series.observations[1].value, None);
    }

    #[test]
    fn test_multi_band_needs_a_name() {
        let cube = cube(vec![1.0; 8], 1, &["red", "nir"]);
        assert!(TemporalReducer::reduce(&cube).is_err());
        let nir = TemporalReducer::reduce_band(&cube, "nir").unwrap();
        assert_relative_eq!(nir.observations[0].value.unwrap(), 1.0);
    }

    #[test]
    fn test_empty_cube() {
        let series = TemporalReducer::reduce(&cube(Vec::new(), 0, &["veg_idx"])).unwrap();
        assert!(series.is_empty());
    }
}
