//! Spectral index calculation on the lazy cube
//!
//! Formulas are plain data: an identifier, the canonical input bands and an
//! elementwise function. New indices are added to [`INDEX_FORMULAS`] (or
//! passed to [`IndexCalculator::with_formulas`]) without touching any other
//! stage.

use ndarray::{Array2, Zip};

use crate::core::cube::{BandExpr, BandPlan, RasterCube};
use crate::io::collections::{CanonicalBand, DataType};
use crate::types::{VegError, VegResult};

/// Name of the band holding the computed index
pub const INDEX_BAND: &str = "veg_idx";

/// Elementwise index definition
#[derive(Debug, Clone, Copy)]
pub struct IndexFormula {
    pub id: &'static str,
    pub inputs: &'static [CanonicalBand],
    /// Receives one value per input band, in `inputs` order
    pub compute: fn(&[f32]) -> f32,
}

impl PartialEq for IndexFormula {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.inputs == other.inputs
    }
}

impl IndexFormula {
    /// Evaluate over co-registered input arrays. Non-finite results are NaN.
    pub fn apply(&self, inputs: &[Array2<f32>]) -> VegResult<Array2<f32>> {
        if inputs.len() != self.inputs.len() {
            return Err(VegError::InvalidParameter(format!(
                "{} expects {} input band(s), got {}",
                self.id,
                self.inputs.len(),
                inputs.len()
            )));
        }
        let shape = inputs.first().map(|a| a.dim()).unwrap_or((0, 0));
        if inputs.iter().any(|a| a.dim() != shape) {
            return Err(VegError::InvalidParameter(format!(
                "{} inputs differ in shape",
                self.id
            )));
        }

        if let [a, b] = inputs {
            return Ok(combine2(a, b, self.compute));
        }

        let mut output = Array2::from_elem(shape, f32::NAN);
        let mut sample = vec![0.0f32; inputs.len()];
        for ((row, col), out) in output.indexed_iter_mut() {
            for (k, band) in inputs.iter().enumerate() {
                sample[k] = band[[row, col]];
            }
            let value = (self.compute)(&sample);
            *out = if value.is_finite() { value } else { f32::NAN };
        }

        Ok(output)
    }
}

/// Normalized difference of the first two inputs: (a - b) / (a + b)
pub fn normalized_difference(values: &[f32]) -> f32 {
    let (a, b) = (values[0], values[1]);
    (a - b) / (a + b)
}

/// Registered index formulas
pub static INDEX_FORMULAS: &[IndexFormula] = &[IndexFormula {
    id: "ndvi",
    inputs: &[CanonicalBand::Nir, CanonicalBand::Red],
    compute: normalized_difference,
}];

/// Adds an index band to a cube
pub struct IndexCalculator {
    formulas: &'static [IndexFormula],
}

impl Default for IndexCalculator {
    fn default() -> Self {
        Self::new()
    }
}

impl IndexCalculator {
    pub fn new() -> Self {
        Self {
            formulas: INDEX_FORMULAS,
        }
    }

    pub fn with_formulas(formulas: &'static [IndexFormula]) -> Self {
        Self { formulas }
    }

    /// Find a formula by identifier (case-insensitive)
    pub fn formula(&self, id: &str) -> VegResult<&IndexFormula> {
        self.formulas
            .iter()
            .find(|f| f.id.eq_ignore_ascii_case(id))
            .ok_or_else(|| VegError::UnsupportedIndex(id.to_string()))
    }

    /// Plan the index band; optionally drop every other band.
    ///
    /// The returned cube is delivered as 32-bit float throughout.
    pub fn apply(&self, cube: RasterCube, index: &str, drop_bands: bool) -> VegResult<RasterCube> {
        let formula = *self.formula(index)?;
        log::info!("Calculating index: {}", formula.id);

        let inputs = formula
            .inputs
            .iter()
            .map(|band| cube.require_band(band.name()).map(|plan| plan.expr.clone()))
            .collect::<VegResult<Vec<_>>>()?;

        let plan = BandPlan {
            name: INDEX_BAND.to_string(),
            expr: BandExpr::Index { formula, inputs },
            data_type: DataType::Float32,
            unit: "1".to_string(),
        };

        let mut cube = cube.with_band(plan);
        if drop_bands {
            cube.bands.retain(|b| b.name == INDEX_BAND);
        }

        log::info!("Index was calculated (bands: {:?})", cube.band_names());
        Ok(cube.cast_float32())
    }
}

/// Elementwise combination of two equally shaped arrays
pub fn combine2(a: &Array2<f32>, b: &Array2<f32>, f: fn(&[f32]) -> f32) -> Array2<f32> {
    let mut output = Array2::from_elem(a.dim(), f32::NAN);
    Zip::from(&mut output).and(a).and(b).for_each(|o, &x, &y| {
        let v = f(&[x, y]);
        *o = if v.is_finite() { v } else { f32::NAN };
    });
    output
}
