//! Materialization of a lazy cube
//!
//! This is the only stage that performs I/O. Every band expression is
//! evaluated per time slice: asset bands are read through the
//! [`AssetReader`], fused across the scenes of the slice and decoded to NaN
//! for nodata; index bands are computed from their evaluated inputs.

use std::collections::HashMap;
use std::time::Instant;

use ndarray::{s, Array2, Array3, Array4, Zip};
use serde::{Deserialize, Serialize};

use crate::core::cube::{BandExpr, ConcreteCube, RasterCube, TimeSlice};
use crate::io::asset_reader::AssetReader;
use crate::io::collections::CanonicalBand;
use crate::types::{VegError, VegResult};

/// How the cube is forced into memory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LoadStrategy {
    /// Whole cube in one operation
    #[default]
    All,
    /// One band at a time, timing each band
    Band,
}

impl LoadStrategy {
    /// Parse a strategy name; unknown names fall back to `All` with a warning
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "all" => LoadStrategy::All,
            "band" => LoadStrategy::Band,
            other => {
                log::warn!("Unknown load strategy '{}', falling back to 'all'", other);
                LoadStrategy::All
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LoadStrategy::All => "all",
            LoadStrategy::Band => "band",
        }
    }
}

impl From<String> for LoadStrategy {
    fn from(name: String) -> Self {
        LoadStrategy::parse(&name)
    }
}

impl From<LoadStrategy> for String {
    fn from(strategy: LoadStrategy) -> Self {
        strategy.as_str().to_string()
    }
}

/// Evaluates cube plans against an asset reader
pub struct Materializer<R: AssetReader> {
    reader: R,
}

impl<R: AssetReader> Materializer<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    pub fn reader(&self) -> &R {
        &self.reader
    }

    /// Force the whole cube into memory. Both strategies give the same values.
    pub fn materialize(&self, cube: &RasterCube, strategy: LoadStrategy) -> VegResult<ConcreteCube> {
        let (height, width) = cube.grid.shape();
        log::info!(
            "Loading cube {:?} = {:?} ({})",
            ConcreteCube::DIMS,
            [cube.n_times(), cube.bands.len(), height, width],
            strategy.as_str()
        );
        let start = Instant::now();

        let mut data = Array4::from_elem((cube.n_times(), cube.bands.len(), height, width), f32::NAN);
        match strategy {
            LoadStrategy::All => {
                let slices = self.load_all(cube)?;
                for (t, bands) in slices.into_iter().enumerate() {
                    for (b, values) in bands.into_iter().enumerate() {
                        data.slice_mut(s![t, b, .., ..]).assign(&values);
                    }
                }
            }
            LoadStrategy::Band => {
                for (b, band) in cube.bands.iter().enumerate() {
                    let band_start = Instant::now();
                    let values = self.materialize_band(cube, &band.name)?;
                    data.slice_mut(s![.., b, .., ..]).assign(&values);
                    log::info!("Loaded band {} in {:.2?}", band.name, band_start.elapsed());
                }
            }
        }

        log::info!("Dataset loaded in {:.2?}", start.elapsed());
        Ok(ConcreteCube {
            grid: cube.grid.clone(),
            dates: cube.dates(),
            band_names: cube.bands.iter().map(|b| b.name.clone()).collect(),
            data,
        })
    }

    /// Force a single band, axes (time, y, x)
    pub fn materialize_band(&self, cube: &RasterCube, name: &str) -> VegResult<Array3<f32>> {
        let band = cube.require_band(name)?;
        let (height, width) = cube.grid.shape();

        let mut values = Array3::from_elem((cube.n_times(), height, width), f32::NAN);
        for (t, slice) in cube.slices.iter().enumerate() {
            let mut cache = HashMap::new();
            let plane = self.eval(cube, slice, &band.expr, &mut cache)?;
            values.slice_mut(s![t, .., ..]).assign(&plane);
        }
        Ok(values)
    }

    #[cfg(feature = "parallel")]
    fn load_all(&self, cube: &RasterCube) -> VegResult<Vec<Vec<Array2<f32>>>> {
        use rayon::prelude::*;

        cube.slices
            .par_iter()
            .map(|slice| self.eval_slice(cube, slice))
            .collect()
    }

    #[cfg(not(feature = "parallel"))]
    fn load_all(&self, cube: &RasterCube) -> VegResult<Vec<Vec<Array2<f32>>>> {
        cube.slices
            .iter()
            .map(|slice| self.eval_slice(cube, slice))
            .collect()
    }

    /// Every band of one slice; asset reads are shared between bands
    fn eval_slice(&self, cube: &RasterCube, slice: &TimeSlice) -> VegResult<Vec<Array2<f32>>> {
        let mut cache = HashMap::new();
        cube.bands
            .iter()
            .map(|band| self.eval(cube, slice, &band.expr, &mut cache))
            .collect()
    }

    fn eval(
        &self,
        cube: &RasterCube,
        slice: &TimeSlice,
        expr: &BandExpr,
        cache: &mut HashMap<CanonicalBand, Array2<f32>>,
    ) -> VegResult<Array2<f32>> {
        match expr {
            BandExpr::Asset(band) => {
                if let Some(values) = cache.get(band) {
                    return Ok(values.clone());
                }
                let values = self.read_fused(cube, slice, *band)?;
                cache.insert(*band, values.clone());
                Ok(values)
            }
            BandExpr::Index { formula, inputs } => {
                let inputs = inputs
                    .iter()
                    .map(|input| self.eval(cube, slice, input, cache))
                    .collect::<VegResult<Vec<_>>>()?;
                formula.apply(&inputs)
            }
        }
    }

    /// Read one band from every scene of the slice; the first valid value wins
    fn read_fused(&self, cube: &RasterCube, slice: &TimeSlice, band: CanonicalBand) -> VegResult<Array2<f32>> {
        let shape = cube.grid.shape();
        let mut fused = Array2::from_elem(shape, f32::NAN);

        for source in &slice.sources {
            let read = match source.hrefs.get(&band) {
                Some(href) => self.reader.read(href, &cube.grid).and_then(|raw| {
                    if raw.dim() == shape {
                        Ok(raw)
                    } else {
                        Err(VegError::AssetRead {
                            href: href.clone(),
                            reason: format!("reader returned {:?}, expected {:?}", raw.dim(), shape),
                        })
                    }
                }),
                None => Err(VegError::AssetRead {
                    href: source.item_id.clone(),
                    reason: format!("no asset for band {}", band),
                }),
            };

            let raw = match read {
                Ok(raw) => raw,
                Err(e) if cube.skip_broken => {
                    if cube.quiet {
                        log::debug!("Skipping {} ({}) for {}: {}", source.item_id, band, slice.date, e);
                    } else {
                        log::warn!("Skipping {} ({}) for {}: {}", source.item_id, band, slice.date, e);
                    }
                    continue;
                }
                Err(e) => return Err(e),
            };

            Zip::from(&mut fused).and(&raw).for_each(|out, &value| {
                if out.is_nan() {
                    *out = source.asset.decode(value);
                }
            });
        }

        Ok(fused)
    }
}
