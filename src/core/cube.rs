//! Raster cube model
//!
//! [`RasterCube`] is an execution plan: the output grid, the time axis with
//! the scenes contributing to every slice, and one expression per band.
//! Band math and time selection only rewrite the plan. Pixel values exist
//! only in a [`ConcreteCube`], produced by the materializer.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use ndarray::{s, Array4, ArrayView3};
use serde::{Deserialize, Serialize};

use crate::core::index::IndexFormula;
use crate::io::collections::{AssetSpec, CanonicalBand, DataType};
use crate::types::{BoundingBox, Crs, VegError, VegResult};

/// Spatial axis names, regardless of the source CRS
pub const SPATIAL_DIMS: [&str; 2] = ["y", "x"];

/// Fraction of a pixel below which a bbox edge counts as on the boundary
const SNAP_TOLERANCE: f64 = 1e-6;

/// Output pixel grid: north-up, square pixels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridSpec {
    pub crs: Crs,
    /// Left edge of the first column
    pub origin_x: f64,
    /// Top edge of the first row
    pub origin_y: f64,
    pub resolution: f64,
    pub width: usize,
    pub height: usize,
}

impl GridSpec {
    /// Grid covering `bbox`, with edges snapped to multiples of `resolution`
    pub fn from_bbox(bbox: &BoundingBox, crs: Crs, resolution: f64) -> VegResult<Self> {
        if !resolution.is_finite() || resolution <= 0.0 {
            return Err(VegError::InvalidGrid(format!(
                "Resolution must be positive, got {}",
                resolution
            )));
        }
        if bbox.crs != crs {
            return Err(VegError::InvalidGrid(format!(
                "Bounding box is in {} but the target grid is {}",
                bbox.crs, crs
            )));
        }

        // Edges within SNAP_TOLERANCE of a pixel boundary snap onto it
        let left = (bbox.min_x / resolution + SNAP_TOLERANCE).floor() as i64;
        let right = (bbox.max_x / resolution - SNAP_TOLERANCE).ceil() as i64;
        let bottom = (bbox.min_y / resolution + SNAP_TOLERANCE).floor() as i64;
        let top = (bbox.max_y / resolution - SNAP_TOLERANCE).ceil() as i64;

        let width = (right - left).max(0) as usize;
        let height = (top - bottom).max(0) as usize;
        if width == 0 || height == 0 {
            return Err(VegError::InvalidGrid(format!(
                "Bounding box {:?} yields an empty {}x{} grid",
                bbox.to_array(),
                width,
                height
            )));
        }

        Ok(Self {
            crs,
            origin_x: left as f64 * resolution,
            origin_y: top as f64 * resolution,
            resolution,
            width,
            height,
        })
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.height, self.width)
    }

    pub fn n_pixels(&self) -> usize {
        self.width * self.height
    }

    /// CRS coordinates of a pixel centre
    pub fn pixel_center(&self, row: usize, col: usize) -> (f64, f64) {
        (
            self.origin_x + (col as f64 + 0.5) * self.resolution,
            self.origin_y - (row as f64 + 0.5) * self.resolution,
        )
    }

    /// GDAL-style geotransform
    pub fn geo_transform(&self) -> [f64; 6] {
        [self.origin_x, self.resolution, 0.0, self.origin_y, 0.0, -self.resolution]
    }
}

/// One scene contributing to a time slice, with its resolved asset hrefs
#[derive(Debug, Clone, PartialEq)]
pub struct SceneSource {
    pub item_id: String,
    pub collection: String,
    pub datetime: DateTime<Utc>,
    pub asset: AssetSpec,
    pub hrefs: HashMap<CanonicalBand, String>,
}

/// All scenes acquired on one solar day
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSlice {
    pub date: NaiveDate,
    /// Acquisition time of the earliest contributing scene
    pub datetime: DateTime<Utc>,
    /// Ordered by acquisition time; earlier scenes win where both are valid
    pub sources: Vec<SceneSource>,
}

/// How a band's values are obtained
#[derive(Debug, Clone, PartialEq)]
pub enum BandExpr {
    /// Read from the scene assets
    Asset(CanonicalBand),
    /// Computed elementwise from other band expressions
    Index {
        formula: IndexFormula,
        inputs: Vec<BandExpr>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct BandPlan {
    pub name: String,
    pub expr: BandExpr,
    pub data_type: DataType,
    pub unit: String,
}

/// Lazy multi-temporal, multi-band raster cube
#[derive(Debug, Clone, PartialEq)]
pub struct RasterCube {
    pub grid: GridSpec,
    pub slices: Vec<TimeSlice>,
    pub bands: Vec<BandPlan>,
    /// Unreadable assets contribute nodata instead of failing the load
    pub skip_broken: bool,
    /// Demote per-scene warnings to debug output
    pub quiet: bool,
}

impl RasterCube {
    pub fn n_times(&self) -> usize {
        self.slices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.slices.iter().map(|s| s.date).collect()
    }

    pub fn band_names(&self) -> Vec<&str> {
        self.bands.iter().map(|b| b.name.as_str()).collect()
    }

    pub fn band(&self, name: &str) -> Option<&BandPlan> {
        self.bands.iter().find(|b| b.name == name)
    }

    pub fn require_band(&self, name: &str) -> VegResult<&BandPlan> {
        self.band(name)
            .ok_or_else(|| VegError::MissingBand(name.to_string()))
    }

    /// Keep only the time slices at `indices`, preserving their order
    pub fn select_times(&self, indices: &[usize]) -> RasterCube {
        let mut sorted = indices.to_vec();
        sorted.sort_unstable();
        sorted.dedup();

        RasterCube {
            slices: sorted
                .into_iter()
                .filter_map(|i| self.slices.get(i).cloned())
                .collect(),
            ..self.clone()
        }
    }

    pub fn drop_band(mut self, name: &str) -> VegResult<RasterCube> {
        let before = self.bands.len();
        self.bands.retain(|b| b.name != name);
        if self.bands.len() == before {
            return Err(VegError::MissingBand(name.to_string()));
        }
        Ok(self)
    }

    /// Add a band, replacing any existing band of the same name
    pub fn with_band(mut self, band: BandPlan) -> RasterCube {
        match self.bands.iter_mut().find(|b| b.name == band.name) {
            Some(existing) => *existing = band,
            None => self.bands.push(band),
        }
        self
    }

    /// Record that every band is delivered as 32-bit float
    pub fn cast_float32(mut self) -> RasterCube {
        for band in &mut self.bands {
            band.data_type = DataType::Float32;
        }
        self
    }
}

/// Materialized cube, axes (time, band, y, x); missing values are NaN
#[derive(Debug, Clone, PartialEq)]
pub struct ConcreteCube {
    pub grid: GridSpec,
    pub dates: Vec<NaiveDate>,
    pub band_names: Vec<String>,
    pub data: Array4<f32>,
}

impl ConcreteCube {
    pub const DIMS: [&'static str; 4] = ["time", "band", SPATIAL_DIMS[0], SPATIAL_DIMS[1]];

    pub fn n_times(&self) -> usize {
        self.dates.len()
    }

    pub fn band_index(&self, name: &str) -> VegResult<usize> {
        self.band_names
            .iter()
            .position(|b| b == name)
            .ok_or_else(|| VegError::MissingBand(name.to_string()))
    }

    /// Values of one band, axes (time, y, x)
    pub fn band(&self, name: &str) -> VegResult<ArrayView3<'_, f32>> {
        let idx = self.band_index(name)?;
        Ok(self.data.slice(s![.., idx, .., ..]))
    }
}
