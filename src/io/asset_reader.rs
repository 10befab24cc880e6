//! Pixel access for scene assets
//!
//! An [`AssetReader`] resamples one asset onto the output grid and returns
//! its raw (still encoded) samples. Decoding nodata and fusing scenes is the
//! materializer's job.

use std::collections::HashMap;

use ndarray::Array2;

use crate::core::cube::GridSpec;
use crate::types::{VegError, VegResult};

pub trait AssetReader: Send + Sync {
    /// Raw samples of `href` on `grid`, shape (height, width).
    /// Pixels outside the asset's footprint are NaN.
    fn read(&self, href: &str, grid: &GridSpec) -> VegResult<Array2<f64>>;
}

/// Reader serving pre-loaded arrays, keyed by href
#[derive(Debug, Clone, Default)]
pub struct MemoryAssetReader {
    assets: HashMap<String, Array2<f64>>,
}

impl MemoryAssetReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, href: impl Into<String>, data: Array2<f64>) {
        self.assets.insert(href.into(), data);
    }

    pub fn with_asset(mut self, href: impl Into<String>, data: Array2<f64>) -> Self {
        self.insert(href, data);
        self
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

impl AssetReader for MemoryAssetReader {
    fn read(&self, href: &str, grid: &GridSpec) -> VegResult<Array2<f64>> {
        let data = self.assets.get(href).ok_or_else(|| VegError::AssetRead {
            href: href.to_string(),
            reason: "asset not found".to_string(),
        })?;

        if data.dim() != grid.shape() {
            return Err(VegError::AssetRead {
                href: href.to_string(),
                reason: format!("shape {:?} does not match grid {:?}", data.dim(), grid.shape()),
            });
        }

        Ok(data.clone())
    }
}

#[cfg(feature = "gdal")]
pub use self::gdal_reader::GdalAssetReader;

#[cfg(feature = "gdal")]
mod gdal_reader {
    use super::*;
    use crate::config::RemoteAccessConfig;
    use gdal::spatial_ref::{CoordTransform, SpatialRef};
    use gdal::Dataset;

    /// Reads cloud-optimised GeoTIFFs over HTTP/S3 with GDAL, resampling
    /// onto the output grid by nearest neighbour
    pub struct GdalAssetReader {
        config: RemoteAccessConfig,
    }

    impl GdalAssetReader {
        pub fn new(config: RemoteAccessConfig) -> Self {
            Self { config }
        }

        /// GDAL virtual path for an asset href
        pub fn vsi_path(href: &str) -> String {
            if let Some(rest) = href.strip_prefix("s3://") {
                format!("/vsis3/{}", rest)
            } else if href.starts_with("http://") || href.starts_with("https://") {
                format!("/vsicurl/{}", href)
            } else {
                href.to_string()
            }
        }

        /// Access options are thread-local so concurrent runs can differ
        fn apply_access_options(&self) -> VegResult<()> {
            gdal::config::set_thread_local_config_option("AWS_S3_ENDPOINT", &self.config.s3_endpoint)?;
            gdal::config::set_thread_local_config_option(
                "AWS_NO_SIGN_REQUEST",
                if self.config.aws_unsigned { "YES" } else { "NO" },
            )?;
            gdal::config::set_thread_local_config_option("GDAL_DISABLE_READDIR_ON_OPEN", "EMPTY_DIR")?;
            Ok(())
        }

        fn traditional_order(epsg: u32) -> VegResult<SpatialRef> {
            let srs = SpatialRef::from_epsg(epsg)?;
            srs.set_axis_mapping_strategy(
                gdal_sys::OSRAxisMappingStrategy::OAMS_TRADITIONAL_GIS_ORDER,
            );
            Ok(srs)
        }
    }

    impl AssetReader for GdalAssetReader {
        fn read(&self, href: &str, grid: &GridSpec) -> VegResult<Array2<f64>> {
            self.apply_access_options()?;

            let path = Self::vsi_path(href);
            log::debug!("Opening asset: {}", path);
            let dataset = Dataset::open(&path)?;
            let gt = dataset.geo_transform()?;
            let (src_width, src_height) = dataset.raster_size();

            // Output pixel centres in source coordinates
            let (height, width) = grid.shape();
            let mut xs = Vec::with_capacity(height * width);
            let mut ys = Vec::with_capacity(height * width);
            for row in 0..height {
                for col in 0..width {
                    let (x, y) = grid.pixel_center(row, col);
                    xs.push(x);
                    ys.push(y);
                }
            }
            let mut zs = vec![0.0; xs.len()];

            let src_srs = dataset.spatial_ref()?;
            src_srs.set_axis_mapping_strategy(
                gdal_sys::OSRAxisMappingStrategy::OAMS_TRADITIONAL_GIS_ORDER,
            );
            let dst_srs = Self::traditional_order(grid.crs.epsg)?;
            let transform = CoordTransform::new(&dst_srs, &src_srs)?;
            transform.transform_coords(&mut xs, &mut ys, &mut zs)?;

            // Source pixel indices of every output pixel
            let indices: Vec<Option<(usize, usize)>> = xs
                .iter()
                .zip(ys.iter())
                .map(|(&x, &y)| {
                    let col = ((x - gt[0]) / gt[1]).floor();
                    let row = ((y - gt[3]) / gt[5]).floor();
                    if col >= 0.0 && row >= 0.0 && (col as usize) < src_width && (row as usize) < src_height {
                        Some((row as usize, col as usize))
                    } else {
                        None
                    }
                })
                .collect();

            let mut output = Array2::from_elem((height, width), f64::NAN);
            let covered: Vec<(usize, usize)> = indices.iter().flatten().copied().collect();
            if covered.is_empty() {
                return Ok(output);
            }

            // Read only the source window that the grid touches
            let min_row = covered.iter().map(|p| p.0).min().unwrap_or(0);
            let max_row = covered.iter().map(|p| p.0).max().unwrap_or(0);
            let min_col = covered.iter().map(|p| p.1).min().unwrap_or(0);
            let max_col = covered.iter().map(|p| p.1).max().unwrap_or(0);
            let win_w = max_col - min_col + 1;
            let win_h = max_row - min_row + 1;

            let band = dataset.rasterband(1)?;
            let buffer = band.read_as::<f64>(
                (min_col as isize, min_row as isize),
                (win_w, win_h),
                (win_w, win_h),
                None,
            )?;

            for (i, idx) in indices.iter().enumerate() {
                if let Some((r, c)) = idx {
                    let value = buffer.data[(r - min_row) * win_w + (c - min_col)];
                    output[[i / width, i % width]] = value;
                }
            }

            Ok(output)
        }
    }
}
