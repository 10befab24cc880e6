//! Run configuration: remote data access and pipeline defaults

use crate::core::materialize::LoadStrategy;
use crate::types::{Crs, VegResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Remote catalog and storage access settings.
///
/// Constructed once per process and handed to the catalog client and the
/// asset reader; nothing reads it from global state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteAccessConfig {
    /// STAC API root
    pub stac_endpoint: String,
    /// S3 endpoint hosting the assets
    pub s3_endpoint: String,
    /// Access the bucket without request signing
    pub aws_unsigned: bool,
    pub request_timeout_secs: u64,
    /// Items requested per catalog page
    pub page_limit: u32,
}

impl Default for RemoteAccessConfig {
    fn default() -> Self {
        Self {
            stac_endpoint: "https://explorer.sandbox.dea.ga.gov.au/stac/".to_string(),
            s3_endpoint: "s3.ap-southeast-2.amazonaws.com".to_string(),
            aws_unsigned: true,
            request_timeout_secs: 60,
            page_limit: 250,
        }
    }
}

impl RemoteAccessConfig {
    /// URL of the item search endpoint
    pub fn search_url(&self) -> String {
        let base = self.stac_endpoint.trim_end_matches('/');
        if base.ends_with("/search") {
            base.to_string()
        } else {
            format!("{}/search", base)
        }
    }
}

/// Defaults for one end-to-end monitoring run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub collections: Vec<String>,
    pub crs: Crs,
    /// Pixel size in CRS units (degrees for EPSG:4326)
    pub resolution: f64,
    pub mask_band: String,
    /// Quality-mask codes counted as valid (fmask: clear, water, snow)
    pub valid_codes: Vec<u16>,
    pub min_valid_fraction: f64,
    pub drop_mask: bool,
    pub index: String,
    pub drop_bands: bool,
    pub load_strategy: LoadStrategy,
    pub outlier_factor: f64,
    pub ignore_warnings: bool,
    pub skip_broken: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            collections: vec![
                "ga_ls5t_ard_3".to_string(),
                "ga_ls7e_ard_3".to_string(),
                "ga_ls8c_ard_3".to_string(),
            ],
            crs: Crs::WGS84,
            resolution: 10.0 / 111_000.0, // ~10 m at the equator
            mask_band: "mask".to_string(),
            valid_codes: vec![1, 4, 5],
            min_valid_fraction: 1.0,
            drop_mask: true,
            index: "ndvi".to_string(),
            drop_bands: true,
            load_strategy: LoadStrategy::All,
            outlier_factor: 2.0,
            ignore_warnings: true,
            skip_broken: true,
        }
    }
}

impl PipelineConfig {
    /// Load a configuration from JSON; absent fields keep their defaults
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> VegResult<Self> {
        log::info!("Loading pipeline configuration: {}", path.as_ref().display());
        let content = std::fs::read_to_string(&path)?;
        Self::from_json_str(&content)
    }

    pub fn from_json_str(content: &str) -> VegResult<Self> {
        let config: PipelineConfig = serde_json::from_str(content)?;
        log::debug!("Pipeline configuration: {:?}", config);
        Ok(config)
    }
}
