//! vegwatch: Vegetation Monitoring from Analysis-Ready Satellite Imagery
//!
//! Given an area and a date range, this library discovers Landsat/Sentinel-2
//! scenes in a STAC catalog, plans a multi-temporal raster cube, drops
//! cloud-contaminated scenes, computes a vegetation index, reduces each
//! scene to its spatial mean and removes spikes from the resulting series.

pub mod types;
pub mod config;
pub mod io;
pub mod core;
pub mod pipeline;

// Re-export main types and functions for easier access
pub use types::{
    BoundingBox, Crs, DateRange, SceneItem, Observation, TimeSeries, VegError, VegResult,
    DATE_FORMAT, parse_date,
};

pub use config::{PipelineConfig, RemoteAccessConfig};
pub use io::{AssetReader, MemoryAssetReader, SceneCatalog, StacCatalog, CatalogQuery};
#[cfg(feature = "gdal")]
pub use io::GdalAssetReader;
pub use self::core::{
    DatasetBuilder, ValidityFilter, IndexCalculator, Materializer, LoadStrategy,
    TemporalReducer, OutlierRemover,
};
pub use pipeline::Pipeline;
