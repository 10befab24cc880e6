//! I/O modules: scene catalog, collection tables and asset access

pub mod collections;
pub mod stac;
pub mod asset_reader;

pub use collections::{CanonicalBand, CollectionSpec, COLLECTIONS, find_collection};
pub use stac::{SceneCatalog, StacCatalog, CatalogQuery};
pub use asset_reader::{AssetReader, MemoryAssetReader};
#[cfg(feature = "gdal")]
pub use asset_reader::GdalAssetReader;
