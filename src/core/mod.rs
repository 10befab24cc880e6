//! Core cube-processing stages

pub mod cube;
pub mod dataset;
pub mod validity;
pub mod index;
pub mod materialize;
pub mod reduce;
pub mod outliers;
pub mod stats;

// Re-export main types
pub use cube::{GridSpec, RasterCube, TimeSlice, BandPlan, BandExpr, ConcreteCube, SceneSource};
pub use dataset::{DatasetBuilder, BuildParams, solar_date};
pub use validity::{ValidityFilter, ValidityParams, valid_fractions};
pub use index::{IndexCalculator, IndexFormula, INDEX_FORMULAS, INDEX_BAND};
pub use materialize::{Materializer, LoadStrategy};
pub use reduce::TemporalReducer;
pub use outliers::{OutlierRemover, rolling_window_size};
