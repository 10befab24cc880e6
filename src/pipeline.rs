//! End-to-end vegetation monitoring run
//!
//! Query → build → validity filter → index → materialize → reduce →
//! outlier removal. Everything before materialization only plans; the
//! validity filter reads the mask band and the materializer reads the rest.

use crate::config::PipelineConfig;
use crate::core::dataset::{BuildParams, DatasetBuilder};
use crate::core::index::{IndexCalculator, INDEX_BAND};
use crate::core::materialize::Materializer;
use crate::core::outliers::OutlierRemover;
use crate::core::reduce::TemporalReducer;
use crate::core::validity::{ValidityFilter, ValidityParams};
use crate::io::asset_reader::AssetReader;
use crate::io::stac::{CatalogQuery, SceneCatalog};
use crate::types::{BoundingBox, DateRange, TimeSeries, VegResult};

pub struct Pipeline<C: SceneCatalog, R: AssetReader> {
    query: CatalogQuery<C>,
    materializer: Materializer<R>,
    config: PipelineConfig,
}

impl<C: SceneCatalog, R: AssetReader> Pipeline<C, R> {
    pub fn new(query: CatalogQuery<C>, materializer: Materializer<R>, config: PipelineConfig) -> Self {
        Self {
            query,
            materializer,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Vegetation index time series over `bbox` for `dates`.
    ///
    /// Configuration errors are raised before any catalog request. Zero
    /// scenes, or zero scenes passing the validity filter, give an empty
    /// series rather than an error.
    #[allow(clippy::too_many_arguments)]
    pub fn run(
        &self,
        collections: &[&str],
        dates: &DateRange,
        bbox: &BoundingBox,
        resolution: f64,
        valid_fraction_min: f64,
        index_name: &str,
        user_factor: f64,
    ) -> VegResult<TimeSeries> {
        let remover = OutlierRemover::new(user_factor)?;
        let calculator = IndexCalculator::new();
        calculator.formula(index_name)?;
        let validity = ValidityFilter::new(ValidityParams {
            mask_band: self.config.mask_band.clone(),
            valid_codes: self.config.valid_codes.clone(),
            min_fraction: valid_fraction_min,
            drop_mask: self.config.drop_mask,
        })?;

        log::info!("Monitoring {:?} for {}", bbox.to_array(), dates);
        let items = self.query.run(collections, dates, bbox)?;
        if items.is_empty() {
            log::warn!("No scenes found for {}", dates);
            return Ok(TimeSeries::default());
        }

        let builder = DatasetBuilder::new(BuildParams {
            crs: self.config.crs,
            resolution,
            like: None,
            ignore_warnings: self.config.ignore_warnings,
            skip_broken: self.config.skip_broken,
        });
        let cube = builder.build(&items, bbox)?;
        let cube = validity.apply(cube, &self.materializer)?;
        if cube.is_empty() {
            log::warn!("No scenes passed the validity filter");
        }

        let cube = calculator.apply(cube, index_name, self.config.drop_bands)?;
        let concrete = self.materializer.materialize(&cube, self.config.load_strategy)?;
        let series = TemporalReducer::reduce_band(&concrete, INDEX_BAND)?;

        remover.apply_series(&series)
    }

    /// [`run`](Self::run) with the collections and thresholds of the configuration
    pub fn run_with_defaults(&self, dates: &DateRange, bbox: &BoundingBox) -> VegResult<TimeSeries> {
        let collections: Vec<&str> = self.config.collections.iter().map(String::as_str).collect();
        self.run(
            &collections,
            dates,
            bbox,
            self.config.resolution,
            self.config.min_valid_fraction,
            &self.config.index,
            self.config.outlier_factor,
        )
    }
}

#[cfg(feature = "gdal")]
impl Pipeline<crate::io::stac::StacCatalog, crate::io::asset_reader::GdalAssetReader> {
    /// Pipeline against the remote STAC catalog and cloud-hosted assets
    pub fn remote(remote: &crate::config::RemoteAccessConfig, config: PipelineConfig) -> VegResult<Self> {
        let catalog = crate::io::stac::StacCatalog::new(remote)?;
        let reader = crate::io::asset_reader::GdalAssetReader::new(remote.clone());
        Ok(Self::new(
            CatalogQuery::new(catalog, remote.page_limit),
            Materializer::new(reader),
            config,
        ))
    }
}
