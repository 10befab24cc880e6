use std::collections::HashMap;

use approx::assert_relative_eq;
use chrono::{Duration, NaiveDate};
use ndarray::Array2;
use vegwatch::types::AssetRef;
use vegwatch::{
    BoundingBox, CatalogQuery, DateRange, LoadStrategy, Materializer, MemoryAssetReader, Pipeline,
    PipelineConfig, SceneCatalog, SceneItem, VegError, VegResult,
};

/// Catalog serving a fixed item list, filtered by collection and date
struct FixtureCatalog {
    items: Vec<SceneItem>,
}

impl SceneCatalog for FixtureCatalog {
    fn search(
        &self,
        collection: &str,
        dates: &DateRange,
        _bbox: &BoundingBox,
        _limit: u32,
    ) -> VegResult<Vec<SceneItem>> {
        Ok(self
            .items
            .iter()
            .filter(|i| i.collection == collection && dates.contains(i.datetime.date_naive()))
            .cloned()
            .collect())
    }
}

struct Fixture {
    items: Vec<SceneItem>,
    reader: MemoryAssetReader,
}

impl Fixture {
    fn new() -> Self {
        Self {
            items: Vec::new(),
            reader: MemoryAssetReader::new(),
        }
    }

    /// Add a uniform Landsat 8 scene `step` 16-day revisits after 2020-01-05
    fn scene(&mut self, step: i64, nir: f64, red: f64, mask: f64) -> &mut Self {
        let date = NaiveDate::from_ymd_opt(2020, 1, 5).unwrap() + Duration::days(16 * step);
        let id = format!("ga_ls8c_ard_3-{}", date);

        let mut assets = HashMap::new();
        for (key, value) in [("nbart_nir", nir), ("nbart_red", red), ("oa_fmask", mask)] {
            let href = format!("s3://dea-public-data/{}/{}.tif", id, key);
            self.reader.insert(href.clone(), Array2::from_elem((2, 2), value));
            assets.insert(key.to_string(), AssetRef { href, media_type: None });
        }

        self.items.push(SceneItem {
            id,
            collection: "ga_ls8c_ard_3".to_string(),
            datetime: date.and_hms_opt(2, 0, 0).unwrap().and_utc(),
            footprint: None,
            assets,
            self_href: None,
        });
        self
    }

    fn pipeline(self, config: PipelineConfig) -> Pipeline<FixtureCatalog, MemoryAssetReader> {
        Pipeline::new(
            CatalogQuery::new(FixtureCatalog { items: self.items }, 250),
            Materializer::new(self.reader),
            config,
        )
    }
}

fn bbox() -> BoundingBox {
    BoundingBox::wgs84(119.0, -23.0, 119.5, -22.5).unwrap()
}

fn year_2020() -> DateRange {
    DateRange::parse("2020-01-01", "2020-12-31").unwrap()
}

/// Nine clear scenes alternating NDVI 0.2 / 0.333 with a -0.6 spike in the
/// middle, and one cloudy scene after the spike
fn spiky_fixture() -> Fixture {
    let mut fixture = Fixture::new();
    for step in 0..9 {
        let (nir, red) = match step {
            4 => (1.0, 4.0),                // -0.6
            s if s % 2 == 0 => (3.0, 2.0), // 0.2
            _ => (2.0, 1.0),                // 1/3
        };
        fixture.scene(step, nir, red, 1.0);
    }
    fixture.scene(20, 3.0, 1.0, 2.0); // fmask cloud
    fixture
}

fn run(pipeline: &Pipeline<FixtureCatalog, MemoryAssetReader>) -> VegResult<vegwatch::TimeSeries> {
    pipeline.run(&["ga_ls8c_ard_3"], &year_2020(), &bbox(), 0.25, 1.0, "ndvi", 2.0)
}

#[test]
fn test_end_to_end_spike_removed() {
    let _ = env_logger::builder().is_test(true).try_init();

    let pipeline = spiky_fixture().pipeline(PipelineConfig::default());
    let series = run(&pipeline).unwrap();

    // Cloudy scene dropped, remaining dates in acquisition order
    assert_eq!(series.len(), 9);
    assert!(series.dates().windows(2).all(|w| w[0] < w[1]));
    assert!(!series
        .dates()
        .contains(&(NaiveDate::from_ymd_opt(2020, 1, 5).unwrap() + Duration::days(320))));

    let values = series.values();
    assert_eq!(values[4], None);
    for (i, value) in values.iter().enumerate().filter(|(i, _)| *i != 4) {
        let expected = if i % 2 == 0 { 0.2 } else { 1.0 / 3.0 };
        assert_relative_eq!(value.unwrap(), expected, epsilon = 1e-6);
    }

    let (dates, _) = series.to_delimited();
    assert!(dates.starts_with("2020-01-05,2020-01-21,"));
}

#[test]
fn test_lenient_threshold_keeps_cloudy_scene() {
    let pipeline = spiky_fixture().pipeline(PipelineConfig::default());
    let series = pipeline
        .run(&["ga_ls8c_ard_3"], &year_2020(), &bbox(), 0.25, 0.0, "ndvi", 2.0)
        .unwrap();
    assert_eq!(series.len(), 10);
}

#[test]
fn test_load_strategies_agree() {
    let all = spiky_fixture().pipeline(PipelineConfig::default());
    let band = spiky_fixture().pipeline(PipelineConfig {
        load_strategy: LoadStrategy::Band,
        ..PipelineConfig::default()
    });

    assert_eq!(run(&all).unwrap(), run(&band).unwrap());
}

#[test]
fn test_no_scenes_is_empty_not_error() {
    let pipeline = Fixture::new().pipeline(PipelineConfig::default());
    let series = run(&pipeline).unwrap();
    assert!(series.is_empty());
}

#[test]
fn test_all_scenes_filtered_is_empty_not_error() {
    let mut fixture = Fixture::new();
    fixture.scene(0, 3.0, 1.0, 2.0).scene(1, 3.0, 1.0, 3.0);
    let series = run(&fixture.pipeline(PipelineConfig::default())).unwrap();
    assert!(series.is_empty());
}

#[test]
fn test_configuration_errors() {
    let pipeline = spiky_fixture().pipeline(PipelineConfig::default());

    let bad_index = pipeline.run(&["ga_ls8c_ard_3"], &year_2020(), &bbox(), 0.25, 1.0, "evi9", 2.0);
    assert!(matches!(bad_index, Err(VegError::UnsupportedIndex(_))));

    let bad_factor = pipeline.run(&["ga_ls8c_ard_3"], &year_2020(), &bbox(), 0.25, 1.0, "ndvi", 0.0);
    assert!(matches!(bad_factor, Err(VegError::InvalidParameter(_))));

    let bad_collection = pipeline.run(&["landsat_99"], &year_2020(), &bbox(), 0.25, 1.0, "ndvi", 2.0);
    assert!(matches!(bad_collection, Err(VegError::UnknownCollection(_))));
}

#[test]
fn test_broken_scene_skipped_or_fatal() {
    let mut fixture = Fixture::new();
    for step in 0..5 {
        fixture.scene(step, 3.0, 2.0, 1.0);
    }
    // Second scene loses its NIR raster
    let broken = fixture.items[1].assets["nbart_nir"].href.clone();
    fixture.items[1]
        .assets
        .get_mut("nbart_nir")
        .unwrap()
        .href = format!("{}.missing", broken);

    let items = fixture.items.clone();
    let reader = fixture.reader.clone();
    let series = run(&fixture.pipeline(PipelineConfig::default())).unwrap();
    assert_eq!(series.len(), 5);
    assert_eq!(series.values()[1], None);
    assert_eq!(series.valid_count(), 4);

    let strict = Fixture { items, reader }.pipeline(PipelineConfig {
        skip_broken: false,
        ..PipelineConfig::default()
    });
    assert!(matches!(run(&strict), Err(VegError::AssetRead { .. })));
}

#[test]
fn test_run_with_defaults_uses_config() {
    let config = PipelineConfig {
        collections: vec!["ga_ls7e_ard_3".to_string(), "ga_ls8c_ard_3".to_string()],
        resolution: 0.25,
        ..PipelineConfig::default()
    };
    let pipeline = spiky_fixture().pipeline(config);
    let series = pipeline.run_with_defaults(&year_2020(), &bbox()).unwrap();
    assert_eq!(series.len(), 9);
    assert_eq!(series.values()[4], None);
}
