//! Dataset builder: scene descriptors to a lazy raster cube
//!
//! Resolves canonical band names through the collection alias table, groups
//! scenes by local solar day and plans one asset band per canonical band.
//! No pixel data is touched here.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::core::cube::{BandExpr, BandPlan, GridSpec, RasterCube, SceneSource, TimeSlice};
use crate::io::collections::{find_collection, CanonicalBand, CollectionSpec, COLLECTIONS};
use crate::types::{BoundingBox, Crs, SceneItem, VegResult};

/// Dataset construction parameters
#[derive(Debug, Clone, PartialEq)]
pub struct BuildParams {
    /// Target CRS. Scenes without a footprint take their solar day from the
    /// bbox centre when this is geographic, otherwise from UTC.
    pub crs: Crs,
    /// Pixel size in CRS units, both axes
    pub resolution: f64,
    /// Align to an existing grid; bbox, CRS and resolution are then ignored
    pub like: Option<GridSpec>,
    /// Demote per-scene warnings to debug output
    pub ignore_warnings: bool,
    /// Unreadable assets contribute nodata instead of failing the load
    pub skip_broken: bool,
}

impl Default for BuildParams {
    fn default() -> Self {
        Self {
            crs: Crs::WGS84,
            resolution: 10.0 / 111_000.0,
            like: None,
            ignore_warnings: true,
            skip_broken: true,
        }
    }
}

/// Local solar date of an acquisition at `longitude` degrees east
pub fn solar_date(datetime: &DateTime<Utc>, longitude: f64) -> NaiveDate {
    let offset = Duration::milliseconds((longitude / 15.0 * 3_600_000.0).round() as i64);
    (*datetime + offset).date_naive()
}

pub struct DatasetBuilder {
    params: BuildParams,
}

impl DatasetBuilder {
    pub fn new(params: BuildParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &BuildParams {
        &self.params
    }

    /// Plan a cube over `bbox` from the given scenes.
    ///
    /// Scenes acquired on the same solar day share one time slice; the time
    /// axis is strictly increasing. Fails only on an invalid grid or an
    /// unknown collection.
    pub fn build(&self, items: &[SceneItem], bbox: &BoundingBox) -> VegResult<RasterCube> {
        let grid = match &self.params.like {
            Some(like) => like.clone(),
            None => GridSpec::from_bbox(bbox, self.params.crs, self.params.resolution)?,
        };
        log::debug!("Output grid: {:?}", grid);

        let mut days: BTreeMap<NaiveDate, Vec<SceneSource>> = BTreeMap::new();
        let mut first_spec: Option<&'static CollectionSpec> = None;

        for item in items {
            let spec = find_collection(&item.collection)?;
            first_spec.get_or_insert(spec);

            let longitude = match &item.footprint {
                Some(footprint) => footprint.center().0,
                None if bbox.crs.is_geographic() => bbox.center().0,
                None => 0.0,
            };
            let date = solar_date(&item.datetime, longitude);

            days.entry(date).or_default().push(self.resolve(item, spec));
        }

        let slices: Vec<TimeSlice> = days
            .into_iter()
            .map(|(date, mut sources)| {
                sources.sort_by_key(|s| s.datetime);
                TimeSlice {
                    date,
                    datetime: sources[0].datetime,
                    sources,
                }
            })
            .collect();

        let spec = first_spec.unwrap_or(&COLLECTIONS[0]);
        let bands = CanonicalBand::ALL
            .iter()
            .map(|band| BandPlan {
                name: band.name().to_string(),
                expr: BandExpr::Asset(*band),
                data_type: spec.asset.data_type,
                unit: spec.asset.unit.to_string(),
            })
            .collect();

        log::info!(
            "Created dataset with {} scenes ({} items)",
            slices.len(),
            items.len()
        );

        Ok(RasterCube {
            grid,
            slices,
            bands,
            skip_broken: self.params.skip_broken,
            quiet: self.params.ignore_warnings,
        })
    }

    /// Resolve the provider asset of every canonical band
    fn resolve(&self, item: &SceneItem, spec: &'static CollectionSpec) -> SceneSource {
        let mut hrefs = HashMap::new();
        for band in CanonicalBand::ALL {
            let asset = spec.alias(band).and_then(|key| item.asset(key));
            match asset {
                Some(asset) => {
                    hrefs.insert(band, asset.href.clone());
                }
                None if self.params.ignore_warnings => {
                    log::debug!("{} has no asset for {}", item.id, band);
                }
                None => {
                    log::warn!("{} has no asset for {}", item.id, band);
                }
            }
        }

        SceneSource {
            item_id: item.id.clone(),
            collection: item.collection.clone(),
            datetime: item.datetime,
            asset: spec.asset,
            hrefs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::collections::DataType;
    use crate::types::{AssetRef, VegError};
    use chrono::TimeZone;

    fn item(id: &str, collection: &str, datetime: DateTime<Utc>, lon: f64) -> SceneItem {
        let spec = find_collection(collection).map(|s| s.aliases).unwrap_or_default();
        SceneItem {
            id: id.to_string(),
            collection: collection.to_string(),
            datetime,
            footprint: Some(BoundingBox::wgs84(lon - 1.0, -24.0, lon + 1.0, -22.0).unwrap()),
            assets: spec
                .iter()
                .map(|(_, key)| {
                    (
                        key.to_string(),
                        AssetRef {
                            href: format!("s3://dea-public-data/{}/{}.tif", id, key),
                            media_type: None,
                        },
                    )
                })
                .collect(),
            self_href: None,
        }
    }

    fn bbox() -> BoundingBox {
        BoundingBox::wgs84(119.0, -23.0, 119.5, -22.5).unwrap()
    }

    fn params() -> BuildParams {
        BuildParams {
            resolution: 0.125,
            ..BuildParams::default()
        }
    }

    #[test]
    fn test_solar_date() {
        // 23:00 UTC is already the next morning in Western Australia
        let late = Utc.with_ymd_and_hms(2020, 1, 3, 23, 0, 0).unwrap();
        assert_eq!(solar_date(&late, 119.0), NaiveDate::from_ymd_opt(2020, 1, 4).unwrap());
        assert_eq!(solar_date(&late, 0.0), NaiveDate::from_ymd_opt(2020, 1, 3).unwrap());
    }

    #[test]
    fn test_same_day_grouping_and_order() {
        let items = vec![
            item("c", "ga_ls8c_ard_3", Utc.with_ymd_and_hms(2020, 2, 4, 2, 0, 0).unwrap(), 119.0),
            item("b", "ga_ls8c_ard_3", Utc.with_ymd_and_hms(2020, 1, 3, 2, 10, 0).unwrap(), 119.0),
            item("a", "ga_ls8c_ard_3", Utc.with_ymd_and_hms(2020, 1, 3, 2, 9, 0).unwrap(), 119.0),
        ];

        let cube = DatasetBuilder::new(params()).build(&items, &bbox()).unwrap();
        assert_eq!(cube.n_times(), 2);
        assert!(cube.dates().windows(2).all(|w| w[0] < w[1]));

        let first = &cube.slices[0];
        let ids: Vec<_> = first.sources.iter().map(|s| s.item_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(first.datetime, items[2].datetime);

        assert_eq!(
            cube.band_names(),
            vec!["blue", "green", "red", "nir", "swir_1", "swir_2", "mask"]
        );
        assert!(cube.bands.iter().all(|b| b.data_type == DataType::UInt16));
        assert_eq!(
            first.sources[0].hrefs[&CanonicalBand::Nir],
            "s3://dea-public-data/a/nbart_nir.tif"
        );
    }

    #[test]
    fn test_solar_day_without_footprint_uses_bbox() {
        let late = Utc.with_ymd_and_hms(2020, 1, 3, 23, 0, 0).unwrap();
        let mut scene = item("a", "ga_ls8c_ard_3", late, 119.0);
        scene.footprint = None;

        // GDA94 area of interest, no scene footprint
        let gda94 = Crs::from_epsg(4283);
        let bbox = BoundingBox::new(119.0, -23.0, 119.5, -22.5, gda94).unwrap();
        let builder = DatasetBuilder::new(BuildParams {
            crs: gda94,
            ..params()
        });
        let cube = builder.build(&[scene.clone()], &bbox).unwrap();
        assert_eq!(cube.dates(), vec![NaiveDate::from_ymd_opt(2020, 1, 4).unwrap()]);

        // Projected area of interest falls back to the UTC date
        let albers = Crs::from_epsg(3577);
        let bbox = BoundingBox::new(-1_500_000.0, -2_500_000.0, -1_499_000.0, -2_499_000.0, albers).unwrap();
        let builder = DatasetBuilder::new(BuildParams {
            crs: albers,
            resolution: 30.0,
            ..params()
        });
        let cube = builder.build(&[scene], &bbox).unwrap();
        assert_eq!(cube.dates(), vec![NaiveDate::from_ymd_opt(2020, 1, 3).unwrap()]);
    }

    #[test]
    fn test_sentinel2_aliases() {
        let items = vec![item(
            "s2",
            "ga_s2am_ard_provisional_3",
            Utc.with_ymd_and_hms(2021, 6, 1, 2, 0, 0).unwrap(),
            119.0,
        )];
        let cube = DatasetBuilder::new(params()).build(&items, &bbox()).unwrap();
        let hrefs = &cube.slices[0].sources[0].hrefs;
        assert!(hrefs[&CanonicalBand::Nir].ends_with("nbart_nir_1.tif"));
        assert!(hrefs[&CanonicalBand::Swir2].ends_with("nbart_swir_3.tif"));
    }

    #[test]
    fn test_empty_and_errors() {
        let cube = DatasetBuilder::new(params()).build(&[], &bbox()).unwrap();
        assert!(cube.is_empty());
        assert_eq!(cube.bands.len(), 7);

        let unknown = vec![item("x", "ga_ls9c_ard_3", Utc::now(), 119.0)];
        assert!(matches!(
            DatasetBuilder::new(params()).build(&unknown, &bbox()),
            Err(VegError::UnknownCollection(_))
        ));

        let bad = BuildParams {
            resolution: -1.0,
            ..params()
        };
        assert!(matches!(
            DatasetBuilder::new(bad).build(&[], &bbox()),
            Err(VegError::InvalidGrid(_))
        ));
    }

    #[test]
    fn test_like_grid_is_used_verbatim() {
        let like = GridSpec::from_bbox(&BoundingBox::wgs84(0.0, 0.0, 3.0, 2.0).unwrap(), Crs::WGS84, 1.0).unwrap();
        let builder = DatasetBuilder::new(BuildParams {
            like: Some(like.clone()),
            ..params()
        });
        let cube = builder.build(&[], &bbox()).unwrap();
        assert_eq!(cube.grid, like);
    }
}
