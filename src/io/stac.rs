//! STAC catalog access: item search with pagination and the per-collection
//! catalog query used by the pipeline

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::RemoteAccessConfig;
use crate::io::collections::find_collection;
use crate::types::{AssetRef, BoundingBox, DateRange, SceneItem, VegError, VegResult};

/// One page of an item search (GeoJSON FeatureCollection)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StacItemCollection {
    #[serde(default)]
    pub features: Vec<StacItem>,
    #[serde(default)]
    pub links: Vec<StacLink>,
}

impl StacItemCollection {
    pub fn next_link(&self) -> Option<&StacLink> {
        self.links.iter().find(|l| l.rel == "next")
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StacItem {
    pub id: String,
    #[serde(default)]
    pub bbox: Option<Vec<f64>>,
    pub properties: StacItemProperties,
    #[serde(default)]
    pub assets: HashMap<String, StacAsset>,
    #[serde(default)]
    pub collection: Option<String>,
    #[serde(default)]
    pub links: Vec<StacLink>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StacItemProperties {
    #[serde(default)]
    pub datetime: Option<String>,
    #[serde(default)]
    pub start_datetime: Option<String>,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StacAsset {
    pub href: String,
    #[serde(rename = "type", default)]
    pub media_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StacLink {
    pub rel: String,
    pub href: String,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub body: Option<serde_json::Value>,
}

impl StacItem {
    /// Convert into a scene descriptor; `None` when the item has no usable time
    pub fn into_scene(self, fallback_collection: &str) -> Option<SceneItem> {
        let stamp = self
            .properties
            .datetime
            .as_deref()
            .or(self.properties.start_datetime.as_deref())?;
        let datetime = DateTime::parse_from_rfc3339(stamp)
            .ok()?
            .with_timezone(&Utc);

        let footprint = self.bbox.as_ref().and_then(|b| match b.as_slice() {
            [min_x, min_y, max_x, max_y] => BoundingBox::wgs84(*min_x, *min_y, *max_x, *max_y).ok(),
            // 3D bbox: [min_x, min_y, min_z, max_x, max_y, max_z]
            [min_x, min_y, _, max_x, max_y, _] => {
                BoundingBox::wgs84(*min_x, *min_y, *max_x, *max_y).ok()
            }
            _ => None,
        });

        let self_href = self
            .links
            .iter()
            .find(|l| l.rel == "self")
            .map(|l| l.href.clone());

        let assets = self
            .assets
            .into_iter()
            .map(|(key, asset)| {
                (
                    key,
                    AssetRef {
                        href: asset.href,
                        media_type: asset.media_type,
                    },
                )
            })
            .collect();

        Some(SceneItem {
            id: self.id,
            collection: self
                .collection
                .unwrap_or_else(|| fallback_collection.to_string()),
            datetime,
            footprint,
            assets,
            self_href,
        })
    }
}

/// Source of scene descriptors for a single collection
pub trait SceneCatalog {
    /// Return every item of `collection` intersecting `bbox` within `dates`,
    /// following pagination to the end, in catalog order
    fn search(
        &self,
        collection: &str,
        dates: &DateRange,
        bbox: &BoundingBox,
        limit: u32,
    ) -> VegResult<Vec<SceneItem>>;
}

/// Blocking STAC API client
pub struct StacCatalog {
    client: reqwest::blocking::Client,
    search_url: String,
}

impl StacCatalog {
    pub fn new(config: &RemoteAccessConfig) -> VegResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| VegError::Catalog(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            search_url: config.search_url(),
        })
    }

    fn first_page(
        &self,
        collection: &str,
        dates: &DateRange,
        bbox: &BoundingBox,
        limit: u32,
    ) -> VegResult<StacItemCollection> {
        let bbox_param = bbox
            .to_array()
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(",");

        log::debug!("GET {} collection={} datetime={}", self.search_url, collection, dates);
        let request = self.client.get(&self.search_url).query(&[
            ("collections", collection.to_string()),
            ("datetime", dates.to_stac_interval()),
            ("bbox", bbox_param),
            ("limit", limit.to_string()),
        ]);

        Self::read_page(request)
    }

    fn follow(&self, link: &StacLink) -> VegResult<StacItemCollection> {
        let method = link.method.as_deref().unwrap_or("GET").to_uppercase();
        log::debug!("Following {} pagination link: {}", method, link.href);

        let request = if method == "POST" {
            let body = link.body.clone().unwrap_or(serde_json::Value::Null);
            self.client.post(&link.href).json(&body)
        } else {
            self.client.get(&link.href)
        };

        Self::read_page(request)
    }

    fn read_page(request: reqwest::blocking::RequestBuilder) -> VegResult<StacItemCollection> {
        let response = request
            .send()
            .map_err(|e| VegError::Catalog(format!("STAC search request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            return Err(VegError::Catalog(format!(
                "STAC search returned HTTP {}: {}",
                status,
                body.chars().take(500).collect::<String>()
            )));
        }

        let text = response
            .text()
            .map_err(|e| VegError::Catalog(format!("Failed to read response: {}", e)))?;

        serde_json::from_str(&text)
            .map_err(|e| VegError::Catalog(format!("Failed to parse STAC response: {}", e)))
    }
}

impl SceneCatalog for StacCatalog {
    fn search(
        &self,
        collection: &str,
        dates: &DateRange,
        bbox: &BoundingBox,
        limit: u32,
    ) -> VegResult<Vec<SceneItem>> {
        let mut items = Vec::new();
        let mut page = self.first_page(collection, dates, bbox, limit)?;

        loop {
            let next = page.next_link().cloned();
            let received = page.features.len();

            for feature in page.features.drain(..) {
                let id = feature.id.clone();
                match feature.into_scene(collection) {
                    Some(scene) => items.push(scene),
                    None => log::warn!("Skipping item without a usable datetime: {}", id),
                }
            }

            match next {
                Some(link) if received > 0 => page = self.follow(&link)?,
                _ => break,
            }
        }

        Ok(items)
    }
}

/// Resolves collections, a date range and an area into a flat scene list
pub struct CatalogQuery<C: SceneCatalog> {
    catalog: C,
    page_limit: u32,
}

impl<C: SceneCatalog> CatalogQuery<C> {
    pub fn new(catalog: C, page_limit: u32) -> Self {
        Self {
            catalog,
            page_limit: page_limit.max(1),
        }
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    /// Query each collection in order and concatenate the results.
    ///
    /// A collection with a maximum supported date only searches up to that
    /// date; if the whole range lies past it the collection is not queried.
    /// Catalog errors propagate unmodified. Zero items is not an error.
    pub fn run(
        &self,
        collections: &[&str],
        dates: &DateRange,
        bbox: &BoundingBox,
    ) -> VegResult<Vec<SceneItem>> {
        log::info!("Beginning STAC query for {} collection(s)", collections.len());

        // Unknown identifiers are a configuration error, checked before any request
        let specs = collections
            .iter()
            .map(|id| find_collection(id))
            .collect::<VegResult<Vec<_>>>()?;

        let mut items = Vec::new();
        for spec in specs {
            let range = match spec.max_date() {
                Some(max) => match dates.clamp_to(max) {
                    Some(clamped) => {
                        if clamped != *dates {
                            log::info!("Truncating {} query to {} (collection ends {})", spec.id, clamped, max);
                        }
                        clamped
                    }
                    None => {
                        log::info!("Skipping {}: requested range starts after {}", spec.id, max);
                        continue;
                    }
                },
                None => *dates,
            };

            log::info!("Checking for collection: {} ({})", spec.id, range);
            let found = self.catalog.search(spec.id, &range, bbox, self.page_limit)?;
            log::info!("Found {} item(s) in {}", found.len(), spec.id);
            items.extend(found);
        }

        log::info!("Found {} items in total", items.len());
        Ok(items)
    }
}
