use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Canonical calendar-date format exchanged with callers
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Geographic (degree-based) EPSG codes recognised by [`Crs::is_geographic`]
const GEOGRAPHIC_EPSG: [u32; 6] = [4326, 4283, 7844, 4269, 4258, 4167];

/// Coordinate reference system identified by its EPSG code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Crs {
    pub epsg: u32,
}

impl Crs {
    /// Geographic WGS84 (longitude, latitude)
    pub const WGS84: Crs = Crs { epsg: 4326 };

    pub fn from_epsg(epsg: u32) -> Self {
        Self { epsg }
    }

    /// Parse an `EPSG:<code>` string (case-insensitive)
    pub fn parse(value: &str) -> VegResult<Self> {
        let pattern = Regex::new(r"(?i)^\s*epsg:(\d+)\s*$")
            .map_err(|e| VegError::InvalidParameter(format!("CRS pattern: {}", e)))?;

        let code = pattern
            .captures(value)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<u32>().ok())
            .ok_or_else(|| VegError::InvalidParameter(format!("Unrecognised CRS: {}", value)))?;

        Ok(Self { epsg: code })
    }

    /// Longitude/latitude CRS: WGS84, GDA94, GDA2020, NAD83, ETRS89, NZGD2000
    pub fn is_geographic(&self) -> bool {
        GEOGRAPHIC_EPSG.contains(&self.epsg)
    }
}

impl Default for Crs {
    fn default() -> Self {
        Crs::WGS84
    }
}

impl std::fmt::Display for Crs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EPSG:{}", self.epsg)
    }
}

/// Axis-aligned bounding box in a stated coordinate reference
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
    #[serde(default)]
    pub crs: Crs,
}

impl BoundingBox {
    /// Create a bounding box, validating `min <= max` on both axes
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64, crs: Crs) -> VegResult<Self> {
        let coords = [min_x, min_y, max_x, max_y];
        if coords.iter().any(|c| !c.is_finite()) {
            return Err(VegError::InvalidParameter(format!(
                "Bounding box has non-finite coordinates: {:?}",
                coords
            )));
        }
        if min_x > max_x || min_y > max_y {
            return Err(VegError::InvalidParameter(format!(
                "Bounding box is inverted: ({}, {}, {}, {})",
                min_x, min_y, max_x, max_y
            )));
        }

        Ok(Self { min_x, min_y, max_x, max_y, crs })
    }

    /// WGS84 bounding box in (min_lon, min_lat, max_lon, max_lat) order
    pub fn wgs84(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> VegResult<Self> {
        Self::new(min_lon, min_lat, max_lon, max_lat, Crs::WGS84)
    }

    /// Envelope of a drawn polygon given as (longitude, latitude) vertices
    pub fn from_vertices(vertices: &[(f64, f64)]) -> VegResult<Self> {
        if vertices.is_empty() {
            return Err(VegError::InvalidParameter(
                "Cannot derive a bounding box from zero vertices".to_string(),
            ));
        }

        let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
        let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
        for &(lon, lat) in vertices {
            min_x = min_x.min(lon);
            min_y = min_y.min(lat);
            max_x = max_x.max(lon);
            max_y = max_y.max(lat);
        }

        Self::wgs84(min_x, min_y, max_x, max_y)
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn center(&self) -> (f64, f64) {
        ((self.min_x + self.max_x) / 2.0, (self.min_y + self.max_y) / 2.0)
    }

    /// `[min_x, min_y, max_x, max_y]` as used by STAC requests
    pub fn to_array(&self) -> [f64; 4] {
        [self.min_x, self.min_y, self.max_x, self.max_y]
    }
}

/// Inclusive calendar date range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateRange {
    pub fn new(from: NaiveDate, to: NaiveDate) -> VegResult<Self> {
        if from > to {
            return Err(VegError::InvalidParameter(format!(
                "Date range starts after it ends: {} > {}",
                from, to
            )));
        }
        Ok(Self { from, to })
    }

    /// Parse a pair of `YYYY-MM-DD` strings
    pub fn parse(from: &str, to: &str) -> VegResult<Self> {
        Self::new(parse_date(from)?, parse_date(to)?)
    }

    /// Truncate the upper bound to `max`; `None` when nothing is left
    pub fn clamp_to(&self, max: NaiveDate) -> Option<DateRange> {
        if self.from > max {
            None
        } else {
            Some(DateRange {
                from: self.from,
                to: self.to.min(max),
            })
        }
    }

    /// Render as a STAC datetime interval covering whole days
    pub fn to_stac_interval(&self) -> String {
        format!(
            "{}T00:00:00Z/{}T23:59:59Z",
            self.from.format(DATE_FORMAT),
            self.to.format(DATE_FORMAT)
        )
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.from && date <= self.to
    }
}

impl std::fmt::Display for DateRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.from.format(DATE_FORMAT), self.to.format(DATE_FORMAT))
    }
}

/// Parse a canonical `YYYY-MM-DD` date
pub fn parse_date(value: &str) -> VegResult<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT)
        .map_err(|e| VegError::InvalidParameter(format!("Invalid date '{}': {}", value, e)))
}

/// Reference to one downloadable asset of a scene
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetRef {
    pub href: String,
    pub media_type: Option<String>,
}

/// One discoverable acquisition returned by the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneItem {
    pub id: String,
    pub collection: String,
    pub datetime: DateTime<Utc>,
    pub footprint: Option<BoundingBox>, // always WGS84 in STAC
    pub assets: HashMap<String, AssetRef>,
    pub self_href: Option<String>,
}

impl SceneItem {
    pub fn asset(&self, key: &str) -> Option<&AssetRef> {
        self.assets.get(key)
    }
}

/// A single (date, value) entry of a reduced time series
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    #[serde(with = "date_format")]
    pub date: NaiveDate,
    pub value: Option<f64>,
}

/// Ordered sequence of observations sharing the cube's time ordering
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    pub observations: Vec<Observation>,
}

impl TimeSeries {
    pub fn new(observations: Vec<Observation>) -> Self {
        Self { observations }
    }

    /// Build from aligned dates and values; NaN values become missing
    pub fn from_parts(dates: &[NaiveDate], values: &[f64]) -> VegResult<Self> {
        if dates.len() != values.len() {
            return Err(VegError::InvalidParameter(format!(
                "Dates and values differ in length: {} vs {}",
                dates.len(),
                values.len()
            )));
        }

        let observations = dates
            .iter()
            .zip(values.iter())
            .map(|(&date, &v)| Observation {
                date,
                value: if v.is_nan() { None } else { Some(v) },
            })
            .collect();

        Ok(Self { observations })
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.observations.iter().map(|o| o.date).collect()
    }

    pub fn values(&self) -> Vec<Option<f64>> {
        self.observations.iter().map(|o| o.value).collect()
    }

    /// Values with missing entries encoded as NaN
    pub fn values_nan(&self) -> Vec<f64> {
        self.observations
            .iter()
            .map(|o| o.value.unwrap_or(f64::NAN))
            .collect()
    }

    pub fn valid_count(&self) -> usize {
        self.observations.iter().filter(|o| o.value.is_some()).count()
    }

    pub fn min_value(&self) -> Option<f64> {
        self.observations
            .iter()
            .filter_map(|o| o.value)
            .fold(None, |acc, v| Some(acc.map_or(v, |a: f64| a.min(v))))
    }

    pub fn max_value(&self) -> Option<f64> {
        self.observations
            .iter()
            .filter_map(|o| o.value)
            .fold(None, |acc, v| Some(acc.map_or(v, |a: f64| a.max(v))))
    }

    /// Comma-joined dates and values, ready for flat storage
    pub fn to_delimited(&self) -> (String, String) {
        let dates = self
            .observations
            .iter()
            .map(|o| o.date.format(DATE_FORMAT).to_string())
            .collect::<Vec<_>>()
            .join(",");
        let values = self
            .observations
            .iter()
            .map(|o| match o.value {
                Some(v) => v.to_string(),
                None => "nan".to_string(),
            })
            .collect::<Vec<_>>()
            .join(",");
        (dates, values)
    }
}

mod date_format {
    use super::DATE_FORMAT;
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&date.format(DATE_FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
        let s = String::deserialize(deserializer)?;
        NaiveDate::parse_from_str(&s, DATE_FORMAT).map_err(serde::de::Error::custom)
    }
}

/// Error types for the monitoring pipeline
#[derive(Debug, thiserror::Error)]
pub enum VegError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unknown collection: {0}")]
    UnknownCollection(String),

    #[error("Unsupported index: {0}")]
    UnsupportedIndex(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Missing band: {0}")]
    MissingBand(String),

    #[error("Invalid grid: {0}")]
    InvalidGrid(String),

    #[error("Failed to read asset {href}: {reason}")]
    AssetRead { href: String, reason: String },

    #[cfg(feature = "gdal")]
    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),
}

/// Result type for monitoring operations
pub type VegResult<T> = Result<T, VegError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        parse_date(s).unwrap()
    }

    #[test]
    fn test_crs_parse() {
        assert_eq!(Crs::parse("EPSG:4326").unwrap(), Crs::WGS84);
        assert_eq!(Crs::parse("epsg:3577").unwrap().epsg, 3577);
        assert!(Crs::parse("WGS84").is_err());
        assert_eq!(Crs::from_epsg(32755).to_string(), "EPSG:32755");
    }

    #[test]
    fn test_crs_is_geographic() {
        assert!(Crs::WGS84.is_geographic());
        assert!(Crs::from_epsg(4283).is_geographic()); // GDA94
        assert!(Crs::from_epsg(7844).is_geographic()); // GDA2020
        assert!(!Crs::from_epsg(3577).is_geographic()); // Australian Albers
        assert!(!Crs::from_epsg(32750).is_geographic());
    }

    #[test]
    fn test_bbox_validation() {
        assert!(BoundingBox::wgs84(119.14, -22.78, 119.15, -22.77).is_ok());
        assert!(BoundingBox::wgs84(119.15, -22.78, 119.14, -22.77).is_err());
        assert!(BoundingBox::wgs84(f64::NAN, -22.78, 119.14, -22.77).is_err());
    }

    #[test]
    fn test_bbox_from_vertices() {
        let bbox = BoundingBox::from_vertices(&[
            (119.148, -22.787),
            (119.150, -22.786),
            (119.149, -22.788),
        ])
        .unwrap();

        assert_eq!(bbox.min_x, 119.148);
        assert_eq!(bbox.max_x, 119.150);
        assert_eq!(bbox.min_y, -22.788);
        assert_eq!(bbox.max_y, -22.786);
        assert!(BoundingBox::from_vertices(&[]).is_err());
    }

    #[test]
    fn test_date_range_clamp() {
        let range = DateRange::parse("1990-01-01", "2021-12-31").unwrap();
        let clamped = range.clamp_to(date("2003-05-31")).unwrap();
        assert_eq!(clamped.to, date("2003-05-31"));
        assert_eq!(clamped.from, range.from);

        let early = DateRange::parse("1995-01-01", "1996-01-01").unwrap();
        assert_eq!(early.clamp_to(date("2003-05-31")), Some(early));

        let late = DateRange::parse("2010-01-01", "2011-01-01").unwrap();
        assert_eq!(late.clamp_to(date("2003-05-31")), None);

        assert!(DateRange::parse("2020-01-02", "2020-01-01").is_err());
        assert_eq!(
            range.to_stac_interval(),
            "1990-01-01T00:00:00Z/2021-12-31T23:59:59Z"
        );
    }

    #[test]
    fn test_time_series_helpers() {
        let series = TimeSeries::from_parts(
            &[date("2020-01-01"), date("2020-01-17"), date("2020-02-02")],
            &[0.4, f64::NAN, 0.6],
        )
        .unwrap();

        assert_eq!(series.len(), 3);
        assert_eq!(series.valid_count(), 2);
        assert_eq!(series.min_value(), Some(0.4));
        assert_eq!(series.max_value(), Some(0.6));

        let (dates, values) = series.to_delimited();
        assert_eq!(dates, "2020-01-01,2020-01-17,2020-02-02");
        assert_eq!(values, "0.4,nan,0.6");
    }

    #[test]
    fn test_time_series_json_dates() {
        let series = TimeSeries::from_parts(&[date("2021-03-04")], &[0.25]).unwrap();
        let json = serde_json::to_string(&series).unwrap();
        assert!(json.contains("\"2021-03-04\""));

        let back: TimeSeries = serde_json::from_str(&json).unwrap();
        assert_eq!(back, series);
    }
}
