//! Band alias table for the supported analysis-ready collections
//!
//! Maps canonical band names to each collection's provider asset keys and
//! declares how the assets are encoded. The table is compiled in and never
//! mutated; adding a collection means adding one entry to [`COLLECTIONS`].

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::types::{VegError, VegResult};

/// Sensor-independent band names used throughout the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CanonicalBand {
    Blue,
    Green,
    Red,
    Nir,
    Swir1,
    Swir2,
    Mask,
}

impl CanonicalBand {
    /// Bands loaded for every scene, in cube order
    pub const ALL: [CanonicalBand; 7] = [
        CanonicalBand::Blue,
        CanonicalBand::Green,
        CanonicalBand::Red,
        CanonicalBand::Nir,
        CanonicalBand::Swir1,
        CanonicalBand::Swir2,
        CanonicalBand::Mask,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            CanonicalBand::Blue => "blue",
            CanonicalBand::Green => "green",
            CanonicalBand::Red => "red",
            CanonicalBand::Nir => "nir",
            CanonicalBand::Swir1 => "swir_1",
            CanonicalBand::Swir2 => "swir_2",
            CanonicalBand::Mask => "mask",
        }
    }
}

impl std::fmt::Display for CanonicalBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Storage data type of a provider asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    UInt16,
    Float32,
}

impl DataType {
    /// Whether a raw value can be represented by this type
    pub fn holds(&self, value: f64) -> bool {
        match self {
            DataType::UInt16 => value.fract() == 0.0 && (0.0..=u16::MAX as f64).contains(&value),
            DataType::Float32 => true,
        }
    }
}

/// Encoding metadata declared for an asset
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AssetSpec {
    pub data_type: DataType,
    pub nodata: f64,
    pub unit: &'static str,
}

impl AssetSpec {
    /// Decode a raw sample: nodata and unrepresentable values become NaN
    pub fn decode(&self, raw: f64) -> f32 {
        if raw.is_nan() || raw == self.nodata || !self.data_type.holds(raw) {
            f32::NAN
        } else {
            raw as f32
        }
    }
}

/// Surface reflectance and fmask encoding shared by all DEA ARD products
const ARD_ASSET: AssetSpec = AssetSpec {
    data_type: DataType::UInt16,
    nodata: 0.0,
    unit: "1",
};

/// Static description of one scene collection
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollectionSpec {
    pub id: &'static str,
    /// (canonical band, provider asset key)
    pub aliases: &'static [(CanonicalBand, &'static str)],
    pub asset: AssetSpec,
    /// Last date with usable acquisitions, as (year, month, day)
    pub max_date: Option<(i32, u32, u32)>,
}

impl CollectionSpec {
    /// Provider asset key for a canonical band
    pub fn alias(&self, band: CanonicalBand) -> Option<&'static str> {
        self.aliases
            .iter()
            .find(|(b, _)| *b == band)
            .map(|(_, key)| *key)
    }

    pub fn max_date(&self) -> Option<NaiveDate> {
        self.max_date
            .and_then(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d))
    }
}

const LANDSAT_ALIASES: &[(CanonicalBand, &str)] = &[
    (CanonicalBand::Blue, "nbart_blue"),
    (CanonicalBand::Green, "nbart_green"),
    (CanonicalBand::Red, "nbart_red"),
    (CanonicalBand::Nir, "nbart_nir"),
    (CanonicalBand::Swir1, "nbart_swir_1"),
    (CanonicalBand::Swir2, "nbart_swir_2"),
    (CanonicalBand::Mask, "oa_fmask"),
];

const SENTINEL2_ALIASES: &[(CanonicalBand, &str)] = &[
    (CanonicalBand::Blue, "nbart_blue"),
    (CanonicalBand::Green, "nbart_green"),
    (CanonicalBand::Red, "nbart_red"),
    (CanonicalBand::Nir, "nbart_nir_1"),
    (CanonicalBand::Swir1, "nbart_swir_2"),
    (CanonicalBand::Swir2, "nbart_swir_3"),
    (CanonicalBand::Mask, "oa_fmask"),
];

/// Supported collections
pub static COLLECTIONS: &[CollectionSpec] = &[
    CollectionSpec {
        id: "ga_ls5t_ard_3",
        aliases: LANDSAT_ALIASES,
        asset: ARD_ASSET,
        max_date: None,
    },
    // Landsat 7 scan-line corrector failed on 2003-05-31
    CollectionSpec {
        id: "ga_ls7e_ard_3",
        aliases: LANDSAT_ALIASES,
        asset: ARD_ASSET,
        max_date: Some((2003, 5, 31)),
    },
    CollectionSpec {
        id: "ga_ls8c_ard_3",
        aliases: LANDSAT_ALIASES,
        asset: ARD_ASSET,
        max_date: None,
    },
    CollectionSpec {
        id: "ga_ls8c_ard_provisional_3",
        aliases: LANDSAT_ALIASES,
        asset: ARD_ASSET,
        max_date: None,
    },
    CollectionSpec {
        id: "ga_s2am_ard_provisional_3",
        aliases: SENTINEL2_ALIASES,
        asset: ARD_ASSET,
        max_date: None,
    },
    CollectionSpec {
        id: "ga_s2bm_ard_provisional_3",
        aliases: SENTINEL2_ALIASES,
        asset: ARD_ASSET,
        max_date: None,
    },
];

/// Look up a collection by identifier
pub fn find_collection(id: &str) -> VegResult<&'static CollectionSpec> {
    COLLECTIONS
        .iter()
        .find(|c| c.id == id)
        .ok_or_else(|| VegError::UnknownCollection(id.to_string()))
}
