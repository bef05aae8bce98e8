use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Electoral geographic level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeoType {
    Island,                 // Highest-level entity
    SenatorialDistrict,     // SenatorialDistrict -> Island
    RepresentativeDistrict, // RepresentativeDistrict -> Island
    Municipality,           // Municipality -> Island
    Precinct,               // Precinct -> Municipality
    Unit,                   // Lowest-level voting unit
}

impl GeoType {
    pub const ALL: [GeoType; 6] = [
        GeoType::Island,
        GeoType::SenatorialDistrict,
        GeoType::RepresentativeDistrict,
        GeoType::Municipality,
        GeoType::Precinct,
        GeoType::Unit,
    ];

    pub fn to_str(&self) -> &'static str {
        match self {
            GeoType::Island => "island",
            GeoType::SenatorialDistrict => "senatorial_district",
            GeoType::RepresentativeDistrict => "representative_district",
            GeoType::Municipality => "municipality",
            GeoType::Precinct => "precinct",
            GeoType::Unit => "unit",
        }
    }

    /// Levels that coincide with a Census geography and skip areal weighting.
    #[inline]
    pub fn is_direct_match(&self) -> bool {
        matches!(self, GeoType::Island | GeoType::Municipality)
    }
}

impl fmt::Display for GeoType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_str())
    }
}

impl FromStr for GeoType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        GeoType::ALL.into_iter()
            .find(|ty| ty.to_str() == s.trim().to_lowercase())
            .ok_or_else(|| Error::InvalidInput(format!("unknown geographic level: {s:?}")))
    }
}
