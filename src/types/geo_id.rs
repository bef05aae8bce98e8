use std::{fmt, sync::Arc};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};

/// State FIPS code for Puerto Rico.
pub const PR_STATE_FIPS: &str = "72";

/// Census geography a GEOID addresses, by digit count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CensusLevel {
    State,  // 2 digits
    County, // 5 digits: state + county
    Tract,  // 11 digits: state + county + tract
}

impl CensusLevel {
    #[inline]
    pub fn id_len(&self) -> usize {
        match self {
            CensusLevel::State => 2,
            CensusLevel::County => 5,
            CensusLevel::Tract => 11,
        }
    }

    pub fn to_str(&self) -> &'static str {
        match self {
            CensusLevel::State => "state",
            CensusLevel::County => "county",
            CensusLevel::Tract => "tract",
        }
    }
}

/// Stable key for a Census entity.
/// Keeps the original GEOID text (with leading zeros) but avoids repeated owned Strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GeoId {
    ty: CensusLevel,
    id: Arc<str>, // e.g., "72" for the island, "72127" for San Juan, "72127001100" for a tract
}

impl GeoId {
    /// Parse a GEOID, inferring its level from its length.
    pub fn parse(id: &str) -> Result<Self> {
        let id = id.trim();
        if !id.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::InvalidInput(format!("GEOID must be numeric: {id:?}")));
        }
        let ty = [CensusLevel::State, CensusLevel::County, CensusLevel::Tract].into_iter()
            .find(|ty| ty.id_len() == id.len())
            .ok_or_else(|| Error::InvalidInput(format!("GEOID has unexpected length {}: {id:?}", id.len())))?;
        Ok(Self { ty, id: Arc::from(id) })
    }

    /// GEOID for a Puerto Rico county-equivalent from its 3-digit FIPS.
    pub fn county(county_fips: &str) -> Result<Self> {
        Self::parse(&format!("{PR_STATE_FIPS}{county_fips}"))
            .and_then(|geo_id| match geo_id.ty {
                CensusLevel::County => Ok(geo_id),
                _ => Err(Error::InvalidInput(format!("county FIPS must be 3 digits: {county_fips:?}"))),
            })
    }

    /// GEOID for the island as a whole.
    pub fn island() -> Self {
        Self { ty: CensusLevel::State, id: Arc::from(PR_STATE_FIPS) }
    }

    #[inline] pub fn ty(&self) -> CensusLevel { self.ty }

    #[inline] pub fn id(&self) -> &str { &self.id }

    /// Returns a new `GeoId` at the coarser `parent_ty`
    /// by truncating this GeoId's string to the correct prefix length.
    pub fn to_parent(&self, parent_ty: CensusLevel) -> GeoId {
        // If the id is shorter than expected, just take the full id.
        let prefix: Arc<str> = Arc::from(&self.id[..self.id.len().min(parent_ty.id_len())]);

        GeoId {
            ty: parent_ty.min(self.ty),
            id: prefix,
        }
    }

    /// The 3-digit county FIPS, if this id is at county level or finer.
    pub fn county_fips(&self) -> Option<&str> {
        (self.ty >= CensusLevel::County).then(|| &self.id[2..5])
    }
}

impl fmt::Display for GeoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

impl Serialize for GeoId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.id)
    }
}

impl<'de> Deserialize<'de> for GeoId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let id = String::deserialize(deserializer)?;
        GeoId::parse(&id).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infers_level_from_length() {
        assert_eq!(GeoId::parse("72").unwrap().ty(), CensusLevel::State);
        assert_eq!(GeoId::parse("72127").unwrap().ty(), CensusLevel::County);
        assert_eq!(GeoId::parse("72127001100").unwrap().ty(), CensusLevel::Tract);
        assert!(GeoId::parse("7212").is_err());
        assert!(GeoId::parse("72a27").is_err());
    }

    #[test]
    fn parent_truncates_prefix() {
        let tract = GeoId::parse("72127001100").unwrap();
        assert_eq!(tract.to_parent(CensusLevel::County).id(), "72127");
        assert_eq!(tract.to_parent(CensusLevel::State), GeoId::island());
        assert_eq!(tract.county_fips(), Some("127"));
        assert_eq!(GeoId::island().county_fips(), None);
    }

    #[test]
    fn county_requires_three_digits() {
        assert_eq!(GeoId::county("097").unwrap().id(), "72097");
        assert!(GeoId::county("97").is_err());
        assert!(GeoId::county("001100").is_err());
    }
}
