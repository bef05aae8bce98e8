use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::{error::{Error, Result}, types::{GeoId, PR_STATE_FIPS}};

use super::{normalize::NameNormalizer, table::MUNICIPALITY_COUNT};

/// One row of the municipality → Census county-equivalent crosswalk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CrosswalkEntry {
    pub municipality_name: String,
    pub display_name: String,
    pub county_fips: String,
    pub geoid: String,
    pub aliases: Vec<String>,
}

/// How well a list of electoral municipality names covers the island.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoverageReport {
    /// (input name, canonical key, geoid)
    pub matched: Vec<(String, String, String)>,
    pub unmatched_input: Vec<String>,
    /// Canonical keys never matched by any input name.
    pub missing: Vec<String>,
    pub coverage_pct: f64,
}

/// Maps municipality names onto Census GEOIDs.
#[derive(Debug, Clone, Copy)]
pub struct MunicipalityCrosswalk<'a> {
    names: NameNormalizer<'a>,
}

impl<'a> MunicipalityCrosswalk<'a> {
    pub fn new(names: NameNormalizer<'a>) -> Self {
        Self { names }
    }

    #[inline] pub fn names(&self) -> &NameNormalizer<'a> { &self.names }

    /// 5-digit GEOID ("72" + county FIPS) for a municipality name.
    pub fn get_geoid(&self, name: &str) -> Result<GeoId> {
        GeoId::county(self.get_county_fips(name)?)
    }

    /// 3-digit county FIPS for a municipality name.
    pub fn get_county_fips(&self, name: &str) -> Result<&'a str> {
        Ok(self.names.resolve(name)?.county_fips.as_str())
    }

    /// Official (accented) display name for a county FIPS.
    pub fn display_name(&self, county_fips: &str) -> Option<&'a str> {
        self.names.table().by_fips(county_fips).map(|m| m.display_name.as_str())
    }

    /// Resolve a batch of names, keeping per-name failures.
    pub fn match_names<'n>(&self, names: &'n [&'n str]) -> Vec<(&'n str, Result<GeoId>)> {
        names.iter().map(|&name| (name, self.get_geoid(name))).collect()
    }

    /// The full crosswalk ordered by county FIPS.
    /// Fails if the municipality table does not hold exactly 78 distinct entries.
    pub fn build_crosswalk(&self) -> Result<Vec<CrosswalkEntry>> {
        let table = self.names.table();

        let by_fips = table.iter()
            .map(|m| (m.county_fips.as_str(), m))
            .collect::<BTreeMap<_, _>>();

        if table.len() != MUNICIPALITY_COUNT || by_fips.len() != MUNICIPALITY_COUNT {
            let present = table.iter().map(|m| m.key.as_str()).collect::<BTreeSet<_>>();
            let missing = super::table::MUNICIPALITIES.iter()
                .filter(|(key, _, _)| !present.contains(key))
                .map(|(key, _, _)| key.to_string())
                .collect();
            return Err(Error::IncompleteCrosswalk { expected: MUNICIPALITY_COUNT, found: by_fips.len(), missing });
        }

        by_fips.into_values()
            .map(|m| {
                let geoid = GeoId::county(&m.county_fips)?;
                debug_assert_eq!(geoid.id(), format!("{PR_STATE_FIPS}{}", m.county_fips));
                Ok::<_, Error>(CrosswalkEntry {
                    municipality_name: m.key.clone(),
                    display_name: m.display_name.clone(),
                    county_fips: m.county_fips.clone(),
                    geoid: geoid.id().to_string(),
                    aliases: m.aliases.clone(),
                })
            })
            .collect()
    }

    /// Check which municipalities a set of electoral names covers.
    pub fn validate_coverage(&self, names: &[&str]) -> CoverageReport {
        let mut matched = Vec::new();
        let mut unmatched_input = Vec::new();
        let mut seen = BTreeSet::new();

        for &name in names {
            match self.names.resolve(name) {
                Ok(m) => {
                    seen.insert(m.key.as_str());
                    matched.push((name.to_string(), m.key.clone(), format!("{PR_STATE_FIPS}{}", m.county_fips)));
                }
                Err(_) => unmatched_input.push(name.to_string()),
            }
        }

        let table = self.names.table();
        let missing = table.iter()
            .filter(|m| !seen.contains(m.key.as_str()))
            .map(|m| m.key.clone())
            .collect();

        CoverageReport {
            matched,
            unmatched_input,
            missing,
            coverage_pct: if table.is_empty() { 0.0 } else { seen.len() as f64 / table.len() as f64 * 100.0 },
        }
    }
}
