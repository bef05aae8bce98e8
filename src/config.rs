use std::{fs::File, io::BufReader, path::{Path, PathBuf}, time::Duration};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::types::GeoType;

/// Confidence assigned per geographic level.
///
/// Fixed levels carry a single score; precinct and unit levels carry a band that the
/// scorer maps weight concentration into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceBands {
    pub island: f64,
    pub municipality: f64,
    pub senatorial_district: f64,
    pub representative_district: f64,
    pub precinct: (f64, f64),
    pub unit: (f64, f64),
    /// Score for a precinct that fell back to its municipality's values.
    pub degraded: f64,
    /// Ceiling applied when more than half of the contributing tracts are suppressed.
    pub suppressed_majority_cap: f64,
}

impl Default for ConfidenceBands {
    fn default() -> Self {
        Self {
            island: 1.0,
            municipality: 1.0,
            senatorial_district: 0.95,
            representative_district: 0.9,
            precinct: (0.6, 0.8),
            unit: (0.4, 0.6),
            degraded: 0.5,
            suppressed_majority_cap: 0.3,
        }
    }
}

impl ConfidenceBands {
    /// The band for a level; fixed levels collapse to a zero-width band.
    pub fn band(&self, ty: GeoType) -> (f64, f64) {
        match ty {
            GeoType::Island => (self.island, self.island),
            GeoType::Municipality => (self.municipality, self.municipality),
            GeoType::SenatorialDistrict => (self.senatorial_district, self.senatorial_district),
            GeoType::RepresentativeDistrict => (self.representative_district, self.representative_district),
            GeoType::Precinct => self.precinct,
            GeoType::Unit => self.unit,
        }
    }
}

/// Census API retry schedule. Durations are serialized as whole seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    #[serde(with = "secs")]
    pub rate_limit_wait: Duration,
    pub rate_limit_max_retries: u32,
    #[serde(with = "secs")]
    pub server_error_wait: Duration,
    pub server_error_max_retries: u32,
    #[serde(with = "secs")]
    pub timeout_wait: Duration,
    pub timeout_max_retries: u32,
    #[serde(with = "secs")]
    pub request_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            rate_limit_wait: Duration::from_secs(60),
            rate_limit_max_retries: 5,
            server_error_wait: Duration::from_secs(30),
            server_error_max_retries: 3,
            timeout_wait: Duration::from_secs(15),
            timeout_max_retries: 3,
            request_timeout: Duration::from_secs(60),
        }
    }
}

/// Census API endpoint settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CensusConfig {
    pub base_url: String,
    pub year: u16,
    pub dataset: String,
    pub api_key: Option<String>,
}

impl Default for CensusConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.census.gov/data".into(),
            year: 2022,
            dataset: "acs/acs5".into(),
            api_key: None,
        }
    }
}

impl CensusConfig {
    /// The configured key, or `CENSUS_API_KEY` from the environment.
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key.clone()
            .or_else(|| std::env::var("CENSUS_API_KEY").ok())
            .filter(|key| !key.trim().is_empty())
    }
}

/// Every tunable of a batch run. Built once, then passed by reference into each component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub data_dir: PathBuf,
    pub output_dir: PathBuf,
    /// EPSG code of input geometries (4269 = NAD83 lon/lat).
    pub source_epsg: u32,
    /// Input coordinates are already planar and equal-area; skip reprojection.
    pub projected_input: bool,
    /// Largest edit distance accepted by the fuzzy name fallback.
    pub fuzzy_max_distance: usize,
    pub confidence: ConfidenceBands,
    pub retry: RetryPolicy,
    pub census: CensusConfig,
    pub max_concurrent_requests: usize,
    /// Overlap workers; 0 lets rayon decide.
    pub worker_threads: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            output_dir: PathBuf::from("data/crossref"),
            source_epsg: 4269,
            projected_input: false,
            fuzzy_max_distance: 2,
            confidence: ConfidenceBands::default(),
            retry: RetryPolicy::default(),
            census: CensusConfig::default(),
            max_concurrent_requests: 4,
            worker_threads: 0,
        }
    }
}

impl Config {
    /// Load a config from a JSON file; absent fields take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open config file: {}", path.display()))?;
        serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }
}

mod secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(deserializer)?))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn defaults_match_documented_policy() {
        let config = Config::default();
        assert_eq!(config.retry.rate_limit_wait, Duration::from_secs(60));
        assert_eq!(config.retry.server_error_max_retries, 3);
        assert_eq!(config.retry.timeout_wait, Duration::from_secs(15));
        assert_eq!(config.confidence.band(GeoType::Precinct), (0.6, 0.8));
        assert_eq!(config.confidence.band(GeoType::Island), (1.0, 1.0));
        assert_eq!(config.fuzzy_max_distance, 2);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"source_epsg": 32161, "retry": {{"rate_limit_wait": 5}}, "census": {{"year": 2020}}}}"#).unwrap();

        let config = Config::from_json_file(file.path()).unwrap();
        assert_eq!(config.source_epsg, 32161);
        assert_eq!(config.retry.rate_limit_wait, Duration::from_secs(5));
        assert_eq!(config.retry.server_error_wait, Duration::from_secs(30));
        assert_eq!(config.census.year, 2020);
        assert_eq!(config.census.dataset, "acs/acs5");
    }
}
