use serde::{Deserialize, Serialize};

use crate::types::GeoId;

/// How an estimate was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimateMethod {
    /// Area-weighted aggregation of overlapping tracts.
    Interpolated,
    /// Values copied from a matching Census geography.
    Direct,
    /// Unit lacked geometry; values taken from its municipality.
    Degraded,
}

/// One variable's value on one electoral unit.
///
/// Serializes to the per-level demographic artifact record. `source_tracts` and
/// `weights` are parallel and ordered by GEOID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemographicEstimate {
    pub unit_code: String,
    pub variable: String,
    pub value: Option<f64>,
    pub margin_of_error: Option<f64>,
    #[serde(rename = "interpolation_confidence")]
    pub confidence: f64,
    #[serde(rename = "census_tracts_used")]
    pub source_tracts: Vec<GeoId>,
    #[serde(rename = "interpolation_weights")]
    pub weights: Vec<f64>,
    #[serde(skip)]
    pub method: Option<EstimateMethod>,
    /// Contributing geographies whose cell was suppressed.
    #[serde(skip)]
    pub suppressed: Vec<GeoId>,
}

impl DemographicEstimate {
    #[inline] pub fn is_null(&self) -> bool { self.value.is_none() }
}
