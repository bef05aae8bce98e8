use std::collections::{BTreeMap, HashMap};

use geo::MultiPolygon;
use serde::{Deserialize, Serialize};

use crate::types::GeoId;

/// Census sentinel codes (-666666666 etc.) all sit at or below this value.
const SENTINEL_CEILING: f64 = -111_111_111.0;

/// One published estimate cell. `None` marks a suppressed or unavailable cell.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CensusValue {
    pub value: Option<f64>,
    pub margin_of_error: Option<f64>,
}

impl CensusValue {
    pub fn new(value: f64, margin_of_error: f64) -> Self {
        Self::from_raw(Some(value), Some(margin_of_error))
    }

    pub fn suppressed() -> Self {
        Self { value: None, margin_of_error: None }
    }

    /// Build a cell from raw API numbers, mapping Census sentinels and NaN to `None`.
    pub fn from_raw(value: Option<f64>, margin_of_error: Option<f64>) -> Self {
        fn clean(x: Option<f64>) -> Option<f64> {
            x.filter(|v| v.is_finite() && *v > SENTINEL_CEILING)
        }
        let value = clean(value);
        Self {
            value,
            // A sentinel MOE on a published value means "not computable"; treat as zero spread.
            margin_of_error: value.map(|_| clean(margin_of_error).map_or(0.0, f64::abs)),
        }
    }

    #[inline] pub fn is_suppressed(&self) -> bool { self.value.is_none() }
}

/// Variable name -> cell for one geography.
pub type Variables = BTreeMap<String, CensusValue>;

/// A Census tract with its boundary and variable cells.
#[derive(Debug, Clone, PartialEq)]
pub struct CensusTract {
    pub geoid: GeoId,
    pub geometry: MultiPolygon<f64>,
    pub variables: Variables,
}

impl CensusTract {
    pub fn new(geoid: GeoId, geometry: MultiPolygon<f64>) -> Self {
        Self { geoid, geometry, variables: Variables::new() }
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: CensusValue) -> Self {
        self.variables.insert(name.into(), value);
        self
    }
}

/// Variable cells keyed by GEOID, at any Census level (tract, county, island).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TractTable {
    rows: HashMap<GeoId, Variables>,
}

impl TractTable {
    pub fn new() -> Self { Self::default() }

    pub fn from_tracts(tracts: &[CensusTract]) -> Self {
        Self {
            rows: tracts.iter()
                .map(|tract| (tract.geoid.clone(), tract.variables.clone()))
                .collect(),
        }
    }

    #[inline] pub fn len(&self) -> usize { self.rows.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.rows.is_empty() }

    pub fn insert(&mut self, geoid: GeoId, variable: impl Into<String>, value: CensusValue) {
        self.rows.entry(geoid).or_default().insert(variable.into(), value);
    }

    pub fn row(&self, geoid: &GeoId) -> Option<&Variables> {
        self.rows.get(geoid)
    }

    /// The cell for (geoid, variable); a missing row or column reads as suppressed.
    pub fn get(&self, geoid: &GeoId, variable: &str) -> CensusValue {
        self.rows.get(geoid)
            .and_then(|row| row.get(variable))
            .copied()
            .unwrap_or_default()
    }

    pub fn geoids(&self) -> impl Iterator<Item = &GeoId> {
        self.rows.keys()
    }

    /// Union with `other`; cells in `other` win on conflict.
    pub fn merge(&mut self, other: TractTable) {
        for (geoid, row) in other.rows {
            self.rows.entry(geoid).or_default().extend(row);
        }
    }

    /// Copy cells onto matching tracts' variable maps.
    pub fn attach_to(&self, tracts: &mut [CensusTract]) {
        for tract in tracts {
            if let Some(row) = self.rows.get(&tract.geoid) {
                tract.variables.extend(row.iter().map(|(k, v)| (k.clone(), *v)));
            }
        }
    }
}
