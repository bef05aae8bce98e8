use std::collections::HashSet;

use anyhow::Result;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{
    census::{derive_metrics, kind_of, CensusTract, TractTable, ACS_VARIABLES, DERIVED_METRICS},
    config::Config,
    error::{Error, SuppressedCell},
    geom::{OverlapEngine, OverlapWeights},
    interpolate::{is_contained, DemographicEstimate, DemographicInterpolator, EstimateMethod},
    names::MunicipalityCrosswalk,
    types::{GeoId, GeoType, GeographicUnit},
};

/// Per-level counts reported with every run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub level: GeoType,
    pub units: usize,
    pub interpolated: usize,
    pub direct: usize,
    pub degraded: usize,
    pub suppressed_cells: usize,
}

/// Output of one (event, level) batch.
#[derive(Debug, Clone)]
pub struct LevelRun {
    pub estimates: Vec<DemographicEstimate>,
    pub suppressed: Vec<SuppressedCell>,
    pub summary: RunSummary,
}

/// Runs the cross-reference data flow for one geographic level at a time.
pub struct Pipeline<'a> {
    config: &'a Config,
    crosswalk: MunicipalityCrosswalk<'a>,
    variables: Vec<String>,
}

impl<'a> Pipeline<'a> {
    /// A pipeline estimating every catalogued ACS variable and derived percentage.
    pub fn new(config: &'a Config, crosswalk: MunicipalityCrosswalk<'a>) -> Self {
        let variables = ACS_VARIABLES.iter().map(|v| v.name)
            .chain(DERIVED_METRICS.iter().map(|m| m.name))
            .map(str::to_string)
            .collect();
        Self { config, crosswalk, variables }
    }

    /// Restrict the run to `variables` (catalogue names or derived metric names).
    pub fn with_variables<S: Into<String>>(mut self, variables: impl IntoIterator<Item = S>) -> Self {
        self.variables = variables.into_iter().map(Into::into).collect();
        self
    }

    #[inline] pub fn variables(&self) -> &[String] { &self.variables }

    /// Estimate every variable for every unit of one level.
    ///
    /// `tracts` carry tract geometry and cells; `census_areas` holds county and island
    /// rows used by direct matches and by the municipality fallback for units that have
    /// no geometry.
    pub fn run_level(&self, level: GeoType, units: &[GeographicUnit], tracts: &[CensusTract], census_areas: &TractTable) -> Result<LevelRun> {
        if let Some(unit) = units.iter().find(|unit| unit.ty != level) {
            return Err(Error::InvalidInput(format!("unit {} is a {}, expected {level}", unit.code, unit.ty)).into());
        }

        let mut tract_table = TractTable::from_tracts(tracts);
        derive_metrics(&mut tract_table);
        let mut area_table = census_areas.clone();
        derive_metrics(&mut area_table);

        let interpolator = DemographicInterpolator::new(&self.config.confidence);

        let per_unit = if level.is_direct_match() {
            units.par_iter()
                .map(|unit| {
                    let geoid = self.census_geoid(unit)?;
                    Ok(self.variables.iter()
                        .map(|variable| interpolator.direct_match(unit, &geoid, &area_table, variable))
                        .collect::<Vec<_>>())
                })
                .collect::<Result<Vec<_>>>()?
        } else {
            let weights = OverlapEngine::new(self.config).compute_weights(units, tracts)?;
            units.par_iter()
                .map(|unit| self.estimate_unit(&interpolator, unit, &weights, &tract_table, &area_table))
                .collect::<Vec<_>>()
        };

        let mut summary = RunSummary { level, units: units.len(), interpolated: 0, direct: 0, degraded: 0, suppressed_cells: 0 };
        for estimates in &per_unit {
            match estimates.first().and_then(|e| e.method) {
                Some(EstimateMethod::Direct) => summary.direct += 1,
                Some(EstimateMethod::Degraded) => summary.degraded += 1,
                _ => summary.interpolated += 1,
            }
        }

        let estimates = per_unit.into_iter().flatten().collect::<Vec<_>>();
        let suppressed = suppressed_cells(&estimates);
        summary.suppressed_cells = suppressed.len();

        if !suppressed.is_empty() {
            tracing::warn!(level = %level, cells = suppressed.len(), "suppressed census cells excluded from estimates");
        }
        tracing::info!(
            level = %level,
            units = summary.units,
            interpolated = summary.interpolated,
            direct = summary.direct,
            degraded = summary.degraded,
            "level run complete",
        );

        Ok(LevelRun { estimates, suppressed, summary })
    }

    /// Interpolate one unit, falling back to its municipality when it has no geometry.
    fn estimate_unit(
        &self,
        interpolator: &DemographicInterpolator,
        unit: &GeographicUnit,
        weights: &OverlapWeights,
        tract_table: &TractTable,
        area_table: &TractTable,
    ) -> Vec<DemographicEstimate> {
        match weights.weights_for(&unit.code) {
            Ok(unit_weights) => {
                let contained = is_contained(unit_weights);
                self.variables.iter()
                    .map(|variable| {
                        let mut estimate = interpolator.interpolate(unit, unit_weights, tract_table, variable, kind_of(variable));
                        if contained {
                            estimate.method = Some(EstimateMethod::Direct);
                        }
                        estimate
                    })
                    .collect()
            }
            Err(err) => {
                let municipality = self.municipality_geoid(unit);
                match &municipality {
                    Ok(geoid) => tracing::warn!(unit = %unit.code, municipality = %geoid, "{err}; using municipality values"),
                    Err(resolve) => tracing::warn!(unit = %unit.code, "{err}; no municipality fallback: {resolve}"),
                }
                self.variables.iter()
                    .map(|variable| match &municipality {
                        Ok(geoid) => interpolator.degraded(unit, geoid, area_table, variable, kind_of(variable)),
                        Err(_) => DemographicEstimate {
                            unit_code: unit.code.clone(),
                            variable: variable.clone(),
                            value: None,
                            margin_of_error: None,
                            confidence: 0.0,
                            source_tracts: Vec::new(),
                            weights: Vec::new(),
                            method: Some(EstimateMethod::Degraded),
                            suppressed: Vec::new(),
                        },
                    })
                    .collect()
            }
        }
    }

    /// Census geography coinciding with a direct-match unit.
    fn census_geoid(&self, unit: &GeographicUnit) -> crate::error::Result<GeoId> {
        match unit.ty {
            GeoType::Island => Ok(GeoId::island()),
            _ => self.municipality_geoid(unit),
        }
    }

    /// County GEOID of the municipality a unit is, or lies in.
    ///
    /// Tries FIPS codes first (own code for municipalities, `parent_code`, a `127-01`
    /// style code prefix), then names through the crosswalk.
    fn municipality_geoid(&self, unit: &GeographicUnit) -> crate::error::Result<GeoId> {
        let table = self.crosswalk.names().table();
        let is_municipality = unit.ty == GeoType::Municipality;

        let own = is_municipality.then_some(unit.code.as_str());
        let prefix = unit.code.split_once(['-', '_']).map(|(head, _)| head).filter(|head| head.len() == 3);
        for fips in [own, unit.parent_code.as_deref(), prefix].into_iter().flatten() {
            if let Some(m) = table.by_fips(fips) {
                return GeoId::county(&m.county_fips);
            }
        }

        let names = if is_municipality {
            [unit.name_es.as_deref(), unit.name_en.as_deref(), Some(unit.code.as_str())]
        } else {
            [unit.parent_code.as_deref(), None, None]
        };
        let mut last_err = None;
        for name in names.into_iter().flatten() {
            match self.crosswalk.get_geoid(name) {
                Ok(geoid) => return Ok(geoid),
                Err(err) => last_err = Some(err),
            }
        }
        Err(last_err.unwrap_or_else(|| Error::NameNotFound { name: unit.code.clone(), closest: None }))
    }
}

/// Distinct suppressed (geography, variable) cells behind a batch of estimates.
fn suppressed_cells(estimates: &[DemographicEstimate]) -> Vec<SuppressedCell> {
    let mut seen = HashSet::new();
    let mut cells = Vec::new();
    for estimate in estimates {
        for geoid in &estimate.suppressed {
            let cell = SuppressedCell { geoid: geoid.id().to_string(), variable: estimate.variable.clone() };
            if seen.insert(cell.clone()) {
                tracing::debug!(unit = %estimate.unit_code, "{cell}");
                cells.push(cell);
            }
        }
    }
    cells
}
