use crate::{
    census::{CensusValue, TractTable, VariableKind},
    config::ConfidenceBands,
    geom::TractWeight,
    types::{GeoId, GeographicUnit},
};

use super::{
    confidence::ConfidenceScorer,
    estimate::{DemographicEstimate, EstimateMethod},
};

/// Variable holding total population, used to apportion counts to degraded units.
const POPULATION_VARIABLE: &str = "total_population";

/// Aggregates tract variables onto electoral units.
///
/// Values are `Σ w·v` with margins `sqrt(Σ w²·moe²)` under independent errors.
/// Rate variables are renormalized by the weight that had data so they stay a weighted
/// average; counts are not, since a partial tract only contributes part of its people.
#[derive(Debug, Clone, Copy)]
pub struct DemographicInterpolator<'c> {
    scorer: ConfidenceScorer<'c>,
}

impl<'c> DemographicInterpolator<'c> {
    pub fn new(bands: &'c ConfidenceBands) -> Self {
        Self { scorer: ConfidenceScorer::new(bands) }
    }

    #[inline] pub fn scorer(&self) -> &ConfidenceScorer<'c> { &self.scorer }

    /// Estimate `variable` for `unit` from its overlap weights.
    pub fn interpolate(
        &self,
        unit: &GeographicUnit,
        weights: &[TractWeight],
        table: &TractTable,
        variable: &str,
        kind: VariableKind,
    ) -> DemographicEstimate {
        let mut estimate = DemographicEstimate {
            unit_code: unit.code.clone(),
            variable: variable.to_string(),
            value: None,
            margin_of_error: None,
            confidence: 0.0,
            source_tracts: Vec::new(),
            weights: Vec::new(),
            method: Some(EstimateMethod::Interpolated),
            suppressed: Vec::new(),
        };
        if weights.is_empty() {
            return estimate;
        }

        let base = self.scorer.score(unit.ty, weights);

        let mut present = Vec::with_capacity(weights.len());
        for w in weights {
            let cell = table.get(&w.geoid, variable);
            match cell.value {
                Some(_) => present.push((w, cell)),
                None => estimate.suppressed.push(w.geoid.clone()),
            }
        }

        let total_weight = weights.iter().map(|w| w.weight).sum::<f64>();
        let present_weight = present.iter().map(|(w, _)| w.weight).sum::<f64>();
        estimate.confidence = self.scorer.adjust_for_suppression(
            base, present_weight, total_weight, estimate.suppressed.len(), weights.len(),
        );

        // For rates this also makes a unit inside one tract take that tract's value exactly.
        let norm = match kind {
            VariableKind::Rate => present_weight,
            VariableKind::Count => 1.0,
        };
        if present.is_empty() || norm <= 0.0 {
            return estimate;
        }

        let mut value = 0.0;
        let mut moe_sq = 0.0;
        for (w, cell) in &present {
            let scaled = w.weight / norm;
            value += scaled * cell.value.unwrap_or_default();
            moe_sq += scaled * scaled * cell.margin_of_error.unwrap_or_default().powi(2);
        }

        estimate.value = Some(value);
        estimate.margin_of_error = Some(moe_sq.sqrt());
        estimate.source_tracts = present.iter().map(|(w, _)| w.geoid.clone()).collect();
        estimate.weights = present.iter().map(|(w, _)| w.weight).collect();
        estimate
    }

    /// Copy `variable` from the Census geography matching `unit` (island or municipality).
    pub fn direct_match(&self, unit: &GeographicUnit, geoid: &GeoId, table: &TractTable, variable: &str) -> DemographicEstimate {
        let cell = table.get(geoid, variable);
        self.single_source(unit, geoid, variable, cell, 1.0, 1.0, EstimateMethod::Direct)
    }

    /// Fallback for a unit without geometry: take its municipality's values.
    ///
    /// Rates carry over unchanged. Counts are apportioned by the unit's share of the
    /// municipal population and are null when that share is unknown.
    pub fn degraded(
        &self,
        unit: &GeographicUnit,
        municipality: &GeoId,
        table: &TractTable,
        variable: &str,
        kind: VariableKind,
    ) -> DemographicEstimate {
        let confidence = self.scorer.bands().degraded;
        let cell = table.get(municipality, variable);

        let share = match kind {
            VariableKind::Rate => Some(1.0),
            VariableKind::Count => {
                let total = table.get(municipality, POPULATION_VARIABLE).value.filter(|&p| p > 0.0);
                unit.population.zip(total).map(|(p, total)| (p / total).clamp(0.0, 1.0))
            }
        };

        match share {
            Some(share) => self.single_source(unit, municipality, variable, cell, share, confidence, EstimateMethod::Degraded),
            None => {
                let mut estimate = self.single_source(unit, municipality, variable, CensusValue::suppressed(), 1.0, confidence, EstimateMethod::Degraded);
                estimate.suppressed.clear();
                estimate.confidence = confidence.min(self.scorer.bands().suppressed_majority_cap);
                estimate
            }
        }
    }

    /// An estimate fed by one Census geography scaled by `share`.
    fn single_source(
        &self,
        unit: &GeographicUnit,
        geoid: &GeoId,
        variable: &str,
        cell: CensusValue,
        share: f64,
        confidence: f64,
        method: EstimateMethod,
    ) -> DemographicEstimate {
        let suppressed = cell.is_suppressed();
        DemographicEstimate {
            unit_code: unit.code.clone(),
            variable: variable.to_string(),
            value: cell.value.map(|v| v * share),
            margin_of_error: cell.margin_of_error.map(|m| m * share),
            confidence: if suppressed { confidence.min(self.scorer.bands().suppressed_majority_cap) } else { confidence },
            source_tracts: if suppressed { Vec::new() } else { vec![geoid.clone()] },
            weights: if suppressed { Vec::new() } else { vec![share] },
            method: Some(method),
            suppressed: if suppressed { vec![geoid.clone()] } else { Vec::new() },
        }
    }
}
