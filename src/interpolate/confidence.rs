use crate::{config::ConfidenceBands, geom::TractWeight, types::GeoType};

/// Share of a unit's area that must fall in one tract for the unit to count as contained.
const CONTAINED_SHARE: f64 = 1.0 - 1e-6;

/// True when a unit lies entirely inside a single tract.
pub fn is_contained(weights: &[TractWeight]) -> bool {
    matches!(weights, [only] if only.share >= CONTAINED_SHARE)
}

/// Assigns a confidence to an estimate from its level and weight distribution.
#[derive(Debug, Clone, Copy)]
pub struct ConfidenceScorer<'c> {
    bands: &'c ConfidenceBands,
}

impl<'c> ConfidenceScorer<'c> {
    pub fn new(bands: &'c ConfidenceBands) -> Self {
        Self { bands }
    }

    #[inline] pub fn bands(&self) -> &'c ConfidenceBands { self.bands }

    /// Base confidence in `[0, 1]`.
    ///
    /// Island, district and municipality levels are fixed. Precincts and units map the
    /// largest overlap weight (fraction of a tract's area covered) linearly into their
    /// band. A unit contained in one tract scores 1.
    pub fn score(&self, ty: GeoType, weights: &[TractWeight]) -> f64 {
        let (lo, hi) = self.bands.band(ty);
        if lo == hi {
            return lo.clamp(0.0, 1.0);
        }
        if is_contained(weights) {
            return 1.0;
        }

        let concentration = weights.iter()
            .map(|w| w.weight)
            .fold(0.0, f64::max)
            .clamp(0.0, 1.0);
        (lo + (hi - lo) * concentration).clamp(lo.min(hi), lo.max(hi))
    }

    /// Apply suppression: scale by the fraction of weight that had data, and cap when
    /// more than half of the contributing tracts were suppressed.
    pub fn adjust_for_suppression(&self, base: f64, present_weight: f64, total_weight: f64, suppressed: usize, contributing: usize) -> f64 {
        let mut confidence = if total_weight > 0.0 { base * (present_weight / total_weight).clamp(0.0, 1.0) } else { base };
        if suppressed * 2 > contributing {
            confidence = confidence.min(self.bands.suppressed_majority_cap);
        }
        confidence
    }
}
