use std::collections::{BTreeMap, BTreeSet};

use anyhow::{Context, Result};
use geo::{Area, BooleanOps, BoundingRect, MultiPolygon};
use rayon::prelude::*;
use serde::Serialize;

use crate::{
    census::CensusTract,
    config::Config,
    error::Error,
    types::{GeoId, GeographicUnit},
};

use super::{bbox::envelope_of, geom::{union_bounds, Geometries}, proj::EqualAreaProjection};

/// Intersections smaller than this fraction of the tract are boundary noise.
const MIN_RELATIVE_OVERLAP: f64 = 1e-12;

/// Overlap of one electoral unit with one tract.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TractWeight {
    pub geoid: GeoId,
    /// area(unit ∩ tract) / area(tract)
    pub weight: f64,
    /// area(unit ∩ tract) / area(unit)
    pub share: f64,
}

impl TractWeight {
    pub fn new(geoid: GeoId, weight: f64, share: f64) -> Self {
        Self { geoid, weight, share }
    }
}

/// Flattened `(precinct_code, tract_geoid) -> weight` record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverlapWeight {
    pub precinct_code: String,
    pub tract_geoid: GeoId,
    pub weight: f64,
}

/// Result of an overlap run: weights per unit code, plus units that had no geometry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OverlapWeights {
    by_unit: BTreeMap<String, Vec<TractWeight>>,
    missing: BTreeSet<String>,
}

impl OverlapWeights {
    /// Build directly from per-unit weights (e.g. a precomputed relationship file).
    pub fn from_units(by_unit: BTreeMap<String, Vec<TractWeight>>) -> Self {
        Self { by_unit, missing: BTreeSet::new() }
    }

    /// Weights for a unit, sorted by GEOID. Empty when the unit overlaps no tract.
    /// Fails with `MissingGeometry` for units that had no boundary.
    pub fn weights_for(&self, code: &str) -> crate::error::Result<&[TractWeight]> {
        if self.missing.contains(code) {
            return Err(Error::MissingGeometry { unit_code: code.to_string() });
        }
        Ok(self.by_unit.get(code).map(Vec::as_slice).unwrap_or_default())
    }

    /// Codes of units with no geometry, in order.
    pub fn missing_geometry(&self) -> impl Iterator<Item = &str> {
        self.missing.iter().map(String::as_str)
    }

    /// Number of units with computed weights (possibly empty).
    #[inline] pub fn len(&self) -> usize { self.by_unit.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.by_unit.is_empty() }

    /// Every non-empty overlap as a flat record.
    pub fn iter(&self) -> impl Iterator<Item = OverlapWeight> + '_ {
        self.by_unit.iter().flat_map(|(code, weights)| {
            weights.iter().map(move |w| OverlapWeight {
                precinct_code: code.clone(),
                tract_geoid: w.geoid.clone(),
                weight: w.weight,
            })
        })
    }

    /// Σ over units of each tract's weight; ≈1 for a tract fully covered by a disjoint partition.
    pub fn tract_totals(&self) -> BTreeMap<GeoId, f64> {
        let mut totals = BTreeMap::new();
        for w in self.by_unit.values().flatten() {
            *totals.entry(w.geoid.clone()).or_insert(0.0) += w.weight;
        }
        totals
    }
}

/// Computes unit ↔ tract areal overlap weights with an R-tree over tract boxes.
#[derive(Debug, Clone, Copy)]
pub struct OverlapEngine<'c> {
    config: &'c Config,
}

impl<'c> OverlapEngine<'c> {
    pub fn new(config: &'c Config) -> Self {
        Self { config }
    }

    /// Compute overlap weights for every unit against every tract it touches.
    ///
    /// Units without geometry get no weights and are reported through
    /// [`OverlapWeights::weights_for`] as `MissingGeometry`.
    pub fn compute_weights(&self, units: &[GeographicUnit], tracts: &[CensusTract]) -> Result<OverlapWeights> {
        let mut missing = BTreeSet::new();
        let mut located = Vec::with_capacity(units.len());
        for unit in units {
            match &unit.geometry {
                Some(shape) if !shape.0.is_empty() => located.push((unit.code.as_str(), shape)),
                _ => {
                    tracing::warn!(unit = %unit.code, level = %unit.ty, "unit has no geometry; no overlap weights");
                    missing.insert(unit.code.clone());
                }
            }
        }

        let (unit_shapes, tract_shapes) = self.equal_area(
            located.iter().map(|&(_, shape)| shape),
            tracts.iter().map(|tract| &tract.geometry),
        )?;

        let tract_geoms = Geometries::new(tract_shapes);
        let tract_areas = tract_geoms.areas();

        let compute = || {
            located.par_iter()
                .zip(unit_shapes.par_iter())
                .map(|(&(code, _), shape)| {
                    (code.to_string(), Self::unit_weights(shape, &tract_geoms, &tract_areas, tracts))
                })
                .collect::<Vec<_>>()
        };

        let computed = if self.config.worker_threads > 0 {
            rayon::ThreadPoolBuilder::new()
                .num_threads(self.config.worker_threads)
                .build()
                .context("failed to build overlap worker pool")?
                .install(compute)
        } else {
            compute()
        };

        let mut by_unit = BTreeMap::new();
        for (code, weights) in computed {
            if by_unit.insert(code.clone(), weights).is_some() {
                return Err(Error::InvalidInput(format!("duplicate unit code: {code}")).into());
            }
        }

        tracing::info!(
            units = by_unit.len(),
            tracts = tracts.len(),
            pairs = by_unit.values().map(Vec::len).sum::<usize>(),
            missing = missing.len(),
            "computed overlap weights",
        );

        Ok(OverlapWeights { by_unit, missing })
    }

    /// Weights of one unit against candidate tracts from the R-tree.
    fn unit_weights(
        shape: &MultiPolygon<f64>,
        tract_geoms: &Geometries,
        tract_areas: &[f64],
        tracts: &[CensusTract],
    ) -> Vec<TractWeight> {
        let Some(rect) = shape.bounding_rect() else { return Vec::new() };
        let unit_area = shape.unsigned_area();
        let envelope = envelope_of(&rect);

        let mut weights = tract_geoms.query(&envelope)
            .filter(|&j| tract_areas[j] > 0.0)
            .filter_map(|j| {
                let overlap = shape.intersection(&tract_geoms.shapes()[j]).unsigned_area();
                (overlap > tract_areas[j] * MIN_RELATIVE_OVERLAP).then(|| TractWeight {
                    geoid: tracts[j].geoid.clone(),
                    weight: (overlap / tract_areas[j]).min(1.0),
                    share: if unit_area > 0.0 { (overlap / unit_area).min(1.0) } else { 0.0 },
                })
            })
            .collect::<Vec<_>>();

        weights.sort_by(|a, b| a.geoid.cmp(&b.geoid));
        weights
    }

    /// Bring unit and tract shapes into one equal-area planar frame.
    fn equal_area<'s>(
        &self,
        units: impl Iterator<Item = &'s MultiPolygon<f64>>,
        tracts: impl Iterator<Item = &'s MultiPolygon<f64>>,
    ) -> Result<(Vec<MultiPolygon<f64>>, Vec<MultiPolygon<f64>>)> {
        let units = units.collect::<Vec<_>>();
        let tracts = tracts.collect::<Vec<_>>();

        if self.config.projected_input {
            return Ok((
                units.into_iter().cloned().collect(),
                tracts.into_iter().cloned().collect(),
            ));
        }

        let Some(bounds) = union_bounds(units.iter().chain(&tracts).filter_map(|shape| shape.bounding_rect())) else {
            return Ok((Vec::new(), tracts.into_iter().cloned().collect()));
        };
        let projection = EqualAreaProjection::centered_on(bounds, self.config.source_epsg)?;

        let project_all = |shapes: Vec<&MultiPolygon<f64>>| -> Result<Vec<MultiPolygon<f64>>> {
            shapes.into_iter().map(|shape| projection.project(shape)).collect()
        };
        Ok((project_all(units)?, project_all(tracts)?))
    }
}
