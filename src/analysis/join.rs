use std::collections::{BTreeMap, BTreeSet};

use ahash::AHashMap;
use anyhow::{Context, Result};
use polars::prelude::*;

use crate::{
    census::{derive_metrics, TractTable},
    interpolate::DemographicEstimate,
    names::MunicipalityCrosswalk,
    types::GeoId,
};

/// Column added by [`prepare_electoral`] holding the canonical municipality key.
pub const NORMALIZED_COLUMN: &str = "municipality_normalized";
/// Column added by [`prepare_electoral`] holding the county GEOID.
pub const GEOID_COLUMN: &str = "geoid";

/// Sum `value_col` up to municipalities, optionally keeping extra grouping columns
/// (e.g. candidate, party). Grouping columns absent from `df` are skipped with a warning.
pub fn aggregate_by_municipality(df: &DataFrame, value_col: &str, group_cols: &[&str], municipality_col: &str) -> Result<DataFrame> {
    let names = df.get_column_names_str();
    let (present, absent): (Vec<&str>, Vec<&str>) = std::iter::once(municipality_col)
        .chain(group_cols.iter().copied())
        .partition(|c| names.contains(c));
    if !absent.is_empty() {
        tracing::warn!(missing = ?absent, "group columns not found");
    }
    if !names.contains(&value_col) {
        anyhow::bail!("electoral table has no column {value_col:?}");
    }

    df.clone().lazy()
        .group_by_stable(present.iter().map(|&c| col(c)).collect::<Vec<_>>())
        .agg([col(value_col).sum()])
        .collect()
        .context("failed to aggregate electoral rows by municipality")
}

/// Add [`NORMALIZED_COLUMN`] and [`GEOID_COLUMN`] to an electoral table.
/// Names the crosswalk cannot resolve get nulls and are logged once each.
pub fn prepare_electoral(df: &DataFrame, municipality_col: &str, crosswalk: &MunicipalityCrosswalk) -> Result<DataFrame> {
    let names = df.column(municipality_col)
        .with_context(|| format!("electoral table has no column {municipality_col:?}"))?
        .cast(&DataType::String)?;

    let mut normalized = Vec::with_capacity(df.height());
    let mut geoids = Vec::with_capacity(df.height());
    let mut unmatched = BTreeMap::<&str, usize>::new();

    for name in names.str()? {
        let resolved = name.and_then(|name| match crosswalk.names().resolve(name) {
            Ok(m) => Some(m),
            Err(_) => {
                *unmatched.entry(name).or_default() += 1;
                None
            }
        });
        normalized.push(resolved.map(|m| m.key.as_str()));
        geoids.push(resolved.map(|m| format!("{}{}", crate::types::PR_STATE_FIPS, m.county_fips)));
    }

    if !unmatched.is_empty() {
        tracing::warn!(names = ?unmatched.keys().collect::<Vec<_>>(), "unmatched municipality names");
    }

    let mut out = df.clone();
    out.with_column(Series::new(NORMALIZED_COLUMN.into(), normalized))?;
    out.with_column(Series::new(GEOID_COLUMN.into(), geoids))?;
    Ok(out)
}

/// Widen estimates to one column per variable and attach them to `electoral` by
/// matching `unit_col` against `unit_code`. Row order of `electoral` is kept; units
/// without estimates get nulls.
pub fn join_estimates(electoral: &DataFrame, unit_col: &str, estimates: &[DemographicEstimate]) -> Result<DataFrame> {
    let mut by_variable = BTreeMap::<&str, AHashMap<&str, Option<f64>>>::new();
    for estimate in estimates {
        by_variable.entry(estimate.variable.as_str())
            .or_default()
            .insert(estimate.unit_code.as_str(), estimate.value);
    }

    let units = electoral.column(unit_col)
        .with_context(|| format!("electoral table has no column {unit_col:?}"))?
        .cast(&DataType::String)?;
    let units = units.str()?.into_iter().collect::<Vec<_>>();

    let mut out = electoral.clone();
    for (variable, values) in by_variable {
        let column = units.iter()
            .map(|unit| unit.and_then(|unit| values.get(unit).copied().flatten()))
            .collect::<Vec<_>>();
        out.with_column(Series::new(variable.into(), column))
            .with_context(|| format!("failed to attach estimates for {variable:?}"))?;
    }
    Ok(out)
}

/// Attach municipality-level Census values to electoral rows.
///
/// Runs [`prepare_electoral`], then adds one column per variable looked up by the
/// county GEOID in [`GEOID_COLUMN`]. Derived percentages are computed from the
/// table's counts first. Variables the table never carries are skipped with a
/// warning; rows with an unmatched municipality or a suppressed cell get nulls.
pub fn join_census(
    electoral: &DataFrame,
    census: &TractTable,
    variables: &[&str],
    municipality_col: &str,
    crosswalk: &MunicipalityCrosswalk,
) -> Result<DataFrame> {
    let mut census = census.clone();
    derive_metrics(&mut census);

    let carried = census.geoids()
        .filter_map(|geoid| census.row(geoid))
        .flat_map(|row| row.keys().map(String::as_str))
        .collect::<BTreeSet<_>>();
    let (available, absent): (Vec<&str>, Vec<&str>) = variables.iter().copied().partition(|v| carried.contains(v));
    if !absent.is_empty() {
        tracing::warn!(missing = ?absent, "census variables not found");
    }

    let mut out = prepare_electoral(electoral, municipality_col, crosswalk)?;
    let geoids = out.column(GEOID_COLUMN)?
        .str()?
        .into_iter()
        .map(|geoid| geoid.and_then(|id| GeoId::parse(id).ok()))
        .collect::<Vec<_>>();

    for &variable in &available {
        let column = geoids.iter()
            .map(|geoid| geoid.as_ref().and_then(|geoid| census.get(geoid, variable).value))
            .collect::<Vec<_>>();
        out.with_column(Series::new(variable.into(), column))
            .with_context(|| format!("failed to attach census column {variable:?}"))?;
    }

    tracing::info!(rows = out.height(), variables = available.len(), "joined electoral rows with census data");
    Ok(out)
}

/// Optional municipality roll-up applied before the census join.
#[derive(Debug, Clone, Copy)]
pub struct Aggregation<'a> {
    pub value_col: &'a str,
    pub group_cols: &'a [&'a str],
}

/// Aggregate (optionally), join with Census values and log municipality coverage.
pub fn create_analysis_dataset(
    electoral: &DataFrame,
    census: &TractTable,
    variables: &[&str],
    municipality_col: &str,
    aggregation: Option<Aggregation>,
    crosswalk: &MunicipalityCrosswalk,
) -> Result<DataFrame> {
    let rows = match aggregation {
        Some(agg) => aggregate_by_municipality(electoral, agg.value_col, agg.group_cols, municipality_col)?,
        None => electoral.clone(),
    };
    let joined = join_census(&rows, census, variables, municipality_col, crosswalk)?;

    let names = joined.column(municipality_col)?.cast(&DataType::String)?;
    let names = names.str()?.into_iter().flatten().collect::<BTreeSet<_>>().into_iter().collect::<Vec<_>>();
    let report = crosswalk.validate_coverage(&names);

    tracing::info!(coverage_pct = report.coverage_pct, "analysis dataset created");
    if !report.unmatched_input.is_empty() {
        tracing::warn!(names = ?report.unmatched_input, "unmatched municipalities");
    }
    Ok(joined)
}
