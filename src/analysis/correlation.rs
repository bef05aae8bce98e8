use anyhow::{Context, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, StudentsT};

/// Fewest paired observations for which a coefficient is reported.
const MIN_SAMPLE: usize = 3;

/// Association between one electoral metric and one census variable.
///
/// `degenerate` marks a pair that could not be measured (too few rows or a constant
/// column); coefficient and p-value are then null.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationResult {
    pub electoral_metric: String,
    pub census_variable: String,
    pub coefficient: Option<f64>,
    pub p_value: Option<f64>,
    pub sample_size: usize,
    pub degenerate: bool,
}

/// Pearson correlation over a joined electoral/census table.
#[derive(Debug, Clone, Copy, Default)]
pub struct CorrelationAnalyzer;

impl CorrelationAnalyzer {
    /// Correlate `electoral_metric` against each of `census_variables`, using only rows
    /// where both columns are non-null.
    pub fn correlate(&self, df: &DataFrame, electoral_metric: &str, census_variables: &[&str]) -> Result<Vec<CorrelationResult>> {
        let metric = float_column(df, electoral_metric)?;

        census_variables.iter()
            .map(|&variable| {
                let values = float_column(df, variable)?;
                let pairs = metric.iter().zip(&values)
                    .filter_map(|(x, y)| Some((x.filter(|v| v.is_finite())?, y.filter(|v| v.is_finite())?)))
                    .collect::<Vec<_>>();
                Ok(pearson(electoral_metric, variable, &pairs))
            })
            .collect()
    }
}

/// A numeric column as nullable floats.
fn float_column(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let column = df.column(name)
        .with_context(|| format!("joined table has no column {name:?}"))?
        .cast(&DataType::Float64)
        .with_context(|| format!("column {name:?} is not numeric"))?;
    Ok(column.f64()?.into_iter().collect())
}

/// Pearson's r with a two-sided p-value from Student's t on n − 2 degrees of freedom.
pub(crate) fn pearson(electoral_metric: &str, census_variable: &str, pairs: &[(f64, f64)]) -> CorrelationResult {
    let n = pairs.len();
    let mut result = CorrelationResult {
        electoral_metric: electoral_metric.to_string(),
        census_variable: census_variable.to_string(),
        coefficient: None,
        p_value: None,
        sample_size: n,
        degenerate: true,
    };
    if n < MIN_SAMPLE {
        return result;
    }

    let nf = n as f64;
    let mean_x = pairs.iter().map(|p| p.0).sum::<f64>() / nf;
    let mean_y = pairs.iter().map(|p| p.1).sum::<f64>() / nf;
    let (mut sxx, mut syy, mut sxy) = (0.0, 0.0, 0.0);
    let (mut raw_xx, mut raw_yy) = (0.0, 0.0);
    for &(x, y) in pairs {
        let (dx, dy) = (x - mean_x, y - mean_y);
        sxx += dx * dx;
        syy += dy * dy;
        sxy += dx * dy;
        raw_xx += x * x;
        raw_yy += y * y;
    }

    // Spread indistinguishable from rounding error relative to the column's own scale.
    let flat = |ss: f64, raw: f64| ss <= f64::EPSILON * raw;
    if flat(sxx, raw_xx) || flat(syy, raw_yy) {
        return result;
    }

    let r = (sxy / (sxx.sqrt() * syy.sqrt())).clamp(-1.0, 1.0);
    let dof = nf - 2.0;
    let p = if 1.0 - r * r <= f64::EPSILON {
        0.0
    } else {
        let t = r * (dof / (1.0 - r * r)).sqrt();
        StudentsT::new(0.0, 1.0, dof)
            .map(|dist| 2.0 * (1.0 - dist.cdf(t.abs())))
            .unwrap_or(f64::NAN)
    };

    result.coefficient = Some(r);
    result.p_value = p.is_finite().then(|| p.clamp(0.0, 1.0));
    result.degenerate = false;
    result
}
