use anyhow::{anyhow, bail, Context, Result};
use serde_json::Value;

use crate::types::GeoId;

use super::{tract::{CensusValue, TractTable}, variables::AcsVariable};

/// Geography columns the API appends, in GEOID concatenation order.
const GEO_COLUMNS: [&str; 3] = ["state", "county", "tract"];

/// Parse a Census API body (a JSON array whose first row is the header) into a table.
/// Variables are stored under their human-readable names.
pub(crate) fn parse_response(body: &str, variables: &[&AcsVariable]) -> Result<TractTable> {
    let rows: Vec<Vec<Value>> = serde_json::from_str(body)
        .context("Census response is not a JSON array of rows")?;
    let Some((header, rows)) = rows.split_first() else {
        bail!("Census response is empty");
    };

    let position = |name: &str| header.iter().position(|h| h.as_str() == Some(name));

    let geo_positions = GEO_COLUMNS.iter().filter_map(|&c| position(c)).collect::<Vec<_>>();
    if geo_positions.is_empty() {
        bail!("Census response has no geography columns");
    }

    let columns = variables.iter()
        .map(|&v| {
            let estimate = position(v.estimate_column().as_str())
                .ok_or_else(|| anyhow!("Census response missing column {}", v.estimate_column()))?;
            Ok::<_, anyhow::Error>((v.name, estimate, position(v.moe_column().as_str())))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut table = TractTable::new();
    for (i, row) in rows.iter().enumerate() {
        let geoid = geo_positions.iter()
            .map(|&p| row.get(p).and_then(Value::as_str).unwrap_or_default())
            .collect::<String>();
        let geoid = GeoId::parse(&geoid)
            .with_context(|| format!("bad GEOID in Census response row {}", i + 1))?;

        for &(name, estimate, moe) in &columns {
            let value = row.get(estimate).and_then(number);
            let margin = moe.and_then(|m| row.get(m)).and_then(number);
            table.insert(geoid.clone(), name, CensusValue::from_raw(value, margin));
        }
    }

    Ok(table)
}

/// Census cells arrive as strings, numbers or null.
fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
