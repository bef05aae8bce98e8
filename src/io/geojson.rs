use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use geo::{Coord, LineString, MultiPolygon, Polygon};
use serde_json::{Map, Value};

use crate::{census::CensusTract, types::{GeoId, GeoType, GeographicUnit}};

/// Property names tried, in order, for a tract's GEOID.
const TRACT_ID_FIELDS: [&str; 2] = ["GEOID", "GEOID20"];

/// Read electoral units from a GeoJSON FeatureCollection file.
pub fn read_units(path: &Path) -> Result<Vec<GeographicUnit>> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read GeoJSON file: {}", path.display()))?;
    parse_units(&bytes).with_context(|| format!("Failed to parse units from {}", path.display()))
}

/// Read census tracts from a GeoJSON FeatureCollection file.
pub fn read_tracts(path: &Path) -> Result<Vec<CensusTract>> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read GeoJSON file: {}", path.display()))?;
    parse_tracts(&bytes).with_context(|| format!("Failed to parse tracts from {}", path.display()))
}

/// Parse electoral units. Properties: `code`, `unit_type`, and optionally `name_en`,
/// `name_es`, `parent_code`, `population`, `area_km2`. A null geometry is kept as `None`.
pub fn parse_units(bytes: &[u8]) -> Result<Vec<GeographicUnit>> {
    features(bytes)?.iter().enumerate()
        .map(|(i, feature)| {
            let props = properties(feature);
            let code = text(props, "code").ok_or_else(|| anyhow!("feature {i} has no code"))?;
            let ty = text(props, "unit_type")
                .ok_or_else(|| anyhow!("feature {i} ({code}) has no unit_type"))?
                .parse::<GeoType>()?;

            Ok(GeographicUnit {
                code,
                ty,
                name_en: text(props, "name_en"),
                name_es: text(props, "name_es"),
                parent_code: text(props, "parent_code"),
                geometry: parse_geometry(&feature["geometry"])
                    .with_context(|| format!("bad geometry on feature {i}"))?,
                population: props.and_then(|p| p.get("population")).and_then(Value::as_f64),
                area_km2: props.and_then(|p| p.get("area_km2")).and_then(Value::as_f64),
            })
        })
        .collect()
}

/// Parse census tracts keyed by `GEOID` (or `GEOID20`). Every tract needs a geometry.
pub fn parse_tracts(bytes: &[u8]) -> Result<Vec<CensusTract>> {
    features(bytes)?.iter().enumerate()
        .map(|(i, feature)| {
            let props = properties(feature);
            let id = TRACT_ID_FIELDS.iter()
                .find_map(|field| text(props, field))
                .ok_or_else(|| anyhow!("feature {i} has no GEOID"))?;
            let geoid = GeoId::parse(&id)?;
            let geometry = parse_geometry(&feature["geometry"])
                .with_context(|| format!("bad geometry on tract {geoid}"))?
                .ok_or_else(|| anyhow!("tract {geoid} has no geometry"))?;
            Ok(CensusTract::new(geoid, geometry))
        })
        .collect()
}

fn features(bytes: &[u8]) -> Result<Vec<Value>> {
    let mut value: Value = serde_json::from_slice(bytes).context("Failed to parse GeoJSON bytes")?;
    match value.get_mut("features").map(Value::take) {
        Some(Value::Array(features)) => Ok(features),
        _ => bail!("GeoJSON is not a FeatureCollection"),
    }
}

fn properties(feature: &Value) -> Option<&Map<String, Value>> {
    feature.get("properties").and_then(Value::as_object)
}

/// A property as text; numbers are accepted for codes written without quotes.
fn text(props: Option<&Map<String, Value>>, key: &str) -> Option<String> {
    match props?.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Polygon or MultiPolygon geometry; `null` or absent gives `None`.
fn parse_geometry(geometry: &Value) -> Result<Option<MultiPolygon<f64>>> {
    if geometry.is_null() {
        return Ok(None);
    }
    let coords = geometry["coordinates"].as_array()
        .ok_or_else(|| anyhow!("geometry has no coordinates"))?;
    match geometry["type"].as_str() {
        Some("Polygon") => Ok(Some(MultiPolygon(vec![parse_polygon_coords(coords)?]))),
        Some("MultiPolygon") => Ok(Some(MultiPolygon(
            coords.iter()
                .map(|polygon| parse_polygon_coords(polygon.as_array().map(Vec::as_slice).unwrap_or_default()))
                .collect::<Result<_>>()?,
        ))),
        other => bail!("unsupported geometry type: {other:?}"),
    }
}

/// Parse `[exterior, hole, hole, ...]` ring arrays into a polygon.
fn parse_polygon_coords(rings: &[Value]) -> Result<Polygon<f64>> {
    let mut rings = rings.iter().map(|ring| {
        ring.as_array()
            .ok_or_else(|| anyhow!("Invalid polygon: ring is not an array"))
            .and_then(|ring| parse_ring_coords(ring))
    });
    let exterior = rings.next()
        .ok_or_else(|| anyhow!("Invalid polygon: missing exterior ring"))??;
    Ok(Polygon::new(exterior, rings.collect::<Result<_>>()?))
}

/// Parse a ring from GeoJSON coordinates `[[x, y], [x, y], ...]`, closing it if needed.
fn parse_ring_coords(coords: &[Value]) -> Result<LineString<f64>> {
    let mut points = coords.iter()
        .map(|pair| {
            let x = pair.get(0).and_then(Value::as_f64);
            let y = pair.get(1).and_then(Value::as_f64);
            x.zip(y)
                .map(|(x, y)| Coord { x, y })
                .ok_or_else(|| anyhow!("Invalid coordinate: {pair}"))
        })
        .collect::<Result<Vec<_>>>()?;

    if let (Some(&first), Some(&last)) = (points.first(), points.last()) {
        if first != last {
            points.push(first);
        }
    }
    Ok(LineString(points))
}

#[cfg(test)]
mod tests {
    use geo::Area;

    use super::*;

    #[test]
    fn units_allow_null_geometry() {
        let json = r#"{"type":"FeatureCollection","features":[
            {"type":"Feature","properties":{"code":"127-01","unit_type":"precinct","parent_code":"127","population":1200},
             "geometry":{"type":"Polygon","coordinates":[[[0,0],[2,0],[2,1],[0,1]]]}},
            {"type":"Feature","properties":{"code":"127-02","unit_type":"precinct","name_es":"Río Piedras"},"geometry":null}
        ]}"#;

        let units = parse_units(json.as_bytes()).unwrap();
        assert_eq!(units.len(), 2);
        assert_eq!(units[0].ty, GeoType::Precinct);
        assert_eq!(units[0].parent_code.as_deref(), Some("127"));
        assert_eq!(units[0].population, Some(1200.0));
        assert_eq!(units[0].geometry.as_ref().unwrap().unsigned_area(), 2.0);
        assert!(units[1].geometry.is_none());
        assert_eq!(units[1].name(), Some("Río Piedras"));
    }

    #[test]
    fn tracts_need_geoid_and_geometry() {
        let json = br#"{"type":"FeatureCollection","features":[
            {"type":"Feature","properties":{"GEOID20":"72127001100"},
             "geometry":{"type":"MultiPolygon","coordinates":[[[[0,0],[1,0],[1,1],[0,1],[0,0]],[[0.2,0.2],[0.4,0.2],[0.4,0.4],[0.2,0.4]]]]}}
        ]}"#;
        let tracts = parse_tracts(json).unwrap();
        assert_eq!(tracts[0].geoid.id(), "72127001100");
        assert!((tracts[0].geometry.unsigned_area() - 0.96).abs() < 1e-12);

        let missing = br#"{"type":"FeatureCollection","features":[{"type":"Feature","properties":{"GEOID":"72127001100"},"geometry":null}]}"#;
        assert!(parse_tracts(missing).is_err());
        assert!(parse_units(br#"{"type":"Feature"}"#).is_err());
    }
}
