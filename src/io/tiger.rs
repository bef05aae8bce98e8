use std::path::Path;

use anyhow::{bail, Context, Result};
use geo::{Coord, LineString, MultiPolygon, Polygon};
use shapefile::{dbase::{FieldValue, Record}, PolygonRing, Reader, Shape};

use crate::{census::CensusTract, types::GeoId};

/// Read a TIGER/Line tract shapefile (`tl_<year>_72_tract.shp`) into tracts.
/// The GEOID comes from `GEOID20` (2020 vintage) or `GEOID`.
pub fn read_tract_shapefile(path: &Path) -> Result<Vec<CensusTract>> {
    /// Get the value of a character field from a Record
    fn get_character_field(record: &Record, fields: &[&str]) -> Result<String> {
        fields.iter()
            .find_map(|&field| match record.get(field) {
                Some(FieldValue::Character(Some(s))) => Some(s.trim().to_string()),
                _ => None,
            })
            .with_context(|| format!("missing or invalid character field: {}", fields.join("/")))
    }

    let mut reader = Reader::from_path(path)
        .with_context(|| format!("Failed to open shapefile: {}", path.display()))?;

    let mut tracts = Vec::with_capacity(reader.shape_count()?);
    for result in reader.iter_shapes_and_records() {
        let (shape, record) = result.context("Error reading shape+record")?;
        let geoid = GeoId::parse(&get_character_field(&record, &["GEOID20", "GEOID"])?)?;
        let geometry = match shape {
            Shape::Polygon(polygon) => rings_to_multipolygon(polygon.rings()),
            other => bail!("found non-Polygon shape for tract {geoid}: {:?}", other.shapetype()),
        };
        tracts.push(CensusTract::new(geoid, geometry));
    }

    tracts.sort_by(|a, b| a.geoid.cmp(&b.geoid));
    Ok(tracts)
}

/// Group shapefile rings into polygons: each outer ring owns the holes that follow it.
fn rings_to_multipolygon(rings: &[PolygonRing<shapefile::Point>]) -> MultiPolygon<f64> {
    fn to_line_string(points: &[shapefile::Point]) -> LineString<f64> {
        let mut coords = points.iter().map(|pt| Coord { x: pt.x, y: pt.y }).collect::<Vec<_>>();
        if let (Some(&first), Some(&last)) = (coords.first(), coords.last()) {
            if first != last {
                coords.push(first);
            }
        }
        LineString(coords)
    }

    let mut polygons = Vec::new();
    let mut exterior: Option<LineString<f64>> = None;
    let mut holes = Vec::new();

    for ring in rings {
        match ring {
            PolygonRing::Outer(points) => {
                if let Some(previous) = exterior.replace(to_line_string(points)) {
                    polygons.push(Polygon::new(previous, std::mem::take(&mut holes)));
                }
            }
            // A hole before any outer ring is malformed; drop it.
            PolygonRing::Inner(points) => if exterior.is_some() {
                holes.push(to_line_string(points));
            },
        }
    }
    if let Some(last) = exterior {
        polygons.push(Polygon::new(last, holes));
    }

    MultiPolygon(polygons)
}

#[cfg(test)]
mod tests {
    use geo::Area;
    use shapefile::Point;

    use super::*;

    fn ring(points: &[(f64, f64)]) -> Vec<Point> {
        points.iter().map(|&(x, y)| Point { x, y }).collect()
    }

    #[test]
    fn holes_attach_to_preceding_outer_ring() {
        let rings = vec![
            PolygonRing::Outer(ring(&[(0.0, 0.0), (0.0, 2.0), (2.0, 2.0), (2.0, 0.0), (0.0, 0.0)])),
            PolygonRing::Inner(ring(&[(0.5, 0.5), (1.5, 0.5), (1.5, 1.5), (0.5, 1.5), (0.5, 0.5)])),
            PolygonRing::Outer(ring(&[(5.0, 5.0), (5.0, 6.0), (6.0, 6.0), (6.0, 5.0)])),
        ];
        let shape = rings_to_multipolygon(&rings);

        assert_eq!(shape.0.len(), 2);
        assert_eq!(shape.0[0].interiors().len(), 1);
        assert!(shape.0[1].interiors().is_empty());
        assert!((shape.unsigned_area() - 4.0).abs() < 1e-12);
    }
}
