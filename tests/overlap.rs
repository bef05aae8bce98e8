// Integration tests for the overlap engine:
//   partition sums, weight/share semantics, missing geometry, reprojection of lon/lat input.

use geo::{Coord, LineString, MultiPolygon, Polygon};
use prelecciones_xref::{
    census::CensusTract, Config, Error, GeoId, GeoType, GeographicUnit, OverlapEngine,
};

fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> MultiPolygon<f64> {
    ring(&[(x0, y0), (x1, y0), (x1, y1), (x0, y1)])
}

fn ring(points: &[(f64, f64)]) -> MultiPolygon<f64> {
    let mut coords = points.iter().map(|&(x, y)| Coord { x, y }).collect::<Vec<_>>();
    coords.push(coords[0]);
    MultiPolygon(vec![Polygon::new(LineString(coords), vec![])])
}

fn tract(id: &str, shape: MultiPolygon<f64>) -> CensusTract {
    CensusTract::new(GeoId::parse(id).unwrap(), shape)
}

fn precinct(code: &str, shape: MultiPolygon<f64>) -> GeographicUnit {
    GeographicUnit::new(GeoType::Precinct, code).with_parent("127").with_geometry(shape)
}

fn planar() -> Config {
    Config { projected_input: true, ..Config::default() }
}

#[test]
fn disjoint_partition_of_a_tract_sums_to_one() {
    let config = planar();
    let tracts = [tract("72127001100", rect(0.0, 0.0, 3.0, 3.0))];
    let units = [
        precinct("127-01", rect(0.0, 0.0, 1.0, 3.0)),
        precinct("127-02", rect(1.0, 0.0, 3.0, 1.0)),
        precinct("127-03", rect(1.0, 1.0, 3.0, 3.0)),
    ];

    let weights = OverlapEngine::new(&config).compute_weights(&units, &tracts).unwrap();
    let total = weights.tract_totals()[&GeoId::parse("72127001100").unwrap()];
    assert!((total - 1.0).abs() < 1e-6, "total {total}");
    assert_eq!(weights.iter().count(), 3);
}

#[test]
fn weight_is_fraction_of_tract_and_share_is_fraction_of_unit() {
    let config = planar();
    let tracts = [
        tract("72127001100", rect(0.0, 0.0, 2.0, 2.0)),
        tract("72127001200", rect(2.0, 0.0, 4.0, 2.0)),
        tract("72127009900", rect(50.0, 50.0, 51.0, 51.0)),
    ];
    let units = [precinct("127-01", rect(1.0, 0.0, 4.0, 1.0))];

    let weights = OverlapEngine::new(&config).compute_weights(&units, &tracts).unwrap();
    let unit = weights.weights_for("127-01").unwrap();

    assert_eq!(unit.len(), 2);
    assert_eq!(unit[0].geoid.id(), "72127001100");
    assert!((unit[0].weight - 0.25).abs() < 1e-12);
    assert!((unit[0].share - 1.0 / 3.0).abs() < 1e-12);
    assert!((unit[1].weight - 0.5).abs() < 1e-12);
    assert!((unit[1].share - 2.0 / 3.0).abs() < 1e-12);
}

#[test]
fn touching_boundaries_are_not_overlaps() {
    let config = planar();
    let tracts = [tract("72127001100", rect(0.0, 0.0, 1.0, 1.0))];
    let units = [precinct("127-01", rect(1.0, 0.0, 2.0, 1.0))];

    let weights = OverlapEngine::new(&config).compute_weights(&units, &tracts).unwrap();
    assert!(weights.weights_for("127-01").unwrap().is_empty());
}

#[test]
fn units_without_geometry_report_missing_geometry() {
    let config = planar();
    let tracts = [tract("72127001100", rect(0.0, 0.0, 1.0, 1.0))];
    let units = [
        precinct("127-01", rect(0.0, 0.0, 1.0, 1.0)),
        GeographicUnit::new(GeoType::Precinct, "127-02").with_parent("127"),
    ];

    let weights = OverlapEngine::new(&config).compute_weights(&units, &tracts).unwrap();
    assert_eq!(weights.missing_geometry().collect::<Vec<_>>(), vec!["127-02"]);
    match weights.weights_for("127-02") {
        Err(Error::MissingGeometry { unit_code }) => assert_eq!(unit_code, "127-02"),
        other => panic!("expected MissingGeometry, got {other:?}"),
    }
    assert_eq!(weights.weights_for("127-01").unwrap().len(), 1);
}

#[test]
fn duplicate_unit_codes_are_rejected() {
    let config = planar();
    let tracts = [tract("72127001100", rect(0.0, 0.0, 1.0, 1.0))];
    let units = [precinct("127-01", rect(0.0, 0.0, 1.0, 1.0)), precinct("127-01", rect(0.0, 0.0, 0.5, 0.5))];
    assert!(OverlapEngine::new(&config).compute_weights(&units, &tracts).is_err());
}

#[test]
fn lon_lat_input_is_reprojected_before_measuring() {
    let config = Config::default();
    // Tract ring carries the split vertices so both sides project onto the same edges.
    let (w, m, e, s, n) = (-66.08, -66.07, -66.05, 18.40, 18.42);
    let tracts = [tract("72127001100", ring(&[(w, s), (m, s), (e, s), (e, n), (m, n), (w, n)]))];
    let units = [
        precinct("127-01", rect(w, s, m, n)),
        precinct("127-02", rect(m, s, e, n)),
    ];

    let weights = OverlapEngine::new(&config).compute_weights(&units, &tracts).unwrap();
    let west = weights.weights_for("127-01").unwrap()[0].weight;
    let east = weights.weights_for("127-02").unwrap()[0].weight;

    assert!((west + east - 1.0).abs() < 1e-6);
    assert!((west - 1.0 / 3.0).abs() < 1e-3, "west {west}");
}
