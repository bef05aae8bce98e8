// Integration tests for demographic interpolation and confidence scoring:
//   the split-precinct scenario, containment, suppression, direct municipality matches.

use geo::{Coord, Rect};
use prelecciones_xref::{
    census::{CensusTract, CensusValue, TractTable, VariableKind},
    config::ConfidenceBands,
    interpolate::{DemographicInterpolator, EstimateMethod},
    Config, GeoId, GeoType, GeographicUnit, OverlapEngine, TractWeight,
};

const INCOME: &str = "median_household_income";

fn geoid(id: &str) -> GeoId {
    GeoId::parse(id).unwrap()
}

fn income_table(cells: &[(&str, Option<f64>)]) -> TractTable {
    let mut table = TractTable::new();
    for &(id, value) in cells {
        let cell = value.map_or_else(CensusValue::suppressed, |v| CensusValue::new(v, 1_000.0));
        table.insert(geoid(id), INCOME, cell);
    }
    table
}

#[test]
fn precinct_split_evenly_between_two_tracts() {
    let bands = ConfidenceBands::default();
    let interpolator = DemographicInterpolator::new(&bands);
    let table = income_table(&[("72127001100", Some(40_000.0)), ("72127001200", Some(50_000.0))]);

    let unit = GeographicUnit::new(GeoType::Precinct, "127-01");
    let weights = [
        TractWeight::new(geoid("72127001100"), 0.5, 0.5),
        TractWeight::new(geoid("72127001200"), 0.5, 0.5),
    ];
    let estimate = interpolator.interpolate(&unit, &weights, &table, INCOME, VariableKind::Rate);

    assert!((estimate.value.unwrap() - 45_000.0).abs() < 1e-9);
    assert!((0.6..=0.8).contains(&estimate.confidence), "confidence {}", estimate.confidence);
    assert_eq!(estimate.source_tracts, vec![geoid("72127001100"), geoid("72127001200")]);
    assert_eq!(estimate.weights, vec![0.5, 0.5]);
    // Rate weights renormalize to 1/2 each: sqrt(2 · 0.25 · 1000²)
    assert!((estimate.margin_of_error.unwrap() - (0.5f64).sqrt() * 1_000.0).abs() < 1e-6);
}

#[test]
fn precinct_inside_one_tract_takes_its_value() {
    let config = Config { projected_input: true, ..Config::default() };
    let tracts = [CensusTract::new(geoid("72127001100"), Rect::new(Coord { x: 0.0, y: 0.0 }, Coord { x: 10.0, y: 10.0 }).to_polygon().into())];
    let unit = GeographicUnit::new(GeoType::Precinct, "127-05")
        .with_geometry(Rect::new(Coord { x: 2.0, y: 2.0 }, Coord { x: 4.0, y: 5.0 }).to_polygon().into());

    let weights = OverlapEngine::new(&config).compute_weights(std::slice::from_ref(&unit), &tracts).unwrap();
    let unit_weights = weights.weights_for("127-05").unwrap();
    assert!((unit_weights[0].weight - 0.06).abs() < 1e-12);

    let interpolator = DemographicInterpolator::new(&config.confidence);
    let table = income_table(&[("72127001100", Some(40_000.0))]);
    let estimate = interpolator.interpolate(&unit, unit_weights, &table, INCOME, VariableKind::Rate);

    assert_eq!(estimate.value, Some(40_000.0));
    assert_eq!(estimate.confidence, 1.0);
}

#[test]
fn all_suppressed_tracts_yield_null_with_capped_confidence() {
    let bands = ConfidenceBands::default();
    let interpolator = DemographicInterpolator::new(&bands);
    let table = income_table(&[("72127001100", None), ("72127001200", None)]);

    let unit = GeographicUnit::new(GeoType::Precinct, "127-01");
    let weights = [
        TractWeight::new(geoid("72127001100"), 0.9, 0.9),
        TractWeight::new(geoid("72127001200"), 0.1, 0.1),
    ];
    let estimate = interpolator.interpolate(&unit, &weights, &table, INCOME, VariableKind::Rate);

    assert!(estimate.value.is_none());
    assert!(estimate.margin_of_error.is_none());
    assert!(estimate.confidence <= bands.suppressed_majority_cap);
    assert_eq!(estimate.suppressed.len(), 2);
}

#[test]
fn majority_suppression_caps_even_with_data_present() {
    let bands = ConfidenceBands::default();
    let interpolator = DemographicInterpolator::new(&bands);
    let table = income_table(&[("72127001100", Some(30_000.0)), ("72127001200", None), ("72127001300", None)]);

    let unit = GeographicUnit::new(GeoType::Precinct, "127-01");
    let weights = [
        TractWeight::new(geoid("72127001100"), 0.8, 0.8),
        TractWeight::new(geoid("72127001200"), 0.1, 0.1),
        TractWeight::new(geoid("72127001300"), 0.1, 0.1),
    ];
    let estimate = interpolator.interpolate(&unit, &weights, &table, INCOME, VariableKind::Rate);

    assert_eq!(estimate.value, Some(30_000.0));
    assert_eq!(estimate.confidence, bands.suppressed_majority_cap);
}

#[test]
fn municipality_direct_match_is_certain() {
    let bands = ConfidenceBands::default();
    let interpolator = DemographicInterpolator::new(&bands);
    let ponce = GeoId::county("113").unwrap();
    let mut table = TractTable::new();
    table.insert(ponce.clone(), INCOME, CensusValue::new(21_000.0, 900.0));

    let unit = GeographicUnit::new(GeoType::Municipality, "113").with_name("Ponce");
    let estimate = interpolator.direct_match(&unit, &ponce, &table, INCOME);

    assert_eq!(estimate.value, Some(21_000.0));
    assert_eq!(estimate.margin_of_error, Some(900.0));
    assert_eq!(estimate.confidence, 1.0);
    assert_eq!(estimate.method, Some(EstimateMethod::Direct));
    assert_eq!(estimate.source_tracts, vec![ponce]);
}
