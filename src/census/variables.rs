use serde::{Deserialize, Serialize};

use super::tract::{CensusValue, TractTable};

/// How a variable aggregates over partial areas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableKind {
    /// Extensive quantity (people, households); split proportionally to area.
    Count,
    /// Intensive quantity (median, percentage); averaged by area weight.
    Rate,
}

/// An ACS 5-year table cell: `code` without the E/M suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcsVariable {
    pub code: &'static str,
    pub name: &'static str,
    pub kind: VariableKind,
}

impl AcsVariable {
    #[inline] pub fn estimate_column(&self) -> String { format!("{}E", self.code) }

    #[inline] pub fn moe_column(&self) -> String { format!("{}M", self.code) }
}

const fn var(code: &'static str, name: &'static str, kind: VariableKind) -> AcsVariable {
    AcsVariable { code, name, kind }
}

/// Variables fetched from the ACS API.
pub const ACS_VARIABLES: &[AcsVariable] = &[
    var("B19013_001", "median_household_income", VariableKind::Rate),
    var("B17001_001", "poverty_total_population", VariableKind::Count),
    var("B17001_002", "poverty_below_poverty_level", VariableKind::Count),
    var("B15003_001", "education_total_population", VariableKind::Count),
    var("B15003_017", "education_high_school_graduate", VariableKind::Count),
    var("B15003_022", "education_bachelors_degree", VariableKind::Count),
    var("B15003_023", "education_masters_degree", VariableKind::Count),
    var("B15003_024", "education_professional_degree", VariableKind::Count),
    var("B15003_025", "education_doctorate_degree", VariableKind::Count),
    var("B23025_001", "employment_total_population", VariableKind::Count),
    var("B23025_003", "employment_in_labor_force", VariableKind::Count),
    var("B23025_005", "employment_unemployed", VariableKind::Count),
    var("B01003_001", "total_population", VariableKind::Count),
    var("B01002_001", "median_age", VariableKind::Rate),
];

/// A percentage computed from count variables: 100 · Σ numerators / denominator.
#[derive(Debug, Clone, Copy)]
pub struct DerivedMetric {
    pub name: &'static str,
    pub numerators: &'static [&'static str],
    pub denominator: &'static str,
}

pub const DERIVED_METRICS: &[DerivedMetric] = &[
    DerivedMetric {
        name: "poverty_rate",
        numerators: &["poverty_below_poverty_level"],
        denominator: "poverty_total_population",
    },
    DerivedMetric {
        name: "unemployment_rate",
        numerators: &["employment_unemployed"],
        denominator: "employment_in_labor_force",
    },
    DerivedMetric {
        name: "pct_high_school_or_higher",
        numerators: &[
            "education_high_school_graduate",
            "education_bachelors_degree",
            "education_masters_degree",
            "education_professional_degree",
            "education_doctorate_degree",
        ],
        denominator: "education_total_population",
    },
    DerivedMetric {
        name: "pct_bachelors_or_higher",
        numerators: &[
            "education_bachelors_degree",
            "education_masters_degree",
            "education_professional_degree",
            "education_doctorate_degree",
        ],
        denominator: "education_total_population",
    },
];

/// Aggregation kind of a catalogue or derived variable; unknown names are counts.
pub fn kind_of(name: &str) -> VariableKind {
    if DERIVED_METRICS.iter().any(|m| m.name == name) {
        return VariableKind::Rate;
    }
    ACS_VARIABLES.iter()
        .find(|v| v.name == name || v.code == name)
        .map_or(VariableKind::Count, |v| v.kind)
}

/// Catalogue entry for a human-readable name or table code.
pub fn lookup(name_or_code: &str) -> Option<&'static AcsVariable> {
    ACS_VARIABLES.iter().find(|v| v.name == name_or_code || v.code == name_or_code)
}

impl DerivedMetric {
    /// Evaluate on one geography. Suppressed inputs or a zero denominator give a suppressed cell.
    ///
    /// MOE follows the ACS proportion formula, falling back to the ratio formula when the
    /// radicand is negative.
    pub fn evaluate(&self, cell: impl Fn(&str) -> CensusValue) -> CensusValue {
        let den = cell(self.denominator);
        let nums = self.numerators.iter().map(|n| cell(n)).collect::<Vec<_>>();

        let (Some(den_value), true) = (den.value, nums.iter().all(|c| !c.is_suppressed())) else {
            return CensusValue::suppressed();
        };
        if den_value <= 0.0 {
            return CensusValue::suppressed();
        }

        let num_value = nums.iter().filter_map(|c| c.value).sum::<f64>();
        let num_moe_sq = nums.iter().filter_map(|c| c.margin_of_error).map(|m| m * m).sum::<f64>();
        let den_moe = den.margin_of_error.unwrap_or(0.0);

        let p = num_value / den_value;
        let radicand = num_moe_sq - p * p * den_moe * den_moe;
        let radicand = if radicand < 0.0 { num_moe_sq + p * p * den_moe * den_moe } else { radicand };

        CensusValue::new(100.0 * p, 100.0 * radicand.sqrt() / den_value)
    }
}

/// Add every derived percentage to every row of `table`.
pub fn derive_metrics(table: &mut TractTable) {
    let geoids = table.geoids().cloned().collect::<Vec<_>>();
    for geoid in geoids {
        for metric in DERIVED_METRICS {
            let cell = metric.evaluate(|name| table.get(&geoid, name));
            table.insert(geoid.clone(), metric.name, cell);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GeoId;

    #[test]
    fn kinds_follow_catalogue() {
        assert_eq!(kind_of("median_household_income"), VariableKind::Rate);
        assert_eq!(kind_of("B01003_001"), VariableKind::Count);
        assert_eq!(kind_of("poverty_rate"), VariableKind::Rate);
        assert_eq!(kind_of("something_else"), VariableKind::Count);
        assert_eq!(lookup("median_age").unwrap().estimate_column(), "B01002_001E");
    }

    #[test]
    fn proportion_moe_matches_acs_formula() {
        let metric = DERIVED_METRICS[0];
        let cell = metric.evaluate(|name| match name {
            "poverty_below_poverty_level" => CensusValue::new(400.0, 30.0),
            "poverty_total_population" => CensusValue::new(1_000.0, 50.0),
            _ => CensusValue::suppressed(),
        });
        assert_eq!(cell.value, Some(40.0));
        // sqrt(30² - 0.4²·50²) / 1000 · 100
        let expected = (900.0f64 - 0.16 * 2_500.0).sqrt() / 1_000.0 * 100.0;
        assert!((cell.margin_of_error.unwrap() - expected).abs() < 1e-9);
    }

    #[test]
    fn negative_radicand_uses_ratio_formula() {
        let metric = DERIVED_METRICS[1];
        let cell = metric.evaluate(|name| match name {
            "employment_unemployed" => CensusValue::new(90.0, 5.0),
            "employment_in_labor_force" => CensusValue::new(100.0, 40.0),
            _ => CensusValue::suppressed(),
        });
        let expected = (25.0f64 + 0.81 * 1_600.0).sqrt() / 100.0 * 100.0;
        assert!((cell.margin_of_error.unwrap() - expected).abs() < 1e-9);
    }

    #[test]
    fn suppressed_inputs_suppress_the_metric() {
        let mut table = TractTable::new();
        let geoid = GeoId::parse("72001956300").unwrap();
        table.insert(geoid.clone(), "poverty_total_population", CensusValue::new(0.0, 0.0));
        table.insert(geoid.clone(), "poverty_below_poverty_level", CensusValue::new(0.0, 0.0));
        derive_metrics(&mut table);

        assert!(table.get(&geoid, "poverty_rate").is_suppressed());
        assert!(table.get(&geoid, "unemployment_rate").is_suppressed());
    }
}
