use std::fmt;

use thiserror::Error;

/// Failures raised by the cross-referencing core.
///
/// `MissingGeometry` is recovered locally by the batch pipeline; everything else
/// propagates to the caller.
#[derive(Debug, Error)]
pub enum Error {
    /// Municipality name unresolvable after normalization and fuzzy fallback.
    #[error("municipality name not found: {name:?}{}", closest_hint(.closest))]
    NameNotFound {
        name: String,
        closest: Option<(String, usize)>,
    },

    /// Required precinct boundary unavailable.
    #[error("no geometry available for unit {unit_code}")]
    MissingGeometry { unit_code: String },

    /// Static municipality table is inconsistent.
    #[error("incomplete crosswalk: expected {expected} municipalities, found {found} (missing: {missing:?})")]
    IncompleteCrosswalk {
        expected: usize,
        found: usize,
        missing: Vec<String>,
    },

    /// Census API failure after exhausting the retry budget.
    #[error("census fetch failed after {attempts} attempt(s) for geoid {geoid} ({year}, vars {variables:?}) at {url}: {cause}")]
    Fetch {
        url: String,
        variables: Vec<String>,
        geoid: String,
        year: u16,
        attempts: u32,
        cause: String,
    },

    /// Malformed caller input (bad GEOID, unknown level, ...).
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

fn closest_hint(closest: &Option<(String, usize)>) -> String {
    match closest {
        Some((name, distance)) => format!(" (closest: {name:?} at distance {distance})"),
        None => String::new(),
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// A tract/variable cell withheld by Census disclosure rules.
/// Excluded from aggregation; lowers the confidence of any estimate it feeds.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SuppressedCell {
    pub geoid: String,
    pub variable: String,
}

impl fmt::Display for SuppressedCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "suppressed cell {}/{}", self.geoid, self.variable)
    }
}
