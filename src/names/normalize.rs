use std::sync::LazyLock;

use regex::Regex;
use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

use crate::error::{Error, Result};

use super::table::{Municipality, MunicipalityTable};

static NON_ALNUM: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-z0-9\s]").expect("valid regex"));
static CENSUS_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:municipio de )?(.*?)(?: municipio)?(?: puerto rico)?$").expect("valid regex")
});

/// Fold free text to matching form: lowercase, no diacritics, no punctuation,
/// single spaces. Pure; performs no lookup.
pub fn fold(name: &str) -> String {
    let lowered = name.trim().to_lowercase()
        .nfd()
        .filter(|&c| !is_combining_mark(c))
        .collect::<String>();
    let stripped = NON_ALNUM.replace_all(&lowered, "");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Folded name with any Census `NAME` decoration ("Municipio", "Puerto Rico") removed.
fn lookup_key(name: &str) -> String {
    let folded = fold(name);
    CENSUS_SUFFIX.captures(&folded)
        .and_then(|caps| caps.get(1))
        .map_or_else(|| folded.clone(), |m| m.as_str().to_string())
}

/// Resolves free-text municipality names to canonical keys.
#[derive(Debug, Clone, Copy)]
pub struct NameNormalizer<'a> {
    table: &'a MunicipalityTable,
    max_distance: usize,
}

impl<'a> NameNormalizer<'a> {
    pub fn new(table: &'a MunicipalityTable, max_distance: usize) -> Self {
        Self { table, max_distance }
    }

    #[inline] pub fn table(&self) -> &'a MunicipalityTable { self.table }

    /// Canonical key for `name`, e.g. "MAYAGÜEZ" -> "mayaguez".
    pub fn normalize(&self, name: &str) -> Result<&'a str> {
        self.resolve(name).map(|m| m.key.as_str())
    }

    /// Resolve `name` to its municipality: exact key, then alias, then the nearest
    /// canonical name within `max_distance` edits.
    pub fn resolve(&self, name: &str) -> Result<&'a Municipality> {
        let key = lookup_key(name);
        let key = key.as_str();

        if let Some(municipality) = self.table.lookup(key) {
            return Ok(municipality);
        }

        let not_found = || Error::NameNotFound {
            name: name.to_string(),
            closest: self.closest(name).map(|(m, d)| (m.key.clone(), d)),
        };

        // Too short to tell a typo from a different name.
        if key.chars().count() <= self.max_distance + 1 {
            return Err(not_found());
        }

        match self.nearest(key) {
            Some((municipality, distance, false)) if distance <= self.max_distance => {
                tracing::debug!(input = name, matched = %municipality.key, distance, "fuzzy municipality match");
                Ok(municipality)
            }
            _ => Err(not_found()),
        }
    }

    /// Closest canonical name and its edit distance, regardless of threshold.
    pub fn closest(&self, name: &str) -> Option<(&'a Municipality, usize)> {
        self.nearest(&lookup_key(name)).map(|(m, d, _)| (m, d))
    }

    /// Nearest canonical key by Levenshtein distance; the flag reports a tie
    /// between different municipalities at that distance.
    fn nearest(&self, key: &str) -> Option<(&'a Municipality, usize, bool)> {
        let mut best: Option<(&'a Municipality, usize, bool)> = None;
        for municipality in self.table.iter() {
            let distance = strsim::levenshtein(key, &municipality.key);
            best = match best {
                Some((_, d, _)) if distance < d => Some((municipality, distance, false)),
                Some((m, d, _)) if distance == d => Some((m, d, true)),
                None => Some((municipality, distance, false)),
                keep => keep,
            };
        }
        best
    }
}
