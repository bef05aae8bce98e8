use std::{collections::BTreeMap, path::Path};

use anyhow::{Context, Result};
use polars::{df, io::SerWriter, prelude::CsvWriter};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{
    analysis::CorrelationResult,
    config::Config,
    names::CrosswalkEntry,
    pipeline::{LevelRun, RunSummary},
};

use super::fs::{ensure_dir_exists, write_atomic};

pub const CROSSWALK_FILE: &str = "crosswalk.csv";
pub const CORRELATIONS_FILE: &str = "correlations.json";
pub const SUMMARY_FILE: &str = "summary.json";
pub const MANIFEST_FILE: &str = "manifest.json";

/// Per-level demographic artifact name, e.g. `demographics_precinct.json`.
pub fn demographics_file(run: &LevelRun) -> String {
    format!("demographics_{}.json", run.summary.level.to_str())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileHash {
    pub sha256: String,
    pub records: usize,
}

/// Index of one batch output directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub version: String,
    pub crs: String,
    pub census_year: u16,
    pub census_dataset: String,
    pub levels: Vec<String>,
    pub files: BTreeMap<String, FileHash>,
}

impl Manifest {
    /// Read `manifest.json` from an output directory.
    pub fn read(dir: &Path) -> Result<Self> {
        let path = dir.join(MANIFEST_FILE);
        let bytes = std::fs::read(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_slice(&bytes).context("Failed to parse manifest.json")
    }
}

pub(crate) fn sha256_bytes(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Crosswalk entries as CSV with columns `municipality_name, county_fips, geoid`,
/// followed by the accented `display_name`.
pub fn crosswalk_csv(entries: &[CrosswalkEntry]) -> Result<Vec<u8>> {
    let mut df = df![
        "municipality_name" => entries.iter().map(|e| e.municipality_name.as_str()).collect::<Vec<_>>(),
        "county_fips" => entries.iter().map(|e| e.county_fips.as_str()).collect::<Vec<_>>(),
        "geoid" => entries.iter().map(|e| e.geoid.as_str()).collect::<Vec<_>>(),
        "display_name" => entries.iter().map(|e| e.display_name.as_str()).collect::<Vec<_>>(),
    ]?;

    let mut out = Vec::new();
    CsvWriter::new(&mut out)
        .finish(&mut df)
        .context("Failed to write crosswalk CSV to bytes")?;
    Ok(out)
}

/// Write every artifact of a batch into `dir`, replacing earlier outputs, and return the
/// manifest (also written as `manifest.json`).
pub fn write_artifacts(
    dir: &Path,
    config: &Config,
    crosswalk: &[CrosswalkEntry],
    runs: &[LevelRun],
    correlations: &[CorrelationResult],
) -> Result<Manifest> {
    ensure_dir_exists(dir)?;
    let mut files = BTreeMap::new();

    let mut put = |name: String, bytes: Vec<u8>, records: usize| -> Result<()> {
        write_atomic(&dir.join(&name), &bytes)?;
        files.insert(name, FileHash { sha256: sha256_bytes(&bytes), records });
        Ok(())
    };

    put(CROSSWALK_FILE.into(), crosswalk_csv(crosswalk)?, crosswalk.len())?;

    for run in runs {
        let bytes = serde_json::to_vec_pretty(&run.estimates)
            .context("Failed to serialize demographic estimates")?;
        put(demographics_file(run), bytes, run.estimates.len())?;
    }

    put(CORRELATIONS_FILE.into(), serde_json::to_vec_pretty(correlations)?, correlations.len())?;

    let summaries = runs.iter().map(|run| &run.summary).collect::<Vec<&RunSummary>>();
    put(SUMMARY_FILE.into(), serde_json::to_vec_pretty(&summaries)?, summaries.len())?;

    let manifest = Manifest {
        version: "1".into(),
        crs: format!("EPSG:{}", config.source_epsg),
        census_year: config.census.year,
        census_dataset: config.census.dataset.clone(),
        levels: runs.iter().map(|run| run.summary.level.to_str().to_string()).collect(),
        files,
    };
    write_atomic(&dir.join(MANIFEST_FILE), &serde_json::to_vec_pretty(&manifest)?)?;

    tracing::info!(dir = %dir.display(), files = manifest.files.len(), "wrote artifacts");
    Ok(manifest)
}
