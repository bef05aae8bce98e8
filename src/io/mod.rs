mod artifacts;
mod fs;
mod geojson;
mod tiger;

pub use artifacts::{
    crosswalk_csv, demographics_file, write_artifacts, FileHash, Manifest,
    CORRELATIONS_FILE, CROSSWALK_FILE, MANIFEST_FILE, SUMMARY_FILE,
};
pub use fs::{ensure_dir_exists, write_atomic};
pub use geojson::{parse_tracts, parse_units, read_tracts, read_units};
pub use tiger::read_tract_shapefile;
