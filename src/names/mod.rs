mod crosswalk;
mod normalize;
mod table;

pub use crosswalk::{CoverageReport, CrosswalkEntry, MunicipalityCrosswalk};
pub use normalize::{fold, NameNormalizer};
pub use table::{Municipality, MunicipalityTable, MUNICIPALITY_COUNT};
