mod geo_id;
mod geo_type;
mod unit;

pub use geo_id::{CensusLevel, GeoId, PR_STATE_FIPS};
pub use geo_type::GeoType;
pub use unit::GeographicUnit;
