#![doc = "Puerto Rico electoral geography to U.S. Census cross-referencing"]
pub mod analysis;
pub mod census;
pub mod config;
pub mod error;
mod geom;
pub mod interpolate;
pub mod io;
pub mod logging;
pub mod names;
mod pipeline;
mod types;

#[doc(inline)]
pub use types::{CensusLevel, GeoId, GeoType, GeographicUnit, PR_STATE_FIPS};

#[doc(inline)]
pub use config::Config;

#[doc(inline)]
pub use error::{Error, Result, SuppressedCell};

#[doc(inline)]
pub use geom::{OverlapEngine, OverlapWeight, OverlapWeights, TractWeight};

#[doc(inline)]
pub use pipeline::{LevelRun, Pipeline, RunSummary};
