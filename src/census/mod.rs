mod fetch;
mod response;
mod tract;
mod variables;

pub use fetch::{CensusClient, Geography, HttpTransport, Sleeper, ThreadSleeper, Transport, TransportError};
pub use tract::{CensusTract, CensusValue, TractTable, Variables};
pub use variables::{derive_metrics, kind_of, lookup, AcsVariable, DerivedMetric, VariableKind, ACS_VARIABLES, DERIVED_METRICS};
