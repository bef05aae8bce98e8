mod correlation;
mod join;

pub use correlation::{CorrelationAnalyzer, CorrelationResult};
pub use join::{
    aggregate_by_municipality, create_analysis_dataset, join_census, join_estimates, prepare_electoral, Aggregation,
    GEOID_COLUMN, NORMALIZED_COLUMN,
};
