mod confidence;
mod estimate;
mod interpolator;

pub use confidence::{is_contained, ConfidenceScorer};
pub use estimate::{DemographicEstimate, EstimateMethod};
pub use interpolator::DemographicInterpolator;
