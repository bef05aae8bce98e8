mod bbox;
mod geom;
mod overlap;
mod proj;

pub use overlap::{OverlapEngine, OverlapWeight, OverlapWeights, TractWeight};
