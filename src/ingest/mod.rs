//! Raw generation-mix observations and the emissions series derived from them.

pub mod emissions;
pub mod feed;

pub use emissions::{emissions_frame, EmissionFactors};
pub use feed::{parse_generation_feed, RawObservation};
