//! Video transform engine.
//!
//! The input is probed, a filter graph is planned from the probe results
//! and resolved parameters, and the external transcoder is invoked once
//! under a hard timeout. Source container metadata is dropped and replaced
//! with synthetic tags.

mod engine;
pub mod filter;
pub mod probe;
pub mod runner;

pub use engine::{VideoEngine, VideoOutput};
pub use filter::{EncodeSettings, VideoPlan};
pub use probe::ProbeInfo;
