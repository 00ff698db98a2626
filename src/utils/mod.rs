//! Utility Module
//!
//! - [`math`]: matrix fallbacks shared by the skeleton, importer and skinner
//! - [`time`]: frame timing for the simulation tick

pub mod math;
pub mod time;

pub use time::Timer;
