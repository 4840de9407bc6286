pub mod anomaly;
pub mod cluster;
pub mod config;
pub mod error;
pub mod experiment;
pub mod metrics;
pub mod model;
pub mod neighbors;
pub mod parsing;
pub mod preprocessing;
pub mod resample;

pub use error::{Error, Result};
pub use parsing::Dataset;
