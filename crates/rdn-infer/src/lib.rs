//! Configuration-driven harness around the `rdn-core` joint sampler.

pub mod analytics;
pub mod config;
pub mod logging;
pub mod model;
pub mod runner;
