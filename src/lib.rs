#[path = "core/config.rs"]
pub mod config;

#[path = "core/paths.rs"]
pub mod paths;

#[path = "core/prng.rs"]
pub mod prng;

#[path = "core/results.rs"]
pub mod results;

#[path = "core/schedule.rs"]
pub mod schedule;

#[path = "core/session.rs"]
pub mod session;

#[path = "core/stats.rs"]
pub mod stats;

#[path = "core/stimulus.rs"]
pub mod stimulus;

#[path = "core/trial.rs"]
pub mod trial;

pub mod sim;
