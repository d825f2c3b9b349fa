//! Configuration loading and management for the payroll engine.
//!
//! This module loads jurisdiction-dependent calculation constants
//! (days per month, hours per day, interest year length) with per-company
//! overrides, and optional seed data for the in-memory repository.
//!
//! # Example
//!
//! ```no_run
//! use payroll_engine::config::ConfigLoader;
//!
//! let config = ConfigLoader::load("./config/default").unwrap();
//! println!("Hours per day: {}", config.get_calculation_config("acme").hours_per_day);
//! ```

mod loader;
mod types;

pub use loader::ConfigLoader;
pub use types::{CalculationConfig, CalculationSettings, SeedData};
