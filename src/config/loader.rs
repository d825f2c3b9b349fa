//! Configuration loading functionality.
//!
//! This module provides the [`ConfigLoader`] type for loading calculation
//! configuration and seed data from YAML files.

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::error::{EngineError, EngineResult};

use super::types::{CalculationConfig, CalculationSettings, SeedData};

/// Loads and provides access to calculation configuration.
///
/// # Directory Structure
///
/// ```text
/// config/default/
/// ├── calculation.yaml  # Defaults and per-company overrides
/// └── seed.yaml         # Optional reference data
/// ```
///
/// # Example
///
/// ```no_run
/// use payroll_engine::config::ConfigLoader;
///
/// let loader = ConfigLoader::load("./config/default")?;
/// let config = loader.get_calculation_config("acme");
/// println!("Days per month: {}", config.days_per_month);
/// # Ok::<(), payroll_engine::error::EngineError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    settings: CalculationSettings,
    seed: Option<SeedData>,
}

impl ConfigLoader {
    /// Loads configuration from the specified directory.
    ///
    /// # Errors
    ///
    /// Returns `ConfigNotFound` when `calculation.yaml` is missing and
    /// `ConfigParseError` when any file contains invalid YAML.
    pub fn load<P: AsRef<Path>>(path: P) -> EngineResult<Self> {
        let path = path.as_ref();

        let settings = Self::load_yaml::<CalculationSettings>(&path.join("calculation.yaml"))?;

        let seed_path = path.join("seed.yaml");
        let seed = if seed_path.exists() {
            Some(Self::load_yaml::<SeedData>(&seed_path)?)
        } else {
            None
        };

        debug!(
            path = %path.display(),
            companies = settings.companies.len(),
            seeded = seed.is_some(),
            "loaded calculation configuration"
        );

        Ok(Self { settings, seed })
    }

    /// Builds a loader from already-parsed parts.
    pub fn from_parts(settings: CalculationSettings, seed: Option<SeedData>) -> Self {
        Self { settings, seed }
    }

    /// Loads and parses a YAML file.
    fn load_yaml<T: serde::de::DeserializeOwned>(path: &Path) -> EngineResult<T> {
        let path_str = path.display().to_string();

        let content = fs::read_to_string(path).map_err(|_| EngineError::ConfigNotFound {
            path: path_str.clone(),
        })?;

        serde_yaml::from_str(&content).map_err(|e| EngineError::ConfigParseError {
            path: path_str,
            message: e.to_string(),
        })
    }

    /// Returns the parsed `calculation.yaml`.
    pub fn settings(&self) -> &CalculationSettings {
        &self.settings
    }

    /// Returns the seed data, if a `seed.yaml` was present.
    pub fn seed(&self) -> Option<&SeedData> {
        self.seed.as_ref()
    }

    /// Takes the seed data out of the loader.
    pub fn take_seed(&mut self) -> Option<SeedData> {
        self.seed.take()
    }

    /// Gets the calculation configuration for a company, falling back to the
    /// global defaults.
    pub fn get_calculation_config(&self, company_id: &str) -> &CalculationConfig {
        self.settings.for_company(company_id)
    }
}
