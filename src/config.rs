//! Experiment settings, loadable from TOML.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::anomaly::{Contamination, Gamma};
use crate::error::Result;
use crate::parsing::synthetic::ClassificationParams;

const DEFAULT_SEED: u64 = 42;

fn default_seed() -> u64 {
    DEFAULT_SEED
}

fn default_test_size() -> f64 {
    0.2
}

fn default_imbalanced() -> ClassificationParams {
    ClassificationParams {
        n_samples: 1000,
        n_features: 20,
        weights: Some(vec![0.99, 0.01]),
        random_state: DEFAULT_SEED,
        ..Default::default()
    }
}

fn default_balanced() -> ClassificationParams {
    ClassificationParams {
        n_samples: 1000,
        n_features: 20,
        random_state: DEFAULT_SEED,
        ..Default::default()
    }
}

/// Everything a scenario run depends on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentConfig {
    /// Seed for splitting, resampling and every seeded estimator
    #[serde(default = "default_seed")]
    pub seed: u64,

    #[serde(default = "default_test_size")]
    pub test_size: f64,

    /// Dataset for the resampling, cost-sensitive and anomaly scenarios
    #[serde(default = "default_imbalanced")]
    pub imbalanced: ClassificationParams,

    /// Dataset for the ensemble scenarios
    #[serde(default = "default_balanced")]
    pub balanced: ClassificationParams,

    #[serde(default)]
    pub models: ModelConfig,

    #[serde(default)]
    pub anomaly: AnomalyConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub forest_estimators: usize,
    pub bagging_estimators: usize,
    pub adaboost_estimators: usize,
    pub adaboost_learning_rate: f64,
    pub stacking_cv: usize,
    pub knn_neighbors: usize,
    pub smote_neighbors: usize,
    pub adasyn_neighbors: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            forest_estimators: 100,
            bagging_estimators: 10,
            adaboost_estimators: 50,
            adaboost_learning_rate: 1.0,
            stacking_cv: 5,
            knn_neighbors: 5,
            smote_neighbors: 5,
            adasyn_neighbors: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnomalyConfig {
    pub nu: f64,
    pub gamma: Gamma,
    pub isolation_estimators: usize,
    pub contamination: Contamination,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            nu: 0.01,
            gamma: Gamma::Scale,
            isolation_estimators: 100,
            contamination: Contamination::Auto,
        }
    }
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            test_size: default_test_size(),
            imbalanced: default_imbalanced(),
            balanced: default_balanced(),
            models: ModelConfig::default(),
            anomaly: AnomalyConfig::default(),
        }
    }
}

impl ExperimentConfig {
    pub fn from_toml_str(source: &str) -> Result<ExperimentConfig> {
        Ok(toml::from_str(source)?)
    }

    pub fn from_toml_file(path: &Path) -> Result<ExperimentConfig> {
        let source = std::fs::read_to_string(path)?;
        ExperimentConfig::from_toml_str(&source)
    }

    /// Use `seed` everywhere, including dataset generation
    pub fn with_seed(mut self, seed: u64) -> ExperimentConfig {
        self.seed = seed;
        self.imbalanced.random_state = seed;
        self.balanced.random_state = seed;
        self
    }
}
