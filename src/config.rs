//! Engine configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::utils::json::{load_json, save_json};

/// Default bound on productive iterations of a repeating strategy.
pub const DEFAULT_MAX_REPETITIONS: usize = 1000;

/// Knobs shared by the executor and the normalizer.
///
/// Missing fields take their default values when deserializing, so a config
/// file only needs to mention what it changes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Productive iterations allowed to every `Repeat` and to the executor loop
    pub max_repetitions: usize,
    /// Check the graph invariants after every replacement
    pub validate_graph: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_repetitions: DEFAULT_MAX_REPETITIONS,
            validate_graph: cfg!(debug_assertions),
        }
    }
}

impl EngineConfig {
    pub fn with_max_repetitions(mut self, max_repetitions: usize) -> Self {
        self.max_repetitions = max_repetitions;
        self
    }

    pub fn with_validation(mut self, validate_graph: bool) -> Self {
        self.validate_graph = validate_graph;
        self
    }

    pub fn from_json_str(json: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        load_json(path)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        save_json(self, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config = EngineConfig::from_json_str(r#"{ "max_repetitions": 7 }"#).unwrap();
        assert_eq!(config.max_repetitions, 7);
        assert_eq!(config.validate_graph, EngineConfig::default().validate_graph);
    }

    #[test]
    fn malformed_json_is_rejected() {
        assert!(EngineConfig::from_json_str(r#"{ "max_repetitions": "many" }"#).is_err());
    }

    #[test]
    fn save_then_load() {
        let path = std::env::temp_dir().join(format!("reductio-config-{}.json", std::process::id()));
        let config = EngineConfig::default()
            .with_max_repetitions(12)
            .with_validation(true);
        config.save(&path).unwrap();
        let loaded = EngineConfig::load(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn loading_missing_file_fails() {
        assert!(EngineConfig::load("/nonexistent/reductio/config.json").is_err());
    }
}
