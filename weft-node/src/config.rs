use serde::{Deserialize, Serialize};
use std::path::Path;

use weft_relay::transport::ErasureConfig;
use weft_weave::capacity::CapacityConfig;
use weft_weave::engine::EngineConfig;

use crate::error::NodeError;

/// File name written by `weft init`.
pub const CONFIG_FILE_NAME: &str = "weft.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeConfig {
    #[serde(default)]
    pub capacity: CapacityConfig,
    #[serde(default)]
    pub erasure: ErasureConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Parameters of the local block-production simulation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Blocks to propose after genesis.
    pub blocks: u64,
    /// New transactions submitted per round.
    pub transactions_per_block: usize,
    /// Chunks dropped from every segment during propagation.
    pub loss_per_segment: usize,
    /// Probability that a proposer references a block it never saw.
    pub orphan_ref_rate: f64,
    /// Outputs created by genesis.
    pub premine_outputs: u32,
    pub mempool_capacity: usize,
    /// RNG seed; the same seed replays the same run.
    pub seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            blocks: 20,
            transactions_per_block: 16,
            loss_per_segment: 1,
            orphan_ref_rate: 0.1,
            premine_outputs: 32,
            mempool_capacity: 10_000,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl NodeConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self, NodeError> {
        let contents = std::fs::read_to_string(path).map_err(|e| NodeError::ConfigError {
            reason: format!("failed to read config file '{}': {}", path, e),
        })?;
        let config: NodeConfig = toml::from_str(&contents).map_err(|e| NodeError::ConfigError {
            reason: format!("failed to parse config file '{}': {}", path, e),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Write the default configuration to `weft.toml` in `dir`. An existing
    /// file is left alone unless `force` is set.
    pub fn init(dir: &str, force: bool) -> Result<std::path::PathBuf, NodeError> {
        let dir_path = Path::new(dir);
        if !dir_path.exists() {
            std::fs::create_dir_all(dir_path)?;
        }

        let config_path = dir_path.join(CONFIG_FILE_NAME);
        if config_path.exists() && !force {
            return Err(NodeError::ConfigError {
                reason: format!("{} already exists", config_path.display()),
            });
        }

        let toml_str =
            toml::to_string_pretty(&NodeConfig::default()).map_err(|e| NodeError::ConfigError {
                reason: format!("failed to serialize default config: {}", e),
            })?;
        std::fs::write(&config_path, toml_str)?;
        Ok(config_path)
    }

    /// Check every section before anything is built from it.
    pub fn validate(&self) -> Result<(), NodeError> {
        self.capacity.validate()?;
        let sim = &self.simulation;
        if !(0.0..=1.0).contains(&sim.orphan_ref_rate) {
            return Err(NodeError::ConfigError {
                reason: format!(
                    "simulation.orphan_ref_rate must be within [0, 1], got {}",
                    sim.orphan_ref_rate
                ),
            });
        }
        if sim.loss_per_segment > self.erasure.symbols_per_segment + self.erasure.redundancy {
            return Err(NodeError::ConfigError {
                reason: format!(
                    "simulation.loss_per_segment {} exceeds the {} chunks in a segment",
                    sim.loss_per_segment,
                    self.erasure.symbols_per_segment + self.erasure.redundancy
                ),
            });
        }
        if sim.premine_outputs == 0 {
            return Err(NodeError::ConfigError {
                reason: "simulation.premine_outputs must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            capacity: self.capacity,
            erasure: self.erasure,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = NodeConfig::default();
        assert_eq!(config.capacity.min_size, 1.0);
        assert_eq!(config.capacity.max_size, 200.0);
        assert_eq!(config.erasure.redundancy, 2);
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let config = NodeConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let deserialized: NodeConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(deserialized.capacity, config.capacity);
        assert_eq!(deserialized.erasure, config.erasure);
        assert_eq!(deserialized.simulation.seed, config.simulation.seed);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: NodeConfig = toml::from_str(
            r#"
            [capacity]
            max_size = 50.0

            [simulation]
            blocks = 3
            "#,
        )
        .unwrap();
        assert_eq!(config.capacity.max_size, 50.0);
        assert_eq!(config.capacity.min_size, 1.0);
        assert_eq!(config.simulation.blocks, 3);
        assert_eq!(config.simulation.transactions_per_block, 16);
        assert_eq!(config.erasure.data_segments, 4);
    }

    #[test]
    fn test_init_creates_config_file() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().to_str().unwrap();
        let path = NodeConfig::init(dir, false).unwrap();
        assert_eq!(path, tmp.path().join(CONFIG_FILE_NAME));

        let contents = std::fs::read_to_string(path).unwrap();
        let _config: NodeConfig = toml::from_str(&contents).unwrap();
    }

    #[test]
    fn test_init_refuses_overwrite() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().to_str().unwrap();
        NodeConfig::init(dir, false).unwrap();
        assert!(matches!(
            NodeConfig::init(dir, false),
            Err(NodeError::ConfigError { .. })
        ));
        assert!(NodeConfig::init(dir, true).is_ok());
    }

    #[test]
    fn test_load_nonexistent_file() {
        assert!(NodeConfig::load("/nonexistent/path/weft.toml").is_err());
    }

    #[test]
    fn test_load_rejects_invalid_capacity() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[capacity]\nmin_size = 10.0\nmax_size = 2.0\n").unwrap();
        assert!(matches!(
            NodeConfig::load(path.to_str().unwrap()),
            Err(NodeError::WeaveError(_))
        ));
    }

    #[test]
    fn test_validate_loss_bound() {
        let mut config = NodeConfig::default();
        config.simulation.loss_per_segment = 7;
        assert!(config.validate().is_err());
        config.simulation.loss_per_segment = 6;
        assert!(config.validate().is_ok());
    }
}
