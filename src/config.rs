use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{ModelScoutError, Result};

/// Name of the configuration file stored inside the `.modelscout` directory.
pub const CONFIG_FILENAME: &str = "config.json";

/// Name of the persisted cache state file stored inside the `.modelscout`
/// directory.
pub const STATE_FILENAME: &str = "state.json";

/// Name of the hidden directory used to store modelscout state.
pub const MODELSCOUT_DIR: &str = ".modelscout";

/// Configuration for a modelscout root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelScoutConfig {
    /// Schema version of the configuration.
    pub version: u32,
    /// Base URL of the model index queried for lookups.
    pub api_base_url: String,
    /// Ceiling in seconds for one whole lookup batch.
    pub lookup_timeout_secs: u64,
    /// Capacity of the event channel feeding subscribers.
    pub event_capacity: usize,
}

impl Default for ModelScoutConfig {
    fn default() -> Self {
        Self {
            version: 1,
            api_base_url: "https://huggingface.co".to_string(),
            lookup_timeout_secs: 60,
            event_capacity: 32,
        }
    }
}

/// Returns the path to the `.modelscout` directory within the given root.
pub fn get_modelscout_dir(root: &Path) -> PathBuf {
    root.join(MODELSCOUT_DIR)
}

/// Returns the path to the configuration file (`config.json`) within the
/// `.modelscout` directory.
pub fn get_config_path(root: &Path) -> PathBuf {
    get_modelscout_dir(root).join(CONFIG_FILENAME)
}

/// Returns the path to the persisted cache state file (`state.json`) within
/// the `.modelscout` directory.
pub fn get_state_path(root: &Path) -> PathBuf {
    get_modelscout_dir(root).join(STATE_FILENAME)
}

/// Loads the configuration from disk.
///
/// If the configuration file does not exist, returns the default
/// configuration.
pub fn load_config(root: &Path) -> Result<ModelScoutConfig> {
    let config_path = get_config_path(root);

    if !config_path.exists() {
        return Ok(ModelScoutConfig::default());
    }

    let contents = fs::read_to_string(&config_path).map_err(|e| ModelScoutError::Config {
        message: format!(
            "failed to read config file '{}': {}",
            config_path.display(),
            e
        ),
    })?;

    let config: ModelScoutConfig =
        serde_json::from_str(&contents).map_err(|e| ModelScoutError::Config {
            message: format!(
                "failed to parse config file '{}': {}",
                config_path.display(),
                e
            ),
        })?;

    Ok(config)
}

/// Saves the configuration to disk using an atomic write.
///
/// Writes to a temporary file first and then renames it to the final
/// location, ensuring that a partial write never corrupts the configuration.
pub fn save_config(root: &Path, config: &ModelScoutConfig) -> Result<()> {
    let scout_dir = get_modelscout_dir(root);
    fs::create_dir_all(&scout_dir).map_err(|e| ModelScoutError::Config {
        message: format!(
            "failed to create modelscout directory '{}': {}",
            scout_dir.display(),
            e
        ),
    })?;

    let config_path = get_config_path(root);
    let tmp_path = config_path.with_extension("tmp");

    let json = serde_json::to_string_pretty(config).map_err(|e| ModelScoutError::Config {
        message: format!("failed to serialize config: {}", e),
    })?;

    fs::write(&tmp_path, &json).map_err(|e| ModelScoutError::Config {
        message: format!(
            "failed to write temporary config file '{}': {}",
            tmp_path.display(),
            e
        ),
    })?;

    fs::rename(&tmp_path, &config_path).map_err(|e| ModelScoutError::Config {
        message: format!(
            "failed to rename temporary config file '{}' to '{}': {}",
            tmp_path.display(),
            config_path.display(),
            e
        ),
    })?;

    Ok(())
}
