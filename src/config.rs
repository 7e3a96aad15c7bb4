use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::errors::*;

/// Knobs for a `Machine`. Every field may be omitted from the JSON form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineConfig {
    /// A fetch still pending after this long settles as `FetchError::Timeout`.
    pub fetch_timeout_secs: u64,

    /// Initial contents of the create form.
    pub default_value: String,
    pub default_ttl_secs: u64,
    pub default_validity_secs: u64,
    pub default_sequence: u64,

    /// Also emit the legacy V1 signature on created records.
    pub v1_compatible: bool,
}

impl Default for MachineConfig {
    fn default() -> Self {
        MachineConfig {
            fetch_timeout_secs: 30,
            default_value: String::new(),
            default_ttl_secs: 300,
            default_validity_secs: 24 * 60 * 60,
            default_sequence: 0,
            v1_compatible: false,
        }
    }
}

impl MachineConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: MachineConfig =
            ::serde_json::from_str(json).chain_err(|| "Failed to parse config")?;

        if config.fetch_timeout_secs == 0 {
            bail!(ErrorKind::Config("fetch_timeout_secs must be at least 1".into()));
        }

        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .chain_err(|| format!("Failed to read config {}", path.display()))?;
        Self::from_json_str(&json)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}
