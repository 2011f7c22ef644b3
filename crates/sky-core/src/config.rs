use std::fs;
use std::path::Path;
use std::time::Duration;

use eyre::{Result as EyreResult, WrapErr};
use serde::{Deserialize, Serialize};
use sky_primitives::{Cost, RequestBudget, SECTOR_SIZE};

/// Tunables for one portal instance. A plain `serde`-derived struct with a
/// `Default` impl, so a config file only needs to name the fields it wants
/// to override.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[non_exhaustive]
#[serde(default)]
pub struct Config {
    #[serde(rename = "request_timeout_ms", with = "serde_duration")]
    pub request_timeout: Duration,
    pub price_per_ms: u64,
    pub budget_per_request: u64,
    pub worker_queue_limit: usize,
    pub upload_data_pieces: u8,
    pub upload_parity_pieces: u8,
    pub base_chunk_redundancy: usize,
    pub session_chunk_size: u64,
    pub session_max_size: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            price_per_ms: 1,
            budget_per_request: 1_000_000,
            worker_queue_limit: 8,
            upload_data_pieces: 10,
            upload_parity_pieces: 20,
            base_chunk_redundancy: 30,
            session_chunk_size: SECTOR_SIZE as u64 * 10,
            session_max_size: 2 * 1024 * 1024 * 1024,
        }
    }
}

impl Config {
    pub fn from_toml_str(raw: &str) -> EyreResult<Self> {
        toml::from_str(raw).wrap_err("failed to parse portal config")
    }

    pub fn load(path: &Path) -> EyreResult<Self> {
        let raw = fs::read_to_string(path).wrap_err_with(|| format!("failed to read {}", path.display()))?;
        Self::from_toml_str(&raw)
    }

    pub fn to_toml_string(&self) -> EyreResult<String> {
        toml::to_string_pretty(self).wrap_err("failed to serialize portal config")
    }

    pub fn save(&self, path: &Path) -> EyreResult<()> {
        let raw = self.to_toml_string()?;
        fs::write(path, raw).wrap_err_with(|| format!("failed to write {}", path.display()))
    }

    /// A fresh budget for one request, sized from this config's defaults.
    #[must_use]
    pub fn request_budget(&self) -> RequestBudget {
        RequestBudget::new(
            self.request_timeout,
            Cost::from(self.price_per_ms),
            Cost::from(self.budget_per_request),
        )
    }
}

mod serde_duration {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
