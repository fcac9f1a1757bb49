use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{QcryptError, QcryptResult};

/// Top-level configuration (loaded from qcrypt.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QcryptConfig {
    pub crypto: CryptoConfig,
    pub logging: LoggingConfig,
}

impl QcryptConfig {
    /// Read `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> QcryptResult<Self> {
        if !path.exists() {
            tracing::debug!("config file not found: {}  (using defaults)", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| QcryptError::Config(format!("parsing config {}: {e}", path.display())))
    }
}

/// Encryption defaults, overridable per command
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CryptoConfig {
    /// Algorithm per loop, innermost first (default: ["X20-PLY"])
    pub algorithms: Vec<String>,
    /// PBKDF2 iteration count (default: 1000000)
    pub iterations: u32,
    /// First clear-data read in bytes; later reads double (default: 1 MiB)
    pub read_size_start: usize,
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            algorithms: vec!["X20-PLY".into()],
            iterations: 1_000_000,
            read_size_start: 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (default: info)
    pub level: String,
    /// Log format: "json" or "text"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}
