//! Client configuration
//!
//! Every key is optional; missing keys fall back to the defaults below.
//!
//! ```yaml
//! app_name: Managed Data Request
//! notify_tag: 0x402
//! config_index: 0
//! poll_interval_ms: 1000
//! library_path: C:\MSFS SDK\SimConnect SDK\lib\SimConnect.dll
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

use crate::host::DEFAULT_NOTIFY_TAG;
use crate::{Result, SimError};

/// Name reported to the simulator when none is configured.
pub const DEFAULT_APP_NAME: &str = "Managed Data Request";

/// Default poll period.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

/// Settings for [`crate::SimClient`] and the driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    /// Client name reported to the simulator
    pub app_name: String,
    /// Tag pending-message notifications are raised with
    pub notify_tag: u32,
    /// Index into the host's connection configuration file
    pub config_index: u32,
    /// Period between telemetry requests
    pub poll_interval_ms: u64,
    /// Explicit path to the SimConnect library; the default search path is used otherwise
    pub library_path: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            app_name: DEFAULT_APP_NAME.to_string(),
            notify_tag: DEFAULT_NOTIFY_TAG,
            config_index: 0,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            library_path: None,
        }
    }
}

impl ClientConfig {
    /// Parse and validate a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml_ng::from_str(yaml)
            .map_err(|e| SimError::config_error(format!("invalid YAML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| SimError::file_error(path.to_path_buf(), e))?;
        let config = Self::from_yaml_str(&yaml)?;
        debug!(path = %path.display(), "Loaded client configuration");
        Ok(config)
    }

    /// Check values the host would reject or the poller cannot use.
    pub fn validate(&self) -> Result<()> {
        if self.app_name.trim().is_empty() {
            return Err(SimError::config_error("app_name must not be empty"));
        }
        if self.app_name.contains('\0') {
            return Err(SimError::config_error("app_name must not contain NUL"));
        }
        if self.poll_interval_ms == 0 {
            return Err(SimError::config_error("poll_interval_ms must be greater than zero"));
        }
        Ok(())
    }

    /// Period between telemetry requests.
    ///
    /// A zero interval (only reachable by building the struct directly, since
    /// parsing validates) falls back to the default period.
    pub fn poll_interval(&self) -> Duration {
        if self.poll_interval_ms == 0 {
            warn!(
                default_ms = DEFAULT_POLL_INTERVAL_MS,
                "poll_interval_ms is zero, using the default period"
            );
            return Duration::from_millis(DEFAULT_POLL_INTERVAL_MS);
        }
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_client() {
        let config = ClientConfig::default();
        assert_eq!(config.app_name, "Managed Data Request");
        assert_eq!(config.notify_tag, 0x402);
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
        config.validate().unwrap();
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config = ClientConfig::from_yaml_str("poll_interval_ms: 250\n").unwrap();
        assert_eq!(config.poll_interval_ms, 250);
        assert_eq!(config.app_name, DEFAULT_APP_NAME);
    }

    #[test]
    fn rejects_zero_interval() {
        let err = ClientConfig::from_yaml_str("poll_interval_ms: 0\n").unwrap_err();
        assert!(matches!(err, SimError::Config { .. }));
    }

    #[test]
    fn zero_interval_falls_back_to_default_period() {
        let config = ClientConfig { poll_interval_ms: 0, ..ClientConfig::default() };
        assert!(config.validate().is_err());
        assert_eq!(config.poll_interval(), Duration::from_millis(DEFAULT_POLL_INTERVAL_MS));
    }

    #[test]
    fn rejects_unknown_keys() {
        assert!(ClientConfig::from_yaml_str("poll_interval: 5\n").is_err());
    }

    #[test]
    fn rejects_blank_app_name() {
        assert!(ClientConfig::from_yaml_str("app_name: '  '\n").is_err());
    }

    #[test]
    fn missing_file_is_a_file_error() {
        let err = ClientConfig::from_file("/nonexistent/simwatch.yaml").unwrap_err();
        assert!(matches!(err, SimError::File { .. }));
    }
}
