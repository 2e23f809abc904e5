/*!
Runtime configuration for the envelope.

Every knob has a default matching the stock tool; `from_env` lets operators
point the envelope at another engine binary or scratch location without
code changes.
*/

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::core::constants::defaults;
use crate::core::error::{Error, Result};

/// Environment variable naming the engine binary
pub const ENV_ENGINE: &str = "PQC_ENVELOPE_ENGINE";
/// Environment variable naming a preferred scratch root
pub const ENV_SCRATCH_DIR: &str = "PQC_ENVELOPE_SCRATCH_DIR";
/// Environment variable overriding the probe timeout (seconds)
pub const ENV_PROBE_TIMEOUT: &str = "PQC_ENVELOPE_PROBE_TIMEOUT_SECS";
/// Environment variable overriding the engine operation timeout (seconds)
pub const ENV_OP_TIMEOUT: &str = "PQC_ENVELOPE_OP_TIMEOUT_SECS";
/// Environment variable toggling the in-process fallback
pub const ENV_NATIVE_FALLBACK: &str = "PQC_ENVELOPE_NATIVE_FALLBACK";

/// Envelope configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvelopeConfig {
    /// Path or name of the OpenSSL binary
    pub engine: PathBuf,
    /// Preferred scratch root, tried before `/dev/shm` and the temp dir
    pub scratch_dir: Option<PathBuf>,
    /// Bound on each capability probe
    pub probe_timeout: Duration,
    /// Bound on each engine key-exchange invocation
    pub operation_timeout: Duration,
    /// Whether the in-process X25519 fallback may be selected
    pub native_fallback: bool,
}

impl Default for EnvelopeConfig {
    fn default() -> Self {
        Self {
            engine: PathBuf::from(defaults::ENGINE),
            scratch_dir: None,
            probe_timeout: Duration::from_secs(defaults::PROBE_TIMEOUT_SECS),
            operation_timeout: Duration::from_secs(defaults::OPERATION_TIMEOUT_SECS),
            native_fallback: true,
        }
    }
}

impl EnvelopeConfig {
    /// Create a new configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a configuration from defaults plus `PQC_ENVELOPE_*` overrides
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    ///
    /// Split out of `from_env` so overrides can be tested without touching
    /// the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(engine) = lookup(ENV_ENGINE).filter(|v| !v.trim().is_empty()) {
            config.engine = PathBuf::from(engine.trim());
        }
        if let Some(dir) = lookup(ENV_SCRATCH_DIR).filter(|v| !v.trim().is_empty()) {
            config.scratch_dir = Some(PathBuf::from(dir.trim()));
        }
        if let Some(secs) = lookup(ENV_PROBE_TIMEOUT) {
            config.probe_timeout = parse_secs(ENV_PROBE_TIMEOUT, &secs)?;
        }
        if let Some(secs) = lookup(ENV_OP_TIMEOUT) {
            config.operation_timeout = parse_secs(ENV_OP_TIMEOUT, &secs)?;
        }
        if let Some(flag) = lookup(ENV_NATIVE_FALLBACK) {
            config.native_fallback = parse_flag(ENV_NATIVE_FALLBACK, &flag)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Use a different engine binary
    pub fn with_engine(mut self, engine: impl Into<PathBuf>) -> Self {
        self.engine = engine.into();
        self
    }

    /// Prefer the given scratch root for scopes
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    /// Set the probe timeout
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Set the engine operation timeout
    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    /// Allow or forbid the in-process fallback
    pub fn with_native_fallback(mut self, enabled: bool) -> Self {
        self.native_fallback = enabled;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.engine.as_os_str().is_empty() {
            return Err(Error::Config("engine path is empty".into()));
        }
        if self.probe_timeout.is_zero() {
            return Err(Error::Config("probe timeout must be non-zero".into()));
        }
        if self.operation_timeout.is_zero() {
            return Err(Error::Config("operation timeout must be non-zero".into()));
        }
        Ok(())
    }
}

fn parse_secs(key: &str, value: &str) -> Result<Duration> {
    value
        .trim()
        .parse::<u64>()
        .ok()
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
        .ok_or_else(|| Error::Config(format!("{} must be a positive integer, got {:?}", key, value)))
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::Config(format!("{} must be a boolean, got {:?}", key, value))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = EnvelopeConfig::default();
        assert_eq!(config.engine, PathBuf::from("openssl"));
        assert_eq!(config.probe_timeout, Duration::from_secs(5));
        assert!(config.native_fallback);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() -> Result<()> {
        let config = EnvelopeConfig::from_lookup(lookup(&[
            (ENV_ENGINE, "/opt/openssl-3.5/bin/openssl"),
            (ENV_SCRATCH_DIR, "/run/user/1000"),
            (ENV_PROBE_TIMEOUT, "2"),
            (ENV_OP_TIMEOUT, "10"),
            (ENV_NATIVE_FALLBACK, "off"),
        ]))?;

        assert_eq!(config.engine, PathBuf::from("/opt/openssl-3.5/bin/openssl"));
        assert_eq!(config.scratch_dir, Some(PathBuf::from("/run/user/1000")));
        assert_eq!(config.probe_timeout, Duration::from_secs(2));
        assert_eq!(config.operation_timeout, Duration::from_secs(10));
        assert!(!config.native_fallback);
        Ok(())
    }

    #[test]
    fn test_invalid_overrides() {
        let result = EnvelopeConfig::from_lookup(lookup(&[(ENV_PROBE_TIMEOUT, "0")]));
        assert!(matches!(result, Err(Error::Config(_))));

        let result = EnvelopeConfig::from_lookup(lookup(&[(ENV_OP_TIMEOUT, "soon")]));
        assert!(matches!(result, Err(Error::Config(_))));

        let result = EnvelopeConfig::from_lookup(lookup(&[(ENV_NATIVE_FALLBACK, "maybe")]));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_builder() {
        let config = EnvelopeConfig::new()
            .with_engine("/usr/local/bin/openssl")
            .with_probe_timeout(Duration::from_millis(500))
            .with_native_fallback(false);
        assert_eq!(config.engine, PathBuf::from("/usr/local/bin/openssl"));
        assert_eq!(config.probe_timeout, Duration::from_millis(500));
        assert!(!config.native_fallback);
    }
}
