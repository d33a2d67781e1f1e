//! Configuration for the attestation client.

use std::time::Duration;

use anyhow::{Context, Result};
use attestor_client::{BackoffStrategy, ClientConfig, PollPolicy, ProverConfig};
use attestor_core::DEFAULT_MIC_SALT;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

const CONFIG_FILE: &str = "attestor.toml";

const ENV_PREFIX: &str = "ATTESTOR_";

/// Client configuration with defaults, file, and environment overrides.
///
/// Configuration is loaded in priority order:
/// 1. Environment variables prefixed `ATTESTOR_` (highest priority)
/// 2. Configuration file (`attestor.toml`)
/// 3. Built-in defaults (lowest priority)
///
/// # Example
///
/// ```no_run
/// use attestor::AttestorConfig;
///
/// let config = AttestorConfig::load().expect("Failed to load configuration");
///
/// println!("Oracle provider at {}", config.oracle_url);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttestorConfig {
    // Oracle
    /// Base URL of the attestation provider.
    ///
    /// Environment variable: `ATTESTOR_ORACLE_URL`
    #[serde(default = "default_oracle_url")]
    pub oracle_url: String,
    /// HTTP request timeout in seconds.
    ///
    /// Environment variable: `ATTESTOR_REQUEST_TIMEOUT_SECS`
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    // Finalization polling
    /// Delay after the first unfinalized probe in milliseconds.
    ///
    /// Environment variable: `ATTESTOR_POLL_BASE_DELAY_MS`
    #[serde(default = "default_base_delay_ms")]
    pub poll_base_delay_ms: u64,
    /// Maximum delay between probes in milliseconds.
    ///
    /// Environment variable: `ATTESTOR_POLL_MAX_DELAY_MS`
    #[serde(default = "default_max_delay_ms")]
    pub poll_max_delay_ms: u64,
    /// Jitter factor for probe timing (0.0 to 1.0).
    ///
    /// Environment variable: `ATTESTOR_POLL_JITTER_FACTOR`
    #[serde(default = "default_jitter_factor")]
    pub poll_jitter_factor: f64,

    // Prover
    /// Bound on the finalization wait in seconds; 0 waits indefinitely.
    ///
    /// Environment variable: `ATTESTOR_FINALIZATION_TIMEOUT_SECS`
    #[serde(default)]
    pub finalization_timeout_secs: u64,
    /// Salt for message integrity codes. Must match the oracle network.
    ///
    /// Environment variable: `ATTESTOR_MIC_SALT`
    #[serde(default = "default_mic_salt")]
    pub mic_salt: String,

    // Logging
    /// Log filter directive.
    ///
    /// Environment variable: `ATTESTOR_RUST_LOG`
    #[serde(default = "default_log_level")]
    pub rust_log: String,
}

impl AttestorConfig {
    /// Load configuration from defaults, `attestor.toml`, and environment
    /// variable overrides.
    ///
    /// # Errors
    ///
    /// Fails if a source cannot be parsed or the result does not validate.
    pub fn load() -> Result<Self> {
        Self::from_figment(Self::figment())
    }

    /// The layered provider stack used by [`load`](Self::load).
    pub fn figment() -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file(CONFIG_FILE))
            .merge(Env::prefixed(ENV_PREFIX))
    }

    /// Extract and validate configuration from any provider stack.
    ///
    /// # Errors
    ///
    /// Fails if extraction or validation fails.
    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: Self = figment.extract().context("Failed to load configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Convert to the HTTP oracle client configuration.
    pub fn to_client_config(&self) -> ClientConfig {
        ClientConfig {
            base_url: self.oracle_url.clone(),
            timeout: Duration::from_secs(self.request_timeout_secs),
            ..ClientConfig::default()
        }
    }

    /// Convert to the finalization poll policy.
    pub fn to_poll_policy(&self) -> PollPolicy {
        PollPolicy {
            base_delay: Duration::from_millis(self.poll_base_delay_ms),
            max_delay: Duration::from_millis(self.poll_max_delay_ms),
            jitter_factor: self.poll_jitter_factor,
            strategy: BackoffStrategy::Exponential,
        }
    }

    /// Convert to prover settings.
    pub fn to_prover_config(&self) -> ProverConfig {
        ProverConfig {
            finalization_timeout: (self.finalization_timeout_secs > 0)
                .then(|| Duration::from_secs(self.finalization_timeout_secs)),
            mic_salt: self.mic_salt.clone(),
        }
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Describes the first invalid value.
    pub fn validate(&self) -> Result<()> {
        let url = self.oracle_url.trim();
        if url.is_empty() {
            anyhow::bail!("oracle_url must not be empty");
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            anyhow::bail!("oracle_url must be an http or https URL");
        }

        if self.request_timeout_secs == 0 {
            anyhow::bail!("request_timeout_secs must be greater than 0");
        }

        if self.poll_base_delay_ms == 0 {
            anyhow::bail!("poll_base_delay_ms must be greater than 0");
        }

        if self.poll_base_delay_ms > self.poll_max_delay_ms {
            anyhow::bail!("poll_base_delay_ms cannot exceed poll_max_delay_ms");
        }

        if !(0.0..=1.0).contains(&self.poll_jitter_factor) {
            anyhow::bail!("poll_jitter_factor must be between 0.0 and 1.0");
        }

        if self.mic_salt.is_empty() {
            anyhow::bail!("mic_salt must not be empty");
        }

        Ok(())
    }
}

impl Default for AttestorConfig {
    fn default() -> Self {
        Self {
            oracle_url: default_oracle_url(),
            request_timeout_secs: default_request_timeout(),
            poll_base_delay_ms: default_base_delay_ms(),
            poll_max_delay_ms: default_max_delay_ms(),
            poll_jitter_factor: default_jitter_factor(),
            finalization_timeout_secs: 0,
            mic_salt: default_mic_salt(),
            rust_log: default_log_level(),
        }
    }
}

fn default_oracle_url() -> String {
    "http://localhost:9500".to_string()
}

fn default_request_timeout() -> u64 {
    attestor_client::DEFAULT_TIMEOUT_SECONDS
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    30000
}

fn default_jitter_factor() -> f64 {
    0.1
}

fn default_mic_salt() -> String {
    DEFAULT_MIC_SALT.to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use figment::Jail;

    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = AttestorConfig::default();

        assert!(config.validate().is_ok());
        assert_eq!(config.mic_salt, "Flare");
        assert_eq!(config.to_prover_config().finalization_timeout, None);
        assert_eq!(config.to_client_config().base_url, "http://localhost:9500");
    }

    #[test]
    fn file_then_environment_override_defaults() {
        Jail::expect_with(|jail| {
            jail.create_file(
                CONFIG_FILE,
                r#"
                oracle_url = "https://oracle.example"
                poll_base_delay_ms = 250
                mic_salt = "FromFile"
                "#,
            )?;
            jail.set_env("ATTESTOR_MIC_SALT", "FromEnv");
            jail.set_env("ATTESTOR_FINALIZATION_TIMEOUT_SECS", "90");

            let config = AttestorConfig::load().map_err(|e| e.to_string())?;

            assert_eq!(config.oracle_url, "https://oracle.example");
            assert_eq!(config.poll_base_delay_ms, 250);
            assert_eq!(config.poll_max_delay_ms, default_max_delay_ms());
            assert_eq!(config.mic_salt, "FromEnv");
            assert_eq!(
                config.to_prover_config().finalization_timeout,
                Some(Duration::from_secs(90))
            );
            Ok(())
        });
    }

    #[test]
    fn invalid_environment_value_fails_to_load() {
        Jail::expect_with(|jail| {
            jail.set_env("ATTESTOR_POLL_JITTER_FACTOR", "1.5");

            let err = AttestorConfig::load().unwrap_err();

            assert!(format!("{err:#}").contains("poll_jitter_factor"));
            Ok(())
        });
    }

    #[test]
    fn conversions_carry_values() {
        let config = AttestorConfig {
            request_timeout_secs: 7,
            poll_base_delay_ms: 200,
            poll_max_delay_ms: 5000,
            poll_jitter_factor: 0.0,
            ..Default::default()
        };

        let policy = config.to_poll_policy();
        assert_eq!(policy.base_delay, Duration::from_millis(200));
        assert_eq!(policy.max_delay, Duration::from_secs(5));
        assert_eq!(policy.delay_for(2), Duration::from_millis(400));
        assert_eq!(config.to_client_config().timeout, Duration::from_secs(7));
    }

    #[test]
    fn invalid_config_validation_fails() {
        let mut config = AttestorConfig { oracle_url: String::new(), ..Default::default() };
        assert!(config.validate().is_err());

        config = AttestorConfig { oracle_url: "ftp://oracle".to_string(), ..Default::default() };
        assert!(config.validate().is_err());

        config = AttestorConfig { poll_base_delay_ms: 0, ..Default::default() };
        assert!(config.validate().is_err());

        config = AttestorConfig { poll_base_delay_ms: 10, poll_max_delay_ms: 5, ..Default::default() };
        assert!(config.validate().is_err());

        config = AttestorConfig { poll_jitter_factor: -0.1, ..Default::default() };
        assert!(config.validate().is_err());

        config = AttestorConfig { mic_salt: String::new(), ..Default::default() };
        assert!(config.validate().is_err());
    }
}
