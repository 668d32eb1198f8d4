//! Configuration types and defaults

use presenca_core::{PresencaError, RetryPolicy};
use presenca_diagnostics::LoggingConfig;
use presenca_facial::FacialServiceConfig;
use presenca_media::CameraRequest;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Durations written as integer milliseconds in configuration files
mod duration_ms {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// Timings and behavior of one attendance controller
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Quality polling period
    #[serde(with = "duration_ms", rename = "quality_interval_ms")]
    pub quality_interval: Duration,
    /// Length of the visible countdown; 0 captures immediately
    pub countdown_seconds: u8,
    /// Period of one countdown step
    #[serde(with = "duration_ms", rename = "countdown_tick_ms")]
    pub countdown_tick: Duration,
    /// Consecutive usable polls needed before quality turns valid
    pub required_valid_polls: u32,
    /// Start the countdown as soon as quality turns valid
    pub auto_capture: bool,
    /// JPEG quality of polling frames
    pub validation_quality: u8,
    /// JPEG quality of submitted frames
    pub submission_quality: u8,
    /// Back-off after a rejected match
    #[serde(with = "duration_ms", rename = "rejected_retry_ms")]
    pub rejected_retry_delay: Duration,
    /// Back-off after a network failure
    #[serde(with = "duration_ms", rename = "network_retry_ms")]
    pub network_retry_delay: Duration,
    /// Back-off after an unclassified failure
    #[serde(with = "duration_ms", rename = "unknown_retry_ms")]
    pub unknown_retry_delay: Duration,
    /// Pause between success and the attendance confirmation call
    #[serde(with = "duration_ms", rename = "confirmation_delay_ms")]
    pub confirmation_delay: Duration,
    /// Extra confirmation attempts after a failure
    pub confirmation_retries: u32,
    /// Base back-off between confirmation attempts (multiplied by the attempt number)
    #[serde(with = "duration_ms", rename = "confirmation_retry_backoff_ms")]
    pub confirmation_retry_backoff: Duration,
    /// Route navigated to after a confirmed attendance
    pub success_redirect: String,
    /// Camera to open
    pub camera: CameraRequest,
    /// Capacity of the event broadcast channel
    pub event_capacity: usize,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        let retry = RetryPolicy::default();
        Self {
            quality_interval: Duration::from_millis(500),
            countdown_seconds: 3,
            countdown_tick: Duration::from_secs(1),
            required_valid_polls: 1,
            auto_capture: false,
            validation_quality: 80,
            submission_quality: 95,
            rejected_retry_delay: retry.rejected_delay,
            network_retry_delay: retry.network_delay,
            unknown_retry_delay: retry.unknown_delay,
            confirmation_delay: Duration::from_millis(1500),
            confirmation_retries: 2,
            confirmation_retry_backoff: Duration::from_secs(2),
            success_redirect: "/dashboard".to_string(),
            camera: CameraRequest::default(),
            event_capacity: 64,
        }
    }
}

impl ControllerConfig {
    /// Recovery delays as a policy
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            rejected_delay: self.rejected_retry_delay,
            network_delay: self.network_retry_delay,
            unknown_delay: self.unknown_retry_delay,
        }
    }

    /// Reject settings the controller cannot run with
    pub fn validate(&self) -> Result<(), PresencaError> {
        let invalid = |message: &str| -> Result<(), PresencaError> {
            Err(PresencaError::InvalidConfiguration {
                message: message.to_string(),
            })
        };

        if self.quality_interval.is_zero() {
            return invalid("quality_interval must be > 0");
        }
        if self.countdown_seconds > 0 && self.countdown_tick.is_zero() {
            return invalid("countdown_tick must be > 0");
        }
        if self.required_valid_polls == 0 {
            return invalid("required_valid_polls must be at least 1");
        }
        if !(1..=100).contains(&self.validation_quality)
            || !(1..=100).contains(&self.submission_quality)
        {
            return invalid("JPEG quality must be between 1 and 100");
        }
        if !self.success_redirect.starts_with('/') {
            return invalid("success_redirect must be an absolute route");
        }
        if self.event_capacity == 0 {
            return invalid("event_capacity must be > 0");
        }
        self.camera
            .validate()
            .map_err(|e| PresencaError::InvalidConfiguration {
                message: e.to_string(),
            })
    }
}

/// Everything a host needs to run the confirmation page
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct PresencaConfig {
    /// Controller behavior
    pub controller: ControllerConfig,
    /// Face service connection
    pub facial: FacialServiceConfig,
    /// Log output
    pub logging: LoggingConfig,
}

impl PresencaConfig {
    /// Parse a TOML document
    pub fn from_toml_str(source: &str) -> Result<Self, PresencaError> {
        let config: Self = toml::from_str(source).map_err(|e| PresencaError::InvalidConfiguration {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML file, then apply environment overrides
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PresencaError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| PresencaError::ConfigurationLoad {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let mut config = Self::from_toml_str(&source).map_err(|e| match e {
            PresencaError::InvalidConfiguration { message } => PresencaError::ConfigurationLoad {
                path: path.display().to_string(),
                reason: message,
            },
            other => other,
        })?;
        config.facial.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Defaults with environment overrides
    pub fn from_env() -> Self {
        Self {
            facial: FacialServiceConfig::from_env(),
            ..Self::default()
        }
    }

    /// Validate every section
    pub fn validate(&self) -> Result<(), PresencaError> {
        self.controller.validate()?;
        self.facial
            .validate()
            .map_err(|message| PresencaError::InvalidConfiguration { message })
    }
}
