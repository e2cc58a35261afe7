// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Configuration file support for poslv-server.
//!
//! Config is loaded from the `[poslv-server]` section of `poslv-rs.toml`.
//! Default search order:
//! 1. Path specified via `--config` CLI argument
//! 2. `./poslv-rs.toml`
//! 3. `~/.config/poslv-rs/poslv-rs.toml`
//! 4. `/etc/poslv-rs/poslv-rs.toml`

use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use poslv_app::{normalize_name, parse_level, ConfigError, ConfigFile};
use poslv_backend::{SimulationProfile, SourceAccess};
use poslv_core::driver::{ExponentialBackoff, FixedDelay, RetryPolicy, SupervisorConfig};
use poslv_core::{Endpoint, FrequencyBounds, StreamBounds};

/// Top-level server configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// General settings
    pub general: GeneralConfig,
    /// Sensor connection
    pub source: SourceConfig,
    /// Reconnect behavior
    pub behavior: BehaviorConfig,
    /// Expected stream rates
    pub streams: StreamsConfig,
    /// JSON-lines publisher
    pub publish: PublishConfig,
    /// Periodic health output
    pub diagnostics: DiagnosticsConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Frame identifier stamped on every published event
    pub frame_id: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: Option<String>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            frame_id: "vehicle_base_link".to_string(),
            log_level: None,
        }
    }
}

/// Packet source configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Source backend ("tcp-json" or "simulated")
    pub backend: String,
    /// Sensor host
    pub host: String,
    /// Sensor port
    pub port: u16,
    /// Longest wait for one packet before the loop iterates
    pub read_timeout_ms: u64,
    /// Longest wait for a connection to open
    pub connect_timeout_ms: u64,
    /// Settings of the simulated backend
    pub simulation: SimulationProfile,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            backend: "tcp-json".to_string(),
            host: "129.132.39.171".to_string(),
            port: 5602,
            read_timeout_ms: 1_000,
            connect_timeout_ms: 5_000,
            simulation: SimulationProfile::default(),
        }
    }
}

/// Reconnect delay strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    #[default]
    Fixed,
    Exponential,
}

/// Reconnect behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorConfig {
    /// Delay before reconnecting, and base delay for exponential backoff
    pub retry_delay_ms: u64,
    pub backoff: BackoffKind,
    /// Cap for exponential backoff
    pub retry_max_delay_ms: u64,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            retry_delay_ms: 1_000,
            backoff: BackoffKind::Fixed,
            retry_max_delay_ms: 30_000,
        }
    }
}

/// Expected rate band of one stream. Unset keys use the stream's default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_hz: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_hz: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub liveness_ms: Option<u64>,
}

impl StreamConfig {
    fn resolve(&self, defaults: FrequencyBounds) -> FrequencyBounds {
        FrequencyBounds::new(
            self.min_hz.unwrap_or(defaults.min_hz),
            self.max_hz.unwrap_or(defaults.max_hz),
            self.liveness_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.liveness),
        )
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamsConfig {
    pub navigation_solution: StreamConfig,
    pub navigation_performance: StreamConfig,
    pub dmi_data: StreamConfig,
}

/// JSON-lines publisher configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    /// Whether the publisher is enabled
    pub enabled: bool,
    /// IP address to listen on
    pub listen: IpAddr,
    /// TCP port to listen on
    pub port: u16,
    /// Lines buffered per subscriber before it starts skipping
    pub buffer: usize,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            listen: IpAddr::V4(std::net::Ipv4Addr::LOCALHOST),
            port: 5610,
            buffer: 256,
        }
    }
}

/// Periodic health report output.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticsConfig {
    pub publish_interval_ms: u64,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            publish_interval_ms: 1_000,
        }
    }
}

impl ServerConfig {
    /// Validate semantic constraints that serde cannot express.
    pub fn validate(&self) -> Result<(), String> {
        validate_log_level(self.general.log_level.as_deref())?;
        if self.general.frame_id.trim().is_empty() {
            return Err("[general].frame_id must not be empty".to_string());
        }

        match normalize_name(&self.source.backend).as_str() {
            "tcpjson" => {
                if self.source.host.trim().is_empty() {
                    return Err("[source].host must not be empty for tcp-json".to_string());
                }
                if self.source.port == 0 {
                    return Err("[source].port must be > 0".to_string());
                }
            }
            "simulated" => self.source.simulation.validate()?,
            _ => {
                return Err(format!(
                    "[source].backend '{}' is invalid (expected one of: tcp-json, simulated)",
                    self.source.backend
                ))
            }
        }
        if self.source.read_timeout_ms == 0 {
            return Err("[source].read_timeout_ms must be > 0".to_string());
        }
        if self.source.connect_timeout_ms == 0 {
            return Err("[source].connect_timeout_ms must be > 0".to_string());
        }

        if self.behavior.retry_delay_ms == 0 {
            return Err("[behavior].retry_delay_ms must be > 0".to_string());
        }
        if self.behavior.backoff == BackoffKind::Exponential
            && self.behavior.retry_max_delay_ms < self.behavior.retry_delay_ms
        {
            return Err(
                "[behavior].retry_max_delay_ms must be >= retry_delay_ms".to_string(),
            );
        }

        let bounds = self.stream_bounds();
        for (name, b) in [
            ("navigation_solution", bounds.navigation_solution),
            ("navigation_performance", bounds.navigation_performance),
            ("dmi_data", bounds.dmi_data),
        ] {
            validate_bounds(name, &b)?;
        }

        if self.publish.enabled {
            if self.publish.port == 0 {
                return Err("[publish].port must be > 0 when publisher is enabled".to_string());
            }
            if self.publish.buffer == 0 {
                return Err("[publish].buffer must be > 0".to_string());
            }
        }
        if self.diagnostics.publish_interval_ms == 0 {
            return Err("[diagnostics].publish_interval_ms must be > 0".to_string());
        }
        Ok(())
    }

    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.source.host.clone(), self.source.port)
    }

    pub fn stream_bounds(&self) -> StreamBounds {
        let defaults = StreamBounds::default();
        StreamBounds {
            navigation_solution: self
                .streams
                .navigation_solution
                .resolve(defaults.navigation_solution),
            navigation_performance: self
                .streams
                .navigation_performance
                .resolve(defaults.navigation_performance),
            dmi_data: self.streams.dmi_data.resolve(defaults.dmi_data),
        }
    }

    pub fn supervisor_config(&self) -> SupervisorConfig {
        SupervisorConfig {
            endpoint: self.endpoint(),
            frame_id: self.general.frame_id.clone(),
            read_timeout: Duration::from_millis(self.source.read_timeout_ms),
            connect_timeout: Duration::from_millis(self.source.connect_timeout_ms),
            bounds: self.stream_bounds(),
        }
    }

    pub fn retry_policy(&self) -> Box<dyn RetryPolicy> {
        let base = Duration::from_millis(self.behavior.retry_delay_ms);
        match self.behavior.backoff {
            BackoffKind::Fixed => Box::new(FixedDelay::new(base)),
            BackoffKind::Exponential => Box::new(ExponentialBackoff::new(
                base,
                Duration::from_millis(self.behavior.retry_max_delay_ms),
            )),
        }
    }

    pub fn source_access(&self) -> SourceAccess {
        SourceAccess {
            simulation: self.source.simulation.clone(),
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        <Self as ConfigFile>::load_from_file(path)
    }

    /// Load configuration from the default search paths.
    /// Returns default config if no config file is found.
    pub fn load_from_default_paths() -> Result<(Self, Option<PathBuf>), ConfigError> {
        <Self as ConfigFile>::load_from_default_paths()
    }

    /// Generate an example configuration under the `[poslv-server]` header.
    pub fn example_toml() -> String {
        #[derive(serde::Serialize)]
        struct Wrapper {
            #[serde(rename = "poslv-server")]
            inner: ServerConfig,
        }
        let defaults = StreamBounds::default();
        let explicit = |b: FrequencyBounds| StreamConfig {
            min_hz: Some(b.min_hz),
            max_hz: Some(b.max_hz),
            liveness_ms: Some(b.liveness.as_millis() as u64),
        };
        let example = ServerConfig {
            general: GeneralConfig {
                frame_id: "vehicle_base_link".to_string(),
                log_level: Some("info".to_string()),
            },
            streams: StreamsConfig {
                navigation_solution: explicit(defaults.navigation_solution),
                navigation_performance: explicit(defaults.navigation_performance),
                dmi_data: explicit(defaults.dmi_data),
            },
            ..Default::default()
        };
        toml::to_string_pretty(&Wrapper { inner: example }).unwrap_or_default()
    }
}

fn validate_log_level(level: Option<&str>) -> Result<(), String> {
    match level {
        Some(level) => parse_level(level)
            .map(|_| ())
            .map_err(|e| format!("[general].log_level: {}", e)),
        None => Ok(()),
    }
}

fn validate_bounds(name: &str, bounds: &FrequencyBounds) -> Result<(), String> {
    if !(bounds.min_hz > 0.0 && bounds.max_hz > 0.0) {
        return Err(format!("[streams.{}] min_hz and max_hz must be > 0", name));
    }
    if bounds.min_hz > bounds.max_hz {
        return Err(format!(
            "[streams.{}] min_hz {} exceeds max_hz {}",
            name, bounds.min_hz, bounds.max_hz
        ));
    }
    if bounds.liveness.is_zero() {
        return Err(format!("[streams.{}] liveness_ms must be > 0", name));
    }
    Ok(())
}

impl ConfigFile for ServerConfig {
    fn section_key() -> &'static str {
        "poslv-server"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.general.frame_id, "vehicle_base_link");
        assert_eq!(config.source.backend, "tcp-json");
        assert_eq!(config.source.host, "129.132.39.171");
        assert_eq!(config.source.port, 5602);
        assert_eq!(config.behavior.retry_delay_ms, 1_000);
        assert_eq!(config.behavior.backoff, BackoffKind::Fixed);
        assert!(config.publish.enabled);
        assert_eq!(config.publish.port, 5610);
        assert!(config.validate().is_ok());

        let bounds = config.stream_bounds();
        assert_eq!(bounds.navigation_solution.min_hz, 1.0);
        assert_eq!(bounds.navigation_solution.max_hz, 200.0);
        assert_eq!(bounds.navigation_performance.min_hz, 0.5);
        assert_eq!(bounds.navigation_performance.max_hz, 1.0);
        assert_eq!(bounds.dmi_data.max_hz, 200.0);
    }

    #[test]
    fn test_parse_full_toml() {
        let toml_str = r#"
[general]
frame_id = "poslv"
log_level = "debug"

[source]
backend = "tcp-json"
host = "10.0.0.2"
port = 5603
read_timeout_ms = 250

[behavior]
retry_delay_ms = 200
backoff = "exponential"
retry_max_delay_ms = 5000

[streams.navigation_performance]
max_hz = 2.0

[streams.dmi_data]
min_hz = 10.0
max_hz = 100.0
liveness_ms = 1000

[publish]
listen = "0.0.0.0"
port = 6000
"#;

        let config: ServerConfig = toml::from_str(toml_str).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.general.frame_id, "poslv");
        assert_eq!(config.endpoint(), Endpoint::new("10.0.0.2", 5603));
        assert_eq!(config.behavior.backoff, BackoffKind::Exponential);
        assert_eq!(
            config.publish.listen,
            IpAddr::V4(std::net::Ipv4Addr::new(0, 0, 0, 0))
        );

        let bounds = config.stream_bounds();
        // unset keys keep the per-stream default
        assert_eq!(bounds.navigation_performance.min_hz, 0.5);
        assert_eq!(bounds.navigation_performance.max_hz, 2.0);
        assert_eq!(bounds.dmi_data.min_hz, 10.0);
        assert_eq!(bounds.dmi_data.liveness, Duration::from_secs(1));

        let supervisor = config.supervisor_config();
        assert_eq!(supervisor.read_timeout, Duration::from_millis(250));
        assert_eq!(supervisor.frame_id, "poslv");

        let policy = config.retry_policy();
        assert_eq!(policy.delay(1), Duration::from_millis(200));
        assert_eq!(policy.delay(3), Duration::from_millis(800));
        assert_eq!(policy.delay(20), Duration::from_secs(5));
    }

    #[test]
    fn test_validate_rejects_inverted_bounds() {
        let mut config = ServerConfig::default();
        config.streams.navigation_solution = StreamConfig {
            min_hz: Some(50.0),
            max_hz: Some(10.0),
            liveness_ms: None,
        };
        let err = config.validate().unwrap_err();
        assert!(err.contains("navigation_solution"));
    }

    #[test]
    fn test_validate_rejects_non_positive_bounds() {
        let mut config = ServerConfig::default();
        config.streams.dmi_data.min_hz = Some(0.0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_fields() {
        let mut config = ServerConfig::default();
        config.general.log_level = Some("verbose".to_string());
        assert!(config.validate().unwrap_err().contains("'verbose'"));

        let mut config = ServerConfig::default();
        config.source.read_timeout_ms = 0;
        assert!(config.validate().is_err());

        let mut config = ServerConfig::default();
        config.source.host = " ".to_string();
        assert!(config.validate().is_err());
        config.source.backend = "simulated".to_string();
        assert!(config.validate().is_ok());

        let mut config = ServerConfig::default();
        config.source.backend = "serial".to_string();
        assert!(config.validate().unwrap_err().contains("serial"));
    }

    #[test]
    fn test_validate_rejects_unschedulable_simulation_rate() {
        let toml_str = r#"
[source]
backend = "simulated"

[source.simulation]
status_hz = 1e-30
"#;
        let config: ServerConfig = toml::from_str(toml_str).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.contains("status_hz"), "{}", err);

        let mut config = config;
        config.source.simulation.status_hz = 0.5;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_example_toml_parses() {
        let example = ServerConfig::example_toml();
        let config = <ServerConfig as ConfigFile>::load_from_str(&example).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.streams.navigation_performance.min_hz, Some(0.5));
        assert_eq!(config.general.log_level.as_deref(), Some("info"));
    }
}
