//! Configuration structures for prosesim devices
//!
//! This module provides configuration types for the prosesim simulator:
//! the per-device configuration (identity, role, sidelink addressing) and
//! the ProSe layer configuration (discovery, relay selection, direct-link
//! timers).

use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Role a device plays in the ProSe relay service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeviceRole {
    /// Out-of-network device seeking connectivity through a relay
    Remote,
    /// Network-attached device offering the U2N relay service
    Relay,
}

impl fmt::Display for DeviceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceRole::Remote => write!(f, "remote"),
            DeviceRole::Relay => write!(f, "relay"),
        }
    }
}

/// Discovery interaction model (3GPP TS 23.304).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiscoveryModel {
    /// Model A: relays periodically announce themselves
    ModelA,
    /// Model B: remotes solicit, matching relays respond
    ModelB,
}

impl fmt::Display for DiscoveryModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscoveryModel::ModelA => write!(f, "model-a"),
            DiscoveryModel::ModelB => write!(f, "model-b"),
        }
    }
}

/// Relay selection algorithm flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SelectionAlgorithm {
    /// First discovered relay, in discovery order
    FirstAvailable,
    /// Uniformly-random relay from the discovered list
    Random,
    /// Eligible relay with the strongest filtered RSRP
    MaxRsrp,
}

impl fmt::Display for SelectionAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionAlgorithm::FirstAvailable => write!(f, "first-available"),
            SelectionAlgorithm::Random => write!(f, "random"),
            SelectionAlgorithm::MaxRsrp => write!(f, "max-rsrp"),
        }
    }
}

/// ProSe layer configuration.
///
/// Defaults follow the reference relay-selection scenario: 2 s discovery
/// interval, −110 dBm RSRP threshold, 10 dB hysteresis, 0.5 filter
/// coefficient, 8 s T5080 and 5 s T5087.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProseConfig {
    /// Discovery interaction model
    #[serde(default = "default_discovery_model")]
    pub discovery_model: DiscoveryModel,
    /// Interval between two discovery transmissions (ms)
    #[serde(default = "default_discovery_interval_ms")]
    pub discovery_interval_ms: u64,
    /// Window for the uniformly-random first-transmission offset (ms)
    #[serde(default = "default_discovery_slot_window_ms")]
    pub discovery_slot_window_ms: u64,
    /// Relay selection algorithm
    #[serde(default = "default_selection_algorithm")]
    pub selection_algorithm: SelectionAlgorithm,
    /// Seed for the random selection algorithm's private stream
    #[serde(default)]
    pub selection_seed: u64,
    /// Interval between periodic relay reselection evaluations (ms)
    #[serde(default = "default_reselection_interval_ms")]
    pub reselection_interval_ms: u64,
    /// RSRP eligibility threshold (dBm)
    #[serde(default = "default_rsrp_threshold_dbm")]
    pub rsrp_threshold_dbm: f64,
    /// Eligibility hysteresis margin (dB)
    #[serde(default = "default_hysteresis_db")]
    pub hysteresis_db: f64,
    /// Exponential filter coefficient, in [0, 1]
    #[serde(default = "default_filter_alpha")]
    pub filter_alpha: f64,
    /// T5080 duration: establishment request retransmission timer (ms)
    #[serde(default = "default_t5080_ms")]
    pub t5080_ms: u64,
    /// Maximum T5080-driven retransmissions before establishment fails
    #[serde(default = "default_max_retx")]
    pub t5080_max_retx: u32,
    /// T5087 duration: release request retransmission timer (ms)
    #[serde(default = "default_t5087_ms")]
    pub t5087_ms: u64,
    /// Maximum T5087-driven retransmissions before local release completes
    #[serde(default = "default_max_retx")]
    pub t5087_max_retx: u32,
    /// Discovered-candidate expiry with no refresh (ms); None keeps entries
    /// forever
    #[serde(default)]
    pub candidate_expiry_ms: Option<u64>,
}

fn default_discovery_model() -> DiscoveryModel {
    DiscoveryModel::ModelA
}

fn default_discovery_interval_ms() -> u64 {
    2000
}

fn default_discovery_slot_window_ms() -> u64 {
    1000
}

fn default_selection_algorithm() -> SelectionAlgorithm {
    SelectionAlgorithm::MaxRsrp
}

fn default_reselection_interval_ms() -> u64 {
    1000
}

fn default_rsrp_threshold_dbm() -> f64 {
    -110.0
}

fn default_hysteresis_db() -> f64 {
    10.0
}

fn default_filter_alpha() -> f64 {
    0.5
}

fn default_t5080_ms() -> u64 {
    8000
}

fn default_t5087_ms() -> u64 {
    5000
}

fn default_max_retx() -> u32 {
    3
}

impl Default for ProseConfig {
    fn default() -> Self {
        Self {
            discovery_model: default_discovery_model(),
            discovery_interval_ms: default_discovery_interval_ms(),
            discovery_slot_window_ms: default_discovery_slot_window_ms(),
            selection_algorithm: default_selection_algorithm(),
            selection_seed: 0,
            reselection_interval_ms: default_reselection_interval_ms(),
            rsrp_threshold_dbm: default_rsrp_threshold_dbm(),
            hysteresis_db: default_hysteresis_db(),
            filter_alpha: default_filter_alpha(),
            t5080_ms: default_t5080_ms(),
            t5080_max_retx: default_max_retx(),
            t5087_ms: default_t5087_ms(),
            t5087_max_retx: default_max_retx(),
            candidate_expiry_ms: None,
        }
    }
}

impl ProseConfig {
    /// Validates the configuration, rejecting values that would otherwise
    /// have to be silently defaulted.
    pub fn validate(&self) -> Result<(), Error> {
        if !(0.0..=1.0).contains(&self.filter_alpha) {
            return Err(Error::Config(format!(
                "filter_alpha must be within [0, 1], got {}",
                self.filter_alpha
            )));
        }
        if self.hysteresis_db < 0.0 {
            return Err(Error::Config(format!(
                "hysteresis_db must be non-negative, got {}",
                self.hysteresis_db
            )));
        }
        if self.discovery_interval_ms == 0 {
            return Err(Error::Config(
                "discovery_interval_ms must be positive".to_string(),
            ));
        }
        if self.reselection_interval_ms == 0 {
            return Err(Error::Config(
                "reselection_interval_ms must be positive".to_string(),
            ));
        }
        if self.t5080_ms == 0 || self.t5087_ms == 0 {
            return Err(Error::Config(
                "T5080 and T5087 durations must be positive".to_string(),
            ));
        }
        if self.t5080_max_retx == 0 || self.t5087_max_retx == 0 {
            return Err(Error::Config(
                "T5080 and T5087 retransmission budgets must be positive".to_string(),
            ));
        }
        if self.candidate_expiry_ms == Some(0) {
            return Err(Error::Config(
                "candidate_expiry_ms must be positive when set".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns the discovery interval as a Duration.
    pub fn discovery_interval(&self) -> Duration {
        Duration::from_millis(self.discovery_interval_ms)
    }

    /// Returns the discovery slot window as a Duration.
    pub fn discovery_slot_window(&self) -> Duration {
        Duration::from_millis(self.discovery_slot_window_ms)
    }

    /// Returns the reselection interval as a Duration.
    pub fn reselection_interval(&self) -> Duration {
        Duration::from_millis(self.reselection_interval_ms)
    }

    /// Returns the T5080 duration as a Duration.
    pub fn t5080(&self) -> Duration {
        Duration::from_millis(self.t5080_ms)
    }

    /// Returns the T5087 duration as a Duration.
    pub fn t5087(&self) -> Duration {
        Duration::from_millis(self.t5087_ms)
    }

    /// Returns the candidate expiry as a Duration, if aging is enabled.
    pub fn candidate_expiry(&self) -> Option<Duration> {
        self.candidate_expiry_ms.map(Duration::from_millis)
    }
}

/// Per-device configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Layer-2 identifier of this device, unique across the scenario
    pub l2_id: u32,
    /// Role of the device (remote or relay)
    pub role: DeviceRole,
    /// Relay service code offered (relay role) or monitored (remote role)
    pub relay_code: u32,
    /// Simulated position used to derive RSRP, as [x, y, z]
    #[serde(default)]
    pub sim_pos: [i32; 3],
    /// Local sidelink bind address
    pub bind_address: SocketAddr,
    /// Sidelink addresses of the other devices in the scenario
    #[serde(default)]
    pub peer_search_list: Vec<SocketAddr>,
    /// ProSe layer configuration
    #[serde(default)]
    pub prose: ProseConfig,
}

impl DeviceConfig {
    /// Validates the device configuration together with its ProSe section.
    pub fn validate(&self) -> Result<(), Error> {
        if self.l2_id == 0 {
            return Err(Error::Config("l2_id must be non-zero".to_string()));
        }
        if self.relay_code == 0 {
            return Err(Error::Config(
                "relay_code must be non-zero (0 is reserved for plain unicast links)".to_string(),
            ));
        }
        self.prose.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_device_config() -> DeviceConfig {
        DeviceConfig {
            l2_id: 1,
            role: DeviceRole::Remote,
            relay_code: 5,
            sim_pos: [0, 0, 0],
            bind_address: "127.0.0.1:0".parse().unwrap(),
            peer_search_list: vec![],
            prose: ProseConfig::default(),
        }
    }

    #[test]
    fn test_prose_config_defaults() {
        let config = ProseConfig::default();
        assert_eq!(config.discovery_interval_ms, 2000);
        assert_eq!(config.rsrp_threshold_dbm, -110.0);
        assert_eq!(config.hysteresis_db, 10.0);
        assert_eq!(config.filter_alpha, 0.5);
        assert_eq!(config.t5080_ms, 8000);
        assert_eq!(config.t5087_ms, 5000);
        assert!(config.candidate_expiry_ms.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_filter_alpha_rejected() {
        let mut config = ProseConfig::default();
        config.filter_alpha = 1.5;
        assert!(config.validate().is_err());

        config.filter_alpha = -0.1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_timer_rejected() {
        let mut config = ProseConfig::default();
        config.t5080_ms = 0;
        assert!(config.validate().is_err());

        let mut config = ProseConfig::default();
        config.t5087_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_retx_budget_rejected() {
        let mut config = ProseConfig::default();
        config.t5080_max_retx = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_expiry_rejected() {
        let mut config = ProseConfig::default();
        config.candidate_expiry_ms = Some(0);
        assert!(config.validate().is_err());

        config.candidate_expiry_ms = Some(10_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_relay_code_rejected() {
        let mut config = test_device_config();
        config.relay_code = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_device_config_yaml_roundtrip() {
        let config = test_device_config();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: DeviceConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.l2_id, config.l2_id);
        assert_eq!(parsed.role, config.role);
        assert_eq!(parsed.prose, config.prose);
    }

    #[test]
    fn test_minimal_yaml_uses_defaults() {
        let yaml = r#"
l2_id: 7
role: relay
relay_code: 42
bind_address: 127.0.0.1:5000
"#;
        let config: DeviceConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.role, DeviceRole::Relay);
        assert_eq!(config.prose.discovery_model, DiscoveryModel::ModelA);
        assert_eq!(config.prose.selection_algorithm, SelectionAlgorithm::MaxRsrp);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_display_impls() {
        assert_eq!(format!("{}", DeviceRole::Remote), "remote");
        assert_eq!(format!("{}", DiscoveryModel::ModelB), "model-b");
        assert_eq!(format!("{}", SelectionAlgorithm::MaxRsrp), "max-rsrp");
    }
}
