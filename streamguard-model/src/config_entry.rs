#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The enumerated config keys the reconciler reads (spec §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ConfigKey {
    Failover,
    HealthCheck,
    Resources,
    Smtp,
}

impl ConfigKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigKey::Failover => "failover",
            ConfigKey::HealthCheck => "health_check",
            ConfigKey::Resources => "resources",
            ConfigKey::Smtp => "smtp",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "failover" => Some(ConfigKey::Failover),
            "health_check" => Some(ConfigKey::HealthCheck),
            "resources" => Some(ConfigKey::Resources),
            "smtp" => Some(ConfigKey::Smtp),
            _ => None,
        }
    }
}

/// An untyped JSON config blob keyed by one of [`ConfigKey`] (spec §4.2,
/// §6: `GET|PUT /config`).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SystemConfigEntry {
    pub key: String,
    pub value: Value,
}
