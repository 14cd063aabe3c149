use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_TILT: f64 = 30.0;
pub const DEFAULT_AZIMUTH: f64 = 180.0;

/// Resolved runtime settings, built from CLI flags and environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub config_path: PathBuf,
    pub json: bool,
    pub log_level: String,
    pub docs_host: String,
    pub docs_port: u16,
    #[serde(with = "humantime_serde")]
    pub docs_timeout: Duration,
}

/// A group of PV modules sharing orientation, wiring and module type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArrayConfig {
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_tilt")]
    pub tilt: f64,
    #[serde(default = "default_azimuth")]
    pub azimuth: f64,
    #[serde(default = "default_count")]
    pub modules_per_string: u32,
    #[serde(default = "default_count")]
    pub strings: u32,
    #[serde(default)]
    pub module: String,
}

fn default_tilt() -> f64 {
    DEFAULT_TILT
}

fn default_azimuth() -> f64 {
    DEFAULT_AZIMUTH
}

fn default_count() -> u32 {
    1
}

impl Default for ArrayConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            tilt: DEFAULT_TILT,
            azimuth: DEFAULT_AZIMUTH,
            modules_per_string: 1,
            strings: 1,
            module: String::new(),
        }
    }
}

impl ArrayConfig {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Total number of modules wired into this array.
    pub fn module_count(&self) -> u64 {
        u64::from(self.modules_per_string) * u64::from(self.strings)
    }
}

/// Top level configuration item: one inverter setup and its arrays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PvPlant {
    pub name: String,
    #[serde(default)]
    pub inverter: String,
    #[serde(default)]
    pub microinverter: bool,
    #[serde(default)]
    pub arrays: Vec<ArrayConfig>,
}

impl PvPlant {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inverter: String::new(),
            microinverter: false,
            arrays: Vec::new(),
        }
    }

    pub fn module_count(&self) -> u64 {
        self.arrays.iter().map(ArrayConfig::module_count).sum()
    }

    pub fn array(&self, name: &str) -> Option<&ArrayConfig> {
        self.arrays.iter().find(|a| a.name == name)
    }
}

/// The YAML document as stored on disk.
///
/// Only `plant` is interpreted. Other top-level sections of the pvcast
/// config file are kept verbatim in `other` so a save does not drop them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlantDocument {
    #[serde(default)]
    pub plant: Vec<PvPlant>,
    #[serde(flatten)]
    pub other: BTreeMap<String, serde_yaml::Value>,
}

/// Optional-field update applied to a plant draft.
#[derive(Debug, Clone, Default)]
pub struct PlantPatch {
    pub name: Option<String>,
    pub inverter: Option<String>,
    pub microinverter: Option<bool>,
}

impl PlantPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.inverter.is_none() && self.microinverter.is_none()
    }
}

/// Optional-field update applied to an array draft.
#[derive(Debug, Clone, Default)]
pub struct ArrayPatch {
    pub name: Option<String>,
    pub tilt: Option<f64>,
    pub azimuth: Option<f64>,
    pub modules_per_string: Option<u32>,
    pub strings: Option<u32>,
    pub module: Option<String>,
}

impl ArrayPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.tilt.is_none()
            && self.azimuth.is_none()
            && self.modules_per_string.is_none()
            && self.strings.is_none()
            && self.module.is_none()
    }
}

/// Structured change events emitted by the registry and consumed by the CLI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConfigEvent {
    PlantAdded { plant: String },
    PlantUpdated { plant: String },
    PlantRenamed { from: String, to: String },
    PlantRemoved { plant: String },
    ArrayAdded { plant: String, array: String },
    ArrayUpdated { plant: String, array: String },
    ArrayRenamed { plant: String, from: String, to: String },
    ArrayRemoved { plant: String, array: String },
    Saved { path: PathBuf },
}

impl ConfigEvent {
    /// Render a human-readable message for the CLI.
    pub fn to_message(&self) -> String {
        match self {
            ConfigEvent::PlantAdded { plant } => format!("Added plant '{}'", plant),
            ConfigEvent::PlantUpdated { plant } => format!("Updated plant '{}'", plant),
            ConfigEvent::PlantRenamed { from, to } => {
                format!("Renamed plant '{}' to '{}'", from, to)
            }
            ConfigEvent::PlantRemoved { plant } => format!("Removed plant '{}'", plant),
            ConfigEvent::ArrayAdded { plant, array } => {
                format!("Added array '{}' to plant '{}'", array, plant)
            }
            ConfigEvent::ArrayUpdated { plant, array } => {
                format!("Updated array '{}' of plant '{}'", array, plant)
            }
            ConfigEvent::ArrayRenamed { plant, from, to } => {
                format!("Renamed array '{}' to '{}' in plant '{}'", from, to, plant)
            }
            ConfigEvent::ArrayRemoved { plant, array } => {
                format!("Removed array '{}' from plant '{}'", array, plant)
            }
            ConfigEvent::Saved { path } => format!("Saved: {}", path.display()),
        }
    }
}
