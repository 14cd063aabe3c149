//! Loading and saving the plant configuration file.
//!
//! The file is a YAML document with a top-level `plant:` list. Saves are
//! validated first and written through a sibling temp file that is renamed
//! over the target, so a failed save never leaves a half-written config.

use crate::model::PlantDocument;
use crate::registry::{self, PlantRegistry, RegistryError};
use crate::validate::{self, ValidationReport};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

pub const DEFAULT_FILE_NAME: &str = "pvcast_config.yaml";

#[derive(Debug, Error)]
pub enum ConfigFileError {
    #[error("failed to read {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid plant configuration: {0}")]
    Invalid(ValidationReport),
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Default location: `<user config dir>/pvcast/pvcast_config.yaml`.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("pvcast")
        .join(DEFAULT_FILE_NAME)
}

/// Parse a YAML document into a registry.
///
/// Blank or whitespace-only input yields an empty registry.
pub fn from_yaml_str(yaml: &str) -> Result<PlantRegistry, ConfigFileError> {
    if yaml.trim().is_empty() {
        return Ok(PlantRegistry::new());
    }
    let doc: PlantDocument = serde_yaml::from_str(yaml)?;
    let registry = PlantRegistry::from_document(doc)?;
    let report = registry.validate();
    if !report.is_valid() {
        return Err(ConfigFileError::Invalid(report));
    }
    for issue in report.warnings() {
        warn!(path = %issue.path, "{}", issue.message);
    }
    Ok(registry)
}

/// Validate a YAML document without building a registry.
///
/// Blank or duplicate plant names end up in the report next to every other
/// issue instead of aborting the parse as they do in [`from_yaml_str`].
pub fn validate_yaml_str(yaml: &str) -> Result<ValidationReport, ConfigFileError> {
    if yaml.trim().is_empty() {
        return Ok(ValidationReport::default());
    }
    let mut doc: PlantDocument = serde_yaml::from_str(yaml)?;
    doc.plant.iter_mut().for_each(registry::normalize_plant);
    Ok(validate::validate_plants(&doc.plant))
}

pub fn to_yaml_string(registry: &PlantRegistry) -> Result<String, ConfigFileError> {
    Ok(serde_yaml::to_string(&registry.to_document())?)
}

/// Load the registry from `path`. A missing file is an empty configuration.
pub fn load(path: &Path) -> Result<PlantRegistry, ConfigFileError> {
    let text = match fs::read_to_string(path) {
        Ok(t) => t,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!(path = %path.display(), "config file not found, starting empty");
            return Ok(PlantRegistry::new());
        }
        Err(source) => {
            return Err(ConfigFileError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    let registry = from_yaml_str(&text)?;
    info!(path = %path.display(), plants = registry.len(), "loaded plant configuration");
    Ok(registry)
}

/// Validate and atomically write the registry to `path`.
pub fn save(path: &Path, registry: &PlantRegistry) -> Result<PathBuf, ConfigFileError> {
    let report = registry.validate();
    if !report.is_valid() {
        return Err(ConfigFileError::Invalid(report));
    }

    let body = to_yaml_string(registry)?;
    let stamp = time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "now".into());
    let contents = format!("# pvcast plant configuration, saved {stamp}\n{body}");

    let write_err = |source| ConfigFileError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(write_err)?;
    }

    let tmp = tmp_path(path);
    let mut f = fs::File::create(&tmp).map_err(write_err)?;
    f.write_all(contents.as_bytes()).map_err(write_err)?;
    f.sync_all().map_err(write_err)?;
    drop(f);
    fs::rename(&tmp, path).map_err(write_err)?;

    info!(path = %path.display(), plants = registry.len(), "saved plant configuration");
    Ok(path.to_path_buf())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| DEFAULT_FILE_NAME.into());
    name.push(".tmp");
    path.with_file_name(name)
}
