//! Layered configuration loading
//!
//! Training layers, lowest precedence first: serde defaults, the YAML file,
//! the `train_arguments.yaml` of a resumed run.
//!
//! Evaluation layers, lowest precedence first: serde defaults, the run's
//! `train_arguments.yaml`, the evaluation YAML file. Keys the evaluation
//! file leaves out (target, key format, embedding mode, filters) come from
//! the run.
//!
//! CLI overrides are applied on the typed config afterwards.

use serde_yaml::{Mapping, Value};
use std::fs;
use std::path::Path;

use super::schema::RunConfig;
use crate::train::TRAIN_ARGUMENTS_FILE;
use crate::{Error, Result};

/// Read a YAML file into an untyped value
fn read_yaml(path: &Path) -> Result<Value> {
    let text = fs::read_to_string(path).map_err(|e| {
        Error::ConfigError(format!("Failed to read config file {}: {e}", path.display()))
    })?;
    serde_yaml::from_str(&text).map_err(|e| {
        Error::ConfigError(format!("Failed to parse YAML config {}: {e}", path.display()))
    })
}

/// Deep-merge `overlay` into `base`; mappings merge key by key, anything else replaces
pub fn merge_values(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Mapping(base_map), Value::Mapping(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (_, Value::Null) => {}
        (base, overlay) => *base = overlay,
    }
}

/// Resolve a config from its file and, when resuming, the run's stored arguments
pub fn load_config(path: &Path, resume: Option<&Path>) -> Result<RunConfig> {
    let mut merged = Value::Mapping(Mapping::new());
    merge_values(&mut merged, read_yaml(path)?);
    if let Some(run_dir) = resume {
        let stored = run_dir.join(TRAIN_ARGUMENTS_FILE);
        if stored.is_file() {
            log::info!("Merging stored arguments from {}", stored.display());
            merge_values(&mut merged, read_yaml(&stored)?);
        }
    }
    let config: RunConfig = serde_yaml::from_value(merged)
        .map_err(|e| Error::ConfigError(format!("Invalid config {}: {e}", path.display())))?;
    Ok(config)
}

/// Resolve the config for evaluating the run in `run_dir`
///
/// The stored `train_arguments.yaml` is the base and the evaluation file
/// overlays it; a run without stored arguments uses the file alone.
pub fn load_evaluation_config(path: &Path, run_dir: &Path) -> Result<RunConfig> {
    let mut merged = Value::Mapping(Mapping::new());
    let stored = run_dir.join(TRAIN_ARGUMENTS_FILE);
    if stored.is_file() {
        log::debug!("Using stored arguments from {}", stored.display());
        merge_values(&mut merged, read_yaml(&stored)?);
    } else {
        log::warn!("No {TRAIN_ARGUMENTS_FILE} in {}; using {} alone", run_dir.display(), path.display());
    }
    merge_values(&mut merged, read_yaml(path)?);
    serde_yaml::from_value(merged)
        .map_err(|e| Error::ConfigError(format!("Invalid config {}: {e}", path.display())))
}

/// Load and validate
pub fn load_and_validate(path: &Path, resume: Option<&Path>) -> Result<RunConfig> {
    let config = load_config(path, resume)?;
    config.validate()?;
    Ok(config)
}
