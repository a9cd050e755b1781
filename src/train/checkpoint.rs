//! Run directory layout and checkpoint persistence
//!
//! A run directory holds:
//! - `checkpoint.safetensors`: model tensors, optimizer buffers and class weights,
//!   with epoch, best validation accuracy and the architecture in the metadata
//! - `epoch.txt`: index of the last completed epoch
//! - `train_arguments.yaml`: the resolved run configuration
//! - `architecture.json`: the model descriptor
//! - `metrics.jsonl`: one line of metrics per epoch
//!
//! Every file is written to a temporary sibling and renamed into place.

use chrono::{DateTime, Local, Utc};
use ndarray::Array2;
use safetensors::tensor::{Dtype, TensorView};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use crate::data::NUM_LOCALIZATIONS;
use crate::model::ArchitectureDescriptor;
use crate::optim::OptimizerState;
use crate::{Error, Result};

pub const CHECKPOINT_FILE: &str = "checkpoint.safetensors";
pub const EPOCH_FILE: &str = "epoch.txt";
pub const TRAIN_ARGUMENTS_FILE: &str = "train_arguments.yaml";
pub const ARCHITECTURE_FILE: &str = "architecture.json";
pub const METRICS_FILE: &str = "metrics.jsonl";

const FORMAT_VERSION: &str = "1";

/// Everything needed to resume or evaluate a run
#[derive(Debug, Clone, PartialEq)]
pub struct Checkpoint {
    /// Number of completed epochs when this checkpoint was taken
    pub epoch: usize,
    pub max_val_acc: f64,
    /// Localization frequencies of the training store
    pub class_weights: [f32; NUM_LOCALIZATIONS],
    pub model: Vec<(String, Array2<f32>)>,
    pub optimizer: OptimizerState,
    pub architecture: ArchitectureDescriptor,
    /// SHA-256 of the resolved configuration
    pub config_sha256: Option<String>,
    pub saved_at: DateTime<Utc>,
}

impl Checkpoint {
    pub fn model_state(&self) -> HashMap<String, Array2<f32>> {
        self.model.iter().cloned().collect()
    }
}

/// Hex SHA-256 of arbitrary text
pub fn sha256_hex(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Write `bytes` to `path` via a temporary file and rename
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut tmp_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    tmp_name.push(".tmp");
    let temp_path = path.with_file_name(tmp_name);
    fs::write(&temp_path, bytes)?;
    fs::rename(&temp_path, path)?;
    Ok(())
}

/// Directory holding the artifacts of one training run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunDirectory {
    root: PathBuf,
}

impl RunDirectory {
    /// Create `runs_dir/{model}_{experiment}_{dd-mm_HH-MM-SS}`
    pub fn create(runs_dir: &Path, model_type: &str, experiment_name: &str) -> Result<Self> {
        let stamp = Local::now().format("%d-%m_%H-%M-%S");
        let mut root = runs_dir.join(format!("{model_type}_{experiment_name}_{stamp}"));
        let mut suffix = 1;
        while root.exists() {
            root = runs_dir.join(format!("{model_type}_{experiment_name}_{stamp}_{suffix}"));
            suffix += 1;
        }
        fs::create_dir_all(&root)?;
        log::info!("Run directory: {}", root.display());
        Ok(Self { root })
    }

    /// Use `root` as the run directory, creating it if needed
    pub fn at(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Open an existing run that holds a checkpoint
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.join(CHECKPOINT_FILE).is_file() {
            return Err(Error::CheckpointNotFound(root));
        }
        Ok(Self { root })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn file(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    pub fn has_checkpoint(&self) -> bool {
        self.file(CHECKPOINT_FILE).is_file()
    }

    /// Record the last completed epoch
    pub fn write_epoch(&self, epoch: usize) -> Result<()> {
        write_atomic(&self.file(EPOCH_FILE), epoch.to_string().as_bytes())
    }

    pub fn read_epoch(&self) -> Result<usize> {
        let path = self.file(EPOCH_FILE);
        let text = fs::read_to_string(&path).map_err(|_| Error::CheckpointNotFound(path.clone()))?;
        text.trim()
            .parse()
            .map_err(|e| Error::CheckpointCorrupt(format!("{}: {e}", path.display())))
    }

    /// Persist the resolved configuration; returns its SHA-256
    pub fn write_train_arguments<T: Serialize>(&self, config: &T) -> Result<String> {
        let yaml = serde_yaml::to_string(config)
            .map_err(|e| Error::Serialization(format!("Failed to serialize config: {e}")))?;
        write_atomic(&self.file(TRAIN_ARGUMENTS_FILE), yaml.as_bytes())?;
        Ok(sha256_hex(&yaml))
    }

    pub fn read_train_arguments(&self) -> Result<serde_yaml::Value> {
        let path = self.file(TRAIN_ARGUMENTS_FILE);
        let text = fs::read_to_string(&path).map_err(|_| Error::CheckpointNotFound(path.clone()))?;
        serde_yaml::from_str(&text)
            .map_err(|e| Error::CheckpointCorrupt(format!("{}: {e}", path.display())))
    }

    /// Keep a copy of the source configuration file
    pub fn copy_config(&self, source: &Path) -> Result<()> {
        let name = source.file_name().ok_or_else(|| {
            Error::ConfigError(format!("config path has no file name: {}", source.display()))
        })?;
        let target = self.root.join(name);
        if target != source {
            write_atomic(&target, &fs::read(source)?)?;
        }
        Ok(())
    }

    pub fn write_architecture(&self, descriptor: &ArchitectureDescriptor) -> Result<()> {
        let json = serde_json::to_string_pretty(descriptor)?;
        write_atomic(&self.file(ARCHITECTURE_FILE), json.as_bytes())
    }

    pub fn save_checkpoint(&self, checkpoint: &Checkpoint) -> Result<()> {
        let mut tensor_data: Vec<(String, Vec<u8>, Vec<usize>)> = Vec::new();
        for (name, value) in &checkpoint.model {
            tensor_data.push((format!("model.{name}"), matrix_bytes(value), shape_of(value)));
        }
        for (name, value) in &checkpoint.optimizer.buffers {
            tensor_data.push((format!("optimizer.{name}"), matrix_bytes(value), shape_of(value)));
        }
        tensor_data.push((
            "class_weights".into(),
            bytemuck::cast_slice(&checkpoint.class_weights[..]).to_vec(),
            vec![NUM_LOCALIZATIONS],
        ));

        let views = tensor_data
            .iter()
            .map(|(name, bytes, shape)| {
                TensorView::new(Dtype::F32, shape.clone(), bytes)
                    .map(|view| (name.as_str(), view))
                    .map_err(|e| Error::Serialization(format!("Invalid tensor {name}: {e}")))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut metadata = HashMap::new();
        metadata.insert("format_version".to_string(), FORMAT_VERSION.to_string());
        metadata.insert("epoch".to_string(), checkpoint.epoch.to_string());
        // Display for f64 is the shortest round-tripping form
        metadata.insert("max_val_acc".to_string(), checkpoint.max_val_acc.to_string());
        metadata.insert("optimizer".to_string(), checkpoint.optimizer.name.clone());
        metadata.insert("optimizer_step".to_string(), checkpoint.optimizer.step.to_string());
        metadata.insert("architecture".to_string(), serde_json::to_string(&checkpoint.architecture)?);
        metadata.insert("saved_at".to_string(), checkpoint.saved_at.to_rfc3339());
        if let Some(hash) = &checkpoint.config_sha256 {
            metadata.insert("config_sha256".to_string(), hash.clone());
        }

        let bytes = safetensors::serialize(views, Some(metadata))
            .map_err(|e| Error::Serialization(format!("Failed to serialize checkpoint: {e}")))?;
        write_atomic(&self.file(CHECKPOINT_FILE), &bytes)?;
        log::debug!("Saved checkpoint at epoch {} to {}", checkpoint.epoch, self.root.display());
        Ok(())
    }

    pub fn load_checkpoint(&self) -> Result<Checkpoint> {
        let path = self.file(CHECKPOINT_FILE);
        let data = fs::read(&path).map_err(|_| Error::CheckpointNotFound(self.root.clone()))?;
        let corrupt = |msg: String| Error::CheckpointCorrupt(format!("{}: {msg}", path.display()));

        let (_, st_metadata) = safetensors::SafeTensors::read_metadata(&data)
            .map_err(|e| corrupt(format!("SafeTensors parsing failed: {e}")))?;
        let meta = st_metadata.metadata().clone().unwrap_or_default();
        let field = |key: &str| meta.get(key).cloned().ok_or_else(|| corrupt(format!("missing metadata '{key}'")));

        let epoch = field("epoch")?.parse().map_err(|e| corrupt(format!("epoch: {e}")))?;
        let max_val_acc = field("max_val_acc")?.parse().map_err(|e| corrupt(format!("max_val_acc: {e}")))?;
        let optimizer_name = field("optimizer")?;
        let optimizer_step =
            field("optimizer_step")?.parse().map_err(|e| corrupt(format!("optimizer_step: {e}")))?;
        let architecture: ArchitectureDescriptor = serde_json::from_str(&field("architecture")?)
            .map_err(|e| corrupt(format!("architecture: {e}")))?;
        let saved_at = DateTime::parse_from_rfc3339(&field("saved_at")?)
            .map_err(|e| corrupt(format!("saved_at: {e}")))?
            .with_timezone(&Utc);

        let tensors = safetensors::SafeTensors::deserialize(&data)
            .map_err(|e| corrupt(format!("SafeTensors parsing failed: {e}")))?;

        let mut model = Vec::new();
        let mut buffers = BTreeMap::new();
        let mut class_weights = None;
        let mut names = tensors.names();
        names.sort();
        for name in names {
            let view = tensors.tensor(name).map_err(|e| corrupt(e.to_string()))?;
            if view.dtype() != Dtype::F32 {
                return Err(corrupt(format!("tensor {name} is not F32")));
            }
            let values: Vec<f32> = view
                .data()
                .chunks_exact(4)
                .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect();
            if name == "class_weights" {
                let arr: [f32; NUM_LOCALIZATIONS] = values
                    .try_into()
                    .map_err(|_| corrupt("class_weights has the wrong length".into()))?;
                class_weights = Some(arr);
            } else if let Some(param) = name.strip_prefix("model.") {
                model.push((param.to_string(), to_matrix(view.shape(), values).map_err(corrupt)?));
            } else if let Some(buffer) = name.strip_prefix("optimizer.") {
                buffers.insert(buffer.to_string(), to_matrix(view.shape(), values).map_err(corrupt)?);
            } else {
                return Err(corrupt(format!("unexpected tensor {name}")));
            }
        }

        Ok(Checkpoint {
            epoch,
            max_val_acc,
            class_weights: class_weights.ok_or_else(|| corrupt("missing class_weights".into()))?,
            model,
            optimizer: OptimizerState { name: optimizer_name, step: optimizer_step, buffers },
            architecture,
            config_sha256: meta.get("config_sha256").cloned(),
            saved_at,
        })
    }
}

fn matrix_bytes(value: &Array2<f32>) -> Vec<u8> {
    let flat: Vec<f32> = value.iter().copied().collect();
    bytemuck::cast_slice(&flat).to_vec()
}

fn shape_of(value: &Array2<f32>) -> Vec<usize> {
    vec![value.nrows(), value.ncols()]
}

fn to_matrix(shape: &[usize], values: Vec<f32>) -> std::result::Result<Array2<f32>, String> {
    match shape {
        [rows, cols] => Array2::from_shape_vec((*rows, *cols), values).map_err(|e| e.to_string()),
        [len] => Array2::from_shape_vec((1, *len), values).map_err(|e| e.to_string()),
        other => Err(format!("unsupported tensor rank {}", other.len())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelParams;
    use ndarray::arr2;
    use tempfile::TempDir;

    fn sample_checkpoint() -> Checkpoint {
        let mut buffers = BTreeMap::new();
        buffers.insert("m.ffn.hidden.weight".to_string(), arr2(&[[0.1, 0.2]]));
        let mut class_weights = [0.0; NUM_LOCALIZATIONS];
        class_weights[0] = 0.75;
        class_weights[3] = 0.25;
        Checkpoint {
            epoch: 4,
            max_val_acc: 71.428_571_428_571_43,
            class_weights,
            model: vec![
                ("ffn.hidden.weight".into(), arr2(&[[1.0, -2.0], [3.5, 0.0]])),
                ("ffn.hidden.bias".into(), arr2(&[[0.5, 0.25]])),
            ],
            optimizer: OptimizerState { name: "adam".into(), step: 12, buffers },
            architecture: ArchitectureDescriptor {
                name: "ffn".into(),
                embedding_dim: 2,
                per_residue: false,
                params: ModelParams::default(),
                num_outputs: 12,
                num_parameters: 6,
            },
            config_sha256: Some(sha256_hex("a: 1")),
            saved_at: Utc::now(),
        }
    }

    #[test]
    fn test_checkpoint_roundtrip_is_exact() {
        let tmp = TempDir::new().unwrap();
        let run = RunDirectory::at(tmp.path().join("run")).unwrap();
        let checkpoint = sample_checkpoint();
        run.save_checkpoint(&checkpoint).unwrap();

        let mut loaded = run.load_checkpoint().unwrap();
        loaded.model.sort_by(|a, b| a.0.cmp(&b.0));
        let mut expected = checkpoint.clone();
        expected.model.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(loaded.max_val_acc.to_bits(), checkpoint.max_val_acc.to_bits());
        assert_eq!(loaded.model, expected.model);
        assert_eq!(loaded.optimizer, expected.optimizer);
        assert_eq!(loaded.class_weights, expected.class_weights);
        assert_eq!(loaded.architecture, expected.architecture);
        assert_eq!(loaded.epoch, 4);
        assert!(!tmp.path().join("run").join("checkpoint.safetensors.tmp").exists());
    }

    #[test]
    fn test_open_without_checkpoint() {
        let tmp = TempDir::new().unwrap();
        assert!(matches!(RunDirectory::open(tmp.path()), Err(Error::CheckpointNotFound(_))));
    }

    #[test]
    fn test_corrupt_checkpoint() {
        let tmp = TempDir::new().unwrap();
        let run = RunDirectory::at(tmp.path()).unwrap();
        fs::write(run.file(CHECKPOINT_FILE), b"not a safetensors file").unwrap();
        assert!(matches!(run.load_checkpoint(), Err(Error::CheckpointCorrupt(_))));
    }

    #[test]
    fn test_epoch_marker() {
        let tmp = TempDir::new().unwrap();
        let run = RunDirectory::at(tmp.path()).unwrap();
        assert!(matches!(run.read_epoch(), Err(Error::CheckpointNotFound(_))));
        run.write_epoch(7).unwrap();
        assert_eq!(run.read_epoch().unwrap(), 7);
        fs::write(run.file(EPOCH_FILE), "seven").unwrap();
        assert!(matches!(run.read_epoch(), Err(Error::CheckpointCorrupt(_))));
    }

    #[test]
    fn test_create_names_run_after_model_and_experiment() {
        let tmp = TempDir::new().unwrap();
        let first = RunDirectory::create(tmp.path(), "ffn", "baseline").unwrap();
        let second = RunDirectory::create(tmp.path(), "ffn", "baseline").unwrap();
        assert_ne!(first, second);
        let name = first.path().file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("ffn_baseline_"));
    }

    #[test]
    fn test_train_arguments_hash_is_stable() {
        let tmp = TempDir::new().unwrap();
        let run = RunDirectory::at(tmp.path()).unwrap();
        let mut map = BTreeMap::new();
        map.insert("lr", 0.001);
        let a = run.write_train_arguments(&map).unwrap();
        let b = run.write_train_arguments(&map).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        let value = run.read_train_arguments().unwrap();
        assert_eq!(value["lr"].as_f64(), Some(0.001));
    }
}
