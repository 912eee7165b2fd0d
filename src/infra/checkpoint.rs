// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves and restores model state using Burn's CompactRecorder.
//
// Directory layout:
//   checkpoints/
//     model_epoch_1.mpk          ← weights after epoch 1
//     model_epoch_2.mpk
//     ...
//     latest_epoch.json          ← number of the last saved epoch
//     best_model_metadata.json   ← which epoch had the best loss
//     model_config.json          ← architecture, to rebuild the model
//     tokenizer.json             ← vocabulary (see tokenizer_store)
//
// Restoration order (locate):
//   1. best_model_metadata.json, if present, readable, and the
//      weights it names exist
//   2. the checkpoint directory itself: latest_epoch.json, then
//      the highest model_epoch_N file found
//   3. nothing: the caller decides what "no model" means
//
// Nothing here creates the directory until something is saved,
// so an inference-only run leaves the filesystem untouched.
//
// Reference: Burn Book §5 (Records and Checkpointing)
//            Rust Book §9 (Error Handling)

use anyhow::{bail, Context, Result};
use burn::{
    prelude::*,
    record::{CompactRecorder, Recorder},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::ml::model::{CaptionModel, CaptionModelConfig};

pub const BEST_MODEL_METADATA: &str = "best_model_metadata.json";
const LATEST_EPOCH_FILE: &str = "latest_epoch.json";
const MODEL_CONFIG_FILE: &str = "model_config.json";
const MODEL_PREFIX: &str = "model_epoch_";

/// Recorder output extensions we accept when looking for weights.
const WEIGHT_EXTENSIONS: [&str; 2] = ["mpk", "mpk.gz"];

/// Describes the best checkpoint a training run produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestModelMetadata {
    pub epoch:          usize,
    pub val_loss:       f64,
    pub checkpoint_dir: PathBuf,
    /// Recorder file stem, e.g. "model_epoch_3"
    pub model_file:     String,
    pub saved_at:       DateTime<Utc>,
}

impl BestModelMetadata {
    pub fn new(epoch: usize, val_loss: f64, checkpoint_dir: impl Into<PathBuf>) -> Self {
        Self {
            epoch,
            val_loss,
            checkpoint_dir: checkpoint_dir.into(),
            model_file:     model_stem(epoch),
            saved_at:       Utc::now(),
        }
    }
}

/// Where a located checkpoint came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointSource {
    Metadata,
    Directory,
}

/// A checkpoint that exists on disk and can be loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckpointLocation {
    /// Directory holding the weights, model config and tokenizer
    pub dir:    PathBuf,
    /// Weights path without the recorder extension
    pub stem:   PathBuf,
    pub epoch:  Option<usize>,
    pub source: CheckpointSource,
}

pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Cannot create checkpoint directory '{}'", self.dir.display()))
    }

    /// Save model weights for `epoch` and advance latest_epoch.json.
    /// Returns the recorder file stem.
    pub fn save_model<B: Backend>(&self, model: &CaptionModel<B>, epoch: usize) -> Result<String> {
        self.ensure_dir()?;

        let stem = model_stem(epoch);
        let path = self.dir.join(&stem);

        CompactRecorder::new()
            .record(model.clone().into_record(), path.clone())
            .with_context(|| format!("Failed to save checkpoint to '{}'", path.display()))?;

        fs::write(self.dir.join(LATEST_EPOCH_FILE), serde_json::to_string(&epoch)?)
            .with_context(|| "Failed to write latest_epoch.json")?;

        tracing::debug!("Saved checkpoint: epoch {}", epoch);
        Ok(stem)
    }

    /// Persist the best-model metadata record.
    pub fn save_best(&self, meta: &BestModelMetadata) -> Result<()> {
        self.ensure_dir()?;
        let path = self.dir.join(BEST_MODEL_METADATA);
        fs::write(&path, serde_json::to_string_pretty(meta)?)
            .with_context(|| format!("Cannot write '{}'", path.display()))?;
        tracing::info!("Best model so far: epoch {} (loss {:.4})", meta.epoch, meta.val_loss);
        Ok(())
    }

    /// Read best_model_metadata.json; Ok(None) when it does not exist.
    pub fn load_best_metadata(&self) -> Result<Option<BestModelMetadata>> {
        let path = self.dir.join(BEST_MODEL_METADATA);
        if !path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read '{}'", path.display()))?;
        let meta = serde_json::from_str(&json)
            .with_context(|| format!("Malformed '{}'", path.display()))?;
        Ok(Some(meta))
    }

    /// Save the model architecture so inference can rebuild it.
    pub fn save_config(&self, cfg: &CaptionModelConfig) -> Result<()> {
        self.ensure_dir()?;
        let path = self.dir.join(MODEL_CONFIG_FILE);
        fs::write(&path, serde_json::to_string_pretty(cfg)?)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))?;
        tracing::debug!("Saved model config to '{}'", path.display());
        Ok(())
    }

    /// Load the model architecture stored beside a checkpoint.
    pub fn load_config(dir: &Path) -> Result<CaptionModelConfig> {
        let path = dir.join(MODEL_CONFIG_FILE);
        let json = fs::read_to_string(&path).with_context(|| {
            format!("Cannot read model config from '{}'", path.display())
        })?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Find the checkpoint to restore, following metadata first and
    /// the directory contents second.
    pub fn locate(&self) -> Result<Option<CheckpointLocation>> {
        match self.load_best_metadata() {
            Ok(Some(meta)) => {
                if let Some(loc) = self.from_metadata(&meta) {
                    return Ok(Some(loc));
                }
                tracing::warn!(
                    "{} names '{}' but its weights are missing; scanning '{}'",
                    BEST_MODEL_METADATA,
                    meta.model_file,
                    self.dir.display()
                );
            }
            Ok(None) => {
                tracing::info!("No {} found; scanning '{}'", BEST_MODEL_METADATA, self.dir.display());
            }
            Err(e) => {
                tracing::warn!("Ignoring unreadable metadata: {:#}", e);
            }
        }

        Ok(self.from_directory())
    }

    /// Resolve the metadata's directory; a stale or relative path
    /// falls back to the directory the metadata was read from.
    fn from_metadata(&self, meta: &BestModelMetadata) -> Option<CheckpointLocation> {
        [meta.checkpoint_dir.clone(), self.dir.clone()]
            .into_iter()
            .find(|dir| weights_exist(&dir.join(&meta.model_file)))
            .map(|dir| CheckpointLocation {
                stem:   dir.join(&meta.model_file),
                dir,
                epoch:  Some(meta.epoch),
                source: CheckpointSource::Metadata,
            })
    }

    fn from_directory(&self) -> Option<CheckpointLocation> {
        if !self.dir.is_dir() {
            return None;
        }

        let epoch = self
            .latest_epoch()
            .filter(|&e| weights_exist(&self.dir.join(model_stem(e))))
            .or_else(|| self.highest_saved_epoch())?;

        Some(CheckpointLocation {
            dir:    self.dir.clone(),
            stem:   self.dir.join(model_stem(epoch)),
            epoch:  Some(epoch),
            source: CheckpointSource::Directory,
        })
    }

    /// Load weights from `location` into `model`.
    ///
    /// Fails when the stored weights do not have the shapes of `model`,
    /// i.e. when model_config.json and the weights disagree.
    pub fn load_model<B: Backend>(
        &self,
        model:    CaptionModel<B>,
        location: &CheckpointLocation,
        device:   &B::Device,
    ) -> Result<CaptionModel<B>> {
        tracing::info!("Loading checkpoint '{}'", location.stem.display());

        let record = CompactRecorder::new()
            .load(location.stem.clone(), device)
            .with_context(|| format!("Cannot load checkpoint '{}'", location.stem.display()))?;

        let expected = model.param_shapes();
        let model    = model.load_record(record);

        let mismatch = expected
            .iter()
            .zip(model.param_shapes())
            .find(|(want, got)| want.1 != got.1);
        if let Some(((name, want), (_, got))) = mismatch {
            bail!(
                "Checkpoint '{}' does not match {}: {} is {:?}, expected {:?}",
                location.stem.display(),
                MODEL_CONFIG_FILE,
                name,
                got,
                want,
            );
        }

        Ok(model)
    }

    fn latest_epoch(&self) -> Option<usize> {
        let s = fs::read_to_string(self.dir.join(LATEST_EPOCH_FILE)).ok()?;
        serde_json::from_str::<usize>(s.trim()).ok()
    }

    fn highest_saved_epoch(&self) -> Option<usize> {
        fs::read_dir(&self.dir)
            .ok()?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| parse_epoch(&entry.file_name().to_string_lossy()))
            .max()
    }
}

fn model_stem(epoch: usize) -> String {
    format!("{MODEL_PREFIX}{epoch}")
}

/// "model_epoch_12.mpk" → Some(12)
fn parse_epoch(file_name: &str) -> Option<usize> {
    let rest = file_name.strip_prefix(MODEL_PREFIX)?;
    WEIGHT_EXTENSIONS
        .iter()
        .find_map(|ext| rest.strip_suffix(&format!(".{ext}")))
        .and_then(|n| n.parse().ok())
}

fn weights_exist(stem: &Path) -> bool {
    WEIGHT_EXTENSIONS.iter().any(|ext| {
        let mut name = stem.as_os_str().to_owned();
        name.push(".");
        name.push(ext);
        Path::new(&name).is_file()
    })
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::model::tests::tiny_config;
    use burn::backend::NdArray;

    fn saved_model(dir: &Path, epochs: &[usize]) -> (CheckpointManager, CaptionModel<NdArray>) {
        let device = Default::default();
        let model: CaptionModel<NdArray> = tiny_config(6).init(&device);
        let ckpt = CheckpointManager::new(dir);
        for &e in epochs {
            ckpt.save_model(&model, e).unwrap();
        }
        (ckpt, model)
    }

    fn weights(model: &CaptionModel<NdArray>) -> Vec<f32> {
        model.encoder.weight.val().into_data().convert::<f32>().to_vec().unwrap()
    }

    #[test]
    fn test_parse_epoch() {
        assert_eq!(parse_epoch("model_epoch_12.mpk"), Some(12));
        assert_eq!(parse_epoch("model_epoch_3.mpk.gz"), Some(3));
        assert_eq!(parse_epoch("model_epoch_x.mpk"), None);
        assert_eq!(parse_epoch("latest_epoch.json"), None);
    }

    #[test]
    fn test_missing_directory_locates_nothing() {
        let dir  = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(dir.path().join("never-created"));
        assert_eq!(ckpt.locate().unwrap(), None);
        assert!(!ckpt.dir().exists());
    }

    #[test]
    fn test_metadata_is_preferred() {
        let dir = tempfile::tempdir().unwrap();
        let (ckpt, _) = saved_model(dir.path(), &[1, 2, 3]);
        ckpt.save_best(&BestModelMetadata::new(2, 0.7, dir.path())).unwrap();

        let loc = ckpt.locate().unwrap().unwrap();
        assert_eq!(loc.source, CheckpointSource::Metadata);
        assert_eq!(loc.epoch, Some(2));
    }

    #[test]
    fn test_stale_metadata_dir_resolves_locally() {
        let dir = tempfile::tempdir().unwrap();
        let (ckpt, _) = saved_model(dir.path(), &[1]);
        ckpt.save_best(&BestModelMetadata::new(1, 0.5, "/moved/elsewhere")).unwrap();

        let loc = ckpt.locate().unwrap().unwrap();
        assert_eq!(loc.source, CheckpointSource::Metadata);
        assert_eq!(loc.dir, dir.path());
    }

    #[test]
    fn test_falls_back_to_directory_without_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let (ckpt, _) = saved_model(dir.path(), &[1, 4]);

        let loc = ckpt.locate().unwrap().unwrap();
        assert_eq!(loc.source, CheckpointSource::Directory);
        assert_eq!(loc.epoch, Some(4));

        // Without latest_epoch.json the highest saved epoch still wins
        fs::remove_file(dir.path().join(LATEST_EPOCH_FILE)).unwrap();
        let loc = ckpt.locate().unwrap().unwrap();
        assert_eq!(loc.epoch, Some(4));
    }

    #[test]
    fn test_corrupt_metadata_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let (ckpt, _) = saved_model(dir.path(), &[2]);
        fs::write(dir.path().join(BEST_MODEL_METADATA), "{ not json").unwrap();

        let loc = ckpt.locate().unwrap().unwrap();
        assert_eq!(loc.source, CheckpointSource::Directory);
        assert_eq!(loc.epoch, Some(2));
    }

    #[test]
    fn test_empty_directory_locates_nothing() {
        let dir  = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(dir.path());
        assert_eq!(ckpt.locate().unwrap(), None);
    }

    #[test]
    fn test_load_restores_weights() {
        let dir = tempfile::tempdir().unwrap();
        let (ckpt, saved) = saved_model(dir.path(), &[1]);
        let loc = ckpt.locate().unwrap().unwrap();

        let device = Default::default();
        let fresh: CaptionModel<NdArray> = tiny_config(6).init(&device);
        assert_ne!(weights(&fresh), weights(&saved));

        let restored = ckpt.load_model(fresh, &loc, &device).unwrap();
        let (a, b) = (weights(&restored), weights(&saved));
        // CompactRecorder stores half precision
        assert!(a.iter().zip(&b).all(|(x, y)| (x - y).abs() < 1e-2));
    }

    #[test]
    fn test_load_rejects_weights_of_another_architecture() {
        let dir = tempfile::tempdir().unwrap();
        let (ckpt, _) = saved_model(dir.path(), &[1]);
        let loc = ckpt.locate().unwrap().unwrap();

        let device = Default::default();
        let wider: CaptionModel<NdArray> = tiny_config(9).init(&device);
        let err = ckpt.load_model(wider, &loc, &device).unwrap_err();
        assert!(format!("{err:#}").contains("does not match"));
    }

    #[test]
    fn test_config_round_trip() {
        let dir  = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(dir.path());
        ckpt.save_config(&tiny_config(9)).unwrap();
        let cfg = CheckpointManager::load_config(dir.path()).unwrap();
        assert_eq!(cfg.vocab_size, 9);
    }
}
