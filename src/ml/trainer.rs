// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Epoch loop over Burn's DataLoader. Parameter updates are
// delegated to the StepStrategy the session selected:
//
//   for each epoch:
//     train batches  → step.step(model, batch)   (Adam or no-op)
//     val batches    → model.valid().forward_loss(..)
//     metrics.csv    ← epoch, train_loss, val_loss
//     model_epoch_N  ← weights
//     best_model_metadata.json ← when the monitored loss improves
//
// Key Burn 0.20 insight:
//   - Training runs on B (an AutodiffBackend) for gradients
//   - model.valid() returns the model on B::InnerBackend, so the
//     validation loader batches for the inner backend as well
//
// Reference: Burn Book §5 (Custom Training Loop)

use anyhow::Result;
use burn::{
    data::dataloader::DataLoaderBuilder,
    module::AutodiffModule,
    prelude::*,
    tensor::backend::AutodiffBackend,
};

use crate::application::session::SessionConfig;
use crate::data::{batcher::CaptionBatcher, dataset::CaptionDataset};
use crate::domain::mode::RunMode;
use crate::infra::checkpoint::{BestModelMetadata, CheckpointManager};
use crate::infra::metrics::{EpochMetrics, MetricsLogger};
use crate::ml::model::{CaptionModel, CaptionModelConfig};
use crate::ml::step::StepStrategy;

/// What a call to `fit` did.
#[derive(Debug, Clone, Default)]
pub struct FitReport {
    pub epochs_run: usize,
    pub best:       Option<BestModelMetadata>,
}

impl FitReport {
    /// The report of a run that performed no training at all.
    pub fn skipped() -> Self {
        Self::default()
    }

    pub fn was_skipped(&self) -> bool {
        self.epochs_run == 0
    }
}

pub struct Trainer<B: AutodiffBackend> {
    mode:   RunMode,
    step:   Box<dyn StepStrategy<B>>,
    device: B::Device,
}

impl<B: AutodiffBackend> Trainer<B> {
    pub fn new(mode: RunMode, step: Box<dyn StepStrategy<B>>, device: B::Device) -> Self {
        Self { mode, step, device }
    }

    pub fn mode(&self) -> RunMode {
        self.mode
    }

    pub fn step_strategy(&self) -> &dyn StepStrategy<B> {
        self.step.as_ref()
    }

    /// Train `model` for `cfg.epochs` epochs.
    ///
    /// `arch` is written to model_config.json together with the first
    /// epoch's weights, so the two never disagree on disk.
    ///
    /// In inference-only mode this returns the model unchanged with
    /// an empty report; no data is iterated and nothing is written.
    pub fn fit(
        &mut self,
        model: CaptionModel<B>,
        arch:  &CaptionModelConfig,
        train: CaptionDataset,
        val:   CaptionDataset,
        cfg:   &SessionConfig,
        ckpt:  &CheckpointManager,
    ) -> Result<(CaptionModel<B>, FitReport)> {
        if !self.mode.is_training() || self.step.is_noop() {
            tracing::info!("Mode is {}: skipping training ({} step)", self.mode, self.step.name());
            return Ok((model, FitReport::skipped()));
        }

        tracing::info!(
            "Training {} epochs on {} samples ({} validation), step = {}",
            cfg.epochs,
            train.sample_count(),
            val.sample_count(),
            self.step.name(),
        );

        let train_loader = DataLoaderBuilder::<B, _, _>::new(CaptionBatcher)
            .batch_size(cfg.batch_size)
            .shuffle(cfg.seed)
            .num_workers(1)
            .set_device(self.device.clone())
            .build(train);

        let val_loader = DataLoaderBuilder::<B::InnerBackend, _, _>::new(CaptionBatcher)
            .batch_size(cfg.batch_size)
            .num_workers(1)
            .set_device(self.device.clone())
            .build(val);

        let metrics = MetricsLogger::new(ckpt.dir())?;

        let mut model     = model;
        let mut best_loss = f64::INFINITY;
        let mut report    = FitReport::default();

        for epoch in 1..=cfg.epochs {
            // ── Training phase ────────────────────────────────────────────────
            let mut train_loss_sum = 0.0f64;
            let mut train_batches  = 0usize;

            for batch in train_loader.iter() {
                let (next, loss) = self.step.step(model, &batch);
                model = next;
                if let Some(loss) = loss {
                    train_loss_sum += loss;
                    train_batches  += 1;
                }
            }

            let avg_train_loss = if train_batches > 0 {
                train_loss_sum / train_batches as f64
            } else { f64::NAN };

            // ── Validation phase ──────────────────────────────────────────────
            // dropout disabled for deterministic evaluation
            let model_valid = model.valid();

            let mut val_loss_sum = 0.0f64;
            let mut val_batches  = 0usize;

            for batch in val_loader.iter() {
                let loss = model_valid.forward_loss(batch.features, batch.tokens);
                val_loss_sum += loss.into_scalar().elem::<f64>();
                val_batches  += 1;
            }

            let avg_val_loss = if val_batches > 0 {
                val_loss_sum / val_batches as f64
            } else { f64::NAN };

            println!(
                "Epoch {:>3}/{} | train_loss={:.4} | val_loss={:.4}",
                epoch, cfg.epochs, avg_train_loss, avg_val_loss,
            );

            // ── Persist ───────────────────────────────────────────────────────
            let row = EpochMetrics::new(epoch, avg_train_loss, avg_val_loss);
            metrics.log(&row)?;
            ckpt.save_model(&model, epoch)?;
            if epoch == 1 {
                ckpt.save_config(arch)?;
            }

            if row.is_improvement(best_loss) {
                best_loss = row.monitored_loss();
                let meta = BestModelMetadata::new(epoch, best_loss, ckpt.dir());
                ckpt.save_best(&meta)?;
                report.best = Some(meta);
            }

            report.epochs_run = epoch;
        }

        tracing::info!("Training complete after {} epochs", report.epochs_run);
        Ok((model, report))
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::dataset::CaptionSample;
    use crate::data::image_features::{FEATURE_DIM, NUM_REGIONS};
    use crate::infra::checkpoint::BEST_MODEL_METADATA;
    use crate::ml::model::tests::tiny_config;
    use crate::ml::step::select_step;
    use burn::backend::{Autodiff, NdArray};

    type TestBackend = Autodiff<NdArray>;

    fn samples(n: usize) -> Vec<CaptionSample> {
        (0..n)
            .map(|i| CaptionSample {
                features: vec![(i as f32) / 10.0 - 0.25; NUM_REGIONS * FEATURE_DIM],
                tokens:   vec![2, 4 + (i as u32 % 3), 5, 3, 0],
            })
            .collect()
    }

    fn small_config() -> SessionConfig {
        SessionConfig { epochs: 2, batch_size: 2, ..SessionConfig::default() }
    }

    #[test]
    fn test_inference_only_fit_writes_nothing() {
        let dir  = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(dir.path().join("ckpt"));
        let device = Default::default();

        let mode = RunMode::InferenceOnly;
        let mut trainer = Trainer::<TestBackend>::new(mode, select_step(mode, 0.01), device);
        let arch  = tiny_config(8);
        let model = arch.init::<TestBackend>(&Default::default());

        let (_, report) = trainer
            .fit(
                model,
                &arch,
                CaptionDataset::new(samples(4)),
                CaptionDataset::new(samples(2)),
                &small_config(),
                &ckpt,
            )
            .unwrap();

        assert!(report.was_skipped());
        assert!(report.best.is_none());
        assert!(!ckpt.dir().exists());
    }

    #[test]
    fn test_training_writes_checkpoints_and_best_metadata() {
        let dir  = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(dir.path());
        let device = Default::default();

        let mode = RunMode::Train;
        let mut trainer = Trainer::<TestBackend>::new(mode, select_step(mode, 0.01), device);
        assert!(!trainer.step_strategy().is_noop());

        let arch  = tiny_config(8);
        let model = arch.init::<TestBackend>(&Default::default());
        let (_, report) = trainer
            .fit(
                model,
                &arch,
                CaptionDataset::new(samples(4)),
                CaptionDataset::new(samples(2)),
                &small_config(),
                &ckpt,
            )
            .unwrap();

        assert_eq!(report.epochs_run, 2);
        assert!(report.best.is_some());
        assert!(dir.path().join(BEST_MODEL_METADATA).is_file());
        assert!(dir.path().join("metrics.csv").is_file());
        assert_eq!(CheckpointManager::load_config(dir.path()).unwrap().vocab_size, 8);

        let csv = std::fs::read_to_string(dir.path().join("metrics.csv")).unwrap();
        assert_eq!(csv.lines().count(), 3);

        let located = ckpt.locate().unwrap().unwrap();
        assert_eq!(located.epoch, report.best.map(|b| b.epoch));
    }
}
