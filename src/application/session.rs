// ============================================================
// Layer 2 — Session (Mode Controller)
// ============================================================
// A session is one run of the capsule. It is built from an
// immutable SessionConfig and does, in order:
//
//   Step 1: Derive the RunMode from `do_train`       (once)
//   Step 2: Select the step strategy from the mode   (once)
//   Step 3: Train, only in Train mode                (Layers 4-6)
//   Step 4: Restore the best checkpoint              (Layer 5/6)
//   Step 5: Collect the test set                     (Layer 4)
//   Step 6: Hand a CaptionRunner to the caller       (Layer 2)
//
// Step 4 runs in both modes. When it finds nothing the session
// still starts, but every inference call on the runner fails
// with ModelUninitialized.
//
// Reference: Burn Book §5 (Training)
//            Rust Book §17 (Trait Objects)

use anyhow::{bail, Context, Result};
use burn::tensor::backend::AutodiffBackend;
use rand::{rngs::StdRng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::application::runner::CaptionRunner;
use crate::data::{
    collector::TestSetCollector,
    dataset::{build_samples, flatten_captions, CaptionDataset},
    image_features::FEATURE_DIM,
    json_parser::JsonCaptionParser,
    preprocessor::Preprocessor,
    splitter::split_train_val,
    txt_parser::TxtCaptionParser,
};
use crate::domain::{
    caption::CaptionMapping,
    mode::RunMode,
    traits::{CaptionParser, CaptionSource},
};
use crate::infra::{
    checkpoint::CheckpointManager,
    results::ResultsWriter,
    tokenizer_store::TokenizerStore,
};
use crate::ml::{
    inferencer::{restore, Captioner, RestoredModel},
    model::CaptionModelConfig,
    step::select_step,
    trainer::{FitReport, Trainer},
};

const TRAIN_FRACTION: f64 = 0.8;

// ─── Session Configuration ───────────────────────────────────────────────────
// Everything a run needs, fixed before the session starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// The mode flag: train first, or restore and caption only
    pub do_train:        bool,
    pub train_captions:  PathBuf,
    pub train_images:    PathBuf,
    pub test_dir:        PathBuf,
    pub checkpoint_dir:  PathBuf,
    pub results_dir:     PathBuf,
    pub validate_images: bool,
    /// Use only the first N training images (sorted by path)
    pub train_limit:     Option<usize>,
    pub seed:            u64,
    pub epochs:          usize,
    pub batch_size:      usize,
    pub lr:              f64,
    pub embed_dim:       usize,
    pub hidden_dim:      usize,
    pub attention_dim:   usize,
    pub vocab_size:      usize,
    /// Token budget per caption, <start> and <end> included
    pub max_caption_len: usize,
    pub dropout:         f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            do_train:        false,
            train_captions:  PathBuf::from("data/train/captions.json"),
            train_images:    PathBuf::from("data/train/images"),
            test_dir:        PathBuf::from("data/test"),
            checkpoint_dir:  PathBuf::from("checkpoints"),
            results_dir:     PathBuf::from("results"),
            validate_images: true,
            train_limit:     None,
            seed:            42,
            epochs:          10,
            batch_size:      16,
            lr:              1e-3,
            embed_dim:       128,
            hidden_dim:      256,
            attention_dim:   128,
            vocab_size:      5000,
            max_caption_len: 24,
            dropout:         0.1,
        }
    }
}

impl SessionConfig {
    /// Reject settings the model or decoder cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.max_caption_len < 2 {
            bail!("max_caption_len must be at least 2 (<start> and <end>), got {}", self.max_caption_len);
        }
        if self.do_train {
            if self.epochs == 0 {
                bail!("epochs must be positive when training");
            }
            if self.batch_size == 0 {
                bail!("batch_size must be positive");
            }
            if !(self.lr > 0.0) {
                bail!("lr must be positive, got {}", self.lr);
            }
            if !(0.0..1.0).contains(&self.dropout) {
                bail!("dropout must be in [0, 1), got {}", self.dropout);
            }
            if self.vocab_size <= 4 {
                bail!("vocab_size must leave room beyond the 4 special tokens, got {}", self.vocab_size);
            }
            if self.embed_dim == 0 || self.hidden_dim == 0 || self.attention_dim == 0 {
                bail!("model dimensions must be positive");
            }
        }
        Ok(())
    }
}

// ─── Session ──────────────────────────────────────────────────────────────────
pub struct Session<B: AutodiffBackend> {
    config:      SessionConfig,
    trainer:     Trainer<B>,
    checkpoints: CheckpointManager,
    device:      B::Device,
}

impl<B: AutodiffBackend> Session<B> {
    /// Fix the mode and the step strategy for the whole run.
    pub fn new(config: SessionConfig, device: B::Device) -> Result<Self> {
        config.validate()?;

        let mode    = RunMode::from_flag(config.do_train);
        let step    = select_step::<B>(mode, config.lr);
        let trainer = Trainer::new(mode, step, device.clone());

        tracing::info!("Session mode: {} (step: {})", mode, trainer.step_strategy().name());

        Ok(Self {
            checkpoints: CheckpointManager::new(&config.checkpoint_dir),
            config,
            trainer,
            device,
        })
    }

    pub fn mode(&self) -> RunMode {
        self.trainer.mode()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn trainer(&self) -> &Trainer<B> {
        &self.trainer
    }

    /// Train (in Train mode), restore, and collect the test set.
    pub fn start(mut self) -> Result<CaptionRunner<B::InnerBackend>> {
        if self.mode().is_training() {
            let report = self.train()?;
            if !report.was_skipped() {
                tracing::info!(
                    "Trained {} epochs; best epoch {:?}",
                    report.epochs_run,
                    report.best.as_ref().map(|b| b.epoch),
                );
            }
        }

        let restored = self.restore()?;
        if restored.is_none() {
            tracing::warn!(
                "No checkpoint found under '{}'; inference calls will fail until a model is trained",
                self.config.checkpoint_dir.display()
            );
        }

        let captioner = Captioner::new(
            restored,
            &self.config.checkpoint_dir,
            self.config.max_caption_len,
            self.device.clone(),
        );

        let test_set = TestSetCollector::new(&self.config.test_dir, self.config.validate_images)
            .load_all()?;
        tracing::info!("Test set: {} images under '{}'", test_set.len(), self.config.test_dir.display());

        Ok(CaptionRunner::new(
            captioner,
            test_set,
            &self.config.test_dir,
            ResultsWriter::new(&self.config.results_dir),
            self.config.seed,
        ))
    }

    /// Load the best checkpoint onto the inference backend.
    pub fn restore(&self) -> Result<Option<RestoredModel<B::InnerBackend>>> {
        restore::<B::InnerBackend>(&self.checkpoints, &self.device)
    }

    /// Run the training pipeline and write checkpoints.
    ///
    /// In inference-only mode this reads no training data and writes
    /// nothing; the report comes back skipped.
    pub fn train(&mut self) -> Result<FitReport> {
        if !self.mode().is_training() || self.trainer.step_strategy().is_noop() {
            tracing::info!("Mode is {}: training pipeline not run", self.mode());
            return Ok(FitReport::skipped());
        }

        let cfg = &self.config;

        // ── Step 1: Parse training annotations ───────────────────────────────
        let mapping = load_training_mapping(cfg)?;
        if mapping.is_empty() {
            bail!("No training captions found in '{}'", cfg.train_captions.display());
        }
        tracing::info!("Loaded captions for {} training images", mapping.len());

        // ── Step 2: Clean, wrap and flatten ──────────────────────────────────
        let (captions, images) = flatten_captions(&mapping, cfg.train_limit, &Preprocessor::new());
        tracing::info!("{} training captions after flattening", captions.len());

        // ── Step 3: Build / load tokenizer ───────────────────────────────────
        let tokenizer = TokenizerStore::new(&cfg.checkpoint_dir).load_or_build(&captions, cfg.vocab_size)?;

        // ── Step 4: Tokenise and extract image features ──────────────────────
        let samples = build_samples(&captions, &images, &tokenizer, cfg.max_caption_len)?;
        if samples.is_empty() {
            bail!("No usable training samples: every training image failed to load");
        }

        // ── Step 5: Split train / validation ─────────────────────────────────
        let mut rng = StdRng::seed_from_u64(cfg.seed);
        let (train, val) = split_train_val(samples, TRAIN_FRACTION, &mut rng);

        // ── Step 6: Architecture, saved with the first epoch's weights ───────
        let model_cfg = CaptionModelConfig::new(
            tokenizer.get_vocab_size(true),
            FEATURE_DIM,
            cfg.embed_dim,
            cfg.hidden_dim,
            cfg.attention_dim,
            cfg.dropout,
        );

        // ── Step 7: Fit ──────────────────────────────────────────────────────
        let model = model_cfg.init::<B>(&self.device);
        let (_, report) = self.trainer.fit(
            model,
            &model_cfg,
            CaptionDataset::new(train),
            CaptionDataset::new(val),
            cfg,
            &self.checkpoints,
        )?;

        Ok(report)
    }
}

/// Parse the training annotation file with the parser its extension calls for.
fn load_training_mapping(cfg: &SessionConfig) -> Result<CaptionMapping> {
    parser_for(&cfg.train_captions)
        .extract(&cfg.train_captions, &cfg.train_images, cfg.validate_images)
        .with_context(|| format!("Cannot parse '{}'", cfg.train_captions.display()))
}

fn parser_for(file: &Path) -> Box<dyn CaptionParser> {
    let is_json = file
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    if is_json {
        Box::new(JsonCaptionParser)
    } else {
        Box::new(TxtCaptionParser)
    }
}
