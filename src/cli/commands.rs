// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the two subcommands, `run` and `mappings`, and all
// their configurable flags.
//
// clap's derive macros automatically generate:
//   - help text (--help)
//   - error messages for bad values
//   - type conversion (string → usize, f64, enum, etc.)
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::application::session::SessionConfig;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Optionally train, restore the best checkpoint, and caption test images
    Run(RunArgs),

    /// List the caption mappings found under a test directory
    Mappings(MappingsArgs),
}

/// Which inference entry point `run` calls.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum InferenceAction {
    /// The first --count images in path order
    FirstN,
    /// One random image
    RandomSingle,
    /// --count distinct random images
    RandomBatch,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Train before captioning. Without it no parameter is updated
    /// and the run only restores a checkpoint and captions
    #[arg(long)]
    pub do_train: bool,

    /// Training annotations (.json, or .txt with `image<3 spaces>caption` lines)
    #[arg(long, default_value = "data/train/captions.json")]
    pub train_captions: PathBuf,

    /// Directory the training image names are relative to
    #[arg(long, default_value = "data/train/images")]
    pub train_images: PathBuf,

    /// Test data root (BNATURE / BNLIT layouts)
    #[arg(long, default_value = "data/test")]
    pub test_dir: PathBuf,

    /// Where checkpoints, tokenizer and best_model_metadata.json live
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: PathBuf,

    /// Where attention plots, report.html, captions.json and scores.json go
    #[arg(long, default_value = "results")]
    pub results_dir: PathBuf,

    #[arg(long, value_enum, default_value_t = InferenceAction::FirstN)]
    pub action: InferenceAction,

    /// Number of images for first-n and random-batch
    #[arg(long, default_value_t = 5)]
    pub count: usize,

    /// Keep mappings whose image files are missing on disk
    #[arg(long)]
    pub no_validate: bool,

    /// Seed for the train/validation split, shuffling and random picks
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Train on the first N images only (0 = all)
    #[arg(long, default_value_t = 0)]
    pub train_limit: usize,

    #[arg(long, default_value_t = 10)]
    pub epochs: usize,

    #[arg(long, default_value_t = 16)]
    pub batch_size: usize,

    #[arg(long, default_value_t = 1e-3)]
    pub lr: f64,

    /// Word embedding and encoded region size
    #[arg(long, default_value_t = 128)]
    pub embed_dim: usize,

    /// Decoder state size
    #[arg(long, default_value_t = 256)]
    pub hidden_dim: usize,

    #[arg(long, default_value_t = 128)]
    pub attention_dim: usize,

    /// Upper bound on vocabulary size, special tokens included
    #[arg(long, default_value_t = 5000)]
    pub vocab_size: usize,

    /// Tokens per caption including <start> and <end>
    #[arg(long, default_value_t = 24)]
    pub max_caption_len: usize,

    #[arg(long, default_value_t = 0.1)]
    pub dropout: f64,
}

/// The application layer never sees clap types.
impl From<RunArgs> for SessionConfig {
    fn from(a: RunArgs) -> Self {
        SessionConfig {
            do_train:        a.do_train,
            train_captions:  a.train_captions,
            train_images:    a.train_images,
            test_dir:        a.test_dir,
            checkpoint_dir:  a.checkpoint_dir,
            results_dir:     a.results_dir,
            validate_images: !a.no_validate,
            train_limit:     (a.train_limit > 0).then_some(a.train_limit),
            seed:            a.seed,
            epochs:          a.epochs,
            batch_size:      a.batch_size,
            lr:              a.lr,
            embed_dim:       a.embed_dim,
            hidden_dim:      a.hidden_dim,
            attention_dim:   a.attention_dim,
            vocab_size:      a.vocab_size,
            max_caption_len: a.max_caption_len,
            dropout:         a.dropout,
        }
    }
}

#[derive(Args, Debug)]
pub struct MappingsArgs {
    /// Base test data directory
    #[arg(long, default_value = "data/test")]
    pub base: PathBuf,

    /// Do not check that image files exist on disk
    #[arg(long)]
    pub no_validate: bool,

    /// Also write the consolidated mappings as JSON (e.g. results/mappings.json)
    #[arg(long)]
    pub write_json: Option<PathBuf>,
}
