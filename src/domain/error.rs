// ============================================================
// Layer 3 — Caption Errors
// ============================================================
// Most failures propagate as anyhow errors with context.
// The ones below are part of the contract: callers (and tests)
// downcast to them to tell "no model" apart from I/O trouble.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CaptionError {
    /// Inference was attempted but restoration found no checkpoint,
    /// so the model weights were never initialised.
    #[error(
        "model weights are not initialised: no checkpoint could be restored from '{}'. \
         Run with --do-train first or point --checkpoint-dir at a trained model",
        .0.display()
    )]
    ModelUninitialized(PathBuf),

    /// The test directory produced no image/caption pairs.
    #[error("no test images with captions were found under '{}'", .0.display())]
    EmptyTestSet(PathBuf),
}
