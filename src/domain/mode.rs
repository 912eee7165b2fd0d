// ============================================================
// Layer 3 — Run Mode
// ============================================================
// The operator picks one of two modes before a session starts:
//
//   Train          — optimise the model, write checkpoints,
//                    then caption the test set
//   InferenceOnly  — never touch parameters or checkpoints,
//                    restore the best checkpoint, then caption
//
// The mode is derived once from the boolean `do_train` flag
// and is read-only for the rest of the run.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunMode {
    Train,
    InferenceOnly,
}

impl RunMode {
    /// Map the operator's `do_train` flag onto a mode.
    pub fn from_flag(do_train: bool) -> Self {
        if do_train {
            RunMode::Train
        } else {
            RunMode::InferenceOnly
        }
    }

    pub fn is_training(self) -> bool {
        matches!(self, RunMode::Train)
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunMode::Train => write!(f, "train"),
            RunMode::InferenceOnly => write!(f, "inference-only"),
        }
    }
}
