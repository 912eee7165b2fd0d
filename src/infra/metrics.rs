// ============================================================
// Layer 6 — Metrics Logger
// ============================================================
// Records per-epoch training metrics to a CSV file.
//
// Output file: checkpoints/metrics.csv
//
//   epoch,train_loss,val_loss
//   1,4.812300,4.790100
//   2,4.104500,4.211800
//
// Only training mode writes this file.
//
// Reference: Rust Book §12 (I/O and File Handling)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::PathBuf,
};

/// One row of metrics for a single training epoch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochMetrics {
    pub epoch: usize,

    /// Mean teacher-forced cross-entropy over training batches
    pub train_loss: f64,

    /// Same on the validation set; NaN when there is none
    pub val_loss: f64,
}

impl EpochMetrics {
    pub fn new(epoch: usize, train_loss: f64, val_loss: f64) -> Self {
        Self { epoch, train_loss, val_loss }
    }

    /// The loss used to rank checkpoints: validation loss when there
    /// is a validation set, training loss otherwise.
    pub fn monitored_loss(&self) -> f64 {
        if self.val_loss.is_finite() { self.val_loss } else { self.train_loss }
    }

    pub fn is_improvement(&self, best_loss: f64) -> bool {
        self.monitored_loss() < best_loss
    }
}

pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Open (or create) `metrics.csv` in `dir`, writing the header
    /// only when the file is new so reruns append.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;

        let csv_path = dir.join("metrics.csv");
        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)
                .with_context(|| format!("Cannot create '{}'", csv_path.display()))?;
            writeln!(f, "epoch,train_loss,val_loss")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    /// Append one epoch's metrics.
    pub fn log(&self, m: &EpochMetrics) -> Result<()> {
        let mut f = OpenOptions::new().append(true).open(&self.csv_path)?;
        writeln!(f, "{},{:.6},{:.6}", m.epoch, m.train_loss, m.val_loss)?;

        tracing::debug!(
            "Logged epoch {} metrics: train_loss={:.4}, val_loss={:.4}",
            m.epoch,
            m.train_loss,
            m.val_loss,
        );
        Ok(())
    }

    pub fn csv_path(&self) -> &PathBuf {
        &self.csv_path
    }
}
