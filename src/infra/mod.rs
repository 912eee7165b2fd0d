// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Everything that touches the disk on behalf of other layers:
//
//   checkpoint.rs      — model weights (CompactRecorder), model
//                        config, latest_epoch.json and
//                        best_model_metadata.json; locates the
//                        checkpoint to restore
//
//   tokenizer_store.rs — word-level vocabulary built from the
//                        training captions and saved beside the
//                        checkpoint
//
//   metrics.rs         — per-epoch loss CSV
//
//   results.rs         — attention plots, captions.json,
//                        scores.json and report.html
//
// Reference: Rust Book §7 (Modules)
//            Burn Book §5 (Checkpointing)

/// Model checkpoint saving, locating and loading
pub mod checkpoint;

/// Tokenizer building, saving, and loading
pub mod tokenizer_store;

/// Training metrics CSV logger
pub mod metrics;

/// Inference outputs
pub mod results;
