// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// All Burn model, training and decoding code lives here:
//
//   model.rs      — attention captioner (encoder, additive
//                   attention, recurrent decoder cell)
//
//   step.rs       — StepStrategy: the real optimiser step and
//                   the no-op step, picked once from the mode
//
//   trainer.rs    — epoch loop, validation, checkpointing
//
//   inferencer.rs — checkpoint restoration and greedy decoding
//                   with per-word attention
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)

/// Backend used for training: autodiff on top of WGPU.
pub type TrainBackend = burn::backend::Autodiff<burn::backend::Wgpu>;

/// Attention captioner architecture
pub mod model;

/// Optimiser and no-op step strategies
pub mod step;

/// Training loop with validation and checkpointing
pub mod trainer;

/// Checkpoint restoration and caption decoding
pub mod inferencer;
