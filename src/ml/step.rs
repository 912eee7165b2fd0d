// ============================================================
// Layer 5 — Step Strategies
// ============================================================
// The training loop never decides by itself whether to update
// parameters. It calls whichever StepStrategy the session picked
// once at startup:
//
//   OptimizerStep — forward, loss, backward, optimiser update
//   NoOpStep      — accepts the same inputs, returns the model
//                   untouched, never fails
//
// select_step() is the single place the mode flag turns into a
// behaviour; nothing re-checks the flag afterwards.
//
// Reference: Burn Book §5 (Custom Training Loop)
//            Kingma & Ba (2015) Adam

use burn::{
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use std::marker::PhantomData;

use crate::data::batcher::CaptionBatch;
use crate::domain::mode::RunMode;
use crate::ml::model::CaptionModel;

pub trait StepStrategy<B: AutodiffBackend> {
    /// Run one step on `batch`, returning the (possibly updated)
    /// model and the batch loss when one was computed.
    fn step(&mut self, model: CaptionModel<B>, batch: &CaptionBatch<B>) -> (CaptionModel<B>, Option<f64>);

    /// True for strategies that never touch parameters.
    fn is_noop(&self) -> bool;

    fn name(&self) -> &'static str;
}

// ─── OptimizerStep ────────────────────────────────────────────────────────────
pub struct OptimizerStep<B: AutodiffBackend, O> {
    optim:    O,
    lr:       f64,
    _backend: PhantomData<B>,
}

impl<B: AutodiffBackend, O: Optimizer<CaptionModel<B>, B>> OptimizerStep<B, O> {
    pub fn new(optim: O, lr: f64) -> Self {
        Self { optim, lr, _backend: PhantomData }
    }
}

impl<B: AutodiffBackend, O: Optimizer<CaptionModel<B>, B>> StepStrategy<B> for OptimizerStep<B, O> {
    fn step(&mut self, model: CaptionModel<B>, batch: &CaptionBatch<B>) -> (CaptionModel<B>, Option<f64>) {
        let loss = model.forward_loss(batch.features.clone(), batch.tokens.clone());
        let loss_val: f64 = loss.clone().into_scalar().elem::<f64>();

        let grads = loss.backward();
        let grads = GradientsParams::from_grads(grads, &model);
        let model = self.optim.step(self.lr, model, grads);

        (model, Some(loss_val))
    }

    fn is_noop(&self) -> bool {
        false
    }

    fn name(&self) -> &'static str {
        "adam"
    }
}

// ─── NoOpStep ─────────────────────────────────────────────────────────────────
pub struct NoOpStep;

impl<B: AutodiffBackend> StepStrategy<B> for NoOpStep {
    fn step(&mut self, model: CaptionModel<B>, _batch: &CaptionBatch<B>) -> (CaptionModel<B>, Option<f64>) {
        (model, None)
    }

    fn is_noop(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "no-op"
    }
}

/// Pick the step behaviour for a run. Called once per session.
pub fn select_step<B: AutodiffBackend>(mode: RunMode, lr: f64) -> Box<dyn StepStrategy<B>> {
    match mode {
        RunMode::Train => {
            let optim = AdamConfig::new()
                .with_epsilon(1e-8)
                .init::<B, CaptionModel<B>>();
            Box::new(OptimizerStep::new(optim, lr))
        }
        RunMode::InferenceOnly => Box::new(NoOpStep),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{batcher::CaptionBatcher, dataset::CaptionSample};
    use crate::data::image_features::{FEATURE_DIM, NUM_REGIONS};
    use crate::ml::model::tests::tiny_config;
    use burn::{backend::{Autodiff, NdArray}, data::dataloader::batcher::Batcher};

    type TestBackend = Autodiff<NdArray>;

    fn batch(device: &<TestBackend as Backend>::Device) -> CaptionBatch<TestBackend> {
        let sample = CaptionSample {
            features: (0..NUM_REGIONS * FEATURE_DIM).map(|i| (i % 7) as f32 / 7.0 - 0.5).collect(),
            tokens:   vec![2, 4, 5, 3, 0],
        };
        CaptionBatcher.batch(vec![sample.clone(), sample], device)
    }

    fn output_weights(model: &CaptionModel<TestBackend>) -> Vec<f32> {
        model.output.weight.val().into_data().convert::<f32>().to_vec().unwrap()
    }

    #[test]
    fn test_noop_never_changes_parameters() {
        let device = Default::default();
        let mut model: CaptionModel<TestBackend> = tiny_config(8).init(&device);
        let before = output_weights(&model);

        let mut step = select_step::<TestBackend>(RunMode::InferenceOnly, 0.1);
        assert!(step.is_noop());

        let batch = batch(&device);
        for _ in 0..25 {
            let (next, loss) = step.step(model, &batch);
            assert!(loss.is_none());
            model = next;
        }

        assert_eq!(output_weights(&model), before);
    }

    #[test]
    fn test_training_mode_uses_real_optimizer() {
        let device = Default::default();
        let model: CaptionModel<TestBackend> = tiny_config(8).init(&device);
        let before = output_weights(&model);

        let mut step = select_step::<TestBackend>(RunMode::Train, 0.05);
        assert!(!step.is_noop());
        assert_eq!(step.name(), "adam");

        let (model, loss) = step.step(model, &batch(&device));
        assert!(loss.map_or(false, f64::is_finite));
        assert_ne!(output_weights(&model), before);
    }
}
