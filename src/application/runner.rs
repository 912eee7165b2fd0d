// ============================================================
// Layer 2 — Caption Runner (inference entry points)
// ============================================================
// Produced by Session::start(). Offers three ways to pick test
// images and caption them:
//
//   run_random_single()      — one uniformly chosen image
//   run_random_batch(count)  — `count` distinct random images
//   run_first_n(count)       — the first `count` images in path order
//
// Every entry point first checks that a model was restored, then
// that the test set is non-empty, then writes the result outputs.

use anyhow::{ensure, Result};
use burn::prelude::Backend;
use rand::{rngs::StdRng, seq::IteratorRandom, SeedableRng};
use std::path::{Path, PathBuf};

use crate::domain::{
    caption::{CaptionMapping, GeneratedCaption},
    error::CaptionError,
    traits::CaptionGenerator,
};
use crate::infra::results::ResultsWriter;
use crate::ml::inferencer::Captioner;

pub struct CaptionRunner<B: Backend> {
    captioner: Captioner<B>,
    test_set:  CaptionMapping,
    test_dir:  PathBuf,
    writer:    ResultsWriter,
    rng:       StdRng,
}

impl<B: Backend> CaptionRunner<B> {
    pub fn new(
        captioner: Captioner<B>,
        test_set:  CaptionMapping,
        test_dir:  impl Into<PathBuf>,
        writer:    ResultsWriter,
        seed:      u64,
    ) -> Self {
        Self {
            captioner,
            test_set,
            test_dir: test_dir.into(),
            writer,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.captioner.is_ready()
    }

    pub fn test_set(&self) -> &CaptionMapping {
        &self.test_set
    }

    pub fn results_dir(&self) -> &Path {
        self.writer.dir()
    }

    /// Caption one randomly chosen test image.
    pub fn run_random_single(&mut self) -> Result<GeneratedCaption> {
        self.check()?;
        let image = self
            .test_set
            .keys()
            .choose(&mut self.rng)
            .cloned()
            .ok_or_else(|| CaptionError::EmptyTestSet(self.test_dir.clone()))?;

        let mut captions = self.caption_images(vec![image])?;
        captions
            .pop()
            .ok_or_else(|| anyhow::anyhow!("The chosen image could not be captioned"))
    }

    /// Caption `count` distinct random test images (fewer if the
    /// test set is smaller).
    pub fn run_random_batch(&mut self, count: usize) -> Result<Vec<GeneratedCaption>> {
        self.check()?;
        ensure!(count > 0, "count must be at least 1");

        let mut images: Vec<PathBuf> = self
            .test_set
            .keys()
            .cloned()
            .choose_multiple(&mut self.rng, count);
        images.sort();

        self.caption_images(images)
    }

    /// Caption the first `count` test images in path order.
    pub fn run_first_n(&mut self, count: usize) -> Result<Vec<GeneratedCaption>> {
        self.check()?;
        ensure!(count > 0, "count must be at least 1");

        let images = self.test_set.keys().take(count).cloned().collect();
        self.caption_images(images)
    }

    fn check(&self) -> Result<()> {
        self.captioner.ensure_ready()?;
        if self.test_set.is_empty() {
            return Err(CaptionError::EmptyTestSet(self.test_dir.clone()).into());
        }
        Ok(())
    }

    fn caption_images(&self, images: Vec<PathBuf>) -> Result<Vec<GeneratedCaption>> {
        let mut captions = Vec::with_capacity(images.len());
        for image in &images {
            match self.captioner.generate(image) {
                Ok(caption) => {
                    tracing::debug!("{} → {}", image.display(), caption.text());
                    captions.push(caption);
                }
                Err(e) => tracing::warn!("Cannot caption '{}': {:#}", image.display(), e),
            }
        }

        tracing::info!("Captioned {}/{} images", captions.len(), images.len());
        ensure!(
            !captions.is_empty() || images.is_empty(),
            "None of the {} selected images could be captioned; results left untouched",
            images.len()
        );
        self.writer.write_all(&captions, &self.test_set)?;
        Ok(captions)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::{checkpoint::CheckpointManager, tokenizer_store::TokenizerStore};
    use crate::ml::{inferencer::restore, model::tests::tiny_config};
    use burn::backend::NdArray;
    use image::{Rgb, RgbImage};

    type TestBackend = NdArray;

    /// A runner over `n` generated images with a freshly initialised checkpoint.
    fn ready_runner(root: &Path, n: usize, seed: u64) -> CaptionRunner<TestBackend> {
        let device = Default::default();
        let ckpt_dir = root.join("ckpt");
        let ckpt = CheckpointManager::new(&ckpt_dir);

        let tokenizer = TokenizerStore::new(&ckpt_dir)
            .load_or_build(&["<start> একটি পাখি <end>".to_string()], 16)
            .unwrap();
        let cfg = tiny_config(tokenizer.get_vocab_size(true));
        ckpt.save_config(&cfg).unwrap();
        ckpt.save_model(&cfg.init::<TestBackend>(&device), 1).unwrap();

        let mut test_set = CaptionMapping::new();
        for i in 0..n {
            let image = root.join(format!("{i}.png"));
            RgbImage::from_pixel(8, 8, Rgb([i as u8 * 20, 0, 0])).save(&image).unwrap();
            test_set.insert(image, vec!["একটি পাখি".to_string()]);
        }

        let restored  = restore::<TestBackend>(&ckpt, &device).unwrap();
        let captioner = Captioner::new(restored, &ckpt_dir, 5, device);
        CaptionRunner::new(captioner, test_set, root, ResultsWriter::new(root.join("results")), seed)
    }

    #[test]
    fn test_first_n_is_ordered_and_clamped() {
        let dir = tempfile::tempdir().unwrap();
        let mut runner = ready_runner(dir.path(), 3, 7);

        let captions = runner.run_first_n(2).unwrap();
        let images: Vec<_> = captions.iter().map(|c| c.image.clone()).collect();
        assert_eq!(images, vec![dir.path().join("0.png"), dir.path().join("1.png")]);

        assert_eq!(runner.run_first_n(10).unwrap().len(), 3);
        assert!(dir.path().join("results/report.html").is_file());
    }

    #[test]
    fn test_random_batch_is_distinct_and_seeded() {
        let dir = tempfile::tempdir().unwrap();

        let pick = |seed| {
            let mut runner = ready_runner(dir.path(), 5, seed);
            runner
                .run_random_batch(3)
                .unwrap()
                .into_iter()
                .map(|c| c.image)
                .collect::<Vec<_>>()
        };

        let first = pick(11);
        assert_eq!(first.len(), 3);
        let mut unique = first.clone();
        unique.dedup();
        assert_eq!(unique.len(), 3);
        assert_eq!(first, pick(11));
    }

    #[test]
    fn test_random_single_comes_from_test_set() {
        let dir = tempfile::tempdir().unwrap();
        let mut runner = ready_runner(dir.path(), 4, 3);
        let caption = runner.run_random_single().unwrap();
        assert!(runner.test_set().contains_key(&caption.image));
    }

    #[test]
    fn test_failed_run_keeps_previous_results() {
        let dir = tempfile::tempdir().unwrap();
        let mut runner = ready_runner(dir.path(), 1, 5);
        runner.run_first_n(1).unwrap();

        let scores = dir.path().join("results/scores.json");
        let before = std::fs::read_to_string(&scores).unwrap();

        std::fs::write(dir.path().join("0.png"), b"not an image").unwrap();
        assert!(runner.run_random_single().is_err());
        assert_eq!(std::fs::read_to_string(&scores).unwrap(), before);
    }

    #[test]
    fn test_empty_test_set_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let mut runner = ready_runner(dir.path(), 0, 1);

        let err = runner.run_random_batch(2).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CaptionError>(),
            Some(CaptionError::EmptyTestSet(_))
        ));
    }

    #[test]
    fn test_zero_count_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut runner = ready_runner(dir.path(), 2, 1);
        assert!(runner.run_first_n(0).is_err());
    }
}
