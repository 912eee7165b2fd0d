// ============================================================
// Layer 3 — Caption Domain Types
// ============================================================
// A caption mapping pairs every image with the reference
// captions written for it:
//
//   /data/test/BNATURE/Pictures/17.jpg → ["একটি ছেলে মাঠে খেলছে", ...]
//
// BTreeMap keeps the images sorted by path so "the first N
// images" means the same thing on every run.
//
// Reference: Rust Book §8 (Collections)

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Absolute image path → reference captions for that image.
pub type CaptionMapping = BTreeMap<PathBuf, Vec<String>>;

/// Merge `other` into `into`, appending captions for images
/// that appear in both.
pub fn merge_mappings(into: &mut CaptionMapping, other: CaptionMapping) {
    for (image, captions) in other {
        into.entry(image).or_default().extend(captions);
    }
}

/// One row of the exported mappings JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingEntry {
    pub image:    String,
    pub captions: Vec<String>,
}

/// A caption produced by the model for one image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedCaption {
    /// The captioned image
    pub image: PathBuf,

    /// Predicted words, without the <start>/<end> markers
    pub words: Vec<String>,

    /// One attention distribution over the image grid per word.
    /// `attention[i]` sums to 1 and has GRID × GRID entries.
    pub attention: Vec<Vec<f32>>,

    /// Mean natural-log probability of the chosen tokens
    pub mean_log_prob: f32,
}

impl GeneratedCaption {
    /// The caption as a single space-joined sentence.
    pub fn text(&self) -> String {
        self.words.join(" ")
    }
}
