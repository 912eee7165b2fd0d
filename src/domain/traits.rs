// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The application layer programs against these traits so that
// annotation formats and caption generators can be swapped:
//
//   CaptionParser    — JsonCaptionParser, TxtCaptionParser
//   CaptionSource    — TestSetCollector (BNATURE / BNLIT walk)
//   CaptionGenerator — Captioner (the restored attention model)
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)

use anyhow::Result;
use std::path::Path;

use crate::domain::caption::{CaptionMapping, GeneratedCaption};

// ─── CaptionParser ────────────────────────────────────────────────────────────
/// Extracts image → captions mappings from one annotation file.
pub trait CaptionParser {
    /// Parse `file`, joining image names onto `images_dir`.
    /// With `validate_images` set, images missing on disk are dropped.
    fn extract(
        &self,
        file:            &Path,
        images_dir:      &Path,
        validate_images: bool,
    ) -> Result<CaptionMapping>;
}

// ─── CaptionSource ────────────────────────────────────────────────────────────
/// Any component that can produce a full caption mapping.
pub trait CaptionSource {
    fn load_all(&self) -> Result<CaptionMapping>;
}

// ─── CaptionGenerator ─────────────────────────────────────────────────────────
/// Any component that can caption an image.
pub trait CaptionGenerator {
    fn generate(&self, image: &Path) -> Result<GeneratedCaption>;
}
