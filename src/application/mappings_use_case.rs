// ============================================================
// Layer 2 — Mappings Use Case
// ============================================================
// Lists the image → captions mappings the test-set collector
// discovers, and optionally exports them as JSON:
//
//   [
//     { "image": "data/test/BNATURE/Pictures/17.jpg",
//       "captions": ["...", "..."] },
//     ...
//   ]
//
// Exported image paths are made relative to a root directory
// (the working directory from the CLI) when they live below it.

use anyhow::{Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::data::collector::TestSetCollector;
use crate::domain::{
    caption::{CaptionMapping, MappingEntry},
    traits::CaptionSource,
};

pub const PREVIEW_IMAGES:   usize = 5;
pub const PREVIEW_CAPTIONS: usize = 2;

pub struct MappingsUseCase {
    base_dir:        PathBuf,
    validate_images: bool,
}

impl MappingsUseCase {
    pub fn new(base_dir: impl Into<PathBuf>, validate_images: bool) -> Self {
        Self { base_dir: base_dir.into(), validate_images }
    }

    pub fn collect(&self) -> Result<CaptionMapping> {
        TestSetCollector::new(&self.base_dir, self.validate_images).load_all()
    }

    /// Write `mapping` to `out` with image paths relative to `root`.
    /// Returns the number of entries written.
    pub fn write_json(&self, mapping: &CaptionMapping, out: &Path, root: &Path) -> Result<usize> {
        if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Cannot create '{}'", parent.display()))?;
        }

        let entries = to_entries(mapping, root);
        fs::write(out, serde_json::to_string_pretty(&entries)?)
            .with_context(|| format!("Cannot write '{}'", out.display()))?;

        tracing::info!("Wrote {} mappings to '{}'", entries.len(), out.display());
        Ok(entries.len())
    }
}

/// The first few mappings, each trimmed to a couple of captions.
pub fn preview(mapping: &CaptionMapping) -> Vec<(&Path, &[String])> {
    mapping
        .iter()
        .take(PREVIEW_IMAGES)
        .map(|(image, caps)| (image.as_path(), &caps[..caps.len().min(PREVIEW_CAPTIONS)]))
        .collect()
}

pub fn to_entries(mapping: &CaptionMapping, root: &Path) -> Vec<MappingEntry> {
    mapping
        .iter()
        .map(|(image, captions)| MappingEntry {
            image:    image.strip_prefix(root).unwrap_or(image).display().to_string(),
            captions: captions.clone(),
        })
        .collect()
}
