// ============================================================
// Layer 4 — Test-Set Collector
// ============================================================
// Walks a test data directory and consolidates every caption
// it understands into one mapping. Two dataset layouts are
// recognised:
//
//   BNATURE
//     BNATURE/
//       caption/
//         test.txt      ← image names, one per line
//         caption.txt   ← "name   caption" / "name #caption"
//       Pictures/       ← the images
//
//   BNLIT
//     BNLIT/
//       Test-Annotation-...BNLIT....txt     ← "name #caption"
//       Bangla Natural Language Image to Text (BNLIT)-Preprocessing
//         and Resizing Dataset-resized-500_375/   ← the images
//
// Every other .txt / .json file (training splits, validation
// splits, unrelated datasets) is ignored. A file that fails to
// parse is logged and skipped; it never aborts the walk.
//
// Reference: walkdir crate documentation
//            Rust Book §9 (Error Handling)

use anyhow::{Context, Result};
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};
use walkdir::WalkDir;

use crate::data::txt_parser::{split_annotation, TXT_DELIMITERS};
use crate::domain::caption::{merge_mappings, CaptionMapping};
use crate::domain::traits::CaptionSource;

/// Folder holding the resized BNLIT images, next to the annotation file.
pub const BNLIT_RESIZED_DIR: &str =
    "Bangla Natural Language Image to Text (BNLIT)-Preprocessing and Resizing Dataset-resized-500_375";

const BNLIT_ANNOTATION_PREFIX: &str = "test-annotation-bangla natural language image to text";

/// How a file found during the walk should be treated.
#[derive(Debug, PartialEq, Eq)]
enum TestFileKind {
    BnatureTestList,
    BnlitAnnotations,
    Ignored,
}

fn classify(file_name: &str) -> TestFileKind {
    let lower = file_name.to_lowercase();
    if lower == "test.txt" {
        TestFileKind::BnatureTestList
    } else if (lower.contains("test-annotation") && lower.contains("bnlit"))
        || lower.starts_with(BNLIT_ANNOTATION_PREFIX)
    {
        TestFileKind::BnlitAnnotations
    } else {
        TestFileKind::Ignored
    }
}

/// Collects the consolidated test mapping under `base_dir`.
/// Implements CaptionSource so the session can stay format-agnostic.
pub struct TestSetCollector {
    base_dir:        PathBuf,
    validate_images: bool,
}

impl TestSetCollector {
    pub fn new(base_dir: impl Into<PathBuf>, validate_images: bool) -> Self {
        Self { base_dir: base_dir.into(), validate_images }
    }
}

impl CaptionSource for TestSetCollector {
    fn load_all(&self) -> Result<CaptionMapping> {
        collect_all_caption_data(&self.base_dir, self.validate_images)
    }
}

/// Walk `base_dir` and merge the captions of every recognised file.
///
/// A missing base directory yields an empty mapping with a warning,
/// the same way an empty dataset would.
pub fn collect_all_caption_data(base_dir: &Path, validate_images: bool) -> Result<CaptionMapping> {
    tracing::info!("Scanning directories in '{}'", base_dir.display());

    let mut all = CaptionMapping::new();
    if !base_dir.exists() {
        tracing::warn!("Test directory '{}' does not exist, no captions", base_dir.display());
        return Ok(all);
    }

    for entry in WalkDir::new(base_dir).sort_by_file_name() {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!("Skipping unreadable entry: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let name = entry.file_name().to_string_lossy();

        let parsed = match classify(&name) {
            TestFileKind::BnatureTestList  => parse_bnature(path, validate_images),
            TestFileKind::BnlitAnnotations => parse_bnlit(path, validate_images),
            TestFileKind::Ignored          => continue,
        };

        match parsed {
            Ok(captions) if !captions.is_empty() => {
                tracing::info!("Added {} captioned images from {}", captions.len(), name);
                merge_mappings(&mut all, captions);
            }
            Ok(_) => tracing::debug!("No usable captions in '{}'", path.display()),
            Err(e) => tracing::warn!("Skipping '{}': {:#}", path.display(), e),
        }
    }

    tracing::info!("Total consolidated caption mappings: {}", all.len());
    Ok(all)
}

/// BNATURE: `test.txt` lists the test images; captions come from the
/// sibling `caption.txt`; images live in `<dataset root>/Pictures`.
fn parse_bnature(test_list: &Path, validate_images: bool) -> Result<CaptionMapping> {
    let caption_dir  = test_list.parent().unwrap_or(Path::new("."));
    let dataset_root = caption_dir.parent().unwrap_or(caption_dir);
    let pictures_dir = dataset_root.join("Pictures");
    let caption_file = caption_dir.join("caption.txt");

    let names: Vec<String> = fs::read_to_string(test_list)
        .with_context(|| format!("Cannot read test list '{}'", test_list.display()))?
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect();

    let mut by_name: HashMap<String, Vec<String>> = HashMap::new();
    if caption_file.exists() {
        let text = fs::read_to_string(&caption_file)
            .with_context(|| format!("Cannot read '{}'", caption_file.display()))?;
        for line in text.lines() {
            if let Some((name, caption)) = split_annotation(line, &TXT_DELIMITERS, true) {
                by_name.entry(name.to_string()).or_default().push(caption.to_string());
            }
        }
    }

    let mut mapping = CaptionMapping::new();
    for name in names {
        let Some(captions) = by_name.get(&name).filter(|c| !c.is_empty()) else {
            continue;
        };
        let image = pictures_dir.join(&name);
        if !validate_images || image.exists() {
            mapping.insert(absolute(&image), captions.clone());
        }
    }
    Ok(mapping)
}

/// BNLIT: the annotation file lists `name #caption`; images live in the
/// resized folder beside it, or beside the file itself.
fn parse_bnlit(annotations: &Path, validate_images: bool) -> Result<CaptionMapping> {
    let bnlit_root = annotations.parent().unwrap_or(Path::new("."));
    let resized    = bnlit_root.join(BNLIT_RESIZED_DIR);
    let images_dir = if resized.is_dir() { resized } else { bnlit_root.to_path_buf() };

    let text = fs::read_to_string(annotations)
        .with_context(|| format!("Cannot read '{}'", annotations.display()))?;

    let mut mapping = CaptionMapping::new();
    for line in text.lines() {
        let Some((name, caption)) = split_annotation(line, &[" #", "#"], true) else {
            continue;
        };
        let image = images_dir.join(name);
        if !validate_images || image.exists() {
            mapping.entry(absolute(&image)).or_default().push(caption.to_string());
        }
    }
    Ok(mapping)
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}
