// ============================================================
// Layer 4 — JSON Caption Parser
// ============================================================
// Parses JSON annotation files of the form:
//
//   [
//     {"filename": "image1.jpg", "caption": ["caption1", "caption2"]},
//     {"filename": "image2.jpg", "caption": "caption3"}
//   ]
//
// `caption` may be a single string or a list. Items missing
// either key are skipped rather than failing the whole file,
// because annotation dumps in the wild are rarely uniform.
//
// Reference: serde_json documentation (untyped Value access)

use anyhow::{Context, Result};
use serde_json::Value;
use std::{fs, path::Path};

use crate::domain::caption::CaptionMapping;
use crate::domain::traits::CaptionParser;

pub struct JsonCaptionParser;

impl CaptionParser for JsonCaptionParser {
    fn extract(
        &self,
        file:            &Path,
        images_dir:      &Path,
        validate_images: bool,
    ) -> Result<CaptionMapping> {
        tracing::info!("Parsing JSON annotations: {}", file.display());

        let text = fs::read_to_string(file)
            .with_context(|| format!("Cannot read JSON file '{}'", file.display()))?;
        let root: Value = serde_json::from_str(&text)
            .with_context(|| format!("Invalid JSON in '{}'", file.display()))?;

        let mut mapping = CaptionMapping::new();

        let Value::Array(items) = root else {
            tracing::warn!(
                "JSON file '{}' does not contain a list at its root, skipping",
                file.display()
            );
            return Ok(mapping);
        };

        for (idx, item) in items.iter().enumerate() {
            if idx % 1000 == 0 {
                tracing::debug!("Processing JSON item {} of '{}'", idx, file.display());
            }

            let (Some(name), Some(raw)) = (
                item.get("filename").and_then(Value::as_str),
                item.get("caption"),
            ) else {
                continue;
            };

            let captions = collect_captions(raw);
            if captions.is_empty() {
                continue;
            }

            let image = images_dir.join(name.trim());
            if !validate_images || image.exists() {
                mapping.insert(image, captions);
            }
        }

        tracing::info!(
            "Finished parsing '{}': {} images with captions",
            file.display(),
            mapping.len()
        );
        Ok(mapping)
    }
}

/// Turn a `caption` value (string, list, or anything else) into
/// trimmed, non-empty caption strings.
fn collect_captions(raw: &Value) -> Vec<String> {
    let values: Vec<&Value> = match raw {
        Value::Array(list) => list.iter().collect(),
        other => vec![other],
    };

    values
        .into_iter()
        .filter_map(|v| match v {
            Value::String(s) => Some(s.trim().to_string()),
            Value::Null | Value::Bool(false) => None,
            other => Some(other.to_string()),
        })
        .filter(|s| !s.is_empty())
        .collect()
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn write_json(dir: &Path, body: &str) -> std::path::PathBuf {
        let file = dir.join("captions.json");
        fs::write(&file, body).unwrap();
        file
    }

    #[test]
    fn test_list_and_single_captions() {
        let dir  = tempfile::tempdir().unwrap();
        let file = write_json(dir.path(), r#"[
            {"filename": " a.jpg ", "caption": ["এক ", "দুই"]},
            {"filename": "b.jpg", "caption": "তিন"}
        ]"#);

        let mapping = JsonCaptionParser.extract(&file, Path::new("imgs"), false).unwrap();
        assert_eq!(mapping[&PathBuf::from("imgs/a.jpg")], vec!["এক", "দুই"]);
        assert_eq!(mapping[&PathBuf::from("imgs/b.jpg")], vec!["তিন"]);
    }

    #[test]
    fn test_malformed_items_are_skipped() {
        let dir  = tempfile::tempdir().unwrap();
        let file = write_json(dir.path(), r#"[
            {"filename": "a.jpg"},
            {"caption": "orphan"},
            "not an object",
            {"filename": "b.jpg", "caption": ["", null]},
            {"filename": "c.jpg", "caption": ["ঠিক"]}
        ]"#);

        let mapping = JsonCaptionParser.extract(&file, Path::new(""), false).unwrap();
        assert_eq!(mapping.len(), 1);
        assert!(mapping.contains_key(&PathBuf::from("c.jpg")));
    }

    #[test]
    fn test_non_list_root_yields_empty_mapping() {
        let dir  = tempfile::tempdir().unwrap();
        let file = write_json(dir.path(), r#"{"filename": "a.jpg", "caption": "x"}"#);
        let mapping = JsonCaptionParser.extract(&file, Path::new(""), false).unwrap();
        assert!(mapping.is_empty());
    }

    #[test]
    fn test_invalid_json_is_error() {
        let dir  = tempfile::tempdir().unwrap();
        let file = write_json(dir.path(), "[{");
        assert!(JsonCaptionParser.extract(&file, Path::new(""), false).is_err());
    }

    #[test]
    fn test_validation_drops_missing_images() {
        let dir  = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("here.jpg"), b"x").unwrap();
        let file = write_json(dir.path(), r#"[
            {"filename": "here.jpg", "caption": "আছে"},
            {"filename": "gone.jpg", "caption": "নেই"}
        ]"#);

        let mapping = JsonCaptionParser.extract(&file, dir.path(), true).unwrap();
        assert_eq!(mapping.len(), 1);
    }
}
