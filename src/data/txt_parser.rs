// ============================================================
// Layer 4 — TXT Caption Parser
// ============================================================
// Parses plain-text annotation files, one caption per line.
// Two layouts show up in the Bangla datasets:
//
//   Triple-space separated:   image1.jpg   একটি ছেলে মাঠে খেলছে।
//   Hash separated:           1.png #একটি ছেলে ব্রিজের রেলিংয়ে দাড়িয়ে আছে।
//
// The delimiter is detected per line; the first one that
// matches wins. The same image may appear on many lines, and
// its captions accumulate in file order.
//
// Reference: Rust Book §8 (Strings), §9 (Error Handling)

use anyhow::{Context, Result};
use std::{fs, path::Path};

use crate::domain::caption::CaptionMapping;
use crate::domain::traits::CaptionParser;

/// Delimiters tried, in order, on every annotation line.
pub const TXT_DELIMITERS: [&str; 3] = ["   ", " #", "#"];

/// Split one annotation line into (image name, caption).
///
/// Tries each delimiter in order; when none matches and
/// `whitespace_fallback` is set, splits on the first run of
/// whitespace instead. Returns None for blank or malformed lines.
pub fn split_annotation<'a>(
    line:                &'a str,
    delimiters:          &[&str],
    whitespace_fallback: bool,
) -> Option<(&'a str, &'a str)> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let split = delimiters
        .iter()
        .find_map(|d| line.split_once(d))
        .or_else(|| {
            if whitespace_fallback {
                line.split_once(char::is_whitespace)
            } else {
                None
            }
        })?;

    let (name, caption) = (split.0.trim(), split.1.trim());
    if name.is_empty() || caption.is_empty() {
        return None;
    }
    Some((name, caption))
}

pub struct TxtCaptionParser;

impl CaptionParser for TxtCaptionParser {
    fn extract(
        &self,
        file:            &Path,
        images_dir:      &Path,
        validate_images: bool,
    ) -> Result<CaptionMapping> {
        tracing::info!("Parsing TXT annotations: {}", file.display());

        let text = fs::read_to_string(file)
            .with_context(|| format!("Cannot read TXT file '{}'", file.display()))?;

        let mut mapping = CaptionMapping::new();
        let mut lines   = 0usize;

        for line in text.lines() {
            lines += 1;
            let Some((name, caption)) = split_annotation(line, &TXT_DELIMITERS, false) else {
                continue;
            };

            let image = images_dir.join(name);
            if !validate_images || image.exists() {
                mapping.entry(image).or_default().push(caption.to_string());
            }

            if lines % 1000 == 0 {
                tracing::debug!("Processed {} lines of '{}'", lines, file.display());
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

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_split_triple_space() {
        let got = split_annotation("img1.jpg   একটি ছেলে মাঠে খেলছে।", &TXT_DELIMITERS, false);
        assert_eq!(got, Some(("img1.jpg", "একটি ছেলে মাঠে খেলছে।")));
    }

    #[test]
    fn test_split_hash_variants() {
        assert_eq!(
            split_annotation("1.png #একটি ছেলে", &TXT_DELIMITERS, false),
            Some(("1.png", "একটি ছেলে"))
        );
        assert_eq!(
            split_annotation("2.png#নদী", &TXT_DELIMITERS, false),
            Some(("2.png", "নদী"))
        );
    }

    #[test]
    fn test_split_rejects_malformed() {
        assert_eq!(split_annotation("", &TXT_DELIMITERS, false), None);
        assert_eq!(split_annotation("no delimiter here", &TXT_DELIMITERS, false), None);
        assert_eq!(split_annotation("1.png #   ", &TXT_DELIMITERS, false), None);
    }

    #[test]
    fn test_whitespace_fallback() {
        assert_eq!(
            split_annotation("3.jpg একটি গাছ", &TXT_DELIMITERS, true),
            Some(("3.jpg", "একটি গাছ"))
        );
        assert_eq!(split_annotation("lonely", &TXT_DELIMITERS, true), None);
    }

    #[test]
    fn test_extract_accumulates_captions() {
        let dir  = tempfile::tempdir().unwrap();
        let file = dir.path().join("captions.txt");
        fs::write(&file, "1.png #প্রথম\n\n1.png #দ্বিতীয়\n2.png   তৃতীয়\nbroken line\n").unwrap();

        let mapping = TxtCaptionParser
            .extract(&file, Path::new("imgs"), false)
            .unwrap();

        assert_eq!(mapping.len(), 2);
        assert_eq!(mapping[&PathBuf::from("imgs/1.png")], vec!["প্রথম", "দ্বিতীয়"]);
        assert_eq!(mapping[&PathBuf::from("imgs/2.png")], vec!["তৃতীয়"]);
    }

    #[test]
    fn test_extract_validates_images() {
        let dir  = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("present.png"), b"x").unwrap();
        let file = dir.path().join("captions.txt");
        fs::write(&file, "present.png #আছে\nmissing.png #নেই\n").unwrap();

        let mapping = TxtCaptionParser.extract(&file, dir.path(), true).unwrap();
        assert_eq!(mapping.len(), 1);
        assert!(mapping.contains_key(&dir.path().join("present.png")));
    }

    #[test]
    fn test_missing_file_is_error() {
        let result = TxtCaptionParser.extract(Path::new("/no/such/file.txt"), Path::new(""), false);
        assert!(result.is_err());
    }
}
