// ============================================================
// Layer 6 — Results Writer
// ============================================================
// Writes everything an inference run produces:
//
//   results/
//     attention/000_<image stem>.png  ← thumbnail + one heat map per word
//     captions.json                   ← prediction and references per image
//     scores.json                     ← mean token log-probability per image
//     report.html                     ← all of the above on one page
//
// Each run overwrites captions.json, scores.json and
// report.html; attention plots accumulate by file name.

use anyhow::{Context, Result};
use image::{Rgb, RgbImage};
use serde::{Deserialize, Serialize};
use std::{
    fmt::Write as _,
    fs,
    path::{Path, PathBuf},
};

use crate::data::image_features::{load_thumbnail, GRID, IMAGE_SIZE};
use crate::domain::caption::{CaptionMapping, GeneratedCaption};

/// Pixel scale applied to the 64 × 64 thumbnail in attention plots.
const PLOT_ZOOM: u32 = 2;
const TILE: u32 = IMAGE_SIZE * PLOT_ZOOM;
const TILE_GAP: u32 = 4;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptionRecord {
    pub image:      String,
    pub caption:    String,
    pub references: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageScore {
    pub image:         String,
    pub mean_log_prob: f32,
    pub length:        usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoresFile {
    pub count:         usize,
    pub mean_log_prob: f32,
    pub per_image:     Vec<ImageScore>,
}

pub struct ResultsWriter {
    dir: PathBuf,
}

impl ResultsWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write plots, captions, scores and the HTML report for one run.
    pub fn write_all(&self, captions: &[GeneratedCaption], references: &CaptionMapping) -> Result<()> {
        let attention_dir = self.dir.join("attention");
        fs::create_dir_all(&attention_dir)
            .with_context(|| format!("Cannot create '{}'", attention_dir.display()))?;

        let mut plots = Vec::with_capacity(captions.len());
        for (i, caption) in captions.iter().enumerate() {
            let stem = caption
                .image
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "image".to_string());
            let file = format!("{i:03}_{stem}.png");

            let thumb = load_thumbnail(&caption.image).unwrap_or_else(|e| {
                tracing::warn!("No thumbnail for '{}': {:#}", caption.image.display(), e);
                RgbImage::from_pixel(IMAGE_SIZE, IMAGE_SIZE, Rgb([128, 128, 128]))
            });

            let plot_path = attention_dir.join(&file);
            render_attention(&thumb, &caption.attention)
                .save(&plot_path)
                .with_context(|| format!("Cannot write '{}'", plot_path.display()))?;
            plots.push(format!("attention/{file}"));
        }

        let records: Vec<CaptionRecord> = captions
            .iter()
            .map(|c| CaptionRecord {
                image:      c.image.display().to_string(),
                caption:    c.text(),
                references: references.get(&c.image).cloned().unwrap_or_default(),
            })
            .collect();
        self.write_json("captions.json", &records)?;

        let scores = score_file(captions);
        self.write_json("scores.json", &scores)?;

        let html = render_report(&records, &plots, &scores);
        fs::write(self.dir.join("report.html"), html).with_context(|| "Cannot write report.html")?;

        tracing::info!("Wrote {} results to '{}'", captions.len(), self.dir.display());
        Ok(())
    }

    fn write_json<T: Serialize>(&self, name: &str, value: &T) -> Result<()> {
        let path = self.dir.join(name);
        fs::write(&path, serde_json::to_string_pretty(value)?)
            .with_context(|| format!("Cannot write '{}'", path.display()))
    }
}

fn score_file(captions: &[GeneratedCaption]) -> ScoresFile {
    let per_image: Vec<ImageScore> = captions
        .iter()
        .map(|c| ImageScore {
            image:         c.image.display().to_string(),
            mean_log_prob: c.mean_log_prob,
            length:        c.words.len(),
        })
        .collect();

    let mean_log_prob = if per_image.is_empty() {
        0.0
    } else {
        per_image.iter().map(|s| s.mean_log_prob).sum::<f32>() / per_image.len() as f32
    };

    ScoresFile { count: per_image.len(), mean_log_prob, per_image }
}

/// Lay out the thumbnail followed by one tinted copy per word; the
/// red channel of each copy is the word's attention, scaled to its max.
pub fn render_attention(thumb: &RgbImage, attention: &[Vec<f32>]) -> RgbImage {
    let tiles  = 1 + attention.len() as u32;
    let width  = tiles * TILE + (tiles - 1) * TILE_GAP;
    let mut canvas = RgbImage::from_pixel(width, TILE, Rgb([255, 255, 255]));

    let cell = (IMAGE_SIZE / GRID as u32).max(1);

    for tile in 0..tiles {
        let x0 = tile * (TILE + TILE_GAP);
        let weights = tile.checked_sub(1).map(|w| &attention[w as usize]);
        let peak = weights
            .map(|w| w.iter().cloned().fold(f32::EPSILON, f32::max))
            .unwrap_or(1.0);

        for y in 0..TILE {
            for x in 0..TILE {
                let (sx, sy) = (x / PLOT_ZOOM, y / PLOT_ZOOM);
                let Rgb([r, g, b]) = *thumb.get_pixel(sx, sy);

                let pixel = match weights {
                    None => Rgb([r, g, b]),
                    Some(w) => {
                        let region = (sy / cell) as usize * GRID + (sx / cell) as usize;
                        let heat   = w.get(region).copied().unwrap_or(0.0) / peak;
                        let gray   = (0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32) * 0.5;
                        Rgb([
                            (gray + heat * 127.0).min(255.0) as u8,
                            gray as u8,
                            gray as u8,
                        ])
                    }
                };
                canvas.put_pixel(x0 + x, y, pixel);
            }
        }
    }

    canvas
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn render_report(records: &[CaptionRecord], plots: &[String], scores: &ScoresFile) -> String {
    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html lang=\"bn\">\n<head>\n<meta charset=\"utf-8\">\n");
    html.push_str("<title>Bangla caption results</title>\n");
    html.push_str("<style>body{font-family:sans-serif}td{vertical-align:top;padding:6px}</style>\n");
    html.push_str("</head>\n<body>\n<h1>Bangla caption results</h1>\n");
    let _ = writeln!(
        html,
        "<p>{} images, mean token log-probability {:.4}</p>",
        scores.count, scores.mean_log_prob
    );
    html.push_str("<table>\n<tr><th>Image</th><th>Prediction</th><th>References</th><th>Attention</th></tr>\n");

    for (record, plot) in records.iter().zip(plots) {
        let refs: String = record
            .references
            .iter()
            .map(|r| format!("<li>{}</li>", escape_html(r)))
            .collect();
        let _ = writeln!(
            html,
            "<tr><td>{}</td><td>{}</td><td><ul>{}</ul></td><td><img src=\"{}\"></td></tr>",
            escape_html(&record.image),
            escape_html(&record.caption),
            refs,
            escape_html(plot),
        );
    }

    html.push_str("</table>\n</body>\n</html>\n");
    html
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::image_features::NUM_REGIONS;

    fn caption(image: &Path, words: &[&str]) -> GeneratedCaption {
        let mut focus = vec![0.0; NUM_REGIONS];
        focus[0] = 1.0;
        GeneratedCaption {
            image:         image.to_path_buf(),
            words:         words.iter().map(|w| w.to_string()).collect(),
            attention:     vec![focus; words.len()],
            mean_log_prob: -1.25,
        }
    }

    #[test]
    fn test_render_attention_dimensions() {
        let thumb = RgbImage::from_pixel(IMAGE_SIZE, IMAGE_SIZE, Rgb([0, 0, 0]));
        let mut w = vec![0.0; NUM_REGIONS];
        w[0] = 1.0;

        let plot = render_attention(&thumb, &[w.clone(), w]);
        assert_eq!(plot.dimensions(), (3 * TILE + 2 * TILE_GAP, TILE));

        // First word tile: the attended corner is red, the far corner is not
        let x0 = TILE + TILE_GAP;
        assert_eq!(plot.get_pixel(x0, 0).0[0], 127);
        assert_eq!(plot.get_pixel(x0 + TILE - 1, TILE - 1).0[0], 0);
    }

    #[test]
    fn test_write_all_produces_every_file() {
        let dir   = tempfile::tempdir().unwrap();
        let image = dir.path().join("17.png");
        RgbImage::from_pixel(10, 10, Rgb([1, 2, 3])).save(&image).unwrap();

        let mut refs = CaptionMapping::new();
        refs.insert(image.clone(), vec!["একটি <ছবি>".to_string()]);

        let out = dir.path().join("results");
        let writer = ResultsWriter::new(&out);
        writer.write_all(&[caption(&image, &["একটি", "ছবি"])], &refs).unwrap();

        assert!(out.join("attention/000_17.png").is_file());

        let records: Vec<CaptionRecord> =
            serde_json::from_str(&fs::read_to_string(out.join("captions.json")).unwrap()).unwrap();
        assert_eq!(records[0].caption, "একটি ছবি");
        assert_eq!(records[0].references, vec!["একটি <ছবি>"]);

        let scores: ScoresFile =
            serde_json::from_str(&fs::read_to_string(out.join("scores.json")).unwrap()).unwrap();
        assert_eq!(scores.count, 1);
        assert_eq!(scores.per_image[0].length, 2);
        assert!((scores.mean_log_prob + 1.25).abs() < 1e-6);

        let html = fs::read_to_string(out.join("report.html")).unwrap();
        assert!(html.contains("একটি &lt;ছবি&gt;"));
        assert!(html.contains("attention/000_17.png"));
    }

    #[test]
    fn test_missing_image_still_plots() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ResultsWriter::new(dir.path());
        let gone = dir.path().join("gone.jpg");
        writer.write_all(&[caption(&gone, &["x"])], &CaptionMapping::new()).unwrap();
        assert!(dir.path().join("attention/000_gone.png").is_file());
    }
}
