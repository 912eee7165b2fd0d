// ============================================================
// Layer 4 — Image Features
// ============================================================
// Turns an image file into the grid of region features the
// attention decoder looks at.
//
//   image (any size)
//       │  resize to IMAGE_SIZE × IMAGE_SIZE, RGB
//       ▼
//   GRID × GRID patches of PATCH_SIZE × PATCH_SIZE pixels
//       │  flatten each patch (row, column, channel)
//       ▼
//   NUM_REGIONS vectors of FEATURE_DIM floats in [-0.5, 0.5]
//
// Region r covers grid cell (r / GRID, r % GRID), so an
// attention distribution over regions can be drawn straight
// back onto the thumbnail.

use anyhow::{Context, Result};
use image::{imageops::FilterType, RgbImage};
use std::path::Path;

pub const IMAGE_SIZE:  u32   = 64;
pub const PATCH_SIZE:  u32   = 8;
pub const GRID:        usize = (IMAGE_SIZE / PATCH_SIZE) as usize;
pub const NUM_REGIONS: usize = GRID * GRID;
pub const FEATURE_DIM: usize = (PATCH_SIZE * PATCH_SIZE * 3) as usize;

/// Decode `path` and resize it to the square thumbnail the model sees.
pub fn load_thumbnail(path: &Path) -> Result<RgbImage> {
    let img = image::open(path)
        .with_context(|| format!("Cannot decode image '{}'", path.display()))?;
    Ok(img
        .resize_exact(IMAGE_SIZE, IMAGE_SIZE, FilterType::Triangle)
        .to_rgb8())
}

/// Flattened region features, NUM_REGIONS × FEATURE_DIM values.
pub fn features_from_thumbnail(thumb: &RgbImage) -> Vec<f32> {
    debug_assert_eq!(thumb.dimensions(), (IMAGE_SIZE, IMAGE_SIZE));

    let mut out = Vec::with_capacity(NUM_REGIONS * FEATURE_DIM);
    for gy in 0..GRID as u32 {
        for gx in 0..GRID as u32 {
            for py in 0..PATCH_SIZE {
                for px in 0..PATCH_SIZE {
                    let pixel = thumb.get_pixel(gx * PATCH_SIZE + px, gy * PATCH_SIZE + py);
                    out.extend(pixel.0.iter().map(|&c| c as f32 / 255.0 - 0.5));
                }
            }
        }
    }
    out
}

/// Load an image and extract its region features.
pub fn load_features(path: &Path) -> Result<Vec<f32>> {
    Ok(features_from_thumbnail(&load_thumbnail(path)?))
}
