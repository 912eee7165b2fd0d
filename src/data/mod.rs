// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything between annotation files on disk and tensor
// batches on the device.
//
//   annotation files (.json / .txt)
//       │
//       ▼
//   JsonCaptionParser / TxtCaptionParser   → image → captions
//   TestSetCollector                        (BNATURE / BNLIT walk)
//       │
//       ▼
//   Preprocessor      → clean, add <start> / <end>
//       │
//       ▼
//   flatten_captions  → one row per caption, optional train limit
//       │
//       ▼
//   image_features    → region grid per image
//       │
//       ▼
//   CaptionDataset    → implements Burn's Dataset trait
//       │
//       ▼
//   CaptionBatcher    → stacks samples into tensor batches
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// JSON annotation parser
pub mod json_parser;

/// TXT annotation parser and the shared line splitter
pub mod txt_parser;

/// Walks a test directory (BNATURE / BNLIT layouts)
pub mod collector;

/// Caption cleaning and sequence markers
pub mod preprocessor;

/// Image decoding and region features
pub mod image_features;

/// Flattening, tokenised samples, Burn Dataset
pub mod dataset;

/// Burn Batcher for caption samples
pub mod batcher;

/// Shuffles and splits data into train/validation sets
pub mod splitter;
