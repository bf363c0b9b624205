//! # lbp-face
//!
//! Pure Rust dense local binary pattern (LBP) descriptors for sliding-window
//! face detection.
//!
//! This crate provides:
//! - **Pattern mapping**: a 256-entry table collapsing 8-neighbor comparison
//!   codes into 58 uniform-pattern classes
//! - **Dense extraction**: per-pixel codes pooled bilinearly into a grid of
//!   cells and square-root normalized per cell
//! - **Vector boundary**: standardization statistics and CSV persistence for
//!   the flattened feature vectors handed to a classifier
//!
//! ## Algorithm Overview
//!
//! 1. Build the mapping once (56 uniform runs, 1 flat class, 1 catch-all)
//! 2. For each interior pixel:
//!    - Compare the 8 neighbors against the center (E, SE, S, SW, W, NW, N, NE)
//!    - Map the resulting byte to a class
//!    - Split unit weight across the four surrounding cell centers
//! 3. Replace each cell histogram `h` by `sqrt(h) / (sqrt(sum(h)) + 1e-10)`
//!
//! ## Features
//!
//! - `rayon` – [`describe_regions`] processes regions in parallel. Results are
//!   identical to the sequential path; run the test suite both ways
//!   (`cargo test` and `cargo test --features rayon`) since each build
//!   compiles only one of the two branches.
//!
//! ## Quick Start
//!
//! ```rust
//! use lbp_face::{extract, CellGrid, GrayImage, PatternClassifier, PatternMapper};
//!
//! let mapper = PatternMapper::uniform(false);
//! let image = GrayImage::from_fn(128, 96, |x, y| ((x * 3 + y) % 256) as f32);
//!
//! // Size the accumulator for 32x32 cells
//! let grid = CellGrid::new(128, 96, 32, mapper.class_count()).unwrap();
//! let mut features = vec![0.0f32; grid.len()];
//!
//! extract(&mapper, &image.view(), 32, &mut features).unwrap();
//! assert_eq!(features.len(), 58 * 4 * 3);
//! ```
//!
//! ## Custom Groupings
//!
//! The extractor only needs a [`PatternClassifier`]:
//!
//! ```rust
//! use lbp_face::PatternClassifier;
//!
//! /// Counts set bits: 9 classes, rotation invariant.
//! struct BitCount;
//!
//! impl PatternClassifier for BitCount {
//!     fn class_count(&self) -> usize { 9 }
//!     fn classify(&self, pattern: u8) -> usize { pattern.count_ones() as usize }
//! }
//! ```

mod config;
mod error;
mod features;
mod mapping;
mod types;
mod vector;

pub use config::{DescriptorConfig, DEFAULT_CELL_SIZE};
pub use error::{Error, Result};
pub use features::{
    describe_regions, extract, extract_slice, Descriptor, GrayImage, ImageView, NORM_EPSILON,
};
pub use mapping::{MappingKind, PatternClassifier, PatternMapper, UNIFORM_CLASSES};
pub use types::{CellGrid, Region};
pub use vector::{load_csv, parse_values, save_csv, write_csv, Standardizer};
