//! Page layout segmentation.
//!
//! This module provides the raster stages that run on every page:
//! - Block detection (morphology + keyword classification)
//! - Noise filtering (legend bands, rules and graphics)
//! - Column splitting (projection profiles)

pub mod block_detector;
pub mod column_splitter;
pub mod noise_filter;

// Re-export main types
pub use block_detector::{Block, BlockClass, BlockDetection, BlockDetector, KeywordSet};
pub use column_splitter::{Column, ColumnSplit, ColumnSplitter};
pub use noise_filter::{ArtifactDespeckle, LegendStripper, NoiseFilter};
