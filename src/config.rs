//! Tunables for the segmentation stages.
//!
//! Every threshold here was tuned against specific newspaper typographies,
//! so they are kept as data rather than literal constants. All structs
//! deserialize with `#[serde(default)]`; a JSON override only needs the
//! fields it changes.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Block detection tunables (page morphology and classification).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockDetectorConfig {
    /// Inverse binarization threshold for the page.
    pub binarize_threshold: u8,
    /// Dilation kernel width fusing glyphs into blobs.
    pub kernel_width: u32,
    /// Dilation kernel height fusing glyphs into blobs.
    pub kernel_height: u32,
    /// Dilation iterations.
    pub iterations: u32,
    /// Boxes narrower than this are page furniture.
    pub min_block_width: u32,
    /// Boxes shorter than this are page furniture.
    pub min_block_height: u32,
    /// Paint furniture boxes white instead of only skipping them.
    pub erase_furniture: bool,
    /// Re-segmentation kernel width for ambiguous blocks (taller/narrower).
    pub reseg_kernel_width: u32,
    /// Re-segmentation kernel height for ambiguous blocks.
    pub reseg_kernel_height: u32,
    /// Re-segmentation dilation iterations.
    pub reseg_iterations: u32,
}

impl Default for BlockDetectorConfig {
    fn default() -> Self {
        Self {
            binarize_threshold: 180,
            kernel_width: 20,
            kernel_height: 15,
            iterations: 2,
            min_block_width: 250,
            min_block_height: 250,
            erase_furniture: false,
            reseg_kernel_width: 5,
            reseg_kernel_height: 30,
            reseg_iterations: 2,
        }
    }
}

/// Legend band stripping tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LegendConfig {
    /// Inverse binarization threshold used to find dark bands.
    pub binarize_threshold: u8,
    /// Horizontal dilation kernel width.
    pub kernel_width: u32,
    /// Horizontal dilation kernel height.
    pub kernel_height: u32,
    /// Dilation iterations.
    pub iterations: u32,
    /// Band must be wider than this fraction of the block width.
    pub min_width_ratio: f64,
    /// Band must be shorter than this fraction of the block height.
    pub max_height_ratio: f64,
    /// Band must start above this fraction of the block height.
    pub max_top_ratio: f64,
    /// Legend tokens that must be recognised in the band.
    pub min_token_matches: usize,
    /// Extra height erased above a confirmed band, as a multiple of its height.
    pub erase_above_factor: f64,
}

impl Default for LegendConfig {
    fn default() -> Self {
        Self {
            binarize_threshold: 150,
            kernel_width: 100,
            kernel_height: 5,
            iterations: 1,
            min_width_ratio: 0.4,
            max_height_ratio: 0.3,
            max_top_ratio: 0.5,
            min_token_matches: 2,
            erase_above_factor: 1.2,
        }
    }
}

/// Rule/graphic artifact removal tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DespeckleConfig {
    /// Inverse binarization threshold for component labelling.
    pub binarize_threshold: u8,
    /// Components wider than this fraction of the block width are candidates.
    pub width_ratio: f64,
    /// Wide components must also be taller than this.
    pub min_height: u32,
    /// Components with more foreground pixels than this are always removed.
    pub max_area: u64,
    /// Symmetric padding around removed components (`p_borrado`).
    pub padding: u32,
}

impl Default for DespeckleConfig {
    fn default() -> Self {
        Self {
            binarize_threshold: 200,
            width_ratio: 0.25,
            min_height: 70,
            max_area: 5000,
            padding: 10,
        }
    }
}

/// Projection-profile column splitting tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnSplitterConfig {
    /// Inverse binarization threshold.
    pub binarize_threshold: u8,
    /// Divider cutoff as a fraction of the profile maximum (`h_factor`).
    pub h_factor: f64,
    /// Divider runs closer than this merge into one cut (`h_gap`).
    pub h_gap: u32,
    /// Synthesize dividers for faint gutters.
    pub reinforce: bool,
    /// Minimum smoothed peak as a fraction of the cutoff (`r_sens`).
    pub r_sens: f64,
    /// Savitzky–Golay window length (odd).
    pub smoothing_window: usize,
    /// Minimum distance between candidate peaks.
    pub peak_distance: usize,
    /// Half-width of the valley inspection window.
    pub valley_radius: usize,
    /// A valley is near-empty below this fraction of the cutoff.
    pub valley_ratio: f64,
    /// Minimum peak/valley contrast on the weaker side.
    pub min_contrast: f64,
    /// Peaks this close to either block edge are ignored.
    pub edge_margin: usize,
    /// Width of a synthesized divider.
    pub divider_width: u32,
    /// Spans at most this wide are dropped.
    pub min_column_width: u32,
    /// Padding added to each side of a surviving column (`p_ocr`).
    pub p_ocr: u32,
}

impl Default for ColumnSplitterConfig {
    fn default() -> Self {
        Self {
            binarize_threshold: 220,
            h_factor: 0.65,
            h_gap: 30,
            reinforce: true,
            r_sens: 0.10,
            smoothing_window: 11,
            peak_distance: 15,
            valley_radius: 15,
            valley_ratio: 0.08,
            min_contrast: 3.0,
            edge_margin: 20,
            divider_width: 2,
            min_column_width: 60,
            p_ocr: 10,
        }
    }
}

/// Section boundary tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SectionConfig {
    /// Rows kept above the start match when cropping.
    pub start_crop_margin: u32,
    /// END columns at most this tall after cropping are dropped.
    pub min_end_height: u32,
    /// Title lines longer than this are body text.
    pub max_title_len: usize,
    /// Pages of raw columns held for the pass-through fallback; `None`
    /// holds every page of the run.
    pub fallback_page_limit: Option<usize>,
}

impl Default for SectionConfig {
    fn default() -> Self {
        Self {
            start_crop_margin: 5,
            min_end_height: 10,
            max_title_len: 60,
            fallback_page_limit: None,
        }
    }
}

/// Tile assembly and upload encoding tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Columns stacked per tile.
    pub tile_size: usize,
    /// White separator between stacked columns.
    pub separator_height: u32,
    /// Encoded tiles above this size are recompressed.
    pub upload_cap_bytes: usize,
    /// First JPEG quality tried when recompressing.
    pub jpeg_start_quality: u8,
    /// Quality decrement per attempt.
    pub jpeg_quality_step: u8,
    /// Lowest JPEG quality tried.
    pub jpeg_min_quality: u8,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            tile_size: 2,
            separator_height: 20,
            upload_cap_bytes: 9 * 1024 * 1024,
            jpeg_start_quality: 95,
            jpeg_quality_step: 5,
            jpeg_min_quality: 10,
        }
    }
}

/// Complete segmentation configuration for one region.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    /// Block detection
    pub block: BlockDetectorConfig,
    /// Legend stripping
    pub legend: LegendConfig,
    /// Artifact removal
    pub despeckle: DespeckleConfig,
    /// Column splitting
    pub columns: ColumnSplitterConfig,
    /// Section boundaries
    pub section: SectionConfig,
    /// Tile assembly
    pub batch: BatchConfig,
}

impl SegmentationConfig {
    /// Create new configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a (possibly partial) configuration from JSON.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: SegmentationConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Set the divider cutoff factor.
    pub fn with_h_factor(mut self, h_factor: f64) -> Self {
        self.columns.h_factor = h_factor;
        self
    }

    /// Set the divider merge gap.
    pub fn with_h_gap(mut self, h_gap: u32) -> Self {
        self.columns.h_gap = h_gap;
        self
    }

    /// Set the reinforcement sensitivity.
    pub fn with_r_sens(mut self, r_sens: f64) -> Self {
        self.columns.r_sens = r_sens;
        self
    }

    /// Enable or disable faint-gutter reinforcement.
    pub fn with_reinforcement(mut self, enable: bool) -> Self {
        self.columns.reinforce = enable;
        self
    }

    /// Set the per-column OCR padding.
    pub fn with_p_ocr(mut self, p_ocr: u32) -> Self {
        self.columns.p_ocr = p_ocr;
        self
    }

    /// Set the artifact erase padding.
    pub fn with_p_borrado(mut self, padding: u32) -> Self {
        self.despeckle.padding = padding;
        self
    }

    /// Set the minimum candidate block size.
    pub fn with_min_block(mut self, width: u32, height: u32) -> Self {
        self.block.min_block_width = width;
        self.block.min_block_height = height;
        self
    }

    /// Set the minimum column width.
    pub fn with_min_column_width(mut self, width: u32) -> Self {
        self.columns.min_column_width = width;
        self
    }

    /// Set the number of columns per OCR tile.
    pub fn with_tile_size(mut self, tile_size: usize) -> Self {
        self.batch.tile_size = tile_size;
        self
    }

    /// Check every tunable is in range.
    pub fn validate(&self) -> Result<()> {
        let c = &self.columns;
        if !(c.h_factor > 0.0 && c.h_factor <= 1.0) {
            return Err(invalid("columns.h_factor must be in (0, 1]"));
        }
        if !(c.r_sens > 0.0 && c.r_sens < 1.0) {
            return Err(invalid("columns.r_sens must be in (0, 1)"));
        }
        if c.smoothing_window < 3 || c.smoothing_window % 2 == 0 {
            return Err(invalid("columns.smoothing_window must be odd and >= 3"));
        }
        if c.peak_distance == 0 || c.valley_radius == 0 {
            return Err(invalid("columns.peak_distance and valley_radius must be positive"));
        }
        if c.divider_width == 0 {
            return Err(invalid("columns.divider_width must be positive"));
        }
        if self.block.kernel_width == 0 || self.block.kernel_height == 0 {
            return Err(invalid("block kernel dimensions must be positive"));
        }
        if self.legend.min_width_ratio <= 0.0 || self.legend.max_height_ratio <= 0.0 {
            return Err(invalid("legend ratios must be positive"));
        }
        if self.legend.min_token_matches == 0 {
            return Err(invalid("legend.min_token_matches must be at least 1"));
        }
        if self.despeckle.width_ratio <= 0.0 {
            return Err(invalid("despeckle.width_ratio must be positive"));
        }
        if self.batch.tile_size == 0 {
            return Err(invalid("batch.tile_size must be at least 1"));
        }
        if self.batch.jpeg_min_quality == 0
            || self.batch.jpeg_min_quality > self.batch.jpeg_start_quality
            || self.batch.jpeg_start_quality > 100
            || self.batch.jpeg_quality_step == 0
        {
            return Err(invalid("batch JPEG qualities must satisfy 0 < min <= start <= 100"));
        }
        Ok(())
    }
}

fn invalid(message: &str) -> Error {
    Error::InvalidConfig(message.to_string())
}
