//! Projection-profile column splitting.
//!
//! Printed classified sections separate their columns with vertical rules.
//! Summing foreground per pixel column gives a profile in which rules stand
//! far above body text; every position above a fraction of the maximum is a
//! divider pixel, and runs of divider pixels collapse into cut points.
//!
//! Hairline rules that the scanner rendered faintly never reach that
//! cutoff. Reinforcement looks for narrow, isolated peaks in a smoothed
//! profile that are flanked by an almost empty valley, and paints a solid
//! divider over each before the cut points are computed.

use image::GrayImage;

use crate::config::ColumnSplitterConfig;
use crate::geometry::PixelRect;
use crate::raster::{self, profile};

/// One vertical print column of a block.
#[derive(Debug, Clone)]
pub struct Column {
    /// Position among the block's columns, left to right
    pub index: usize,
    /// Left edge of the padded crop (block coordinates)
    pub x_start: u32,
    /// Right edge (exclusive) of the padded crop
    pub x_end: u32,
    /// Cut point the column starts at, before padding
    pub cut_left: u32,
    /// Cut point the column ends at, before padding
    pub cut_right: u32,
    /// Pixels of the padded crop, full block height
    pub image: GrayImage,
}

impl Column {
    /// Width of the padded crop.
    pub fn width(&self) -> u32 {
        self.x_end - self.x_start
    }
}

/// Result of splitting one block.
#[derive(Debug, Clone, Default)]
pub struct ColumnSplit {
    /// Columns wider than the minimum, left to right
    pub columns: Vec<Column>,
    /// Cut points including both block edges
    pub cut_points: Vec<u32>,
    /// Divider cutoff applied to the profile
    pub threshold: f64,
    /// Positions where a divider was synthesized
    pub reinforced: Vec<u32>,
}

/// Splits cleaned blocks into columns.
#[derive(Debug, Clone, Default)]
pub struct ColumnSplitter {
    config: ColumnSplitterConfig,
}

impl ColumnSplitter {
    /// Create a splitter.
    pub fn new(config: ColumnSplitterConfig) -> Self {
        Self { config }
    }

    /// Split `block` into columns.
    ///
    /// A block without dividers yields one column covering its full width
    /// (when that is wider than the minimum column width).
    pub fn split(&self, block: &GrayImage) -> ColumnSplit {
        let cfg = &self.config;
        let width = block.width();
        if width == 0 || block.height() == 0 {
            return ColumnSplit::default();
        }

        let mut binary = raster::binarize_inverse(block, cfg.binarize_threshold);
        let original = profile::vertical_projection(&binary);
        let max = original.iter().cloned().fold(0.0f64, f64::max);
        let threshold = max * cfg.h_factor;

        let mut reinforced = Vec::new();
        if cfg.reinforce && max > 0.0 {
            reinforced = self.faint_dividers(&original, threshold);
            for &x in &reinforced {
                raster::fill_rect(
                    &mut binary,
                    PixelRect::new(x, 0, cfg.divider_width, block.height()),
                    raster::INK,
                );
            }
            if !reinforced.is_empty() {
                log::debug!("reinforced {} faint dividers at {:?}", reinforced.len(), reinforced);
            }
        }

        let final_profile = if reinforced.is_empty() {
            original
        } else {
            profile::vertical_projection(&binary)
        };

        let mut cut_points = vec![0u32];
        cut_points.extend(self.merge_dividers(&final_profile, threshold));
        cut_points.push(width);

        let mut columns = Vec::new();
        for pair in cut_points.windows(2) {
            let (left, right) = (pair[0], pair[1]);
            if right.saturating_sub(left) <= cfg.min_column_width {
                continue;
            }
            let x_start = left.saturating_sub(cfg.p_ocr);
            let x_end = (right + cfg.p_ocr).min(width);
            let image = raster::crop(block, PixelRect::from_corners(x_start, 0, x_end, block.height()));
            columns.push(Column {
                index: columns.len(),
                x_start,
                x_end,
                cut_left: left,
                cut_right: right,
                image,
            });
        }

        log::debug!(
            "cut points {:?} (threshold {:.0}), {} columns kept",
            cut_points,
            threshold,
            columns.len()
        );
        ColumnSplit {
            columns,
            cut_points,
            threshold,
            reinforced,
        }
    }

    /// Positions of faint dividers worth synthesizing.
    fn faint_dividers(&self, projection: &[f64], threshold: f64) -> Vec<u32> {
        let cfg = &self.config;
        let n = projection.len();
        let smooth = profile::savgol_smooth(projection, cfg.smoothing_window);
        let valley_floor = threshold * cfg.valley_ratio;

        profile::find_peaks(&smooth, threshold * cfg.r_sens, cfg.peak_distance)
            .into_iter()
            .filter(|&x| {
                let peak = smooth[x];
                if peak >= threshold || x < cfg.edge_margin || x + cfg.edge_margin >= n {
                    return false;
                }
                let left = &smooth[x.saturating_sub(cfg.valley_radius)..x];
                let right = &smooth[x + 1..(x + cfg.valley_radius + 1).min(n)];
                let valley = |zone: &[f64]| zone.iter().cloned().fold(f64::INFINITY, f64::min);
                let (left_min, right_min) = (valley(left), valley(right));
                let (left_min, right_min) = (
                    if left_min.is_finite() { left_min } else { peak },
                    if right_min.is_finite() { right_min } else { peak },
                );

                let has_valley = left_min < valley_floor || right_min < valley_floor;
                let contrast = |v: f64| if v > 0.0 { peak / v } else { f64::INFINITY };
                let has_contrast = contrast(left_min).min(contrast(right_min)) >= cfg.min_contrast;
                let is_max = peak > smooth[x - 1] && peak > smooth[x + 1];
                has_valley && has_contrast && is_max
            })
            .map(|x| x as u32)
            .collect()
    }

    /// First index of each run of divider pixels; runs separated by at most
    /// `h_gap` merge.
    fn merge_dividers(&self, projection: &[f64], threshold: f64) -> Vec<u32> {
        let mut cuts = Vec::new();
        let mut previous: Option<usize> = None;
        for (x, &value) in projection.iter().enumerate() {
            if value <= threshold {
                continue;
            }
            match previous {
                Some(p) if x - p <= self.config.h_gap as usize => {},
                _ => cuts.push(x as u32),
            }
            previous = Some(x);
        }
        cuts
    }
}
