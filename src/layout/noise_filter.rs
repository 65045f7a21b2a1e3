//! Block clean-up passes.
//!
//! Both passes paint over pixels in place and never change block
//! dimensions, so coordinates computed before and after filtering agree.

use image::{GrayImage, Luma};
use imageproc::region_labelling::{connected_components, Connectivity};

use crate::config::{DespeckleConfig, LegendConfig};
use crate::geometry::PixelRect;
use crate::ocr::{OcrEngine, OcrLayoutHint};
use crate::raster;

/// Removes the dark category-legend band printed across the top of some
/// classified sections, together with the page/category numerals above it.
#[derive(Debug, Clone)]
pub struct LegendStripper {
    config: LegendConfig,
    tokens: Vec<String>,
}

impl LegendStripper {
    /// Create a stripper validating bands against `tokens` (upper-cased).
    pub fn new<S: AsRef<str>>(config: LegendConfig, tokens: impl IntoIterator<Item = S>) -> Self {
        Self {
            config,
            tokens: tokens.into_iter().map(|t| t.as_ref().to_uppercase()).collect(),
        }
    }

    /// Band detection tunables.
    pub fn config(&self) -> &LegendConfig {
        &self.config
    }

    /// Legend tokens.
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// Find confirmed legend bands and return the rectangles to erase.
    pub fn locate(&self, block: &GrayImage, ocr: &dyn OcrEngine) -> Vec<PixelRect> {
        let cfg = &self.config;
        let (w, h) = (block.width(), block.height());
        if w == 0 || h == 0 || self.tokens.is_empty() {
            return Vec::new();
        }

        let binary = raster::binarize_inverse(block, cfg.binarize_threshold);
        let joined = raster::dilate_rect(&binary, cfg.kernel_width, cfg.kernel_height, cfg.iterations);

        let mut erase = Vec::new();
        for band in raster::external_boxes(&joined) {
            let wide = band.width as f64 > w as f64 * cfg.min_width_ratio;
            let short = (band.height as f64) < h as f64 * cfg.max_height_ratio;
            let near_top = (band.y as f64) < h as f64 * cfg.max_top_ratio;
            if !(wide && short && near_top) {
                continue;
            }

            let text = match ocr.recognize(&raster::crop(block, band), OcrLayoutHint::UniformBlock) {
                Ok(output) => output.upper_text(),
                Err(e) => {
                    log::warn!("OCR failed on legend candidate at y={}: {}", band.y, e);
                    continue;
                },
            };
            let matches = self.tokens.iter().filter(|t| text.contains(t.as_str())).count();
            if matches < cfg.min_token_matches {
                continue;
            }

            let above = (band.height as f64 * cfg.erase_above_factor) as u32;
            let top = band.y.saturating_sub(above);
            log::debug!(
                "legend band at y={} ({} tokens), erasing rows {}..{}",
                band.y,
                matches,
                top,
                band.bottom()
            );
            erase.push(PixelRect::from_corners(band.x, top, band.right(), band.bottom()));
        }
        erase
    }

    /// Erase confirmed legend bands in place; returns how many were erased.
    pub fn apply(&self, block: &mut GrayImage, ocr: &dyn OcrEngine) -> usize {
        let bands = self.locate(block, ocr);
        for band in &bands {
            raster::fill_white(block, *band);
        }
        bands.len()
    }
}

/// Removes rules, boxes and graphics that would otherwise dominate the
/// projection profile.
#[derive(Debug, Clone, Default)]
pub struct ArtifactDespeckle {
    config: DespeckleConfig,
}

impl ArtifactDespeckle {
    /// Create the pass.
    pub fn new(config: DespeckleConfig) -> Self {
        Self { config }
    }

    /// Rectangles (padded) of components classified as artifacts.
    pub fn locate(&self, block: &GrayImage) -> Vec<PixelRect> {
        let cfg = &self.config;
        let (w, h) = (block.width(), block.height());
        if w == 0 || h == 0 {
            return Vec::new();
        }

        let binary = raster::binarize_inverse(block, cfg.binarize_threshold);
        let labels = connected_components(&binary, Connectivity::Four, Luma([0u8]));

        // label -> (x0, y0, x1, y1, area)
        let mut stats: Vec<(u32, u32, u32, u32, u64)> = Vec::new();
        for (x, y, label) in labels.enumerate_pixels() {
            let label = label.0[0] as usize;
            if label == 0 {
                continue;
            }
            if stats.len() < label {
                stats.resize(label, (u32::MAX, u32::MAX, 0, 0, 0));
            }
            let s = &mut stats[label - 1];
            s.0 = s.0.min(x);
            s.1 = s.1.min(y);
            s.2 = s.2.max(x);
            s.3 = s.3.max(y);
            s.4 += 1;
        }

        stats
            .into_iter()
            .filter(|s| s.4 > 0)
            .filter_map(|(x0, y0, x1, y1, area)| {
                let comp_w = x1 - x0 + 1;
                let comp_h = y1 - y0 + 1;
                let wide_and_tall =
                    comp_w as f64 > w as f64 * cfg.width_ratio && comp_h > cfg.min_height;
                if wide_and_tall || area > cfg.max_area {
                    Some(PixelRect::new(x0, y0, comp_w, comp_h).padded(cfg.padding, w, h))
                } else {
                    None
                }
            })
            .collect()
    }

    /// White-fill artifacts in place; returns how many were removed.
    pub fn apply(&self, block: &mut GrayImage) -> usize {
        let artifacts = self.locate(block);
        for rect in &artifacts {
            raster::fill_white(block, *rect);
        }
        artifacts.len()
    }
}

/// Legend stripping (when the region has a legend) followed by artifact
/// removal.
#[derive(Debug, Clone, Default)]
pub struct NoiseFilter {
    despeckle: ArtifactDespeckle,
}

impl NoiseFilter {
    /// Create the filter.
    pub fn new(despeckle: ArtifactDespeckle) -> Self {
        Self { despeckle }
    }

    /// Return a cleaned copy of `block`.
    pub fn apply(
        &self,
        block: &GrayImage,
        legend: Option<&LegendStripper>,
        ocr: &dyn OcrEngine,
    ) -> GrayImage {
        let mut cleaned = block.clone();
        if let Some(stripper) = legend {
            stripper.apply(&mut cleaned, ocr);
        }
        let removed = self.despeckle.apply(&mut cleaned);
        if removed > 0 {
            log::debug!("removed {} rule/graphic artifacts", removed);
        }
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::ocr::OcrOutput;

    struct FixedOcr(&'static str);

    impl OcrEngine for FixedOcr {
        fn recognize(&self, _image: &GrayImage, _hint: OcrLayoutHint) -> Result<OcrOutput> {
            Ok(OcrOutput::from_text(self.0))
        }

        fn name(&self) -> &'static str {
            "fixed"
        }
    }

    fn blank(w: u32, h: u32) -> GrayImage {
        raster::white_canvas(w, h)
    }

    #[test]
    fn test_despeckle_removes_wide_rule_and_large_blob() {
        let mut block = blank(400, 300);
        // Wide, tall frame: 200x80 outline.
        raster::fill_rect(&mut block, PixelRect::new(20, 20, 200, 80), Luma([0]));
        raster::fill_rect(&mut block, PixelRect::new(23, 23, 194, 74), Luma([255]));
        // Small glyph that must survive.
        raster::fill_rect(&mut block, PixelRect::new(300, 200, 8, 12), Luma([0]));
        // Dense graphic with area > 5000.
        raster::fill_rect(&mut block, PixelRect::new(250, 20, 80, 80), Luma([0]));

        let despeckle = ArtifactDespeckle::new(DespeckleConfig::default());
        assert_eq!(despeckle.apply(&mut block), 2);
        assert_eq!(block.get_pixel(21, 21).0[0], 255);
        assert_eq!(block.get_pixel(260, 30).0[0], 255);
        assert_eq!(block.get_pixel(303, 205).0[0], 0);
        assert_eq!(block.dimensions(), (400, 300));
    }

    #[test]
    fn test_despeckle_keeps_thin_vertical_rule() {
        let mut block = blank(400, 600);
        raster::fill_rect(&mut block, PixelRect::new(200, 0, 2, 600), Luma([0]));
        let despeckle = ArtifactDespeckle::new(DespeckleConfig::default());
        assert_eq!(despeckle.apply(&mut block), 0);
    }

    #[test]
    fn test_legend_band_erased_with_numerals_above() {
        let mut block = blank(600, 800);
        // Numerals above the band.
        raster::fill_rect(&mut block, PixelRect::new(40, 60, 30, 20), Luma([0]));
        // Dark legend band.
        raster::fill_rect(&mut block, PixelRect::new(20, 100, 500, 30), Luma([0]));
        // Body text lower down.
        raster::fill_rect(&mut block, PixelRect::new(20, 500, 40, 10), Luma([0]));

        let stripper = LegendStripper::new(LegendConfig::default(), ["PROPIEDADES", "VEHICULOS"]);
        let ocr = FixedOcr("1300 PROPIEDADES  1400 VEHICULOS");
        assert_eq!(stripper.apply(&mut block, &ocr), 1);
        assert_eq!(block.get_pixel(50, 70).0[0], 255);
        assert_eq!(block.get_pixel(100, 110).0[0], 255);
        assert_eq!(block.get_pixel(30, 505).0[0], 0);
    }

    #[test]
    fn test_legend_requires_two_tokens() {
        let mut block = blank(600, 800);
        raster::fill_rect(&mut block, PixelRect::new(20, 100, 500, 30), Luma([0]));
        let stripper = LegendStripper::new(LegendConfig::default(), ["PROPIEDADES", "VEHICULOS"]);
        assert_eq!(stripper.apply(&mut block, &FixedOcr("PROPIEDADES")), 0);
        assert_eq!(block.get_pixel(100, 110).0[0], 0);
    }
}
