//! Candidate text block detection.
//!
//! Glyphs are fused into blobs by dilating an inverse-thresholded page with
//! a wide, short kernel. Each external blob large enough to be content is
//! OCR-sampled and classified against keyword sets:
//!
//! - inclusion only: the block survives
//! - inclusion and exclusion: the block straddles the target category and
//!   an unrelated one, so it is re-segmented with a tall, narrow kernel and
//!   every sub-block is classified on its own
//! - anything else: the block is painted white in place
//!
//! Rejected areas are painted rather than removed so coordinates stay
//! stable. Boxes too small to be content are skipped, and painted only when
//! [`BlockDetectorConfig::erase_furniture`] is set. Survivors are recomposed onto a white canvas before cropping, so
//! ink from a rejected neighbour that overlaps a survivor's rectangle never
//! leaks into the output.

use image::GrayImage;

use crate::cancel::CancellationToken;
use crate::config::BlockDetectorConfig;
use crate::error::{SkipReason, StageOutcome};
use crate::geometry::PixelRect;
use crate::ocr::{OcrEngine, OcrLayoutHint};
use crate::page::PageImage;
use crate::raster;

/// How a candidate block relates to the target category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockClass {
    /// Matches inclusion keywords only.
    Include,
    /// Matches no inclusion keyword.
    Exclude,
    /// Matches both inclusion and exclusion keywords.
    Ambiguous,
}

/// Inclusion and exclusion keywords, matched against upper-cased OCR text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeywordSet {
    include: Vec<String>,
    exclude: Vec<String>,
}

impl KeywordSet {
    /// Build a keyword set; keywords are upper-cased.
    pub fn new<I, E, S, T>(include: I, exclude: E) -> Self
    where
        I: IntoIterator<Item = S>,
        E: IntoIterator<Item = T>,
        S: AsRef<str>,
        T: AsRef<str>,
    {
        Self {
            include: include.into_iter().map(|k| k.as_ref().to_uppercase()).collect(),
            exclude: exclude.into_iter().map(|k| k.as_ref().to_uppercase()).collect(),
        }
    }

    /// True when any inclusion keyword occurs in `upper_text`.
    pub fn includes(&self, upper_text: &str) -> bool {
        self.include.iter().any(|k| upper_text.contains(k.as_str()))
    }

    /// True when any exclusion keyword occurs in `upper_text`.
    pub fn excludes(&self, upper_text: &str) -> bool {
        self.exclude.iter().any(|k| upper_text.contains(k.as_str()))
    }

    /// Classify upper-cased OCR text.
    pub fn classify(&self, upper_text: &str) -> BlockClass {
        match (self.includes(upper_text), self.excludes(upper_text)) {
            (true, false) => BlockClass::Include,
            (true, true) => BlockClass::Ambiguous,
            (false, _) => BlockClass::Exclude,
        }
    }
}

/// A surviving candidate region of a page.
#[derive(Debug, Clone)]
pub struct Block {
    /// Position among the page's surviving blocks (top-to-bottom)
    pub index: usize,
    /// Bounding box in page coordinates
    pub bbox: PixelRect,
    /// Classification of the blob the block came from; sub-blocks cut out
    /// of an ambiguous blob keep `Ambiguous`
    pub classification: BlockClass,
    /// Pixels cropped from the recomposed page
    pub image: GrayImage,
}

/// Everything block detection produced for one page.
#[derive(Debug, Clone, Default)]
pub struct BlockDetection {
    /// Surviving blocks, top-to-bottom
    pub blocks: Vec<Block>,
    /// Blobs large enough to be classified
    pub candidates: usize,
    /// Blobs or sub-blocks painted out
    pub rejected: usize,
    /// Ambiguous blobs that were re-segmented
    pub resegmented: usize,
    /// OCR samples that failed and were treated as "no match"
    pub ocr_failures: usize,
}

/// Locates candidate text blocks on a page.
#[derive(Debug, Clone)]
pub struct BlockDetector {
    config: BlockDetectorConfig,
    keywords: KeywordSet,
}

impl BlockDetector {
    /// Create a detector.
    pub fn new(config: BlockDetectorConfig, keywords: KeywordSet) -> Self {
        Self { config, keywords }
    }

    /// Keywords used for classification.
    pub fn keywords(&self) -> &KeywordSet {
        &self.keywords
    }

    /// Detect and classify the blocks of `page`.
    ///
    /// Returns `Skipped(NoBlocks)` when nothing survives, or
    /// `Skipped(ClassificationUncertain)` when nothing survives and every
    /// OCR sample failed.
    pub fn detect(
        &self,
        page: &PageImage,
        ocr: &dyn OcrEngine,
        cancel: &CancellationToken,
    ) -> StageOutcome<BlockDetection> {
        let cfg = &self.config;
        let binary = raster::binarize_inverse(&page.image, cfg.binarize_threshold);
        let fused = raster::dilate_rect(&binary, cfg.kernel_width, cfg.kernel_height, cfg.iterations);
        let mut boxes = raster::external_boxes(&fused);
        boxes.sort_by_key(|b| (b.y, b.x));

        let mut filtered = page.image.clone();
        let mut survivors: Vec<(PixelRect, BlockClass)> = Vec::new();
        let mut report = BlockDetection::default();

        for bbox in boxes {
            if cancel.is_cancelled() {
                return StageOutcome::Cancelled;
            }
            if bbox.width < cfg.min_block_width || bbox.height < cfg.min_block_height {
                if cfg.erase_furniture {
                    raster::fill_white(&mut filtered, bbox);
                }
                continue;
            }
            report.candidates += 1;

            let text = self.sample(page, bbox, ocr, &mut report);
            let class = self.keywords.classify(&text);
            log::debug!(
                "page {}: block at ({}, {}) {}x{} classified {:?}",
                page.index,
                bbox.x,
                bbox.y,
                bbox.width,
                bbox.height,
                class
            );

            match class {
                BlockClass::Include => survivors.push((bbox, class)),
                BlockClass::Exclude => {
                    raster::fill_white(&mut filtered, bbox);
                    report.rejected += 1;
                },
                BlockClass::Ambiguous => {
                    report.resegmented += 1;
                    let region = raster::crop(&binary, bbox);
                    let split = raster::dilate_rect(
                        &region,
                        cfg.reseg_kernel_width,
                        cfg.reseg_kernel_height,
                        cfg.reseg_iterations,
                    );
                    for sub in raster::external_boxes(&split) {
                        if cancel.is_cancelled() {
                            return StageOutcome::Cancelled;
                        }
                        let sub = sub.offset(bbox.x, bbox.y);
                        let sub_text = self.sample(page, sub, ocr, &mut report);
                        if self.keywords.includes(&sub_text) {
                            survivors.push((sub, BlockClass::Ambiguous));
                        } else {
                            raster::fill_white(&mut filtered, sub);
                            report.rejected += 1;
                        }
                    }
                },
            }
        }

        if survivors.is_empty() {
            if report.candidates > 0 && report.ocr_failures >= report.candidates {
                return StageOutcome::Skipped(SkipReason::ClassificationUncertain {
                    page: page.index,
                    detail: format!("{} OCR samples failed", report.ocr_failures),
                });
            }
            log::debug!("page {}: no block matched the inclusion keywords", page.index);
            return StageOutcome::Skipped(SkipReason::NoBlocks { page: page.index });
        }

        let mut canvas = raster::white_canvas(page.width(), page.height());
        for (bbox, _) in &survivors {
            let pixels = raster::crop(&filtered, *bbox);
            raster::paste(&mut canvas, &pixels, bbox.x, bbox.y);
        }

        survivors.sort_by_key(|(b, _)| (b.y, b.x));
        report.blocks = survivors
            .into_iter()
            .enumerate()
            .map(|(index, (bbox, classification))| Block {
                index,
                bbox,
                classification,
                image: raster::crop(&canvas, bbox),
            })
            .collect();

        log::debug!(
            "page {}: {} of {} candidate blocks kept",
            page.index,
            report.blocks.len(),
            report.candidates
        );
        StageOutcome::Done(report)
    }

    fn sample(
        &self,
        page: &PageImage,
        bbox: PixelRect,
        ocr: &dyn OcrEngine,
        report: &mut BlockDetection,
    ) -> String {
        let roi = raster::crop(&page.image, bbox);
        match ocr.recognize(&roi, OcrLayoutHint::Auto) {
            Ok(output) => output.upper_text(),
            Err(e) => {
                report.ocr_failures += 1;
                log::warn!(
                    "page {}: OCR failed on block at ({}, {}), treating as no match: {}",
                    page.index,
                    bbox.x,
                    bbox.y,
                    e
                );
                String::new()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::ocr::OcrOutput;
    use image::Luma;

    struct Always(&'static str);

    impl OcrEngine for Always {
        fn recognize(&self, _image: &GrayImage, _hint: OcrLayoutHint) -> Result<OcrOutput> {
            Ok(OcrOutput::from_text(self.0))
        }

        fn name(&self) -> &'static str {
            "always"
        }
    }

    /// An L-shaped auction block with a speck sitting inside its bounding box.
    fn l_page() -> PageImage {
        let mut image = raster::white_canvas(600, 600);
        raster::fill_rect(&mut image, PixelRect::new(50, 50, 400, 60), Luma([0]));
        raster::fill_rect(&mut image, PixelRect::new(50, 50, 60, 400), Luma([0]));
        raster::fill_rect(&mut image, PixelRect::new(350, 350, 10, 10), Luma([0]));
        PageImage::new(0, image)
    }

    fn speck_in_block(config: BlockDetectorConfig) -> u8 {
        let detector = BlockDetector::new(config, KeywordSet::new(["REMATE"], ["DEFUNCIONES"]));
        let cancel = CancellationToken::new();
        let detection = match detector.detect(&l_page(), &Always("REMATE"), &cancel) {
            StageOutcome::Done(detection) => detection,
            other => panic!("expected blocks, got {:?}", other.skip_reason()),
        };
        assert_eq!(detection.blocks.len(), 1);
        let block = &detection.blocks[0];
        block.image.get_pixel(355 - block.bbox.x, 355 - block.bbox.y).0[0]
    }

    #[test]
    fn test_furniture_inside_survivor_kept_by_default() {
        assert_eq!(speck_in_block(BlockDetectorConfig::default()), 0);
    }

    #[test]
    fn test_furniture_erased_when_configured() {
        let config = BlockDetectorConfig {
            erase_furniture: true,
            ..Default::default()
        };
        assert_eq!(speck_in_block(config), 255);
    }

    #[test]
    fn test_keyword_classification() {
        let keywords = KeywordSet::new(["remate", "JUZGADO"], ["necrologicos"]);
        assert_eq!(keywords.classify("REMATE JUDICIAL"), BlockClass::Include);
        assert_eq!(keywords.classify("REMATE ... NECROLOGICOS"), BlockClass::Ambiguous);
        assert_eq!(keywords.classify("NECROLOGICOS"), BlockClass::Exclude);
        assert_eq!(keywords.classify("VENDO AUTO"), BlockClass::Exclude);
    }

    #[test]
    fn test_empty_exclusion_set_never_ambiguous() {
        let keywords = KeywordSet::new(["REMATE"], Vec::<String>::new());
        assert!(!keywords.excludes("ANYTHING"));
        assert_eq!(keywords.classify("REMATE"), BlockClass::Include);
    }
}
