//! Start-code detection strategies.

use image::GrayImage;
use serde::{Deserialize, Serialize};

use super::patterns::SectionPatterns;
use crate::error::Result;
use crate::geometry::PixelRect;
use crate::ocr::{OcrEngine, OcrLayoutHint, OcrOutput};
use crate::raster;

/// Where the start code was found in a column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartMatch {
    /// Top row of the code in column coordinates
    pub y: u32,
    /// Text that matched
    pub token: String,
}

/// Finds the start code in a column.
///
/// `recognized` is the column's OCR output, already computed by the caller;
/// strategies that need more recognition run it through `ocr`.
pub trait StartDetector {
    /// Look for the start code.
    fn detect(
        &self,
        column: &GrayImage,
        recognized: &OcrOutput,
        ocr: &dyn OcrEngine,
        patterns: &SectionPatterns,
    ) -> Result<Option<StartMatch>>;

    /// Return the name of this strategy for logging.
    fn name(&self) -> &'static str;
}

/// Plain text match on the whole column.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextMatchDetector;

impl StartDetector for TextMatchDetector {
    fn detect(
        &self,
        _column: &GrayImage,
        recognized: &OcrOutput,
        _ocr: &dyn OcrEngine,
        patterns: &SectionPatterns,
    ) -> Result<Option<StartMatch>> {
        if !patterns.matches_start(&recognized.text) {
            return Ok(None);
        }
        // The text may match across word boundaries; keep the whole column then.
        let found = match recognized.find_word(|t| patterns.matches_start(t)) {
            Some(word) => StartMatch {
                y: word.bbox.y,
                token: word.text.clone(),
            },
            None => StartMatch {
                y: 0,
                token: patterns.start_code().to_string(),
            },
        };
        Ok(Some(found))
    }

    fn name(&self) -> &'static str {
        "text-match"
    }
}

/// Which side of the anchor word the code is printed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnchorSide {
    /// Code precedes the anchor
    Left,
    /// Code follows the anchor
    Right,
}

/// Geometry of the patch read next to an anchor word.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpatialAnchor {
    /// Word printed next to the code, matched case-insensitively
    pub word: String,
    /// Side of the anchor the code sits on
    pub side: AnchorSide,
    /// Patch width in pixels
    pub patch_width: u32,
    /// Rows added above and below the anchor box
    pub vertical_pad: u32,
}

impl Default for SpatialAnchor {
    fn default() -> Self {
        Self {
            word: "REMATES".to_string(),
            side: AnchorSide::Left,
            patch_width: 160,
            vertical_pad: 8,
        }
    }
}

/// Spatial co-detection.
///
/// Some mastheads print the code reversed (light on a dark box) beside the
/// section name, which a full-column pass never reads. The detector locates
/// the section name, cuts the patch beside it, inverts only that patch and
/// accepts the column when the patch alone reads as the start code.
#[derive(Debug, Clone, Default)]
pub struct SpatialCoDetector {
    anchor: SpatialAnchor,
}

impl SpatialCoDetector {
    /// Create a detector for `anchor`.
    pub fn new(anchor: SpatialAnchor) -> Self {
        Self { anchor }
    }

    /// Patch rectangle beside `anchor_box`, clipped to the column.
    pub fn patch_rect(&self, anchor_box: PixelRect, width: u32, height: u32) -> PixelRect {
        let a = &self.anchor;
        let top = anchor_box.y.saturating_sub(a.vertical_pad);
        let bottom = (anchor_box.bottom() + a.vertical_pad).min(height);
        let (left, right) = match a.side {
            AnchorSide::Left => (anchor_box.x.saturating_sub(a.patch_width), anchor_box.x),
            AnchorSide::Right => (
                anchor_box.right().min(width),
                (anchor_box.right() + a.patch_width).min(width),
            ),
        };
        PixelRect::from_corners(left, top, right, bottom)
    }
}

impl StartDetector for SpatialCoDetector {
    fn detect(
        &self,
        column: &GrayImage,
        recognized: &OcrOutput,
        ocr: &dyn OcrEngine,
        patterns: &SectionPatterns,
    ) -> Result<Option<StartMatch>> {
        let anchor_word = self.anchor.word.to_uppercase();
        let Some(anchor) = recognized.find_word(|t| t.to_uppercase().contains(&anchor_word)) else {
            return Ok(None);
        };

        let rect = self.patch_rect(anchor.bbox, column.width(), column.height());
        if rect.is_empty() {
            return Ok(None);
        }
        let patch = raster::inverted(&raster::crop(column, rect));
        let read = ocr.recognize(&patch, OcrLayoutHint::UniformBlock)?;
        let text = read.text.trim();
        log::debug!("patch beside {:?} at y={} reads {:?}", anchor.text, rect.y, text);

        if patterns.matches_start(text) {
            Ok(Some(StartMatch {
                y: rect.y,
                token: text.to_string(),
            }))
        } else {
            Ok(None)
        }
    }

    fn name(&self) -> &'static str {
        "spatial-co-detection"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::OcrWord;
    use image::Luma;
    use std::cell::RefCell;

    fn patterns() -> SectionPatterns {
        SectionPatterns::new("1612", "(1612|I612|l6l2|161Z)", None).unwrap()
    }

    fn word(text: &str, bbox: PixelRect, line: usize) -> OcrWord {
        OcrWord {
            text: text.to_string(),
            bbox,
            line,
        }
    }

    /// Reads "1612" only from images whose pixels are mostly dark, i.e. an
    /// inverted light-on-dark patch.
    struct PolarityOcr {
        seen: RefCell<Vec<(u32, u32)>>,
    }

    impl OcrEngine for PolarityOcr {
        fn recognize(&self, image: &GrayImage, _hint: OcrLayoutHint) -> Result<OcrOutput> {
            self.seen.borrow_mut().push(image.dimensions());
            let dark = image.pixels().filter(|p| p.0[0] < 128).count();
            if dark * 2 > image.pixels().count() {
                Ok(OcrOutput::from_text("1612"))
            } else {
                Ok(OcrOutput::from_text("~~"))
            }
        }

        fn name(&self) -> &'static str {
            "polarity"
        }
    }

    #[test]
    fn test_text_match_uses_word_top() {
        let output = OcrOutput::from_words(vec![
            word("AVISOS", PixelRect::new(0, 10, 50, 12), 0),
            word("I612", PixelRect::new(0, 140, 60, 30), 1),
            word("REMATES", PixelRect::new(70, 140, 90, 30), 1),
        ]);
        let column = GrayImage::new(200, 400);
        let found = TextMatchDetector
            .detect(&column, &output, &PolarityOcr { seen: RefCell::new(vec![]) }, &patterns())
            .unwrap()
            .unwrap();
        assert_eq!(found.y, 140);
        assert_eq!(found.token, "I612");
    }

    #[test]
    fn test_text_match_without_boxes_keeps_whole_column() {
        let output = OcrOutput::from_text("remates 1612 judiciales");
        let column = GrayImage::new(10, 10);
        let ocr = PolarityOcr { seen: RefCell::new(vec![]) };
        let found = TextMatchDetector.detect(&column, &output, &ocr, &patterns()).unwrap();
        assert_eq!(found.map(|m| m.y), Some(0));
        assert!(TextMatchDetector
            .detect(&column, &OcrOutput::from_text("nada"), &ocr, &patterns())
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_spatial_reads_inverted_patch_beside_anchor() {
        // White code box to the left of the anchor word on a white column:
        // inverted it becomes dark and reads as the code.
        let column = GrayImage::from_pixel(400, 600, Luma([255]));
        let output = OcrOutput::from_words(vec![word("REMATES", PixelRect::new(200, 300, 120, 30), 0)]);
        let ocr = PolarityOcr { seen: RefCell::new(vec![]) };
        let detector = SpatialCoDetector::new(SpatialAnchor::default());

        let found = detector.detect(&column, &output, &ocr, &patterns()).unwrap().unwrap();
        assert_eq!(found.y, 292);
        assert_eq!(ocr.seen.borrow().as_slice(), &[(160, 46)]);
    }

    #[test]
    fn test_spatial_requires_anchor() {
        let column = GrayImage::from_pixel(400, 600, Luma([255]));
        let output = OcrOutput::from_text("1612 REMATES");
        let ocr = PolarityOcr { seen: RefCell::new(vec![]) };
        let detector = SpatialCoDetector::default();
        assert!(detector.detect(&column, &output, &ocr, &patterns()).unwrap().is_none());
        assert!(ocr.seen.borrow().is_empty());
    }

    #[test]
    fn test_patch_rect_right_side_clipped() {
        let detector = SpatialCoDetector::new(SpatialAnchor {
            side: AnchorSide::Right,
            ..Default::default()
        });
        let rect = detector.patch_rect(PixelRect::new(300, 4, 50, 20), 400, 600);
        assert_eq!(rect, PixelRect::from_corners(350, 0, 400, 32));
    }
}
