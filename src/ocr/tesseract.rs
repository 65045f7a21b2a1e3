//! OCR through Tesseract, driven in-process with `leptess`.
//!
//! The image is handed over as an in-memory PNG. Text lines and words are
//! located with the page iterator, then every word box is recognised on
//! its own so each word keeps its box in image coordinates.

use std::io::Cursor;

use image::{GrayImage, ImageFormat};
use leptess::{capi, LepTess, Variable};

use super::{OcrEngine, OcrLayoutHint, OcrOutput, OcrWord};
use crate::error::{Error, Result};
use crate::geometry::PixelRect;

/// Tesseract engine.
#[derive(Debug, Clone)]
pub struct TesseractEngine {
    data_path: Option<String>,
    language: String,
}

impl Default for TesseractEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TesseractEngine {
    /// Engine using the system tessdata with Spanish models.
    pub fn new() -> Self {
        Self {
            data_path: None,
            language: "spa".to_string(),
        }
    }

    /// Load models from a specific tessdata directory.
    pub fn with_data_path(mut self, path: impl Into<String>) -> Self {
        self.data_path = Some(path.into());
        self
    }

    /// Use a different language model (e.g. `"spa+eng"`).
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    fn page_seg_mode(hint: OcrLayoutHint) -> &'static str {
        match hint {
            OcrLayoutHint::Auto => "3",
            OcrLayoutHint::UniformBlock => "6",
        }
    }

    fn init(&self, hint: OcrLayoutHint) -> Result<LepTess> {
        let mut lt = LepTess::new(self.data_path.as_deref(), &self.language).map_err(|e| {
            Error::Ocr(format!("failed to initialize Tesseract ({}): {}", self.language, e))
        })?;
        lt.set_variable(Variable::TesseditPagesegMode, Self::page_seg_mode(hint))
            .map_err(|e| Error::Ocr(format!("failed to set page segmentation mode: {}", e)))?;
        Ok(lt)
    }
}

impl OcrEngine for TesseractEngine {
    fn recognize(&self, image: &GrayImage, hint: OcrLayoutHint) -> Result<OcrOutput> {
        if image.width() == 0 || image.height() == 0 {
            return Ok(OcrOutput::default());
        }

        let mut lt = self.init(hint)?;

        let mut png = Cursor::new(Vec::new());
        image.write_to(&mut png, ImageFormat::Png)?;
        lt.set_image_from_mem(png.get_ref())
            .map_err(|e| Error::Ocr(format!("failed to load image into Tesseract: {}", e)))?;

        let lines = component_boxes(&mut lt, capi::TessPageIteratorLevel_RIL_TEXTLINE);
        let word_boxes = component_boxes(&mut lt, capi::TessPageIteratorLevel_RIL_WORD);

        let mut words = Vec::with_capacity(word_boxes.len());
        for bbox in word_boxes {
            lt.set_rectangle(bbox.x as i32, bbox.y as i32, bbox.width as i32, bbox.height as i32);
            let text = lt.get_utf8_text().unwrap_or_default().trim().to_string();
            if text.is_empty() {
                continue;
            }
            words.push((text, bbox));
        }

        log::trace!(
            "tesseract: {} lines, {} words ({}x{}, psm {})",
            lines.len(),
            words.len(),
            image.width(),
            image.height(),
            Self::page_seg_mode(hint)
        );
        Ok(OcrOutput::from_words(assign_lines(words, &lines)))
    }

    fn name(&self) -> &'static str {
        "tesseract"
    }
}

/// Boxes of every text component at `level`; empty when nothing was found.
fn component_boxes(lt: &mut LepTess, level: capi::TessPageIteratorLevel) -> Vec<PixelRect> {
    let Some(boxes) = lt.get_component_boxes(level, true) else {
        return Vec::new();
    };
    let mut rects = Vec::new();
    for bbox in &boxes {
        let geom = bbox.get_geometry();
        if geom.w <= 0 || geom.h <= 0 {
            continue;
        }
        rects.push(PixelRect::new(
            geom.x.max(0) as u32,
            geom.y.max(0) as u32,
            geom.w as u32,
            geom.h as u32,
        ));
    }
    rects
}

/// Attach every word to the text line holding its center, or to the line
/// closest to it vertically.
fn assign_lines(words: Vec<(String, PixelRect)>, lines: &[PixelRect]) -> Vec<OcrWord> {
    words
        .into_iter()
        .map(|(text, bbox)| {
            let cx = bbox.x + bbox.width / 2;
            let cy = bbox.y + bbox.height / 2;
            let line = lines
                .iter()
                .position(|l| l.x <= cx && cx < l.right() && l.y <= cy && cy < l.bottom())
                .or_else(|| {
                    lines
                        .iter()
                        .enumerate()
                        .min_by_key(|(_, l)| (l.y + l.height / 2).abs_diff(cy))
                        .map(|(i, _)| i)
                })
                .unwrap_or(0);
            OcrWord { text, bbox, line }
        })
        .collect()
}
