//! Pluggable text recognition.
//!
//! The segmentation core never recognises text itself; it samples blocks
//! and columns through an [`OcrEngine`] and only needs the recognised text
//! plus word boxes in the coordinates of the image it handed over.

#[cfg(feature = "tesseract")]
#[cfg_attr(docsrs, doc(cfg(feature = "tesseract")))]
pub mod tesseract;

#[cfg(feature = "tesseract")]
pub use tesseract::TesseractEngine;

use image::GrayImage;

use crate::error::Result;
use crate::geometry::PixelRect;

/// How the engine should lay out the image it receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OcrLayoutHint {
    /// Let the engine find its own text regions (page/blocks).
    Auto,
    /// Treat the image as one uniform block of text (a column or band).
    UniformBlock,
}

/// One recognised word with its box in image coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct OcrWord {
    /// Recognised text
    pub text: String,
    /// Bounding box in the coordinates of the recognised image
    pub bbox: PixelRect,
    /// Line number the engine assigned (monotonic in reading order)
    pub line: usize,
}

/// A recognised line assembled from words.
#[derive(Debug, Clone, PartialEq)]
pub struct OcrLine {
    /// Words joined by single spaces
    pub text: String,
    /// Union of word boxes, when the engine reported any
    pub bbox: Option<PixelRect>,
}

/// Everything an engine returns for one image.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OcrOutput {
    /// Plain text, lines separated by `\n`
    pub text: String,
    /// Word boxes; may be empty for engines that only return text
    pub words: Vec<OcrWord>,
}

impl OcrOutput {
    /// Output carrying text only.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            words: Vec::new(),
        }
    }

    /// Output carrying word boxes; `text` is rebuilt line by line.
    pub fn from_words(words: Vec<OcrWord>) -> Self {
        let mut output = Self {
            text: String::new(),
            words,
        };
        output.text = output
            .lines()
            .into_iter()
            .map(|line| line.text)
            .collect::<Vec<_>>()
            .join("\n");
        output
    }

    /// True when nothing was recognised.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// Upper-cased plain text, used for keyword matching.
    pub fn upper_text(&self) -> String {
        self.text.to_uppercase()
    }

    /// Lines in reading order.
    ///
    /// Engines that report word boxes get lines grouped by their line
    /// numbers; text-only engines get the plain text split on newlines with
    /// no boxes.
    pub fn lines(&self) -> Vec<OcrLine> {
        if self.words.is_empty() {
            return self
                .text
                .lines()
                .map(|l| OcrLine {
                    text: l.to_string(),
                    bbox: None,
                })
                .collect();
        }

        let mut lines: Vec<(usize, OcrLine)> = Vec::new();
        for word in &self.words {
            match lines.iter_mut().find(|(id, _)| *id == word.line) {
                Some((_, line)) => {
                    line.text.push(' ');
                    line.text.push_str(&word.text);
                    line.bbox = Some(match line.bbox {
                        Some(b) => b.union(&word.bbox),
                        None => word.bbox,
                    });
                },
                None => lines.push((
                    word.line,
                    OcrLine {
                        text: word.text.clone(),
                        bbox: Some(word.bbox),
                    },
                )),
            }
        }
        lines.sort_by_key(|(id, _)| *id);
        lines.into_iter().map(|(_, line)| line).collect()
    }

    /// First word whose text satisfies `pred`.
    pub fn find_word<F: Fn(&str) -> bool>(&self, pred: F) -> Option<&OcrWord> {
        self.words.iter().find(|w| pred(&w.text))
    }
}

/// A text recognition capability.
///
/// Implementations may be local (Tesseract) or remote; they must be usable
/// from one pipeline run at a time, so `&self` methods are enough.
pub trait OcrEngine {
    /// Recognise `image`.
    fn recognize(&self, image: &GrayImage, hint: OcrLayoutHint) -> Result<OcrOutput>;

    /// Return the name of this engine for logging.
    fn name(&self) -> &'static str;
}

impl<T: OcrEngine + ?Sized> OcrEngine for &T {
    fn recognize(&self, image: &GrayImage, hint: OcrLayoutHint) -> Result<OcrOutput> {
        (**self).recognize(image, hint)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

impl<T: OcrEngine + ?Sized> OcrEngine for Box<T> {
    fn recognize(&self, image: &GrayImage, hint: OcrLayoutHint) -> Result<OcrOutput> {
        (**self).recognize(image, hint)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}
