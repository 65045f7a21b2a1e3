//! Shared fixtures for integration tests.
//!
//! Pages are drawn as printed layouts: vertical rules between columns and
//! one solid bar per text line. Every line gets its own gray level, and
//! [`InkOcr`] "recognises" an image by looking up which levels it contains,
//! so word boxes follow the pixels through every crop the pipeline makes.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use classified_sections::cancel::CancellationToken;
use classified_sections::geometry::PixelRect;
use classified_sections::ocr::{OcrEngine, OcrLayoutHint, OcrOutput, OcrWord};
use classified_sections::Result;
use image::{GrayImage, Luma};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;

/// Height of a drawn text line.
pub const LINE_HEIGHT: u32 = 8;
/// Vertical distance between consecutive text lines.
pub const LINE_PITCH: u32 = 30;

/// Allocates gray levels to text lines.
#[derive(Debug, Default)]
pub struct Script {
    lines: RefCell<HashMap<u8, String>>,
    next: Cell<u8>,
}

impl Script {
    pub fn new() -> Self {
        let script = Self::default();
        script.next.set(20);
        script
    }

    /// Reserve a gray level for `text`.
    pub fn level(&self, text: &str) -> u8 {
        let level = self.next.get();
        assert!(level < 170, "out of gray levels");
        self.next.set(level + 2);
        self.lines.borrow_mut().insert(level, text.to_string());
        level
    }

    /// Text assigned to `level`.
    pub fn text(&self, level: u8) -> Option<String> {
        self.lines.borrow().get(&level).cloned()
    }
}

/// A column of text lines on a page.
#[derive(Debug, Clone)]
pub struct ColumnSpec {
    pub lines: Vec<String>,
}

impl ColumnSpec {
    pub fn new(lines: &[&str]) -> Self {
        Self {
            lines: lines.iter().map(|l| l.to_string()).collect(),
        }
    }
}

/// Draws one classified block of equal-width columns separated by rules.
pub struct PageBuilder<'s> {
    script: &'s Script,
    width: u32,
    height: u32,
    block: PixelRect,
}

impl<'s> PageBuilder<'s> {
    pub fn new(script: &'s Script) -> Self {
        Self {
            script,
            width: 1000,
            height: 800,
            block: PixelRect::new(100, 100, 800, 600),
        }
    }

    /// Draw the page; returns it with the gray level of every line, per column.
    pub fn build(&self, columns: &[ColumnSpec]) -> (GrayImage, Vec<Vec<u8>>) {
        let mut page = GrayImage::from_pixel(self.width, self.height, Luma([255]));
        let n = columns.len() as u32;
        let column_width = self.block.width / n;

        for i in 1..n {
            let x = self.block.x + i * column_width;
            fill(&mut page, PixelRect::new(x, self.block.y, 2, self.block.height), 0);
        }

        let mut levels = Vec::new();
        for (i, column) in columns.iter().enumerate() {
            let left = self.block.x + i as u32 * column_width + 20;
            let right = self.block.x + (i as u32 + 1) * column_width - 20;
            let mut column_levels = Vec::new();
            for (k, text) in column.lines.iter().enumerate() {
                let level = self.script.level(text);
                let y = self.block.y + 20 + k as u32 * LINE_PITCH;
                fill(&mut page, PixelRect::new(left, y, right - left, LINE_HEIGHT), level);
                column_levels.push(level);
            }
            levels.push(column_levels);
        }
        (page, levels)
    }
}

pub fn fill(image: &mut GrayImage, rect: PixelRect, level: u8) {
    draw_filled_rect_mut(
        image,
        Rect::at(rect.x as i32, rect.y as i32).of_size(rect.width, rect.height),
        Luma([level]),
    );
}

/// First row of `image` holding `level`, if any.
pub fn first_row_with(image: &GrayImage, level: u8) -> Option<u32> {
    (0..image.height()).find(|&y| (0..image.width()).any(|x| image.get_pixel(x, y).0[0] == level))
}

/// Recognises the scripted lines whose gray levels appear in an image.
pub struct InkOcr<'s> {
    script: &'s Script,
    calls: Cell<usize>,
    cancel_at: Option<(usize, CancellationToken)>,
}

impl<'s> InkOcr<'s> {
    pub fn new(script: &'s Script) -> Self {
        Self {
            script,
            calls: Cell::new(0),
            cancel_at: None,
        }
    }

    /// Cancel `token` once `calls` recognitions have run.
    pub fn cancelling_after(mut self, calls: usize, token: CancellationToken) -> Self {
        self.cancel_at = Some((calls, token));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.get()
    }
}

impl OcrEngine for InkOcr<'_> {
    fn recognize(&self, image: &GrayImage, _hint: OcrLayoutHint) -> Result<OcrOutput> {
        self.calls.set(self.calls.get() + 1);
        if let Some((after, token)) = &self.cancel_at {
            if self.calls.get() >= *after {
                token.cancel();
            }
        }

        let mut boxes: HashMap<u8, PixelRect> = HashMap::new();
        for (x, y, pixel) in image.enumerate_pixels() {
            let level = pixel.0[0];
            if self.script.text(level).is_none() {
                continue;
            }
            let dot = PixelRect::new(x, y, 1, 1);
            boxes
                .entry(level)
                .and_modify(|b| *b = b.union(&dot))
                .or_insert(dot);
        }

        let mut found: Vec<(u8, PixelRect)> = boxes.into_iter().collect();
        found.sort_by_key(|(_, b)| (b.y, b.x));

        let mut words = Vec::new();
        for (line, (level, bbox)) in found.into_iter().enumerate() {
            let text = self.script.text(level).unwrap_or_default();
            for word in text.split_whitespace() {
                words.push(OcrWord {
                    text: word.to_string(),
                    bbox,
                    line,
                });
            }
        }
        Ok(OcrOutput::from_words(words))
    }

    fn name(&self) -> &'static str {
        "ink"
    }
}
