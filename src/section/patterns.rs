//! Section code patterns and the boundary-title heuristic.
//!
//! Classified sections are numbered with four-digit codes. A section starts
//! at its own code (read through OCR, so digit/letter confusions such as
//! `I612` or `l6l2` must still match) and ends at the first title line
//! carrying another code of the closing family. Editions share that family
//! even when their start codes differ, so it is configured separately and
//! one code of it (the auctions' own) never closes a section.
//!
//! Codes also appear inside ad bodies: street numbers, property roles,
//! prices. A code line only counts as a boundary when it looks like a
//! title, see [`SectionPatterns::is_section_title`].

use std::sync::OnceLock;

use regex::{Regex, RegexBuilder};

use crate::error::{Error, Result};

static LINE_CODE_REGEX: OnceLock<Option<Regex>> = OnceLock::new();

fn get_line_code_regex() -> Option<&'static Regex> {
    LINE_CODE_REGEX
        .get_or_init(|| Regex::new(r"^\s*(\d{4})\b").ok())
        .as_ref()
}

/// A line that closes the section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndMatch {
    /// The closing code as printed
    pub code: String,
    /// Index of the line among the lines searched
    pub line_index: usize,
    /// The trimmed line
    pub line: String,
}

/// Compiled start/end patterns for one region.
#[derive(Debug, Clone)]
pub struct SectionPatterns {
    start_code: String,
    family: String,
    excluded_end: String,
    start: Regex,
    title_words: Vec<String>,
    locator_words: Vec<String>,
    blocked_symbols: Vec<String>,
    max_title_len: usize,
}

impl SectionPatterns {
    /// Compile the patterns.
    ///
    /// `start_pattern` is matched case-insensitively. The end-code family
    /// defaults to the first two digits of `start_code`, and the start code
    /// itself never closes the section.
    pub fn new(start_code: &str, start_pattern: &str, family: Option<&str>) -> Result<Self> {
        if start_code.len() != 4 || !start_code.chars().all(|c| c.is_ascii_digit()) {
            return Err(Error::InvalidRegion(format!(
                "start code must be four digits, got {:?}",
                start_code
            )));
        }
        let family = family.unwrap_or(&start_code[..2]).to_string();
        if family.len() != 2 || !family.chars().all(|c| c.is_ascii_digit()) {
            return Err(Error::InvalidRegion(format!(
                "end-code family must be two digits, got {:?}",
                family
            )));
        }
        let start = RegexBuilder::new(start_pattern).case_insensitive(true).build()?;

        Ok(Self {
            start_code: start_code.to_string(),
            family,
            excluded_end: start_code.to_string(),
            start,
            title_words: Vec::new(),
            locator_words: Vec::new(),
            blocked_symbols: Vec::new(),
            max_title_len: 60,
        })
    }

    /// Code of the closing family that never closes the section.
    pub fn with_excluded_end_code(mut self, code: &str) -> Self {
        self.excluded_end = code.trim().to_string();
        self
    }

    /// Words that make a code line a title outright (upper-cased).
    pub fn with_title_words<S: AsRef<str>>(mut self, words: impl IntoIterator<Item = S>) -> Self {
        self.title_words = words.into_iter().map(|w| w.as_ref().to_uppercase()).collect();
        self
    }

    /// Address/locator words that disqualify a code they precede (lower-cased).
    pub fn with_locator_words<S: AsRef<str>>(mut self, words: impl IntoIterator<Item = S>) -> Self {
        self.locator_words = words.into_iter().map(|w| w.as_ref().to_lowercase()).collect();
        self
    }

    /// Currency, unit and URL markers that never occur in a title.
    pub fn with_blocked_symbols<S: AsRef<str>>(
        mut self,
        symbols: impl IntoIterator<Item = S>,
    ) -> Self {
        self.blocked_symbols = symbols.into_iter().map(|s| s.as_ref().to_string()).collect();
        self
    }

    /// Longest line that can still be a title.
    pub fn with_max_title_len(mut self, len: usize) -> Self {
        self.max_title_len = len;
        self
    }

    /// The code opening the section.
    pub fn start_code(&self) -> &str {
        &self.start_code
    }

    /// Two-digit family of closing codes.
    pub fn family(&self) -> &str {
        &self.family
    }

    /// True when `text` contains the start code.
    pub fn matches_start(&self, text: &str) -> bool {
        self.start.is_match(text)
    }

    /// Code of the closing family that never closes the section.
    pub fn excluded_end_code(&self) -> &str {
        &self.excluded_end
    }

    /// A closing-family code other than the excluded one at the start of
    /// `line`.
    pub fn end_code<'a>(&self, line: &'a str) -> Option<&'a str> {
        let caps = get_line_code_regex()?.captures(line)?;
        let code = caps.get(1)?.as_str();
        if code.starts_with(self.family.as_str()) && code != self.excluded_end {
            Some(code)
        } else {
            None
        }
    }

    /// Decide whether a line carrying `code` is a real section title.
    ///
    /// Rejects long lines, lines with currency/unit/URL markers and decimal
    /// continuations of the code (`1615.5`). Accepts lines with a known
    /// title word. Otherwise rejects the line only when the code directly
    /// follows a locator word (`Rol 1615`, `calle 1620`).
    pub fn is_section_title(&self, line: &str, code: &str) -> bool {
        let line = line.trim();
        if line.chars().count() > self.max_title_len {
            return false;
        }
        if self.blocked_symbols.iter().any(|s| line.contains(s.as_str())) {
            return false;
        }
        if let Some(rest) = line.strip_prefix(code) {
            let mut chars = rest.chars();
            if chars.next() == Some('.') && chars.next().is_some_and(|c| c.is_ascii_digit()) {
                return false;
            }
        }

        let upper = line.to_uppercase();
        if self.title_words.iter().any(|w| upper.contains(w.as_str())) {
            return true;
        }

        let lower = line.to_lowercase();
        let words: Vec<&str> = lower
            .split_whitespace()
            .map(|w| w.trim_matches(|c| matches!(c, '.' | ',' | ':' | ';')))
            .collect();
        if words.len() > 1 {
            if let Some(idx) = words.iter().position(|w| *w == code) {
                if idx > 0 && self.locator_words.iter().any(|l| l == words[idx - 1]) {
                    return false;
                }
            }
        }
        true
    }

    /// First line that closes the section.
    pub fn find_end<S: AsRef<str>>(&self, lines: &[S]) -> Option<EndMatch> {
        lines.iter().enumerate().find_map(|(line_index, line)| {
            let line = line.as_ref().trim();
            if line.is_empty() {
                return None;
            }
            let code = self.end_code(line)?;
            if !self.is_section_title(line, code) {
                log::debug!("code {} in {:?} is not a section title", code, line);
                return None;
            }
            Some(EndMatch {
                code: code.to_string(),
                line_index,
                line: line.to_string(),
            })
        })
    }
}
