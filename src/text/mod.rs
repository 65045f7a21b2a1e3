//! Post-OCR text handling.
//!
//! Tiles carry page furniture (mastheads, pagination, dated running heads)
//! that the OCR service faithfully transcribes. These lines are removed,
//! then the recognised tiles of a page are joined back in tile order with
//! the section marker in front of the tile that holds the start.

use regex::Regex;

use crate::batch::Tile;
use crate::error::{Result, StageOutcome};
use crate::region::RegionProfile;

/// Removes furniture lines matching a region's patterns.
#[derive(Debug, Clone)]
pub struct FurnitureFilter {
    patterns: Vec<Regex>,
}

impl FurnitureFilter {
    /// Compile the region's furniture patterns.
    pub fn new(profile: &RegionProfile) -> Result<Self> {
        let patterns = profile
            .furniture_patterns
            .iter()
            .map(|p| Regex::new(p))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    /// True when the (trimmed) line is page furniture.
    pub fn is_furniture(&self, line: &str) -> bool {
        let line = line.trim();
        !line.is_empty() && self.patterns.iter().any(|p| p.is_match(line))
    }

    /// Drop furniture lines, keeping every other line untouched.
    pub fn strip(&self, text: &str) -> String {
        text.lines()
            .filter(|line| !self.is_furniture(line))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Drop the region's furniture lines from `text`.
pub fn strip_furniture(text: &str, profile: &RegionProfile) -> Result<String> {
    Ok(FurnitureFilter::new(profile)?.strip(text))
}

/// Join recognised tile texts in tile order.
///
/// Each tile contributes its text followed by a newline, preceded by its
/// marker line when it carries one. Tiles whose recognition was skipped or
/// came back empty contribute nothing.
pub fn assemble_page_text(tiles: &[Tile], texts: &[StageOutcome<String>]) -> String {
    let mut page = String::new();
    for (tile, text) in tiles.iter().zip(texts) {
        let text = match text {
            StageOutcome::Done(text) if !text.trim().is_empty() => text,
            StageOutcome::Done(_) => {
                log::warn!("tile {} of page {}: no text recognised", tile.index, tile.page);
                continue;
            },
            StageOutcome::Skipped(reason) => {
                log::warn!("tile {} of page {}: {}", tile.index, tile.page, reason);
                continue;
            },
            StageOutcome::Cancelled => break,
        };
        if let Some(marker) = &tile.marker {
            page.push_str(&marker.to_string());
            page.push('\n');
        }
        page.push_str(text.trim_end());
        page.push('\n');
    }
    page
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SkipReason;
    use crate::section::SectionMarker;
    use image::GrayImage;

    fn tile(index: usize, marker: bool) -> Tile {
        Tile {
            index,
            page: 1,
            image: GrayImage::new(1, 1),
            columns: Vec::new(),
            marker: marker.then(|| SectionMarker {
                code: "1612".to_string(),
            }),
        }
    }

    #[test]
    fn test_strip_valparaiso_furniture() {
        let text = "EL MERCURIO DE VALPARAÍSO\n\
                    REMATE JUDICIAL\n\
                    Página 14\n\
                    EL MERCURIO DE VALPARAISO | Martes 3 de junio de 2025\n\
                    Pag. 5\n\
                    Fecha de remate: martes 3 de junio de 2025\n\
                    30";
        let cleaned = strip_furniture(text, &RegionProfile::valparaiso()).unwrap();
        assert_eq!(
            cleaned,
            "REMATE JUDICIAL\nFecha de remate: martes 3 de junio de 2025\n30"
        );
    }

    #[test]
    fn test_furniture_filter_keeps_blank_lines() {
        let filter = FurnitureFilter::new(&RegionProfile::valparaiso()).unwrap();
        assert!(!filter.is_furniture("   "));
        assert!(filter.is_furniture("  Pág 7 "));
        assert_eq!(filter.strip("a\n\nb"), "a\n\nb");
    }

    #[test]
    fn test_assemble_in_tile_order_with_marker() {
        let tiles = vec![tile(0, true), tile(1, false), tile(2, false), tile(3, false)];
        let texts = vec![
            StageOutcome::Done("first\n".to_string()),
            StageOutcome::Skipped(SkipReason::ClassificationUncertain {
                page: 1,
                detail: "timeout".to_string(),
            }),
            StageOutcome::Done("   ".to_string()),
            StageOutcome::Done("last".to_string()),
        ];
        assert_eq!(assemble_page_text(&tiles, &texts), "[CODE:1612]\nfirst\nlast\n");
    }
}
