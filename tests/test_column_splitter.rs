//! Column splitting properties over synthetic blocks.

use classified_sections::config::ColumnSplitterConfig;
use classified_sections::geometry::PixelRect;
use classified_sections::layout::ColumnSplitter;
use classified_sections::raster;
use image::{GrayImage, Luma};
use proptest::prelude::*;

const HEIGHT: u32 = 500;

/// Text lines across `[x0, x1)` every 30 rows.
fn draw_text(block: &mut GrayImage, x0: u32, x1: u32) {
    let mut y = 15;
    while y + 8 < HEIGHT {
        raster::fill_rect(block, PixelRect::from_corners(x0, y, x1, y + 8), Luma([30]));
        y += 30;
    }
}

/// Rule positions at least 100px apart and away from the block edges.
fn rules() -> impl Strategy<Value = (u32, Vec<u32>)> {
    prop::collection::vec(100u32..220, 0..6).prop_map(|gaps| {
        let mut x = 0;
        let mut positions = Vec::new();
        for gap in gaps {
            x += gap;
            positions.push(x);
        }
        (x + 120, positions)
    })
}

#[test]
fn test_printed_page_columns() {
    let width = 900;
    let mut block = raster::white_canvas(width, HEIGHT);
    for &x in &[300u32, 600] {
        raster::fill_rect(&mut block, PixelRect::new(x, 0, 2, HEIGHT), Luma([0]));
    }
    draw_text(&mut block, 20, 280);
    draw_text(&mut block, 320, 580);
    draw_text(&mut block, 620, 880);

    let split = ColumnSplitter::default().split(&block);
    assert_eq!(split.cut_points, vec![0, 300, 600, 900]);
    let spans: Vec<(u32, u32)> = split.columns.iter().map(|c| (c.x_start, c.x_end)).collect();
    assert_eq!(spans, vec![(0, 310), (290, 610), (590, 900)]);
}

#[test]
fn test_wider_merge_gap_joins_more_dividers() {
    let mut block = raster::white_canvas(700, HEIGHT);
    for &x in &[300u32, 340] {
        raster::fill_rect(&mut block, PixelRect::new(x, 0, 2, HEIGHT), Luma([0]));
    }

    let split = ColumnSplitter::default().split(&block);
    assert_eq!(split.cut_points, vec![0, 300, 340, 700]);

    let merged = ColumnSplitter::new(ColumnSplitterConfig {
        h_gap: 45,
        ..Default::default()
    })
    .split(&block);
    assert_eq!(merged.cut_points, vec![0, 300, 700]);
}

proptest! {
    #[test]
    fn prop_k_rules_give_k_plus_one_columns((width, positions) in rules()) {
        let mut block = raster::white_canvas(width, HEIGHT);
        for &x in &positions {
            raster::fill_rect(&mut block, PixelRect::new(x, 0, 2, HEIGHT), Luma([0]));
        }

        let split = ColumnSplitter::default().split(&block);
        prop_assert_eq!(split.columns.len(), positions.len() + 1);
        let interior = &split.cut_points[1..split.cut_points.len() - 1];
        prop_assert_eq!(interior, positions.as_slice());

        // Unpadded spans tile the block without gaps.
        for pair in split.columns.windows(2) {
            prop_assert_eq!(pair[0].cut_right, pair[1].cut_left);
        }
        prop_assert_eq!(split.columns[0].cut_left, 0);
        prop_assert_eq!(split.columns[split.columns.len() - 1].cut_right, width);
    }

    #[test]
    fn prop_no_rules_single_wide_column(width in 400u32..1200, inset in 0u32..15) {
        let mut block = raster::white_canvas(width, HEIGHT);
        draw_text(&mut block, inset, width - inset);

        let split = ColumnSplitter::default().split(&block);
        prop_assert_eq!(split.columns.len(), 1);
        prop_assert!(split.columns[0].width() as f64 >= 0.95 * width as f64);
    }
}
