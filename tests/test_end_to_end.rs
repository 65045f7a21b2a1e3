//! End-to-end segmentation runs over drawn pages.

mod common;

use classified_sections::pipeline::{PageOutput, SegmentationPipeline};
use classified_sections::region::RegionProfile;
use classified_sections::section::SectionMarkerTag;
use classified_sections::text::assemble_page_text;
use classified_sections::{recognize_tiles, PageSource, SkipReason, StageOutcome};
use common::{first_row_with, ColumnSpec, InkOcr, PageBuilder, Script};

fn column(lines: &[&str]) -> ColumnSpec {
    ColumnSpec::new(lines)
}

#[test]
fn test_section_spans_three_pages() {
    let script = Script::new();
    let builder = PageBuilder::new(&script);

    let (p1, l1) = builder.build(&[
        column(&["REMATE JUDICIAL", "Juzgado de Letras", "Parcela en Quilpue"]),
        column(&["AVISOS", "1612 REMATES", "Juzgado Civil", "Remate casa"]),
        column(&["Remate en Vina", "Juzgado 2", "Extracto"]),
    ]);
    let (p2, _) = builder.build(&[
        column(&["Remate depto", "Juzgado 3"]),
        column(&["Remate sitio", "Juzgado 4"]),
        column(&["Remate local", "Juzgado 5"]),
    ]);
    let (p3, l3) = builder.build(&[
        column(&["Remate bodega", "Juzgado 6"]),
        column(&["Remate parcela", "Juzgado 7", "1613 CITAN A REUNION", "Club deportivo"]),
        column(&["Junta de vecinos", "Asamblea"]),
    ]);
    let (p4, _) = builder.build(&[column(&["Remate tardio"]), column(&["Juzgado 8"])]);

    let dir = tempfile::tempdir().unwrap();
    let p3_path = dir.path().join("p3.png");
    p3.save(&p3_path).unwrap();

    let ocr = InkOcr::new(&script);
    let mut pipeline = SegmentationPipeline::for_region(RegionProfile::valparaiso(), &ocr).unwrap();

    let pages = vec![
        PageSource::from(p1),
        PageSource::from(p2),
        PageSource::from_path(&p3_path),
        PageSource::from(p4),
    ];
    let mut outputs: Vec<PageOutput> = Vec::new();
    let calls_before_last = std::cell::Cell::new(0);
    let outcome = pipeline.run(pages, |page| {
        if page.page == 2 {
            calls_before_last.set(ocr.calls());
        }
        outputs.push(page)
    });

    assert!(!outcome.is_cancelled());
    let summary = outcome.summary();
    assert!(summary.start_found);
    assert!(summary.end_found);
    assert!(!summary.fallback_used);
    assert_eq!(summary.pages_seen, 4);
    assert_eq!(summary.columns_accepted, 7);
    assert!(summary.skips.contains(&SkipReason::SectionClosed { page: 3 }));
    // The page after the closing title is never analysed.
    assert_eq!(ocr.calls(), calls_before_last.get());

    let tags: Vec<Vec<SectionMarkerTag>> = outputs
        .iter()
        .map(|p| p.columns.iter().map(|c| c.tag).collect())
        .collect();
    assert_eq!(
        tags,
        vec![
            vec![SectionMarkerTag::Start, SectionMarkerTag::None],
            vec![SectionMarkerTag::None; 3],
            vec![SectionMarkerTag::None, SectionMarkerTag::End],
        ]
    );

    // START keeps the matched line plus the crop margin and drops what is above.
    let start = &outputs[0].columns[0];
    assert_eq!(start.context.column, 1);
    assert_eq!(start.marker.as_ref().map(|m| m.to_string()).as_deref(), Some("[CODE:1612]"));
    assert_eq!(first_row_with(&start.image, l1[1][1]), Some(5));
    assert_eq!(first_row_with(&start.image, l1[1][0]), None);
    assert!(first_row_with(&start.image, l1[1][2]).is_some());

    // END keeps everything above the closing title and nothing from it on.
    let end = &outputs[2].columns[1];
    assert_eq!(end.context.column, 1);
    assert!(first_row_with(&end.image, l3[1][1]).is_some());
    assert_eq!(first_row_with(&end.image, l3[1][2]), None);
    assert_eq!(first_row_with(&end.image, l3[1][3]), None);
    assert!(outputs[2]
        .columns
        .iter()
        .all(|c| first_row_with(&c.image, l3[2][0]).is_none()));

    // Tiles: marker rides on the first tile of the start page only.
    let tile_counts: Vec<usize> = outputs.iter().map(|p| p.tiles.len()).collect();
    assert_eq!(tile_counts, vec![1, 2, 1]);
    assert!(outputs[0].tiles[0].marker.is_some());
    assert!(outputs[1].tiles.iter().all(|t| t.marker.is_none()));
}

#[test]
fn test_page_text_is_reassembled_in_tile_order() {
    let script = Script::new();
    let builder = PageBuilder::new(&script);
    let (page, _) = builder.build(&[
        column(&["Remate uno", "1612 REMATES", "Juzgado A"]),
        column(&["Remate dos", "Juzgado B"]),
        column(&["Remate tres", "Juzgado C"]),
    ]);

    let ocr = InkOcr::new(&script);
    let mut pipeline = SegmentationPipeline::for_region(RegionProfile::valparaiso(), &ocr).unwrap();
    let output = pipeline
        .process_page(PageSource::from(page))
        .into_done()
        .unwrap();

    assert_eq!(output.tiles.len(), 2);
    let texts = recognize_tiles(&output.tiles, &ocr);
    assert!(texts.iter().all(|t| matches!(t, StageOutcome::Done(_))));

    let text = assemble_page_text(&output.tiles, &texts);
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "[CODE:1612]");
    assert_eq!(lines[1], "1612 REMATES");
    assert!(!text.contains("Remate uno"));
    let a = text.find("Juzgado A").unwrap();
    let b = text.find("Juzgado B").unwrap();
    let c = text.find("Juzgado C").unwrap();
    assert!(a < b && b < c);
}

#[test]
fn test_no_start_emits_nothing_by_default() {
    let script = Script::new();
    let builder = PageBuilder::new(&script);
    let (p1, _) = builder.build(&[column(&["Remate uno"]), column(&["Juzgado"])]);
    let (p2, _) = builder.build(&[column(&["Remate dos"]), column(&["Extracto"])]);

    let ocr = InkOcr::new(&script);
    let mut pipeline = SegmentationPipeline::for_region(RegionProfile::valparaiso(), &ocr).unwrap();
    let mut delivered = 0;
    let outcome = pipeline.run(vec![PageSource::from(p1), PageSource::from(p2)], |_| delivered += 1);

    assert_eq!(delivered, 0);
    let summary = outcome.summary();
    assert!(!summary.start_found);
    assert!(!summary.fallback_used);
    assert_eq!(summary.columns_accepted, 0);
    assert_eq!(summary.skips, vec![SkipReason::NoStartFound]);
}

#[test]
fn test_pass_through_fallback_emits_raw_columns() {
    let script = Script::new();
    let builder = PageBuilder::new(&script);
    let (p1, _) = builder.build(&[column(&["Remate uno"]), column(&["Juzgado"])]);
    let (p2, _) = builder.build(&[column(&["Remate dos"]), column(&["Extracto"])]);

    let ocr = InkOcr::new(&script);
    let mut pipeline = SegmentationPipeline::for_region(RegionProfile::concepcion(), &ocr).unwrap();
    let mut delivered = Vec::new();
    let outcome = pipeline.run(vec![PageSource::from(p1), PageSource::from(p2)], |page| {
        delivered.push(page)
    });

    let summary = outcome.summary();
    assert!(summary.fallback_used);
    assert!(summary.skips.contains(&SkipReason::NoStartFound));
    assert_eq!(delivered.iter().map(|p| p.page).collect::<Vec<_>>(), vec![0, 1]);
    assert!(delivered.iter().all(|p| p.fallback && p.columns.len() == 2));
    assert!(delivered
        .iter()
        .flat_map(|p| &p.columns)
        .all(|c| c.tag == SectionMarkerTag::None && c.marker.is_none()));
}

#[test]
fn test_pass_through_holds_at_most_the_configured_pages() {
    let script = Script::new();
    let builder = PageBuilder::new(&script);
    let pages: Vec<PageSource> = (0..3)
        .map(|_| {
            let (page, _) = builder.build(&[column(&["Remate", "Juzgado"]), column(&["Extracto"])]);
            PageSource::from(page)
        })
        .collect();

    let profile = RegionProfile::concepcion();
    let mut config = profile.config.clone();
    config.section.fallback_page_limit = Some(2);
    let ocr = InkOcr::new(&script);
    let mut pipeline = SegmentationPipeline::new(profile, config, &ocr).unwrap();
    let mut delivered = Vec::new();
    let outcome = pipeline.run(pages, |page| delivered.push(page));

    assert!(outcome.summary().fallback_used);
    assert_eq!(delivered.iter().map(|p| p.page).collect::<Vec<_>>(), vec![0, 1]);
    assert!(delivered.iter().all(|p| p.tiles.len() == 1));
    assert_eq!(outcome.summary().tiles, 2);
}

#[test]
fn test_unreadable_page_does_not_stop_the_run() {
    let script = Script::new();
    let builder = PageBuilder::new(&script);
    let (p2, _) = builder.build(&[column(&["1612 REMATES", "Remate"]), column(&["Juzgado"])]);

    let ocr = InkOcr::new(&script);
    let mut pipeline = SegmentationPipeline::for_region(RegionProfile::valparaiso(), &ocr).unwrap();
    let mut delivered = Vec::new();
    let outcome = pipeline.run(
        vec![PageSource::from_path("/nonexistent/p1.png"), PageSource::from(p2)],
        |page| delivered.push(page.page),
    );

    assert_eq!(delivered, vec![1]);
    assert!(matches!(
        outcome.summary().skips.first(),
        Some(SkipReason::RecoverableImage { page: 0, .. })
    ));
    assert!(outcome.summary().start_found);
}
