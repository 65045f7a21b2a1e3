//! Segment scanned classified pages into OCR tiles
//!
//! Runs the segmentation pipeline over the pages of one edition, in the
//! order given, and writes every tile of the extracted section.
//!
//! Usage:
//!   cargo run --release --features tesseract --bin segment_pages -- \
//!       --region valparaiso --out tiles/ p1.png p2.png p3.png
//!   cargo run --release --features tesseract --bin segment_pages -- \
//!       --profile custom.json --lang spa --text scans/*.png

use classified_sections::ocr::TesseractEngine;
use classified_sections::pipeline::{recognize_tiles, PageOutput, SegmentationPipeline};
use classified_sections::region::RegionProfile;
use classified_sections::text::{assemble_page_text, FurnitureFilter};
use classified_sections::PageSource;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

struct CliConfig {
    region: String,
    profile: Option<PathBuf>,
    output_dir: PathBuf,
    language: String,
    text: bool,
    pages: Vec<PathBuf>,
}

impl CliConfig {
    fn from_args() -> Self {
        let args: Vec<String> = std::env::args().collect();
        let mut config = Self {
            region: "valparaiso".to_string(),
            profile: None,
            output_dir: PathBuf::from("tiles"),
            language: "spa".to_string(),
            text: false,
            pages: Vec::new(),
        };

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--region" => {
                    i += 1;
                    if i < args.len() {
                        config.region = args[i].clone();
                    }
                },
                "--profile" => {
                    i += 1;
                    if i < args.len() {
                        config.profile = Some(PathBuf::from(&args[i]));
                    }
                },
                "--out" => {
                    i += 1;
                    if i < args.len() {
                        config.output_dir = PathBuf::from(&args[i]);
                    }
                },
                "--lang" => {
                    i += 1;
                    if i < args.len() {
                        config.language = args[i].clone();
                    }
                },
                "--text" => {
                    config.text = true;
                },
                other => config.pages.push(PathBuf::from(other)),
            }
            i += 1;
        }

        config
    }

    fn load_profile(&self) -> Result<RegionProfile, Box<dyn std::error::Error>> {
        match &self.profile {
            Some(path) => Ok(RegionProfile::from_json_str(&fs::read_to_string(path)?)?),
            None => Ok(RegionProfile::builtin(&self.region)?),
        }
    }
}

fn write_page(
    page: &PageOutput,
    output_dir: &Path,
    text: Option<(&TesseractEngine, &FurnitureFilter)>,
) -> Result<usize, Box<dyn std::error::Error>> {
    for tile in &page.tiles {
        let path = output_dir.join(format!("page{}_tile{}.png", page.page + 1, tile.index + 1));
        tile.image.save(&path)?;
    }

    if let Some((ocr, furniture)) = text {
        let texts: Vec<_> = recognize_tiles(&page.tiles, ocr)
            .into_iter()
            .map(|outcome| outcome.map(|text| furniture.strip(&text)))
            .collect();
        let page_text = assemble_page_text(&page.tiles, &texts);
        fs::write(output_dir.join(format!("page{}.txt", page.page + 1)), page_text)?;
    }

    Ok(page.tiles.len())
}

fn run(config: &CliConfig) -> Result<(), Box<dyn std::error::Error>> {
    let profile = config.load_profile()?;
    let furniture = FurnitureFilter::new(&profile)?;
    let ocr = TesseractEngine::new().with_language(config.language.clone());

    println!("Classified Section Segmenter");
    println!("============================");
    println!("Region: {}", profile.name);
    println!("Start code: {}", profile.start_code);
    println!("Pages: {}", config.pages.len());
    println!("Output directory: {}", config.output_dir.display());
    println!();

    fs::create_dir_all(&config.output_dir)?;

    let start = Instant::now();
    let mut pipeline = SegmentationPipeline::for_region(profile, &ocr)?;
    let mut tiles_written = 0;
    let mut write_errors = 0;

    let text = config.text.then_some((&ocr, &furniture));
    let pages = config.pages.iter().map(PageSource::from_path);
    let outcome = pipeline.run(pages, |page| {
        let label = if page.fallback { " (fallback)" } else { "" };
        match write_page(&page, &config.output_dir, text) {
            Ok(count) => {
                println!(
                    "Page {}{}: {} columns, {} tiles",
                    page.page + 1,
                    label,
                    page.columns.len(),
                    count
                );
                tiles_written += count;
            },
            Err(e) => {
                eprintln!("Page {}: ✗ Error: {}", page.page + 1, e);
                write_errors += 1;
            },
        }
    });

    let summary = outcome.summary();
    println!("\n{}", "=".repeat(70));
    println!("Run {}", summary.run_id);
    println!("{}", "=".repeat(70));
    println!("Pages seen: {}", summary.pages_seen);
    println!("Pages with output: {}", summary.pages_with_output);
    println!("Columns accepted: {}", summary.columns_accepted);
    println!("Tiles written: {}", tiles_written);
    println!("Start found: {}", summary.start_found);
    println!("End found: {}", summary.end_found);
    println!("Fallback used: {}", summary.fallback_used);
    for skip in &summary.skips {
        println!("  skipped: {}", skip);
    }
    println!("Write errors: {}", write_errors);
    println!("Time: {:?}", start.elapsed());
    println!("{}", "=".repeat(70));

    Ok(())
}

fn main() {
    env_logger::init();

    let config = CliConfig::from_args();
    if config.pages.is_empty() {
        eprintln!(
            "Usage: segment_pages [--region <name>] [--profile <json>] [--out <dir>] \
             [--lang <lang>] [--text] <page>..."
        );
        std::process::exit(2);
    }

    if let Err(e) = run(&config) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
