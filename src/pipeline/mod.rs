//! Segmentation run driver.
//!
//! ```text
//! PageSource (lazy)
//!     ↓
//! [BlockDetector] (morphology + keyword classification)
//!     ↓
//! Block[] → [NoiseFilter] (legend band, rules, graphics)
//!     ↓
//! [ColumnSplitter] (projection profile)
//!     ↓
//! Column[] → [SectionStateMachine] (run-scoped START/END tracking)
//!     ↓
//! SectionColumn[] → [BatchAssembler]
//!     ↓
//! Tile[] per page, handed to the caller's sink
//! ```
//!
//! A [`SegmentationPipeline`] is one run over one edition. Its state machine
//! carries memory across pages, so pages are processed strictly in order;
//! independent runs share nothing and may execute concurrently.

use uuid::Uuid;

use crate::batch::{BatchAssembler, Tile};
use crate::cancel::CancellationToken;
use crate::config::SegmentationConfig;
use crate::error::{Result, SkipReason, StageOutcome};
use crate::layout::{ArtifactDespeckle, BlockDetector, ColumnSplitter, NoiseFilter};
use crate::ocr::{OcrEngine, OcrLayoutHint};
use crate::page::PageSource;
use crate::region::{create_strategy, FallbackPolicy, RegionProfile, RegionStrategy};
use crate::section::{ColumnContext, ColumnVerdict, PipelineState, SectionColumn, SectionStateMachine};

/// Everything one page contributed to the section.
#[derive(Debug, Clone)]
pub struct PageOutput {
    /// Page index in run order
    pub page: usize,
    /// Accepted columns in reading order
    pub columns: Vec<SectionColumn>,
    /// Tiles built from `columns`; fallback pages get theirs when the run
    /// finishes
    pub tiles: Vec<Tile>,
    /// Columns skipped on this page and why
    pub skips: Vec<SkipReason>,
    /// True for raw columns emitted by the pass-through fallback
    pub fallback: bool,
}

/// Counters and flags describing a run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    /// Identifier used in this run's log lines
    pub run_id: Uuid,
    /// Region the run was configured for
    pub region: String,
    /// Pages whose processing started before cancellation
    pub pages_seen: usize,
    /// Pages that contributed at least one column
    pub pages_with_output: usize,
    /// Columns accepted into the section (fallback columns included)
    pub columns_accepted: usize,
    /// Tiles produced
    pub tiles: usize,
    /// Start code found
    pub start_found: bool,
    /// Closing title found
    pub end_found: bool,
    /// Pass-through fallback emitted raw columns
    pub fallback_used: bool,
    /// Non-fatal skips, in the order they happened
    pub skips: Vec<SkipReason>,
}

impl RunSummary {
    fn new(region: &str) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            region: region.to_string(),
            pages_seen: 0,
            pages_with_output: 0,
            columns_accepted: 0,
            tiles: 0,
            start_found: false,
            end_found: false,
            fallback_used: false,
            skips: Vec::new(),
        }
    }
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// Every page was processed
    Completed(RunSummary),
    /// Cancellation was observed; pages already handed to the sink stand
    Cancelled(RunSummary),
}

impl RunOutcome {
    /// Summary of the run, however it ended.
    pub fn summary(&self) -> &RunSummary {
        match self {
            RunOutcome::Completed(summary) | RunOutcome::Cancelled(summary) => summary,
        }
    }

    /// True when the run was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RunOutcome::Cancelled(_))
    }
}

/// One segmentation run over an edition.
pub struct SegmentationPipeline<'a> {
    region: Box<dyn RegionStrategy + Send + Sync>,
    ocr: Box<dyn OcrEngine + 'a>,
    cancel: CancellationToken,
    detector: BlockDetector,
    noise: NoiseFilter,
    splitter: ColumnSplitter,
    assembler: BatchAssembler,
    machine: SectionStateMachine,
    fallback_buffer: Vec<PageOutput>,
    fallback_limit: Option<usize>,
    next_page: usize,
    summary: RunSummary,
}

impl<'a> SegmentationPipeline<'a> {
    /// Create a run for `profile` with tunables `config`.
    ///
    /// `config` replaces the profile's own tunables for every stage,
    /// including the region's legend stripper and title patterns.
    pub fn new(
        profile: RegionProfile,
        config: SegmentationConfig,
        ocr: impl OcrEngine + 'a,
    ) -> Result<Self> {
        config.validate()?;
        let profile = RegionProfile {
            config: config.clone(),
            ..profile
        };
        let keywords = profile.keywords();
        let region = create_strategy(profile)?;
        let summary = RunSummary::new(region.name());

        Ok(Self {
            detector: BlockDetector::new(config.block.clone(), keywords),
            noise: NoiseFilter::new(ArtifactDespeckle::new(config.despeckle.clone())),
            splitter: ColumnSplitter::new(config.columns.clone()),
            assembler: BatchAssembler::new(config.batch.clone()),
            machine: SectionStateMachine::new(config.section.clone()),
            region,
            ocr: Box::new(ocr),
            cancel: CancellationToken::new(),
            fallback_buffer: Vec::new(),
            fallback_limit: config.section.fallback_page_limit,
            next_page: 0,
            summary,
        })
    }

    /// Create a run using the profile's own tunables.
    pub fn for_region(profile: RegionProfile, ocr: impl OcrEngine + 'a) -> Result<Self> {
        let config = profile.config.clone();
        Self::new(profile, config, ocr)
    }

    /// Observe `token` for cooperative cancellation.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Section state of the run.
    pub fn state(&self) -> &PipelineState {
        self.machine.state()
    }

    /// Summary so far.
    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    /// Region strategy in use.
    pub fn region(&self) -> &dyn RegionStrategy {
        self.region.as_ref()
    }

    /// Process the next page of the run.
    ///
    /// Nothing is decoded once the section has closed or cancellation was
    /// signalled.
    pub fn process_page(&mut self, source: PageSource) -> StageOutcome<PageOutput> {
        let index = self.next_page;
        self.next_page += 1;

        if self.cancel.is_cancelled() {
            return StageOutcome::Cancelled;
        }
        self.summary.pages_seen += 1;
        if self.machine.state().is_closed() {
            log::debug!("[{}] page {}: section already closed", self.summary.run_id, index);
            return self.skip(SkipReason::SectionClosed { page: index });
        }

        let description = source.describe();
        let page = match source.load(index) {
            Ok(page) => page,
            Err(e) => {
                log::warn!("[{}] page {} ({}): {}", self.summary.run_id, index, description, e);
                return self.skip(SkipReason::RecoverableImage {
                    page: index,
                    detail: e.to_string(),
                });
            },
        };

        let detection = match self.detector.detect(&page, self.ocr.as_ref(), &self.cancel) {
            StageOutcome::Done(detection) => detection,
            StageOutcome::Skipped(reason) => return self.skip(reason),
            StageOutcome::Cancelled => return StageOutcome::Cancelled,
        };

        let mut output = PageOutput {
            page: index,
            columns: Vec::new(),
            tiles: Vec::new(),
            skips: Vec::new(),
            fallback: false,
        };
        let mut raw = Vec::new();
        let buffer_raw = self.region.fallback_policy() == FallbackPolicy::PassThrough;

        'blocks: for block in &detection.blocks {
            if self.cancel.is_cancelled() {
                return StageOutcome::Cancelled;
            }
            let cleaned = self
                .noise
                .apply(&block.image, self.region.detect_legend(), self.ocr.as_ref());
            let split = self.splitter.split(&cleaned);
            if split.columns.is_empty() {
                log::warn!("page {} block {}: no columns found", index, block.index);
                continue;
            }

            for column in split.columns {
                if self.cancel.is_cancelled() {
                    return StageOutcome::Cancelled;
                }
                let ctx = ColumnContext {
                    page: index,
                    block: block.index,
                    column: column.index,
                };
                let searching = self.machine.state().is_searching();

                match self
                    .machine
                    .feed(&column.image, ctx, self.region.as_ref(), self.ocr.as_ref())
                {
                    ColumnVerdict::Accepted(accepted) => output.columns.push(accepted),
                    ColumnVerdict::Closed(last) => {
                        output.columns.extend(last);
                        break 'blocks;
                    },
                    ColumnVerdict::Discarded => {
                        if buffer_raw && searching {
                            raw.push(SectionColumn::plain(ctx, column.image));
                        }
                    },
                    ColumnVerdict::Ignored => break 'blocks,
                    ColumnVerdict::Skipped(reason) => {
                        if buffer_raw && searching {
                            raw.push(SectionColumn::plain(ctx, column.image));
                        }
                        output.skips.push(reason);
                    },
                }
            }
        }

        if self.machine.state().is_searching() {
            if !raw.is_empty() {
                self.hold_for_fallback(index, raw);
            }
        } else if !self.fallback_buffer.is_empty() {
            self.fallback_buffer.clear();
        }

        output.tiles = self.assembler.assemble(&output.columns);
        self.record(&output);
        log::info!(
            "[{}] page {}: {} blocks, {} columns accepted, {} tiles",
            self.summary.run_id,
            index,
            detection.blocks.len(),
            output.columns.len(),
            output.tiles.len()
        );
        StageOutcome::Done(output)
    }

    /// Close the run, applying the region's fallback policy when the start
    /// code never appeared. Returns the fallback pages to hand downstream.
    pub fn finish(&mut self) -> Vec<PageOutput> {
        self.summary.start_found = self.machine.state().start_page().is_some();
        self.summary.end_found = self.machine.state().end_page().is_some();

        let Some(reason) = self.machine.finish() else {
            return Vec::new();
        };
        self.summary.skips.push(reason);

        match self.region.fallback_policy() {
            FallbackPolicy::EmitNothing => {
                log::warn!(
                    "[{}] start code {} never found, emitting nothing",
                    self.summary.run_id,
                    self.region.patterns().start_code()
                );
                Vec::new()
            },
            FallbackPolicy::PassThrough => {
                let mut pages = std::mem::take(&mut self.fallback_buffer);
                for page in &mut pages {
                    page.tiles = self.assembler.assemble(&page.columns);
                }
                log::warn!(
                    "[{}] start code {} never found, passing {} raw pages through",
                    self.summary.run_id,
                    self.region.patterns().start_code(),
                    pages.len()
                );
                self.summary.fallback_used = !pages.is_empty();
                for page in &pages {
                    self.record(page);
                }
                pages
            },
        }
    }

    /// Process every page in order, handing each page with output to `sink`.
    pub fn run<I, F>(&mut self, pages: I, mut sink: F) -> RunOutcome
    where
        I: IntoIterator<Item = PageSource>,
        F: FnMut(PageOutput),
    {
        log::info!(
            "[{}] segmentation run started (region {}, OCR {})",
            self.summary.run_id,
            self.region.name(),
            self.ocr.name()
        );

        for source in pages {
            match self.process_page(source) {
                StageOutcome::Done(output) => {
                    if !output.columns.is_empty() {
                        sink(output);
                    }
                },
                StageOutcome::Skipped(reason) => {
                    log::debug!("[{}] {}", self.summary.run_id, reason);
                },
                StageOutcome::Cancelled => {
                    log::info!(
                        "[{}] run cancelled at page {}",
                        self.summary.run_id,
                        self.next_page - 1
                    );
                    return RunOutcome::Cancelled(self.summary.clone());
                },
            }
        }

        for page in self.finish() {
            sink(page);
        }
        log::info!(
            "[{}] run finished: {} columns, start {}, end {}, fallback {}",
            self.summary.run_id,
            self.summary.columns_accepted,
            self.summary.start_found,
            self.summary.end_found,
            self.summary.fallback_used
        );
        RunOutcome::Completed(self.summary.clone())
    }

    fn hold_for_fallback(&mut self, page: usize, columns: Vec<SectionColumn>) {
        if self
            .fallback_limit
            .is_some_and(|limit| self.fallback_buffer.len() >= limit)
        {
            log::warn!(
                "[{}] page {}: fallback buffer full, dropping {} raw columns",
                self.summary.run_id,
                page,
                columns.len()
            );
            return;
        }
        self.fallback_buffer.push(PageOutput {
            page,
            columns,
            tiles: Vec::new(),
            skips: Vec::new(),
            fallback: true,
        });
    }

    fn skip(&mut self, reason: SkipReason) -> StageOutcome<PageOutput> {
        self.summary.skips.push(reason.clone());
        StageOutcome::Skipped(reason)
    }

    fn record(&mut self, output: &PageOutput) {
        if !output.columns.is_empty() {
            self.summary.pages_with_output += 1;
        }
        self.summary.columns_accepted += output.columns.len();
        self.summary.tiles += output.tiles.len();
        self.summary.skips.extend(output.skips.iter().cloned());
    }
}

/// Recognise tiles one by one, keeping tile order in the result.
///
/// Callers dispatching tiles concurrently must reassemble results in this
/// same order before joining page text.
pub fn recognize_tiles(tiles: &[Tile], ocr: &dyn OcrEngine) -> Vec<StageOutcome<String>> {
    tiles
        .iter()
        .map(|tile| match ocr.recognize(&tile.image, OcrLayoutHint::Auto) {
            Ok(output) => StageOutcome::Done(output.text),
            Err(e) => {
                log::warn!("tile {} of page {}: OCR failed: {}", tile.index, tile.page, e);
                StageOutcome::Skipped(SkipReason::ClassificationUncertain {
                    page: tile.page,
                    detail: e.to_string(),
                })
            },
        })
        .collect()
}
