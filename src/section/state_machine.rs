//! Run-scoped section boundary tracking.
//!
//! Columns arrive in reading order across every page of an edition. The
//! machine discards columns until one carries the start code, keeps
//! everything after it, and closes on the first title line of another
//! section. Once closed it accepts nothing for the rest of the run.

use std::fmt;

use image::GrayImage;

use crate::config::SectionConfig;
use crate::error::SkipReason;
use crate::ocr::{OcrEngine, OcrLayoutHint};
use crate::raster;
use crate::region::RegionStrategy;

/// Phase of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SectionPhase {
    /// Looking for the start code
    #[default]
    SearchingStart,
    /// Inside the section
    Collecting,
    /// Section closed
    Done,
}

/// State owned by one run; never shared and never reset mid-run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineState {
    phase: SectionPhase,
    columns_accepted: usize,
    start_page: Option<usize>,
    end_page: Option<usize>,
}

impl PipelineState {
    /// Current phase.
    pub fn phase(&self) -> SectionPhase {
        self.phase
    }

    /// Still looking for the start code.
    pub fn is_searching(&self) -> bool {
        self.phase == SectionPhase::SearchingStart
    }

    /// Inside the section.
    pub fn is_collecting(&self) -> bool {
        self.phase == SectionPhase::Collecting
    }

    /// Section closed; later columns are ignored.
    pub fn is_closed(&self) -> bool {
        self.phase == SectionPhase::Done
    }

    /// Columns accepted so far.
    pub fn columns_accepted(&self) -> usize {
        self.columns_accepted
    }

    /// Page the start code was found on.
    pub fn start_page(&self) -> Option<usize> {
        self.start_page
    }

    /// Page the section closed on.
    pub fn end_page(&self) -> Option<usize> {
        self.end_page
    }
}

/// Structural tag attached to an accepted column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionMarkerTag {
    /// First column of the section, cropped at the start code
    Start,
    /// Last column of the section, cropped above the closing title
    End,
    /// Any other column
    None,
}

/// Marker prepended to the recognised text of the tile holding the start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionMarker {
    /// Start code of the section
    pub code: String,
}

impl fmt::Display for SectionMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[CODE:{}]", self.code)
    }
}

/// Position of a column in the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ColumnContext {
    /// Page index
    pub page: usize,
    /// Block index on the page
    pub block: usize,
    /// Column index in the block
    pub column: usize,
}

impl fmt::Display for ColumnContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "page {} block {} column {}", self.page, self.block, self.column)
    }
}

/// A column accepted into the section.
#[derive(Debug, Clone)]
pub struct SectionColumn {
    /// Where the column came from
    pub context: ColumnContext,
    /// Structural tag
    pub tag: SectionMarkerTag,
    /// Start marker, on the START column only
    pub marker: Option<SectionMarker>,
    /// Pixels, cropped for START/END columns
    pub image: GrayImage,
}

impl SectionColumn {
    /// An untagged column.
    pub fn plain(context: ColumnContext, image: GrayImage) -> Self {
        Self {
            context,
            tag: SectionMarkerTag::None,
            marker: None,
            image,
        }
    }
}

/// What the machine did with one column.
#[derive(Debug, Clone)]
pub enum ColumnVerdict {
    /// Column is part of the section
    Accepted(SectionColumn),
    /// Column precedes the start code
    Discarded,
    /// Column carried the closing title; the cropped remainder, if tall
    /// enough to keep
    Closed(Option<SectionColumn>),
    /// Section already closed
    Ignored,
    /// Column could not be read; state unchanged
    Skipped(SkipReason),
}

/// The section boundary state machine.
#[derive(Debug, Clone, Default)]
pub struct SectionStateMachine {
    config: SectionConfig,
    state: PipelineState,
}

impl SectionStateMachine {
    /// Create a machine in the start-search phase.
    pub fn new(config: SectionConfig) -> Self {
        Self {
            config,
            state: PipelineState::default(),
        }
    }

    /// Current state.
    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    /// Process the next column in reading order.
    pub fn feed(
        &mut self,
        column: &GrayImage,
        ctx: ColumnContext,
        region: &dyn RegionStrategy,
        ocr: &dyn OcrEngine,
    ) -> ColumnVerdict {
        if self.state.is_closed() {
            return ColumnVerdict::Ignored;
        }

        let recognized = match ocr.recognize(column, OcrLayoutHint::UniformBlock) {
            Ok(output) => output,
            Err(e) => {
                log::warn!("{}: OCR failed, skipping column: {}", ctx, e);
                return ColumnVerdict::Skipped(SkipReason::ClassificationUncertain {
                    page: ctx.page,
                    detail: format!("{}: {}", ctx, e),
                });
            },
        };

        match self.state.phase {
            SectionPhase::SearchingStart => {
                let found = match region.detect_start(column, &recognized, ocr) {
                    Ok(found) => found,
                    Err(e) => {
                        log::warn!("{}: start detection failed: {}", ctx, e);
                        return ColumnVerdict::Skipped(SkipReason::ClassificationUncertain {
                            page: ctx.page,
                            detail: format!("{}: {}", ctx, e),
                        });
                    },
                };
                let Some(found) = found else {
                    return ColumnVerdict::Discarded;
                };

                let from_row = found.y.saturating_sub(self.config.start_crop_margin);
                log::info!(
                    "section start {} found at {} (row {})",
                    found.token,
                    ctx,
                    found.y
                );
                self.state.phase = SectionPhase::Collecting;
                self.state.start_page = Some(ctx.page);
                self.state.columns_accepted += 1;
                ColumnVerdict::Accepted(SectionColumn {
                    context: ctx,
                    tag: SectionMarkerTag::Start,
                    marker: Some(SectionMarker {
                        code: region.patterns().start_code().to_string(),
                    }),
                    image: raster::crop_rows_from(column, from_row),
                })
            },
            SectionPhase::Collecting => {
                let lines = recognized.lines();
                let texts: Vec<&str> = lines.iter().map(|l| l.text.as_str()).collect();
                let Some(end) = region.patterns().find_end(&texts) else {
                    self.state.columns_accepted += 1;
                    return ColumnVerdict::Accepted(SectionColumn::plain(ctx, column.clone()));
                };

                log::info!("section end {:?} found at {}", end.line, ctx);
                self.state.phase = SectionPhase::Done;
                self.state.end_page = Some(ctx.page);

                let to_row = lines[end.line_index]
                    .bbox
                    .map(|b| b.y)
                    .unwrap_or_else(|| column.height());
                if to_row <= self.config.min_end_height {
                    log::debug!("{}: nothing left above the closing title", ctx);
                    return ColumnVerdict::Closed(None);
                }
                self.state.columns_accepted += 1;
                ColumnVerdict::Closed(Some(SectionColumn {
                    context: ctx,
                    tag: SectionMarkerTag::End,
                    marker: None,
                    image: raster::crop_rows_to(column, to_row),
                }))
            },
            SectionPhase::Done => ColumnVerdict::Ignored,
        }
    }

    /// Report how the run ended for the section: `NoStartFound` when the
    /// start code never appeared.
    pub fn finish(&self) -> Option<SkipReason> {
        if self.state.is_searching() {
            Some(SkipReason::NoStartFound)
        } else {
            None
        }
    }
}
