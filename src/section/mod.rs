//! Section boundary extraction across pages.

pub mod patterns;
pub mod start_detector;
pub mod state_machine;

pub use patterns::{EndMatch, SectionPatterns};
pub use start_detector::{
    AnchorSide, SpatialAnchor, SpatialCoDetector, StartDetector, StartMatch, TextMatchDetector,
};
pub use state_machine::{
    ColumnContext, ColumnVerdict, PipelineState, SectionColumn, SectionMarker, SectionMarkerTag,
    SectionPhase, SectionStateMachine,
};
