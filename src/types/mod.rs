pub mod geometry;
pub mod report;
pub mod snapshot;

pub use geometry::{Area, AreaDelta, Delta, PixelRegion};
pub use report::{
    DiffElement, DiffReport, DiffSnapshot, DiffState, DiffStory, DiffTag, DisplayTransition,
    ReportSummary,
};
pub use snapshot::{
    identity_hash, parse_identity_hash, BrowserProfile, Element, SnapshotRecord, TestIdentity,
    HIDDEN_DISPLAY, NOT_FOUND_DISPLAY,
};
