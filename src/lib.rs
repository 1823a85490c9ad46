//! Snapdiff Library
//!
//! A visual-regression diff engine. Given two dated capture runs of UI test
//! states (screenshots plus per-element metadata), it reports what changed
//! for every test identity, at pixel level and at DOM-element level.
//!
//! # Module Overview
//!
//! - [`aligner`] - pairing of records into actual/expected sides
//! - [`image_diff`] - pixel-region image differ
//! - [`element_diff`] - structural element differ
//! - [`assembler`] - concurrent report assembly with caching
//! - [`pool`] - bounded worker pool
//! - [`store`] / [`cache`] - snapshot records and cached reports
//! - [`artifacts`] - diff visualizations on disk
//! - [`config`] - configuration file support
//! - [`types`] - records, elements and report structures
//! - [`output`] - JSON output schemas
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use snapdiff_lib::{
//!     ArtifactStore, AssemblerOptions, Config, FileStore, FsReportCache, ReportAssembler,
//!     ReportRequest,
//! };
//!
//! # async fn example() -> snapdiff_lib::Result<()> {
//! let config = Config::default();
//! let assembler = ReportAssembler::new(
//!     Arc::new(FileStore::open(config.storage.snapshots_path())?),
//!     Arc::new(FsReportCache::new(config.storage.reports_path())),
//!     Arc::new(ArtifactStore::new(config.storage.reports_path(), None)),
//!     AssemblerOptions::from_config(&config),
//! );
//! let request = ReportRequest::parse("2018-05-01T11:00:00Z", "2018-05-01T10:00:00Z")?;
//! let generated = assembler.generate(request).await?;
//! println!("{}", generated.json);
//! # Ok(())
//! # }
//! ```

pub mod aligner;
pub mod artifacts;
pub mod assembler;
pub mod cache;
pub mod config;
pub mod element_diff;
pub mod error;
pub mod image_diff;
pub mod image_loader;
pub mod output;
pub mod pool;
pub mod store;
pub mod types;

pub use aligner::{align, AlignedGroup};
pub use artifacts::ArtifactStore;
pub use assembler::{
    format_capture_time, parse_capture_time, AssemblerOptions, GeneratedReport, ReportAssembler,
    ReportRequest,
};
pub use cache::{cache_key, FsReportCache, MemoryReportCache, ReportCache};
pub use config::Config;
pub use element_diff::{
    classify, compare_elements, flatten_element, is_displayed, ElementDiffOptions,
    ElementDiffOutcome, ElementImages,
};
pub use error::{ErrorCategory, ErrorPayload, ItemError, Result, SnapdiffError};
pub use image_diff::{compare_files, compare_images, DiffScope, ImageDiff, RenderMode};
pub use image_loader::{load_image, ImageLoadError};
pub use output::{
    CapturesOutput, CompareImagesOutput, ErrorOutput, IngestOutput, RecordsOutput,
    ReportOutput, SnapdiffOutput, SNAPDIFF_OUTPUT_VERSION,
};
pub use pool::{PoolResults, TaskFailure, WorkerPool};
pub use store::{
    CaptureSummary, FileStore, MemoryStore, SnapshotGroup, SnapshotStore, UpsertOutcome,
};
pub use types::{
    Area, BrowserProfile, DiffElement, DiffReport, DiffSnapshot, DiffTag, DisplayTransition,
    Element, ReportSummary, SnapshotRecord, TestIdentity,
};
