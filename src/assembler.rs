//! Report assembler: fan-out of one unit per identity group, fan-in into
//! the story/state/snapshot hierarchy, and report caching.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, SecondsFormat, Utc};
use image::RgbaImage;
use tracing::{debug, info, warn};

use crate::aligner::{align, AlignedGroup};
use crate::artifacts::ArtifactStore;
use crate::cache::{cache_key, ReportCache};
use crate::config::Config;
use crate::element_diff::{compare_elements, ElementDiffOptions, ElementImages};
use crate::error::{join_item_errors, ItemError, Result, SnapdiffError};
use crate::image_diff::{compare_images, round_percentage, DiffScope, RenderMode};
use crate::image_loader::{load_image, resolve_image_path, ImageLoadError};
use crate::pool::WorkerPool;
use crate::store::SnapshotStore;
use crate::types::{
    BrowserProfile, Delta, DiffReport, DiffSnapshot, DiffState, DiffStory, SnapshotRecord,
    TestIdentity,
};

/// Parses an RFC 3339 capture time into UTC.
pub fn parse_capture_time(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|e| SnapdiffError::invalid_date(value, e))
}

/// Canonical rendering used in reports and cache keys.
pub fn format_capture_time(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportRequest {
    pub actual: DateTime<Utc>,
    pub expected: DateTime<Utc>,
    /// Per-channel tolerance of the image differ.
    pub inaccuracy: u8,
    /// Recompute even when a cached report exists.
    pub reload: bool,
}

impl ReportRequest {
    pub fn new(actual: DateTime<Utc>, expected: DateTime<Utc>) -> Self {
        Self {
            actual,
            expected,
            inaccuracy: 0,
            reload: false,
        }
    }

    pub fn parse(actual: &str, expected: &str) -> Result<Self> {
        Ok(Self::new(
            parse_capture_time(actual)?,
            parse_capture_time(expected)?,
        ))
    }

    pub fn with_inaccuracy(mut self, inaccuracy: u8) -> Self {
        self.inaccuracy = inaccuracy;
        self
    }

    pub fn with_reload(mut self, reload: bool) -> Self {
        self.reload = reload;
        self
    }
}

#[derive(Debug, Clone)]
pub struct GeneratedReport {
    /// Serialized report, byte-identical to the cache entry.
    pub json: String,
    pub report: DiffReport,
    pub cached: bool,
}

#[derive(Debug, Clone)]
pub struct AssemblerOptions {
    pub images_dir: PathBuf,
    pub report_workers: usize,
    pub element_workers: usize,
    /// Ignored names; `inaccuracy` is taken from each request.
    pub elements: ElementDiffOptions,
}

impl AssemblerOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            images_dir: config.storage.images_path(),
            report_workers: config.concurrency.report_workers,
            element_workers: config.concurrency.element_workers,
            elements: config.diff.element_options(config.diff.inaccuracy),
        }
    }
}

pub struct ReportAssembler {
    store: Arc<dyn SnapshotStore>,
    cache: Arc<dyn ReportCache>,
    artifacts: Arc<ArtifactStore>,
    images_dir: PathBuf,
    element_options: ElementDiffOptions,
    group_pool: WorkerPool,
    element_pool: WorkerPool,
}

/// Everything a group unit needs, shared read-only across units.
struct GroupContext {
    images_dir: PathBuf,
    artifacts: Arc<ArtifactStore>,
    element_options: Arc<ElementDiffOptions>,
    element_pool: WorkerPool,
    inaccuracy: u8,
}

struct GroupResult {
    identity: TestIdentity,
    browser: BrowserProfile,
    snapshot: DiffSnapshot,
}

/// Decoded images and whole-snapshot diff of one group.
#[derive(Default)]
struct PixelStage {
    actual: Option<Arc<RgbaImage>>,
    expected: Option<Arc<RgbaImage>>,
    percentage: f64,
    differs: bool,
    pixels: Option<String>,
    errors: Vec<ItemError>,
}

impl ReportAssembler {
    pub fn new(
        store: Arc<dyn SnapshotStore>,
        cache: Arc<dyn ReportCache>,
        artifacts: Arc<ArtifactStore>,
        options: AssemblerOptions,
    ) -> Self {
        Self {
            store,
            cache,
            artifacts,
            images_dir: options.images_dir,
            element_options: options.elements,
            group_pool: WorkerPool::new("report", options.report_workers),
            element_pool: WorkerPool::new("elements", options.element_workers),
        }
    }

    pub async fn generate(&self, request: ReportRequest) -> Result<GeneratedReport> {
        let started = Instant::now();
        let actual = format_capture_time(request.actual);
        let expected = format_capture_time(request.expected);
        let key = cache_key(&actual, &expected);

        if !request.reload {
            if let Some(json) = self.cache.load(&key)? {
                match serde_json::from_str::<DiffReport>(&json) {
                    Ok(report) => {
                        info!(key = %key, "serving cached report");
                        return Ok(GeneratedReport {
                            json,
                            report,
                            cached: true,
                        });
                    }
                    // Recomputing overwrites the entry.
                    Err(e) => warn!(key = %key, error = %e, "cached report unreadable, recomputing"),
                }
            }
        }

        let groups: Vec<AlignedGroup> = self
            .store
            .aggregate(request.actual, request.expected)?
            .into_iter()
            .filter_map(|group| align(group, request.actual, request.expected))
            .collect();
        info!(
            actual = %actual,
            expected = %expected,
            groups = groups.len(),
            reload = request.reload,
            "generating report"
        );

        let identities: HashMap<String, (TestIdentity, BrowserProfile)> = groups
            .iter()
            .map(|group| {
                (
                    group.hash.clone(),
                    (group.identity.clone(), group.browser.clone()),
                )
            })
            .collect();

        let context = Arc::new(GroupContext {
            images_dir: self.images_dir.clone(),
            artifacts: Arc::clone(&self.artifacts),
            element_options: Arc::new(ElementDiffOptions {
                inaccuracy: request.inaccuracy,
                ..self.element_options.clone()
            }),
            element_pool: self.element_pool.clone(),
            inaccuracy: request.inaccuracy,
        });
        let units = groups
            .into_iter()
            .map(|group| (group.hash.clone(), group))
            .collect();
        let results = self
            .group_pool
            .map(units, move |group: AlignedGroup| {
                let context = Arc::clone(&context);
                async move { diff_group(context, group).await }
            })
            .await;

        let mut snapshots: Vec<GroupResult> = results
            .completed
            .into_iter()
            .map(|(_, result)| result)
            .collect();
        for failure in results.failures {
            match identities.get(&failure.key) {
                Some((identity, browser)) => snapshots.push(GroupResult {
                    identity: identity.clone(),
                    browser: browser.clone(),
                    snapshot: failed_snapshot(browser.clone(), &failure.message),
                }),
                None => warn!(key = %failure.key, error = %failure.message, "lost report unit"),
            }
        }

        let report = build_report(actual, expected, snapshots);
        let json = serde_json::to_string(&report)?;
        self.cache.store(&key, &json)?;

        let summary = report.summary();
        info!(
            key = %key,
            snapshots = summary.snapshots,
            pixel_diffs = summary.pixel_diffs,
            element_diffs = summary.element_diffs,
            errors = summary.errors,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "report generated"
        );
        Ok(GeneratedReport {
            json,
            report,
            cached: false,
        })
    }
}

async fn diff_group(context: Arc<GroupContext>, group: AlignedGroup) -> GroupResult {
    let AlignedGroup {
        hash,
        identity,
        browser,
        actual,
        expected,
        mut errors,
    } = group;
    debug!(hash = %hash, "diffing snapshot group");

    let images_dir = context.images_dir.clone();
    let artifacts = Arc::clone(&context.artifacts);
    let inaccuracy = context.inaccuracy;
    let actual_path = actual.as_ref().map(|record| record.image_path.clone());
    let expected_path = expected.as_ref().map(|record| record.image_path.clone());
    let stage = tokio::task::spawn_blocking(move || {
        pixel_stage(
            &images_dir,
            actual_path.as_deref(),
            expected_path.as_deref(),
            inaccuracy,
            &artifacts,
        )
    })
    .await
    .unwrap_or_else(|e| PixelStage {
        errors: vec![ItemError::image_compare(format!("pixel comparison aborted: {e}"))],
        ..PixelStage::default()
    });
    errors.extend(stage.errors);

    let mut elements = Vec::new();
    if let (Some(actual_image), Some(expected_image), Some(actual_record), Some(expected_record)) =
        (stage.actual, stage.expected, actual.as_ref(), expected.as_ref())
    {
        if actual_record.has_elements() && expected_record.has_elements() {
            match (
                parse_elements("actual", actual_record),
                parse_elements("expected", expected_record),
            ) {
                (Ok(actual_elements), Ok(expected_elements)) => {
                    let outcome = compare_elements(
                        actual_elements,
                        expected_elements,
                        ElementImages {
                            actual: actual_image,
                            expected: expected_image,
                            retina: browser.retina,
                            compare_images: stage.differs,
                        },
                        Arc::clone(&context.element_options),
                        Some(Arc::clone(&context.artifacts)),
                        &context.element_pool,
                    )
                    .await;
                    elements = outcome.elements;
                    errors.extend(outcome.errors);
                }
                (actual_parsed, expected_parsed) => {
                    errors.extend(actual_parsed.err());
                    errors.extend(expected_parsed.err());
                }
            }
        }
    }
    elements.sort_by(|a, b| a.name.cmp(&b.name));

    for error in &errors {
        warn!(story = %identity.story, state = %identity.state, browser = %browser, error = %error, "snapshot item error");
    }

    let snapshot = DiffSnapshot {
        testcase_id: actual
            .as_ref()
            .and_then(|r| r.testcase_id.clone())
            .or_else(|| expected.as_ref().and_then(|r| r.testcase_id.clone())),
        server: side_delta(&actual, &expected, |r| r.server.clone()),
        branch: side_delta(&actual, &expected, |r| r.branch.clone()),
        commit: side_delta(&actual, &expected, |r| r.commit.clone()),
        diff_percentage: stage.percentage,
        pixels: stage.pixels,
        error: join_item_errors(&errors),
        browser: browser.clone(),
        images: Delta::new(
            actual
                .as_ref()
                .map(|r| context.artifacts.original_reference(&r.image_path)),
            expected
                .as_ref()
                .map(|r| context.artifacts.original_reference(&r.image_path)),
        ),
        elements,
    };

    GroupResult {
        identity,
        browser,
        snapshot,
    }
}

fn side_delta(
    actual: &Option<SnapshotRecord>,
    expected: &Option<SnapshotRecord>,
    pick: impl Fn(&SnapshotRecord) -> Option<String>,
) -> Delta<String> {
    Delta::new(actual.as_ref().and_then(&pick), expected.as_ref().and_then(&pick))
}

fn pixel_stage(
    images_dir: &Path,
    actual_path: Option<&str>,
    expected_path: Option<&str>,
    inaccuracy: u8,
    artifacts: &ArtifactStore,
) -> PixelStage {
    let mut stage = PixelStage::default();
    let mut load = |side: &'static str, path: Option<&str>| -> Option<Arc<RgbaImage>> {
        let path = path?;
        match load_image(resolve_image_path(images_dir, path)) {
            Ok(image) => Some(Arc::new(image)),
            Err(err) => {
                stage.errors.push(image_load_error(side, err));
                None
            }
        }
    };
    let actual = load("actual", actual_path);
    let expected = load("expected", expected_path);

    if let (Some(actual_image), Some(expected_image)) = (&actual, &expected) {
        match compare_images(
            actual_image,
            expected_image,
            DiffScope::Whole,
            inaccuracy,
            RenderMode::Background,
            Some(artifacts),
        ) {
            Ok(diff) => {
                stage.percentage = round_percentage(diff.percentage);
                stage.differs = diff.diff_pixels > 0;
                stage.pixels = diff.artifact;
            }
            Err(err) => stage.errors.push(err),
        }
    }
    stage.actual = actual;
    stage.expected = expected;
    stage
}

fn image_load_error(side: &'static str, err: ImageLoadError) -> ItemError {
    ItemError::ImageLoad {
        side,
        message: err.to_string(),
    }
}

fn parse_elements(
    side: &'static str,
    record: &SnapshotRecord,
) -> std::result::Result<HashMap<String, crate::types::Element>, ItemError> {
    record.elements().map_err(|e| ItemError::ElementParse {
        side,
        message: e.to_string(),
    })
}

fn failed_snapshot(browser: BrowserProfile, message: &str) -> DiffSnapshot {
    DiffSnapshot {
        testcase_id: None,
        server: Delta::default(),
        branch: Delta::default(),
        commit: Delta::default(),
        diff_percentage: 0.0,
        pixels: None,
        error: Some(format!("snapshot comparison failed: {message}")),
        browser,
        images: Delta::default(),
        elements: Vec::new(),
    }
}

/// Groups snapshots by story then state, each level ordered by name and
/// snapshots ordered by browser profile.
fn build_report(actual: String, expected: String, results: Vec<GroupResult>) -> DiffReport {
    let mut stories: BTreeMap<String, BTreeMap<String, BTreeMap<String, DiffSnapshot>>> =
        BTreeMap::new();
    for result in results {
        stories
            .entry(result.identity.story)
            .or_default()
            .entry(result.identity.state)
            .or_default()
            .insert(result.browser.to_string(), result.snapshot);
    }

    DiffReport {
        actual,
        expected,
        stories: stories
            .into_iter()
            .map(|(story, states)| DiffStory {
                story,
                states: states
                    .into_iter()
                    .map(|(state, snapshots)| DiffState {
                        state,
                        snapshots: snapshots.into_values().collect(),
                    })
                    .collect(),
            })
            .collect(),
    }
}
