use std::path::Path;
use std::sync::Arc;

use image::{Rgba, RgbaImage};
use snapdiff_lib::{
    cache_key, ArtifactStore, AssemblerOptions, Config, DisplayTransition, FileStore,
    FsReportCache, ReportAssembler, ReportRequest, SnapshotRecord, SnapshotStore,
};
use tempfile::TempDir;

const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

fn config_for(root: &Path) -> Config {
    let mut config = Config::default();
    config.storage.root = root.to_path_buf();
    config.concurrency.report_workers = 2;
    config.concurrency.element_workers = 2;
    config
}

fn record(story: &str, captured_at: &str, image: &str, elements: &str) -> SnapshotRecord {
    serde_json::from_value(serde_json::json!({
        "story": story,
        "state": "default",
        "browser": {"browserName": "chrome", "resolution": "1280x720"},
        "capturedAt": captured_at,
        "server": "staging",
        "imagePath": image,
        "elements": elements,
    }))
    .expect("record json")
}

fn assembler(config: &Config) -> ReportAssembler {
    ReportAssembler::new(
        Arc::new(FileStore::open(config.storage.snapshots_path()).expect("open store")),
        Arc::new(FsReportCache::new(config.storage.reports_path())),
        Arc::new(ArtifactStore::new(
            config.storage.reports_path(),
            Some("https://snapdiff.example/".to_string()),
        )),
        AssemblerOptions::from_config(config),
    )
}

fn seed(config: &Config) {
    let images = config.storage.images_path();
    std::fs::create_dir_all(&images).expect("images dir");
    let expected = RgbaImage::from_pixel(40, 40, WHITE);
    let mut actual = expected.clone();
    for y in 0..4 {
        for x in 0..40 {
            actual.put_pixel(x, y, Rgba([0, 0, 255, 255]));
        }
    }
    expected.save(images.join("home-e.png")).expect("save expected");
    actual.save(images.join("home-a.png")).expect("save actual");
    expected.save(images.join("about.png")).expect("save about");

    let banner = r#"{"banner":{"display":"block","area":{"left":0,"top":0,"right":40,"bottom":4,"width":40,"height":4}}}"#;
    let with_footer = r#"{"banner":{"display":"block","area":{"left":0,"top":0,"right":40,"bottom":4,"width":40,"height":4}},"footer":{"display":"none","area":{"left":0,"top":30,"right":40,"bottom":40,"width":40,"height":10}}}"#;

    let store = FileStore::open(config.storage.snapshots_path()).expect("open store");
    store
        .upsert(record("Home", "2018-05-01T11:00:00Z", "home-a.png", banner))
        .expect("upsert");
    store
        .upsert(record("Home", "2018-05-01T10:00:00Z", "home-e.png", with_footer))
        .expect("upsert");
    store
        .upsert(record("About", "2018-05-01T11:00:00Z", "about.png", ""))
        .expect("upsert");
}

#[tokio::test]
async fn report_over_file_store_and_cache() {
    let dir = TempDir::new().expect("tempdir");
    let config = config_for(dir.path());
    seed(&config);

    let request = ReportRequest::parse("2018-05-01T11:00:00Z", "2018-05-01T10:00:00Z")
        .expect("request");
    let generated = assembler(&config)
        .generate(request.clone())
        .await
        .expect("generate");
    assert!(!generated.cached);

    let report = &generated.report;
    assert_eq!(report.actual, "2018-05-01T11:00:00.000Z");
    let stories: Vec<_> = report.stories.iter().map(|s| s.story.as_str()).collect();
    assert_eq!(stories, vec!["About", "Home"]);

    let about = &report.stories[0].states[0].snapshots[0];
    assert_eq!(about.error.as_deref(), Some("expected snapshot not found"));
    assert_eq!(about.diff_percentage, 0.0);

    let home = &report.stories[1].states[0].snapshots[0];
    assert_eq!(home.diff_percentage, 10.0);
    let pixels = home.pixels.as_deref().expect("diff image reference");
    assert!(pixels.starts_with("https://snapdiff.example/images/reports/"));
    let file_name = pixels.rsplit('/').next().expect("file name");
    assert!(config.storage.reports_path().join(file_name).exists());

    let footer = home
        .elements
        .iter()
        .find(|e| e.name == "footer")
        .expect("footer element");
    assert_eq!(footer.display, DisplayTransition::Removed);

    let key = cache_key(&report.actual, &report.expected);
    let cached_file = config.storage.reports_path().join(format!("{key}.json"));
    let on_disk = std::fs::read_to_string(&cached_file).expect("cache entry");
    assert_eq!(on_disk, generated.json);

    // A fresh assembler over the same directories serves the cached bytes.
    let again = assembler(&config).generate(request).await.expect("cached");
    assert!(again.cached);
    assert_eq!(again.json, generated.json);
}

#[tokio::test]
async fn reload_recomputes_with_request_tolerance() {
    let dir = TempDir::new().expect("tempdir");
    let config = config_for(dir.path());
    seed(&config);

    let request = ReportRequest::parse("2018-05-01T11:00:00Z", "2018-05-01T10:00:00Z")
        .expect("request");
    let first = assembler(&config)
        .generate(request.clone())
        .await
        .expect("first");

    let tolerant = request.with_inaccuracy(255).with_reload(true);
    let second = assembler(&config).generate(tolerant).await.expect("reload");
    assert!(!second.cached);
    assert_ne!(first.json, second.json);
    let home = &second.report.stories[1].states[0].snapshots[0];
    assert_eq!(home.diff_percentage, 0.0);
    assert!(home.pixels.is_none());
}
