use snapdiff_lib::error::{join_item_errors, ErrorCategory, ItemError};
use snapdiff_lib::{ImageLoadError, SnapdiffError};

#[test]
fn config_error_display_includes_message() {
    let err = SnapdiffError::Config("missing storage root".to_string());

    assert_eq!(format!("{}", err), "Configuration error: missing storage root");
}

#[test]
fn io_error_display_wraps_source() {
    let io_err = std::io::Error::other("disk full");
    let err: SnapdiffError = io_err.into();
    let rendered = format!("{}", err);

    assert!(rendered.starts_with("IO error: "));
    assert!(rendered.contains("disk full"));
}

#[test]
fn invalid_date_names_the_value() {
    let err = SnapdiffError::invalid_date("yesterday", "input contains invalid characters");

    assert_eq!(
        format!("{}", err),
        "Invalid capture time 'yesterday': input contains invalid characters"
    );
    assert!(matches!(err.to_payload().category, ErrorCategory::Config));
}

#[test]
fn store_and_cache_helpers_map_to_their_categories() {
    let store = SnapdiffError::store("snapshots file is corrupt");
    let cache = SnapdiffError::cache("reports dir is read-only");

    assert_eq!(format!("{}", store), "Snapshot store error: snapshots file is corrupt");
    assert!(matches!(store.to_payload().category, ErrorCategory::Store));
    assert!(matches!(cache.to_payload().category, ErrorCategory::Cache));
}

#[test]
fn missing_image_becomes_config_error_with_hint() {
    let err: SnapdiffError = ImageLoadError::NotFound("shots/a.png".to_string()).into();
    let payload = err.to_payload();

    assert_eq!(payload.message, "File not found: shots/a.png");
    assert!(payload
        .remediation
        .as_deref()
        .is_some_and(|hint| hint.contains("Verify the file exists")));
}

#[test]
fn item_errors_join_one_per_line() {
    let errors = vec![
        ItemError::alignment("expected snapshot not found"),
        ItemError::element_compare("logo", "region out of bounds"),
    ];
    let joined = join_item_errors(&errors).expect("joined errors");

    assert_eq!(joined.lines().count(), 2);
    assert!(joined.starts_with("expected snapshot not found"));
    assert!(join_item_errors(&[]).is_none());
}
