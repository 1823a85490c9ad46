use std::path::{Path, PathBuf};
use std::process::ExitCode;

use snapdiff_lib::{
    FileStore, IngestOutput, SnapdiffError, SnapdiffOutput, SnapshotRecord, SnapshotStore,
    UpsertOutcome, SNAPDIFF_OUTPUT_VERSION,
};
use tracing::{debug, info};

use crate::cli::OutputFormat;
use crate::formatting::{render_error, write_output};
use crate::settings::load_config;

/// Run the ingest command.
pub async fn run_ingest(
    config_path: Option<PathBuf>,
    files: Vec<PathBuf>,
    format: OutputFormat,
) -> ExitCode {
    let config = match load_config(config_path.as_deref()) {
        Ok(cfg) => cfg,
        Err(err) => return render_error(err, format, None),
    };
    let store = match FileStore::open(config.storage.snapshots_path()) {
        Ok(store) => store,
        Err(err) => return render_error(err, format, None),
    };

    let mut inserted = 0;
    let mut updated = 0;
    for file in &files {
        let records = match read_records(file) {
            Ok(records) => records,
            Err(err) => return render_error(err, format, None),
        };
        debug!(file = %file.display(), records = records.len(), "ingesting records");
        for record in records {
            match store.upsert(record) {
                Ok(UpsertOutcome::Inserted) => inserted += 1,
                Ok(UpsertOutcome::Updated) => updated += 1,
                Err(err) => return render_error(err, format, None),
            }
        }
    }
    info!(inserted, updated, store = %store.path().display(), "ingest finished");

    let body = SnapdiffOutput::Ingest(IngestOutput {
        version: SNAPDIFF_OUTPUT_VERSION.to_string(),
        inserted,
        updated,
        files: files.iter().map(|f| f.display().to_string()).collect(),
    });
    if let Err(err) = write_output(&body, format, None) {
        return render_error(SnapdiffError::Config(err.to_string()), format, None);
    }
    ExitCode::SUCCESS
}

/// A file holds either one record object or an array of records.
fn read_records(path: &Path) -> Result<Vec<SnapshotRecord>, SnapdiffError> {
    let content = std::fs::read_to_string(path)?;
    let value: serde_json::Value = serde_json::from_str(&content).map_err(|e| {
        SnapdiffError::store(format!("failed to parse {}: {e}", path.display()))
    })?;
    let parsed: serde_json::Result<Vec<SnapshotRecord>> = if value.is_array() {
        serde_json::from_value(value)
    } else {
        serde_json::from_value::<SnapshotRecord>(value).map(|record| vec![record])
    };
    parsed.map_err(|e| SnapdiffError::store(format!("invalid snapshot record in {}: {e}", path.display())))
}
