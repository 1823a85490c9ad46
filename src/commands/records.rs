use std::path::PathBuf;
use std::process::ExitCode;

use snapdiff_lib::{
    format_capture_time, parse_capture_time, FileStore, RecordsOutput, SnapdiffError,
    SnapdiffOutput, SnapshotStore, SNAPDIFF_OUTPUT_VERSION,
};

use crate::cli::OutputFormat;
use crate::formatting::{render_error, write_output};
use crate::settings::load_config;

/// Run the records command.
pub async fn run_records(
    config_path: Option<PathBuf>,
    at: String,
    format: OutputFormat,
    output: Option<PathBuf>,
) -> ExitCode {
    let config = match load_config(config_path.as_deref()) {
        Ok(cfg) => cfg,
        Err(err) => return render_error(err, format, output),
    };
    let captured_at = match parse_capture_time(&at) {
        Ok(value) => value,
        Err(err) => return render_error(err, format, output),
    };
    let records = match FileStore::open(config.storage.snapshots_path())
        .and_then(|store| store.find(captured_at))
    {
        Ok(records) => records,
        Err(err) => return render_error(err, format, output),
    };
    let body = SnapdiffOutput::Records(RecordsOutput {
        version: SNAPDIFF_OUTPUT_VERSION.to_string(),
        captured_at: format_capture_time(captured_at),
        records,
    });
    if let Err(err) = write_output(&body, format, output.clone()) {
        return render_error(SnapdiffError::Config(err.to_string()), format, output);
    }
    ExitCode::SUCCESS
}
