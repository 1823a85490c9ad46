use std::path::PathBuf;
use std::process::ExitCode;

use snapdiff_lib::{
    CapturesOutput, FileStore, SnapdiffError, SnapdiffOutput, SnapshotStore,
    SNAPDIFF_OUTPUT_VERSION,
};

use crate::cli::OutputFormat;
use crate::formatting::{render_error, write_output};
use crate::settings::load_config;

/// Run the captures command.
pub async fn run_captures(config_path: Option<PathBuf>, format: OutputFormat) -> ExitCode {
    let config = match load_config(config_path.as_deref()) {
        Ok(cfg) => cfg,
        Err(err) => return render_error(err, format, None),
    };
    let captures = match FileStore::open(config.storage.snapshots_path())
        .and_then(|store| store.capture_times())
    {
        Ok(captures) => captures,
        Err(err) => return render_error(err, format, None),
    };
    let body = SnapdiffOutput::Captures(CapturesOutput {
        version: SNAPDIFF_OUTPUT_VERSION.to_string(),
        captures,
    });
    if let Err(err) = write_output(&body, format, None) {
        return render_error(SnapdiffError::Config(err.to_string()), format, None);
    }
    ExitCode::SUCCESS
}
