use std::path::PathBuf;
use std::process::ExitCode;

use snapdiff_lib::{
    compare_files, ArtifactStore, CompareImagesOutput, SnapdiffError, SnapdiffOutput,
    SNAPDIFF_OUTPUT_VERSION,
};
use tracing::debug;

use crate::cli::OutputFormat;
use crate::formatting::{exit_code_for_differences, render_error, write_output};
use crate::settings::{load_config, resolve_diff_settings, DiffFlagSources};

/// Run the compare-images command.
#[allow(clippy::too_many_arguments)]
pub async fn run_compare_images(
    raw_args: &[String],
    config_path: Option<PathBuf>,
    actual: PathBuf,
    expected: PathBuf,
    rgb: u8,
    no_artifact: bool,
    format: OutputFormat,
    output: Option<PathBuf>,
) -> ExitCode {
    let config = match load_config(config_path.as_deref()) {
        Ok(cfg) => cfg,
        Err(err) => return render_error(err, format, output),
    };
    let settings = resolve_diff_settings(rgb, &config, &DiffFlagSources::from_args(raw_args));
    let artifacts = (!no_artifact).then(|| {
        ArtifactStore::new(config.storage.reports_path(), config.links.base_url.clone())
    });

    let (actual_path, expected_path) = (actual.clone(), expected.clone());
    let inaccuracy = settings.inaccuracy;
    let diff = tokio::task::spawn_blocking(move || {
        compare_files(&actual_path, &expected_path, inaccuracy, artifacts.as_ref())
    })
    .await
    .unwrap_or_else(|e| Err(SnapdiffError::Compare(format!("image comparison aborted: {e}"))));
    let diff = match diff {
        Ok(diff) => diff,
        Err(err) => return render_error(err, format, output),
    };
    debug!(
        diff_pixels = diff.diff_pixels,
        percentage = diff.percentage,
        "compared image files"
    );

    let body = SnapdiffOutput::CompareImages(CompareImagesOutput {
        version: SNAPDIFF_OUTPUT_VERSION.to_string(),
        actual: actual.display().to_string(),
        expected: expected.display().to_string(),
        inaccuracy,
        diff_pixels: diff.diff_pixels,
        diff_percentage: diff.percentage,
        diff_image: diff.artifact,
    });
    if let Err(err) = write_output(&body, format, output.clone()) {
        return render_error(SnapdiffError::Config(err.to_string()), format, output);
    }
    exit_code_for_differences(diff.diff_pixels > 0)
}
