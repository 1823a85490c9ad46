use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use snapdiff_lib::{
    ArtifactStore, AssemblerOptions, FileStore, FsReportCache, ReportAssembler, ReportOutput,
    ReportRequest, SnapdiffError, SnapdiffOutput, SNAPDIFF_OUTPUT_VERSION,
};
use tracing::debug;

use crate::cli::OutputFormat;
use crate::formatting::{exit_code_for_differences, render_error, write_output};
use crate::settings::{format_effective_config, load_config, resolve_diff_settings, DiffFlagSources};

/// Run the report command.
#[allow(clippy::too_many_arguments)]
pub async fn run_report(
    raw_args: &[String],
    config_path: Option<PathBuf>,
    verbose: bool,
    actual: String,
    expected: String,
    reload: bool,
    rgb: u8,
    format: OutputFormat,
    output: Option<PathBuf>,
) -> ExitCode {
    let config = match load_config(config_path.as_deref()) {
        Ok(cfg) => cfg,
        Err(err) => return render_error(err, format, output),
    };
    let settings = resolve_diff_settings(rgb, &config, &DiffFlagSources::from_args(raw_args));
    if verbose {
        debug!(
            "{}",
            format_effective_config(&config, &settings, config_path.as_deref())
        );
    }

    let request = match ReportRequest::parse(&actual, &expected) {
        Ok(request) => request
            .with_inaccuracy(settings.inaccuracy)
            .with_reload(reload),
        Err(err) => return render_error(err, format, output),
    };

    let store = match FileStore::open(config.storage.snapshots_path()) {
        Ok(store) => store,
        Err(err) => return render_error(err, format, output),
    };
    let reports_dir = config.storage.reports_path();
    let mut options = AssemblerOptions::from_config(&config);
    options.report_workers = settings.report_workers;
    options.element_workers = settings.element_workers;
    let assembler = ReportAssembler::new(
        Arc::new(store),
        Arc::new(FsReportCache::new(&reports_dir)),
        Arc::new(ArtifactStore::new(&reports_dir, config.links.base_url.clone())),
        options,
    );

    let generated = match assembler.generate(request).await {
        Ok(generated) => generated,
        Err(err) => return render_error(err, format, output),
    };
    let summary = generated.report.summary();
    let differs = summary.has_differences();
    let body = SnapdiffOutput::Report(ReportOutput {
        version: SNAPDIFF_OUTPUT_VERSION.to_string(),
        cached: generated.cached,
        summary,
        report: generated.report,
    });
    if let Err(err) = write_output(&body, format, output.clone()) {
        return render_error(SnapdiffError::Config(err.to_string()), format, output);
    }
    exit_code_for_differences(differs)
}
