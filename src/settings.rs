use std::path::Path;

use snapdiff_lib::{Config, SnapdiffError};

/// Tracks which CLI flags were explicitly provided vs. defaulted.
#[derive(Debug, Default)]
pub struct DiffFlagSources {
    pub rgb: bool,
}

impl DiffFlagSources {
    pub fn from_args(args: &[String]) -> Self {
        Self {
            rgb: flag_present(args, "--rgb"),
        }
    }
}

/// Checks if a flag was present in the command-line arguments.
pub fn flag_present(args: &[String], flag: &str) -> bool {
    args.iter()
        .any(|arg| arg == flag || arg.starts_with(&format!("{flag}=")))
}

/// Resolved settings after merging CLI args and config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedDiffSettings {
    pub inaccuracy: u8,
    pub report_workers: usize,
    pub element_workers: usize,
}

/// Merge CLI arguments with config file, preferring CLI when flags are present.
pub fn resolve_diff_settings(
    cli_rgb: u8,
    config: &Config,
    flags: &DiffFlagSources,
) -> ResolvedDiffSettings {
    ResolvedDiffSettings {
        inaccuracy: if flags.rgb {
            cli_rgb
        } else {
            config.diff.inaccuracy
        },
        report_workers: config.concurrency.report_workers,
        element_workers: config.concurrency.element_workers,
    }
}

/// Load config from a TOML file, central config, or return defaults.
/// Priority: explicit path > <config dir>/snapdiff/config.toml > defaults
pub fn load_config(path: Option<&Path>) -> Result<Config, SnapdiffError> {
    let cfg = Config::load(path).map_err(|e| {
        let loc = path
            .map(|p| p.display().to_string())
            .or_else(|| Config::central_config_path().map(|p| p.display().to_string()))
            .unwrap_or_else(|| "defaults".to_string());
        SnapdiffError::Config(format!("Failed to read config {}: {}", loc, e))
    })?;

    cfg.validate().map_err(|e| {
        let prefix = path
            .map(|p| format!("Invalid config ({}): {}", p.display(), e))
            .unwrap_or_else(|| format!("Invalid config: {}", e));
        SnapdiffError::Config(prefix)
    })?;
    Ok(cfg)
}

/// Format effective config as a single-line string.
pub fn format_effective_config(
    config: &Config,
    settings: &ResolvedDiffSettings,
    config_source: Option<&Path>,
) -> String {
    let source = config_source
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "defaults".to_string());
    format!(
        "Effective config [{source}]: root={}, images={}, reports={}, snapshots={}, rgb={}, ignored attributes=[{}], ignored css=[{}], workers: report={}, elements={}, base_url={}",
        config.storage.root.display(),
        config.storage.images_path().display(),
        config.storage.reports_path().display(),
        config.storage.snapshots_path().display(),
        settings.inaccuracy,
        config.diff.ignored_attributes.join(","),
        config.diff.ignored_css.join(","),
        settings.report_workers,
        settings.element_workers,
        config.links.base_url.as_deref().unwrap_or("none"),
    )
}
