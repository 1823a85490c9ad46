use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "snapdiff")]
#[command(
    version,
    about = "Snapdiff - pixel and DOM-element regression reports between two UI capture runs",
    long_about = "Snapdiff\n\nCommands:\n- report: diff two capture runs (by capture time) into a story/state/snapshot report.\n- ingest: add captured snapshot records to the store.\n- captures / records: inspect what the store holds.\n- compare-images: ad-hoc pixel diff of two image files.\n\nUse --help on any subcommand for details."
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, global = true, help = "Enable verbose (debug) logging on stderr")]
    pub verbose: bool,

    #[arg(
        long,
        global = true,
        value_name = "PATH",
        help = "Optional config file (TOML) for storage paths, diff tolerance, ignored names and worker counts; CLI flags override config"
    )]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Diff two capture runs into a report
    Report {
        #[arg(long, help = "Capture time of the new run (RFC 3339)")]
        actual: String,

        #[arg(long, help = "Capture time of the baseline run (RFC 3339)")]
        expected: String,

        #[arg(long, help = "Recompute even when a cached report exists")]
        reload: bool,

        #[arg(
            long,
            default_value = "0",
            value_name = "N",
            help = "Per-channel RGBA tolerance (0-255); 0 flags any difference"
        )]
        rgb: u8,

        #[arg(long, value_enum, default_value = "json", help = "Output format")]
        format: OutputFormat,

        #[arg(long, short, help = "Output file path (stdout if omitted)")]
        output: Option<PathBuf>,
    },

    /// Upsert snapshot records from JSON files (object or array per file)
    Ingest {
        #[arg(required = true, value_name = "FILE")]
        files: Vec<PathBuf>,

        #[arg(long, value_enum, default_value = "json", help = "Output format")]
        format: OutputFormat,
    },

    /// List capture times with their record counts
    Captures {
        #[arg(long, value_enum, default_value = "json", help = "Output format")]
        format: OutputFormat,
    },

    /// List records captured at one time
    Records {
        #[arg(long, help = "Capture time (RFC 3339)")]
        at: String,

        #[arg(long, value_enum, default_value = "json", help = "Output format")]
        format: OutputFormat,

        #[arg(long, short, help = "Output file path (stdout if omitted)")]
        output: Option<PathBuf>,
    },

    /// Pixel-diff two image files
    CompareImages {
        #[arg(long, help = "New image")]
        actual: PathBuf,

        #[arg(long, help = "Baseline image")]
        expected: PathBuf,

        #[arg(
            long,
            default_value = "0",
            value_name = "N",
            help = "Per-channel RGBA tolerance (0-255); 0 flags any difference"
        )]
        rgb: u8,

        #[arg(long, help = "Do not write a diff image")]
        no_artifact: bool,

        #[arg(long, value_enum, default_value = "json", help = "Output format")]
        format: OutputFormat,

        #[arg(long, short, help = "Output file path (stdout if omitted)")]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Json,
    Pretty,
}

pub fn parse() -> Cli {
    Cli::parse()
}

#[cfg(test)]
mod tests {
    use super::{Cli, Commands, OutputFormat};
    use clap::Parser;

    #[test]
    fn report_command_uses_defaults() {
        let cli = Cli::parse_from([
            "snapdiff",
            "report",
            "--actual",
            "2018-05-01T11:00:00Z",
            "--expected",
            "2018-05-01T10:00:00Z",
        ]);

        assert!(!cli.verbose);
        assert!(cli.config.is_none());

        match cli.command {
            Commands::Report {
                actual,
                expected,
                reload,
                rgb,
                format,
                output,
            } => {
                assert_eq!(actual, "2018-05-01T11:00:00Z");
                assert_eq!(expected, "2018-05-01T10:00:00Z");
                assert!(!reload);
                assert_eq!(rgb, 0);
                assert!(matches!(format, OutputFormat::Json));
                assert!(output.is_none());
            }
            _ => panic!("expected report command"),
        }
    }

    #[test]
    fn report_command_respects_overrides() {
        let cli = Cli::parse_from([
            "snapdiff",
            "report",
            "--actual",
            "a",
            "--expected",
            "e",
            "--reload",
            "--rgb",
            "12",
            "--format",
            "pretty",
            "--output",
            "report.json",
            "--config",
            "snapdiff.toml",
        ]);

        assert_eq!(
            cli.config.as_deref(),
            Some(std::path::Path::new("snapdiff.toml"))
        );
        match cli.command {
            Commands::Report {
                reload,
                rgb,
                format,
                output,
                ..
            } => {
                assert!(reload);
                assert_eq!(rgb, 12);
                assert!(matches!(format, OutputFormat::Pretty));
                assert_eq!(output.as_deref(), Some(std::path::Path::new("report.json")));
            }
            _ => panic!("expected report command with overrides"),
        }
    }

    #[test]
    fn rgb_above_255_is_rejected() {
        let parsed = Cli::try_parse_from([
            "snapdiff",
            "compare-images",
            "--actual",
            "a.png",
            "--expected",
            "e.png",
            "--rgb",
            "256",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn ingest_requires_files_and_sets_verbose() {
        assert!(Cli::try_parse_from(["snapdiff", "ingest"]).is_err());

        let cli = Cli::parse_from(["snapdiff", "--verbose", "ingest", "a.json", "b.json"]);
        assert!(cli.verbose);
        match cli.command {
            Commands::Ingest { files, .. } => assert_eq!(files.len(), 2),
            _ => panic!("expected ingest command"),
        }
    }
}
