use std::fmt::Write as FmtWrite;
use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use snapdiff_lib::{
    DiffElement, ErrorOutput, ReportSummary, SnapdiffError, SnapdiffOutput,
    SNAPDIFF_OUTPUT_VERSION,
};

use crate::cli::OutputFormat;

/// Write output in the requested format.
pub fn write_output(
    body: &SnapdiffOutput,
    format: OutputFormat,
    output: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        OutputFormat::Json => write_json_output(body, output.as_deref())?,
        OutputFormat::Pretty => write_pretty_output(body, output.as_deref())?,
    };
    Ok(())
}

/// Render an error and return the appropriate exit code.
pub fn render_error(err: SnapdiffError, format: OutputFormat, output: Option<PathBuf>) -> ExitCode {
    tracing::debug!(error = ?err, "command failed");
    let error_payload = err.to_payload();
    let payload = SnapdiffOutput::Error(ErrorOutput {
        version: SNAPDIFF_OUTPUT_VERSION.to_string(),
        message: Some(error_payload.message.clone()),
        error: error_payload,
    });

    match format {
        OutputFormat::Json => {
            let content =
                serde_json::to_string(&payload).unwrap_or_else(|_| "{\"mode\":\"error\"}".into());
            if let Some(path) = output {
                if let Err(write_err) = std::fs::write(&path, &content) {
                    eprintln!("Failed to write error output: {}", write_err);
                    println!("{content}");
                }
            } else {
                println!("{content}");
            }
        }
        OutputFormat::Pretty => {
            if let Err(write_err) = write_pretty_output(&payload, output.as_deref()) {
                eprintln!("Failed to write error output: {}", write_err);
            }
        }
    };

    // Exit code 2 is fatal; differences found use 1.
    ExitCode::from(2)
}

fn write_json_output(
    body: &SnapdiffOutput,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let content = serde_json::to_string(body)?;
    if let Some(path) = output {
        std::fs::write(path, content)?;
    } else {
        println!("{content}");
    }
    Ok(())
}

fn write_pretty_output(body: &SnapdiffOutput, output: Option<&Path>) -> io::Result<()> {
    let stdout_is_tty = std::io::stdout().is_terminal();
    let use_human = output.is_none() && stdout_is_tty;

    if use_human {
        let content = format_pretty(body, true);
        println!("{content}");
        return Ok(());
    }

    // Non-tty or file output: keep JSON shape for pipelines/files.
    let content =
        serde_json::to_string_pretty(body).unwrap_or_else(|_| "{\"mode\":\"error\"}".to_string());
    if let Some(path) = output {
        std::fs::write(path, &content)?;
    } else {
        println!("{content}");
    }
    Ok(())
}

/// Format output for human consumption in a terminal.
pub fn format_pretty(body: &SnapdiffOutput, colorize: bool) -> String {
    let mut buf = String::new();
    match body {
        SnapdiffOutput::Report(out) => {
            let summary = &out.summary;
            let differs = summary.has_differences();
            let status = color(
                if differs { "DIFF" } else { "SAME" },
                if differs { "31" } else { "32" },
                colorize,
            );
            writeln!(
                buf,
                "{} {} vs {}{}",
                status,
                out.report.actual,
                out.report.expected,
                if out.cached { " (cached)" } else { "" }
            )
            .ok();
            writeln!(buf, "{}", summary_line(summary)).ok();

            for story in &out.report.stories {
                for state in &story.states {
                    for snapshot in &state.snapshots {
                        if !snapshot.has_pixel_diff()
                            && !snapshot.has_element_diff()
                            && !snapshot.has_error()
                        {
                            continue;
                        }
                        let pct = format!("{:.3}%", snapshot.diff_percentage);
                        writeln!(
                            buf,
                            "- {} / {} [{}] {}",
                            story.story,
                            state.state,
                            snapshot.browser,
                            color(&pct, percentage_color_code(snapshot.diff_percentage), colorize)
                        )
                        .ok();
                        if let Some(pixels) = &snapshot.pixels {
                            writeln!(buf, "    pixels: {pixels}").ok();
                        }
                        for element in &snapshot.elements {
                            writeln!(buf, "    {}", element_line(element)).ok();
                        }
                        if let Some(error) = &snapshot.error {
                            for line in error.lines() {
                                writeln!(buf, "    {} {}", color("!", "33", colorize), line).ok();
                            }
                        }
                    }
                }
            }
        }
        SnapdiffOutput::Ingest(out) => {
            let header = color("[INGEST]", "36", colorize);
            writeln!(
                buf,
                "{} {} inserted, {} updated",
                header, out.inserted, out.updated
            )
            .ok();
            for file in &out.files {
                writeln!(buf, "- {file}").ok();
            }
        }
        SnapdiffOutput::Captures(out) => {
            let header = color("[CAPTURES]", "34", colorize);
            writeln!(buf, "{} {} capture runs", header, out.captures.len()).ok();
            for capture in &out.captures {
                writeln!(
                    buf,
                    "- {}  {} records",
                    snapdiff_lib::format_capture_time(capture.captured_at),
                    capture.records
                )
                .ok();
            }
        }
        SnapdiffOutput::Records(out) => {
            let header = color("[RECORDS]", "34", colorize);
            writeln!(buf, "{} {} at {}", header, out.records.len(), out.captured_at).ok();
            for record in &out.records {
                writeln!(
                    buf,
                    "- {} / {} [{}] {}",
                    record.identity.story, record.identity.state, record.browser, record.image_path
                )
                .ok();
            }
        }
        SnapdiffOutput::CompareImages(out) => {
            let differs = out.diff_pixels > 0;
            let status = color(
                if differs { "DIFF" } else { "SAME" },
                if differs { "31" } else { "32" },
                colorize,
            );
            writeln!(buf, "{} {} vs {}", status, out.actual, out.expected).ok();
            writeln!(
                buf,
                "Differing pixels: {} ({:.3}%, rgb tolerance {})",
                out.diff_pixels, out.diff_percentage, out.inaccuracy
            )
            .ok();
            if let Some(image) = &out.diff_image {
                writeln!(buf, "Diff image: {image}").ok();
            }
        }
        SnapdiffOutput::Error(out) => {
            let header = color("[ERROR]", "31", colorize);
            let message = out
                .message
                .as_deref()
                .unwrap_or_else(|| out.error.message.as_str());
            writeln!(buf, "{} {}", header, message).ok();
            if let Some(remediation) = &out.error.remediation {
                writeln!(buf, "Hint: {}", remediation).ok();
            }
        }
    }
    buf
}

fn summary_line(summary: &ReportSummary) -> String {
    format!(
        "Snapshots: {} in {} stories, {} with pixel diffs (max {:.3}%), {} with element diffs, {} with errors",
        summary.snapshots,
        summary.stories,
        summary.pixel_diffs,
        summary.max_diff_percentage,
        summary.element_diffs,
        summary.errors
    )
}

fn element_line(element: &DiffElement) -> String {
    let tags: Vec<String> = element
        .diff
        .iter()
        .map(|tag| format!("{tag:?}").to_ascii_lowercase())
        .collect();
    if tags.is_empty() {
        format!("{}: {}", element.name, element.display.as_str())
    } else {
        format!(
            "{}: {} ({})",
            element.name,
            element.display.as_str(),
            tags.join(", ")
        )
    }
}

/// Apply ANSI color codes when enabled.
fn color(text: &str, code: &str, colorize: bool) -> String {
    if colorize {
        format!("\x1b[{}m{}\x1b[0m", code, text)
    } else {
        text.to_string()
    }
}

fn percentage_color_code(percentage: f64) -> &'static str {
    if percentage == 0.0 {
        "32" // green
    } else if percentage < 1.0 {
        "33" // yellow
    } else {
        "31" // red
    }
}

/// 0 when nothing differs, 1 when differences were found.
pub fn exit_code_for_differences(differs: bool) -> ExitCode {
    if differs {
        ExitCode::from(1)
    } else {
        ExitCode::SUCCESS
    }
}
