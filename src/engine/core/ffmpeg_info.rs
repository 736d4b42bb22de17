use crate::engine::runner::{ProcessRunner, ToolCommand};
use anyhow::{Context, Result};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DurationField {
    Text(String),
    Number(f64),
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<DurationField>,
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
}

fn tool_version(runner: &dyn ProcessRunner, program: &str) -> Result<String> {
    let mut cmd = ToolCommand::new(program);
    cmd.arg("-version");

    let output = runner
        .run(&cmd, None)
        .with_context(|| format!("Failed to execute {}. Is it installed and in PATH?", program))?;

    if !output.is_success() {
        anyhow::bail!("{} -version failed with exit code {:?}", program, output.exit_code);
    }

    let first_line = output.stdout.lines().next().unwrap_or("Unknown version");
    Ok(first_line.to_string())
}

/// Check if ffmpeg is available and return its version line
pub fn ffmpeg_version(runner: &dyn ProcessRunner, ffmpeg: &str) -> Result<String> {
    tool_version(runner, ffmpeg)
}

/// Check if ffprobe is available and return its version line
pub fn ffprobe_version(runner: &dyn ProcessRunner, ffprobe: &str) -> Result<String> {
    tool_version(runner, ffprobe)
}

/// Tool availability as a plain yes/no.
pub fn tool_available(runner: &dyn ProcessRunner, program: &str) -> bool {
    tool_version(runner, program).is_ok()
}

/// Parse `format.duration` from `ffprobe -print_format json -show_format`.
/// ffprobe prints it as a string; a bare number is accepted too.
pub fn parse_ffprobe_duration(json: &str) -> Result<f64> {
    let probe: FfprobeOutput =
        serde_json::from_str(json).context("Failed to parse ffprobe JSON")?;

    let duration = match probe.format.duration.context("No duration found in JSON")? {
        DurationField::Text(s) => s
            .trim()
            .parse::<f64>()
            .context("Failed to parse duration as float")?,
        DurationField::Number(n) => n,
    };

    if !duration.is_finite() {
        anyhow::bail!("Duration is not a finite number");
    }
    Ok(duration)
}
