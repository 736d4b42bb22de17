// Audio probing using ffprobe

use crate::engine::core::parse_ffprobe_duration;
use crate::engine::runner::{ProcessRunner, ToolCommand};
use std::path::{Path, PathBuf};

/// The job's audio input and its probed length.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioTrack {
    pub path: PathBuf,
    pub duration_secs: f64,
}

impl AudioTrack {
    pub fn is_readable(&self) -> bool {
        self.duration_secs > 0.0
    }
}

pub fn ffprobe_format_command(ffprobe: &str, path: &Path) -> ToolCommand {
    let mut cmd = ToolCommand::new(ffprobe);
    cmd.args(["-v", "quiet", "-print_format", "json", "-show_format"]);
    cmd.arg(path);
    cmd
}

/// Probe an audio file's duration in seconds.
///
/// Never fails: a launch error, unparseable output or a missing field all
/// yield `0.0`, which callers treat as "unreadable".
pub fn probe_audio_duration(runner: &dyn ProcessRunner, ffprobe: &str, path: &Path) -> f64 {
    let output = match runner.run(&ffprobe_format_command(ffprobe, path), None) {
        Ok(output) => output,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to run ffprobe");
            return 0.0;
        }
    };

    // Exit status is not checked: an unreadable file prints no duration anyway
    match parse_ffprobe_duration(&output.stdout) {
        Ok(duration) if duration > 0.0 => duration,
        Ok(_) => 0.0,
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %format!("{:#}", e),
                "no usable duration from ffprobe"
            );
            0.0
        }
    }
}

pub fn probe_audio_track(runner: &dyn ProcessRunner, ffprobe: &str, path: &Path) -> AudioTrack {
    AudioTrack {
        path: path.to_path_buf(),
        duration_secs: probe_audio_duration(runner, ffprobe, path),
    }
}

/// `m:ss` rendering of a duration, as shown to users.
pub fn format_clock(secs: f64) -> String {
    let total = if secs.is_finite() && secs > 0.0 {
        secs as u64
    } else {
        0
    };
    format!("{}:{:02}", total / 60, total % 60)
}
