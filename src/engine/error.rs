//! Pipeline failures.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::engine::runner::ToolOutput;

/// Longest stderr excerpt carried in an error message
pub const MAX_DIAGNOSTIC_CHARS: usize = 500;

/// Where in the job a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Detected before any rendering started
    Precondition,
    Render,
    Assembly,
    Mux,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("ffmpeg was not found ({program}). Install ffmpeg and make sure it is on PATH")]
    ToolMissing { program: String },

    #[error("could not read image folder {}: {source}", .path.display())]
    ImageDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("no images found in {}", .0.display())]
    NoImages(PathBuf),

    #[error("could not read audio file {} (no usable duration)", .0.display())]
    UnreadableAudio(PathBuf),

    #[error(
        "each image is shown for {per_image:.2}s, not longer than the {dissolve:.2}s dissolve; use fewer images, longer audio, or disable dissolve"
    )]
    ImagesTooShortForDissolve { per_image: f64, dissolve: f64 },

    #[error("could not create job workspace: {0}")]
    Workspace(#[source] io::Error),

    #[error("failed to render {image}: {detail}")]
    Render { image: String, detail: String },

    #[error("failed to assemble timeline: {0}")]
    Assembly(String),

    #[error("failed to write final video: {0}")]
    Mux(String),
}

impl PipelineError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ToolMissing { .. }
            | Self::ImageDir { .. }
            | Self::NoImages(_)
            | Self::UnreadableAudio(_)
            | Self::ImagesTooShortForDissolve { .. }
            | Self::Workspace(_) => ErrorCategory::Precondition,
            Self::Render { .. } => ErrorCategory::Render,
            Self::Assembly(_) => ErrorCategory::Assembly,
            Self::Mux(_) => ErrorCategory::Mux,
        }
    }
}

/// Last `max_chars` characters of `text`, where ffmpeg puts the actual error.
pub fn diagnostic_excerpt(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim();
    let count = trimmed.chars().count();
    if count <= max_chars {
        return trimmed.to_string();
    }
    trimmed.chars().skip(count - max_chars).collect()
}

/// `None` if the tool ran and succeeded, otherwise a one-line description
/// with a bounded stderr excerpt.
pub fn tool_failure(result: &io::Result<ToolOutput>, program: &str) -> Option<String> {
    match result {
        Ok(output) if output.is_success() => None,
        Ok(output) => {
            let excerpt = diagnostic_excerpt(&output.stderr, MAX_DIAGNOSTIC_CHARS);
            let status = match output.exit_code {
                Some(code) => format!("{} exited with code {}", program, code),
                None => format!("{} was terminated by a signal", program),
            };
            if excerpt.is_empty() {
                Some(status)
            } else {
                Some(format!("{}: {}", status, excerpt))
            }
        }
        Err(e) => Some(format!("failed to run {}: {}", program, e)),
    }
}
