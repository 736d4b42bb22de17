use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Output frame size. Every clip, the timeline and the final video use it.
pub const OUTPUT_WIDTH: u32 = 1920;
pub const OUTPUT_HEIGHT: u32 = 1080;
pub const OUTPUT_FPS: u32 = 30;

/// Zoom ramp goes from 1.0 to 1.0 + ZOOM_GAIN over a clip.
pub const ZOOM_GAIN: f64 = 0.1;

/// Nominal cross-fade length between consecutive images.
pub const DEFAULT_DISSOLVE_SECS: f64 = 1.0;

/// Visual treatment requested for a job. All combinations are valid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectConfig {
    #[serde(default)]
    pub zoom: bool,
    #[serde(default)]
    pub blur_background: bool,
    #[serde(default)]
    pub dissolve: bool,
}

impl fmt::Display for EffectConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if self.zoom {
            parts.push("zoom");
        }
        if self.blur_background {
            parts.push("blur-bg");
        }
        if self.dissolve {
            parts.push("dissolve");
        }
        if parts.is_empty() {
            write!(f, "none")
        } else {
            write!(f, "{}", parts.join("+"))
        }
    }
}

/// Video encoder path for one job. Chosen once, before any rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncoderBackend {
    Hardware,
    Software,
}

/// How the backend is chosen for each job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendPreference {
    /// Probe NVENC for every job and fall back to software if it fails
    #[default]
    Auto,
    /// Never probe; always use libx264
    Software,
}

/// What to do when an image is on screen no longer than the dissolve.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShortImagePolicy {
    /// Shrink the dissolve to half an image's duration for the whole job
    #[default]
    Clamp,
    /// Fail the job before rendering
    Reject,
}

impl ShortImagePolicy {
    /// Dissolve length to use when each image lasts `per_image` seconds, or
    /// `None` when the job has to be rejected.
    pub fn resolve(self, per_image: f64, nominal: f64) -> Option<f64> {
        if per_image > nominal {
            return Some(nominal);
        }
        match self {
            Self::Clamp => Some(per_image / 2.0),
            Self::Reject => None,
        }
    }
}

/// Per-image timing derived from the audio length.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimingPlan {
    pub duration_per_image: f64,
    pub frame_count: u32,
    pub fps: u32,
}

impl TimingPlan {
    /// Split `audio_duration` evenly across `image_count` images.
    /// Returns `None` when no positive per-image duration exists.
    pub fn new(audio_duration: f64, image_count: usize, fps: u32) -> Option<Self> {
        if image_count == 0 || !audio_duration.is_finite() || audio_duration <= 0.0 {
            return None;
        }
        let duration_per_image = audio_duration / image_count as f64;
        // zoompan divides by the frame count, so never let it reach zero
        let frame_count = ((duration_per_image * fps as f64).round() as u32).max(1);
        Some(Self {
            duration_per_image,
            frame_count,
            fps,
        })
    }

    /// Length of the timeline before the final `-shortest` trim.
    pub fn timeline_duration(&self, image_count: usize, dissolve_secs: Option<f64>) -> f64 {
        let plain = self.duration_per_image * image_count as f64;
        match dissolve_secs {
            Some(d) if image_count > 1 => plain - d * (image_count - 1) as f64,
            _ => plain,
        }
    }
}

/// Orchestrator states, in execution order, plus the terminal `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStage {
    Idle,
    CheckingTools,
    ResolvingInputs,
    ProbingAudio,
    SelectingBackend,
    RenderingClips,
    AssemblingTimeline,
    Muxing,
    Done,
    Failed,
}

impl JobStage {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Successor on the happy path. Terminal stages have none.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Idle => Some(Self::CheckingTools),
            Self::CheckingTools => Some(Self::ResolvingInputs),
            Self::ResolvingInputs => Some(Self::ProbingAudio),
            Self::ProbingAudio => Some(Self::SelectingBackend),
            Self::SelectingBackend => Some(Self::RenderingClips),
            Self::RenderingClips => Some(Self::AssemblingTimeline),
            Self::AssemblingTimeline => Some(Self::Muxing),
            Self::Muxing => Some(Self::Done),
            Self::Done | Self::Failed => None,
        }
    }
}

/// Human-readable progress emitted by the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressEvent {
    pub stage: JobStage,
    pub message: String,
}

impl ProgressEvent {
    pub fn new(stage: JobStage, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
        }
    }
}

/// Inputs of one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRequest {
    pub image_dir: PathBuf,
    pub audio_path: PathBuf,
    pub output_path: PathBuf,
    pub effects: EffectConfig,
}
