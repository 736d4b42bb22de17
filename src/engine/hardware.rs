//! NVIDIA NVENC detection and encoder backend selection

use std::time::Duration;

use crate::engine::core::{
    BackendPreference, EncoderBackend, HARDWARE_VIDEO_CODEC, SOFTWARE_VIDEO_CODEC,
    nvenc_probe_command,
};
use crate::engine::runner::ProcessRunner;

/// Default bound on the NVENC probe encode
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

impl EncoderBackend {
    /// Get the FFmpeg encoder name
    pub fn ffmpeg_name(&self) -> &'static str {
        match self {
            Self::Hardware => HARDWARE_VIDEO_CODEC,
            Self::Software => SOFTWARE_VIDEO_CODEC,
        }
    }

    /// Check if this is a hardware encoder
    pub fn is_hardware(&self) -> bool {
        matches!(self, Self::Hardware)
    }

    /// Get user-friendly display name
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Hardware => "GPU (NVENC)",
            Self::Software => "CPU (libx264)",
        }
    }
}

/// Check if h264_nvenc actually works right now.
///
/// Being listed by `ffmpeg -encoders` is not enough: builds ship nvenc even
/// on machines without a usable NVIDIA driver. A tiny real encode is the only
/// reliable answer. Launch errors, non-zero exit and timeouts all count as
/// unavailable. Not cached: driver state can change between jobs.
pub fn check_nvenc_available(runner: &dyn ProcessRunner, ffmpeg: &str, timeout: Duration) -> bool {
    match runner.run(&nvenc_probe_command(ffmpeg), Some(timeout)) {
        Ok(output) if output.is_success() => true,
        Ok(output) => {
            tracing::info!(
                exit_code = ?output.exit_code,
                "nvenc probe failed, hardware encoding unavailable"
            );
            false
        }
        Err(e) => {
            tracing::info!(error = %e, "nvenc probe did not complete");
            false
        }
    }
}

/// Pick the backend for one job.
pub fn select_backend(
    runner: &dyn ProcessRunner,
    ffmpeg: &str,
    preference: BackendPreference,
    timeout: Duration,
) -> EncoderBackend {
    match preference {
        BackendPreference::Software => EncoderBackend::Software,
        BackendPreference::Auto => {
            if check_nvenc_available(runner, ffmpeg, timeout) {
                EncoderBackend::Hardware
            } else {
                EncoderBackend::Software
            }
        }
    }
}
