//! Typed ffmpeg invocations, one spec struct per pipeline step.
//!
//! Each spec turns into exactly one [`ToolCommand`]. Nothing here spawns a
//! process, so every branch can be asserted on directly.

use super::hw_config::EncoderSettings;
use super::types::{EncoderBackend, OUTPUT_FPS, OUTPUT_HEIGHT, OUTPUT_WIDTH};
use crate::engine::runner::ToolCommand;
use std::path::{Path, PathBuf};

/// Final video bitrate target and cap, in kbit/s
pub const OUTPUT_VIDEO_KBPS: u32 = 10_000;
/// Rate-control buffer for the final encode, in kbit/s
pub const OUTPUT_BUFSIZE_KBPS: u32 = 20_000;
pub const OUTPUT_AUDIO_CODEC: &str = "aac";
pub const OUTPUT_AUDIO_KBPS: u32 = 320;
pub const OUTPUT_AUDIO_RATE: u32 = 48_000;

pub const SOFTWARE_VIDEO_CODEC: &str = "libx264";
pub const HARDWARE_VIDEO_CODEC: &str = "h264_nvenc";

/// Seconds as ffmpeg reads them. Full precision so N clips add up to the
/// audio length.
pub fn format_secs(secs: f64) -> String {
    format!("{}", secs)
}

/// Video codec arguments for intermediate encodes (clips, dissolve pass):
/// quality-targeted, no bitrate.
pub fn intermediate_video_args(backend: EncoderBackend, settings: &EncoderSettings) -> Vec<String> {
    let mut args = Vec::new();
    match backend {
        EncoderBackend::Hardware => {
            let nv = &settings.nvenc;
            args.extend([
                "-c:v".to_string(),
                HARDWARE_VIDEO_CODEC.to_string(),
                "-preset".to_string(),
                nv.preset.clone(),
                "-cq".to_string(),
                nv.cq.to_string(),
                "-gpu".to_string(),
                nv.gpu.to_string(),
            ]);
        }
        EncoderBackend::Software => {
            let sw = &settings.software;
            if let Some(threads) = sw.threads {
                args.push("-threads".to_string());
                args.push(threads.to_string());
            }
            args.extend([
                "-c:v".to_string(),
                SOFTWARE_VIDEO_CODEC.to_string(),
                "-preset".to_string(),
                sw.preset.clone(),
                "-crf".to_string(),
                sw.crf.to_string(),
            ]);
        }
    }
    args
}

/// Video codec arguments for the final encode: constant 10 Mbit/s target.
/// NVENC additionally gets CBR rate control and spatial/temporal AQ.
pub fn output_video_args(backend: EncoderBackend, settings: &EncoderSettings) -> Vec<String> {
    let rate = format!("{}k", OUTPUT_VIDEO_KBPS);
    let bufsize = format!("{}k", OUTPUT_BUFSIZE_KBPS);
    let mut args = Vec::new();
    match backend {
        EncoderBackend::Hardware => {
            let nv = &settings.nvenc;
            args.extend([
                "-c:v".to_string(),
                HARDWARE_VIDEO_CODEC.to_string(),
                "-preset".to_string(),
                nv.preset.clone(),
                "-tune".to_string(),
                "hq".to_string(),
                "-rc".to_string(),
                "cbr".to_string(),
                "-b:v".to_string(),
                rate.clone(),
                "-maxrate".to_string(),
                rate,
                "-bufsize".to_string(),
                bufsize,
                "-spatial_aq".to_string(),
                "1".to_string(),
                "-temporal_aq".to_string(),
                "1".to_string(),
                "-gpu".to_string(),
                nv.gpu.to_string(),
            ]);
        }
        EncoderBackend::Software => {
            let sw = &settings.software;
            if let Some(threads) = sw.threads {
                args.push("-threads".to_string());
                args.push(threads.to_string());
            }
            args.extend([
                "-c:v".to_string(),
                SOFTWARE_VIDEO_CODEC.to_string(),
                "-preset".to_string(),
                sw.preset.clone(),
                "-b:v".to_string(),
                rate.clone(),
                "-maxrate".to_string(),
                rate,
                "-bufsize".to_string(),
                bufsize,
            ]);
        }
    }
    args
}

/// Minimal real NVENC encode of a synthetic source. Exits 0 only when a
/// usable device and driver are present, not merely when ffmpeg was built
/// with nvenc.
pub fn nvenc_probe_command(ffmpeg: &str) -> ToolCommand {
    let mut cmd = ToolCommand::new(ffmpeg);
    cmd.args([
        "-hide_banner",
        "-f",
        "lavfi",
        "-i",
        "nullsrc=s=64x64:d=0.1",
        "-c:v",
        HARDWARE_VIDEO_CODEC,
        "-f",
        "null",
        "-",
    ]);
    cmd
}

/// One still image looped into one silent fixed-length clip.
#[derive(Debug, Clone)]
pub struct ClipRenderSpec<'a> {
    pub image: &'a Path,
    pub duration_secs: f64,
    pub filter_graph: &'a str,
    pub fps: u32,
    pub backend: EncoderBackend,
    pub encoder: &'a EncoderSettings,
    pub output: &'a Path,
}

impl ClipRenderSpec<'_> {
    pub fn to_command(&self, ffmpeg: &str) -> ToolCommand {
        let mut cmd = ToolCommand::new(ffmpeg);
        cmd.args(["-y", "-loop", "1", "-i"]);
        cmd.arg(self.image);
        cmd.arg("-t").arg(format_secs(self.duration_secs));
        cmd.arg("-vf").arg(self.filter_graph);
        cmd.arg("-r").arg(self.fps.to_string());
        cmd.args(intermediate_video_args(self.backend, self.encoder));
        cmd.arg("-an");
        cmd.arg(self.output);
        cmd
    }
}

/// Concat demuxer manifest: one `file '...'` line per clip, in order.
/// Backslashes become forward slashes and single quotes are escaped the way
/// the demuxer expects (`'\''`).
pub fn concat_manifest(clips: &[PathBuf]) -> String {
    let mut out = String::new();
    for clip in clips {
        let escaped = clip
            .to_string_lossy()
            .replace('\\', "/")
            .replace('\'', "'\\''");
        out.push_str(&format!("file '{}'\n", escaped));
    }
    out
}

/// Lossless stream-copy join of the clips listed in a manifest.
#[derive(Debug, Clone)]
pub struct ConcatSpec<'a> {
    pub manifest: &'a Path,
    pub output: &'a Path,
}

impl ConcatSpec<'_> {
    pub fn to_command(&self, ffmpeg: &str) -> ToolCommand {
        let mut cmd = ToolCommand::new(ffmpeg);
        cmd.args(["-y", "-f", "concat", "-safe", "0", "-i"]);
        cmd.arg(self.manifest);
        cmd.args(["-c", "copy"]);
        cmd.arg(self.output);
        cmd
    }
}

/// Start time of each cross-fade in the growing timeline.
///
/// With `count` clips there are `count - 1` fades; fade `i` starts at
/// `(P - D) + i * (P - D)`. Callers guarantee `P > D`.
pub fn crossfade_offsets(duration_per_image: f64, dissolve_secs: f64, count: usize) -> Vec<f64> {
    let step = duration_per_image - dissolve_secs;
    (0..count.saturating_sub(1))
        .map(|i| step + i as f64 * step)
        .collect()
}

/// `-filter_complex` chaining `xfade` over every input in order. The last
/// stage is left unlabeled so it becomes the output stream.
pub fn build_crossfade_graph(duration_per_image: f64, dissolve_secs: f64, count: usize) -> String {
    let offsets = crossfade_offsets(duration_per_image, dissolve_secs, count);
    let last = offsets.len().saturating_sub(1);

    offsets
        .iter()
        .enumerate()
        .map(|(i, offset)| {
            let input = if i == 0 {
                "[0:v]".to_string()
            } else {
                format!("[v{}]", i)
            };
            let output = if i == last {
                String::new()
            } else {
                format!("[v{}]", i + 1)
            };
            format!(
                "{}[{}:v]xfade=transition=fade:duration={}:offset={}{}",
                input,
                i + 1,
                format_secs(dissolve_secs),
                format_secs(*offset),
                output
            )
        })
        .collect::<Vec<_>>()
        .join(";")
}

/// Re-encode all clips into one silent timeline joined by dissolves.
#[derive(Debug, Clone)]
pub struct CrossfadeSpec<'a> {
    pub clips: &'a [PathBuf],
    pub duration_per_image: f64,
    pub dissolve_secs: f64,
    pub backend: EncoderBackend,
    pub encoder: &'a EncoderSettings,
    pub output: &'a Path,
}

impl CrossfadeSpec<'_> {
    pub fn to_command(&self, ffmpeg: &str) -> ToolCommand {
        let mut cmd = ToolCommand::new(ffmpeg);
        cmd.arg("-y");
        for clip in self.clips {
            cmd.arg("-i").arg(clip);
        }
        cmd.arg("-filter_complex").arg(build_crossfade_graph(
            self.duration_per_image,
            self.dissolve_secs,
            self.clips.len(),
        ));
        cmd.args(intermediate_video_args(self.backend, self.encoder));
        cmd.arg("-an");
        cmd.arg(self.output);
        cmd
    }
}

/// Silent timeline + audio track -> delivered file at the output profile.
#[derive(Debug, Clone)]
pub struct MuxSpec<'a> {
    pub video: &'a Path,
    pub audio: &'a Path,
    pub backend: EncoderBackend,
    pub encoder: &'a EncoderSettings,
    /// User-supplied arguments placed just before the output path
    pub extra_args: &'a [String],
    pub output: &'a Path,
}

impl MuxSpec<'_> {
    pub fn to_command(&self, ffmpeg: &str) -> ToolCommand {
        let mut cmd = ToolCommand::new(ffmpeg);
        cmd.arg("-y");
        cmd.arg("-i").arg(self.video);
        cmd.arg("-i").arg(self.audio);
        cmd.args(output_video_args(self.backend, self.encoder));
        cmd.arg("-r").arg(OUTPUT_FPS.to_string());
        cmd.arg("-s").arg(format!("{}x{}", OUTPUT_WIDTH, OUTPUT_HEIGHT));
        cmd.arg("-c:a").arg(OUTPUT_AUDIO_CODEC);
        cmd.arg("-b:a").arg(format!("{}k", OUTPUT_AUDIO_KBPS));
        cmd.arg("-ar").arg(OUTPUT_AUDIO_RATE.to_string());
        cmd.args(["-map", "0:v:0", "-map", "1:a:0", "-shortest"]);
        cmd.args(self.extra_args.iter().cloned());
        cmd.arg(self.output);
        cmd
    }
}
