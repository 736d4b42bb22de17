//! Encoder tuning.
//!
//! libx264 and NVENC expose different quality knobs (CRF vs CQ, no AQ flags
//! on the software side), so each gets its own independently tuned profile.

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

/// libx264 settings used for clips, the dissolve pass and the final mux
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct X264Config {
    /// x264 preset name (ultrafast..placebo)
    #[serde(default = "default_x264_preset")]
    pub preset: String,

    /// Constant rate factor for intermediate clips (0-51, lower = better)
    #[serde(default = "default_quality")]
    pub crf: u32,

    /// Encoder thread count. `None` lets ffmpeg decide.
    #[serde(default)]
    pub threads: Option<u32>,
}

/// NVIDIA h264_nvenc settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NvencConfig {
    /// NVENC preset (p1 = fastest .. p7 = best quality)
    #[serde(default = "default_nvenc_preset")]
    pub preset: String,

    /// Constant quality target for intermediate clips (0-51, lower = better)
    #[serde(default = "default_quality")]
    pub cq: u32,

    /// GPU index passed as `-gpu`
    #[serde(default)]
    pub gpu: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncoderSettings {
    #[serde(default)]
    pub software: X264Config,
    #[serde(default)]
    pub nvenc: NvencConfig,
}

fn default_x264_preset() -> String {
    "fast".to_string()
}

fn default_nvenc_preset() -> String {
    "p4".to_string()
}

fn default_quality() -> u32 {
    18
}

impl Default for X264Config {
    fn default() -> Self {
        Self {
            preset: default_x264_preset(),
            crf: default_quality(),
            threads: None,
        }
    }
}

impl Default for NvencConfig {
    fn default() -> Self {
        Self {
            preset: default_nvenc_preset(),
            cq: default_quality(),
            gpu: 0,
        }
    }
}

impl EncoderSettings {
    /// Reject values ffmpeg would refuse at encode time.
    pub fn validate(&self) -> Result<()> {
        if self.software.crf > 51 {
            bail!("x264 crf must be 0-51, got {}", self.software.crf);
        }
        if self.nvenc.cq > 51 {
            bail!("nvenc cq must be 0-51, got {}", self.nvenc.cq);
        }
        if self.software.threads == Some(0) {
            bail!("x264 threads must be at least 1 (omit it for auto)");
        }
        let p = self.nvenc.preset.as_str();
        if !matches!(p, "p1" | "p2" | "p3" | "p4" | "p5" | "p6" | "p7") {
            bail!("nvenc preset must be p1-p7, got '{}'", p);
        }
        Ok(())
    }
}
