// Global configuration management

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::engine::{
    BackendPreference, DEFAULT_DISSOLVE_SECS, EffectConfig, EncoderSettings, JobSettings,
    NvencConfig, ShortImagePolicy, X264Config,
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub defaults: DefaultsConfig,

    #[serde(default)]
    pub encoder: EncoderConfig,

    #[serde(default)]
    pub transitions: TransitionsConfig,

    #[serde(default)]
    pub tools: ToolsConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Slow zoom-in on every image unless overridden on the command line
    #[serde(default)]
    pub zoom: bool,

    /// Fill letterbox bars with a blurred copy of the image
    #[serde(default)]
    pub blur_background: bool,

    /// Dissolve between images instead of hard cuts
    #[serde(default)]
    pub dissolve: bool,

    /// Appended to the audio file stem to name the output video
    #[serde(default = "default_output_suffix")]
    pub output_suffix: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncoderConfig {
    /// "auto" probes NVENC for each job, "software" always uses libx264
    #[serde(default)]
    pub backend: BackendPreference,

    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,

    #[serde(default)]
    pub software: X264Config,

    #[serde(default)]
    pub nvenc: NvencConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionsConfig {
    #[serde(default = "default_dissolve_secs")]
    pub dissolve_secs: f64,

    /// What to do when images are on screen no longer than the dissolve
    #[serde(default)]
    pub short_image_policy: ShortImagePolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg: String,

    #[serde(default = "default_ffprobe")]
    pub ffprobe: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Extra ffmpeg arguments for the final mux, shell-quoted
    /// (e.g. `-movflags +faststart`)
    #[serde(default)]
    pub extra_args: String,
}

fn default_output_suffix() -> String {
    "_video".to_string()
}

fn default_probe_timeout_secs() -> u64 {
    10
}

fn default_dissolve_secs() -> f64 {
    DEFAULT_DISSOLVE_SECS
}

fn default_ffmpeg() -> String {
    "ffmpeg".to_string()
}

fn default_ffprobe() -> String {
    "ffprobe".to_string()
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            zoom: false,
            blur_background: false,
            dissolve: false,
            output_suffix: default_output_suffix(),
        }
    }
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            backend: BackendPreference::Auto,
            probe_timeout_secs: default_probe_timeout_secs(),
            software: X264Config::default(),
            nvenc: NvencConfig::default(),
        }
    }
}

impl Default for TransitionsConfig {
    fn default() -> Self {
        Self {
            dissolve_secs: default_dissolve_secs(),
            short_image_policy: ShortImagePolicy::Clamp,
        }
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ffmpeg: default_ffmpeg(),
            ffprobe: default_ffprobe(),
        }
    }
}

impl EncoderConfig {
    pub fn settings(&self) -> EncoderSettings {
        EncoderSettings {
            software: self.software.clone(),
            nvenc: self.nvenc.clone(),
        }
    }
}

impl Config {
    /// Get the path to the config file
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = if cfg!(target_os = "macos") {
            dirs::home_dir()
                .context("Could not determine home directory")?
                .join(".config")
                .join("stillcut")
        } else {
            dirs::config_dir()
                .context("Could not determine config directory")?
                .join("stillcut")
        };

        Ok(config_dir.join("config.toml"))
    }

    /// Load config from disk. A missing file means built-in defaults.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            Ok(Config::default())
        }
    }

    /// Load and validate a specific config file
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&contents)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }

    /// Parse and validate config text
    pub fn parse(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents).context("Failed to parse config")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would only fail later inside ffmpeg.
    pub fn validate(&self) -> Result<()> {
        self.encoder.settings().validate().context("[encoder]")?;
        let dissolve = self.transitions.dissolve_secs;
        if !(dissolve.is_finite() && dissolve > 0.0) {
            bail!(
                "[transitions] dissolve_secs must be a positive number of seconds, got {}",
                dissolve
            );
        }
        if self.encoder.probe_timeout_secs == 0 {
            bail!("[encoder] probe_timeout_secs must be at least 1");
        }
        self.extra_output_args()?;
        Ok(())
    }

    /// `[output] extra_args` split into individual arguments
    pub fn extra_output_args(&self) -> Result<Vec<String>> {
        let raw = self.output.extra_args.trim();
        if raw.is_empty() {
            return Ok(Vec::new());
        }
        shlex::split(raw).with_context(|| {
            format!("[output] extra_args has unbalanced quotes: {}", raw)
        })
    }

    /// Effects used when the command line doesn't ask for any
    pub fn default_effects(&self) -> EffectConfig {
        EffectConfig {
            zoom: self.defaults.zoom,
            blur_background: self.defaults.blur_background,
            dissolve: self.defaults.dissolve,
        }
    }

    /// Per-job settings for the pipeline
    pub fn job_settings(&self) -> Result<JobSettings> {
        Ok(JobSettings {
            ffmpeg: self.tools.ffmpeg.clone(),
            ffprobe: self.tools.ffprobe.clone(),
            backend: self.encoder.backend,
            probe_timeout: Duration::from_secs(self.encoder.probe_timeout_secs),
            encoder: self.encoder.settings(),
            dissolve_secs: self.transitions.dissolve_secs,
            short_image_policy: self.transitions.short_image_policy,
            extra_output_args: self.extra_output_args()?,
            workspace_root: None,
        })
    }

    /// Save config to disk
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        // Create parent directory if it doesn't exist
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(&config_path, contents)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    /// Check if config file exists
    pub fn exists() -> bool {
        Self::config_path().map(|p| p.exists()).unwrap_or(false)
    }

    /// Create a default config file if it doesn't exist
    pub fn ensure_default() -> Result<()> {
        if !Self::exists() {
            let config = Config::default();
            config.save()?;
        }
        Ok(())
    }
}
