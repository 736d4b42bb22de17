use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "stillcut")]
#[command(
    about = "Turn a folder of images and one audio track into a 1080p video",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// More log output on stderr (-v info, -vv debug). RUST_LOG overrides.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Render a video from a folder of images and an audio file
    Render(JobArgs),

    /// Show the ffmpeg commands a render would run, without running them
    DryRun(JobArgs),

    /// Check if ffmpeg and ffprobe are installed
    CheckFfmpeg,

    /// Check whether NVENC hardware encoding works on this machine
    CheckNvenc,

    /// Probe an audio file to get its duration
    Probe {
        /// Path to the audio file
        file: PathBuf,
    },

    /// List the images a render would use, in order
    Scan {
        /// Image folder
        directory: PathBuf,
    },

    /// Show config status and location, or create default config if missing
    InitConfig,
}

#[derive(Args, Debug, Clone)]
pub struct JobArgs {
    /// Folder containing the images (not searched recursively)
    #[arg(value_name = "IMAGES_DIR")]
    pub images: PathBuf,

    /// Audio track; its length sets the video length
    #[arg(value_name = "AUDIO")]
    pub audio: PathBuf,

    /// Output file, or a directory to put it in
    #[arg(short, long, value_name = "OUTPUT")]
    pub output: Option<PathBuf>,

    /// Slow zoom-in on each image
    #[arg(long)]
    pub zoom: bool,

    /// Fill the letterbox bars with a blurred copy of the image
    #[arg(long = "blur-bg")]
    pub blur_bg: bool,

    /// Dissolve between images instead of hard cuts
    #[arg(long)]
    pub dissolve: bool,

    /// Skip the NVENC probe and encode with libx264
    #[arg(long)]
    pub software: bool,
}

pub fn parse() -> Cli {
    Cli::parse()
}
