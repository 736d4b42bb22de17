mod ffmpeg_cmd;
mod ffmpeg_info;
mod filter_graph;
mod hw_config;
mod profile;
mod scan;
mod types;
mod workspace;

pub use ffmpeg_cmd::{
    ClipRenderSpec, ConcatSpec, CrossfadeSpec, HARDWARE_VIDEO_CODEC, MuxSpec, OUTPUT_AUDIO_CODEC,
    OUTPUT_AUDIO_KBPS, OUTPUT_AUDIO_RATE, OUTPUT_BUFSIZE_KBPS, OUTPUT_VIDEO_KBPS,
    SOFTWARE_VIDEO_CODEC, build_crossfade_graph, concat_manifest, crossfade_offsets, format_secs,
    intermediate_video_args, nvenc_probe_command, output_video_args,
};
pub use ffmpeg_info::{ffmpeg_version, ffprobe_version, parse_ffprobe_duration, tool_available};
pub use filter_graph::build_filter_graph;
pub use hw_config::{EncoderSettings, NvencConfig, X264Config};
pub use profile::{OUTPUT_CONTAINER, derive_output_path};
pub use scan::{ImageSet, is_image_file, natural_cmp, resolve_image_set};
pub use types::{
    BackendPreference, DEFAULT_DISSOLVE_SECS, EffectConfig, EncoderBackend, JobRequest, JobStage,
    OUTPUT_FPS, OUTPUT_HEIGHT, OUTPUT_WIDTH, ProgressEvent, ShortImagePolicy, TimingPlan,
    ZOOM_GAIN,
};
pub use workspace::JobWorkspace;
