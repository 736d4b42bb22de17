use std::path::{Path, PathBuf};

/// Container of every delivered file
pub const OUTPUT_CONTAINER: &str = "mp4";

/// Default output location for a job: `<audio stem><suffix>.mp4`, placed in
/// `output_dir` when given, otherwise next to the audio file.
pub fn derive_output_path(audio_path: &Path, output_dir: Option<&Path>, suffix: &str) -> PathBuf {
    // Use custom output directory if provided, otherwise use audio file's directory
    let output_dir = match output_dir {
        Some(dir) => dir,
        None => audio_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new(".")),
    };

    let stem = audio_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");

    output_dir.join(format!("{}{}.{}", stem, suffix, OUTPUT_CONTAINER))
}
