//! Job orchestration: images + audio in, one MP4 out.
//!
//! Steps run strictly one after another and every external tool call blocks
//! until ffmpeg exits. The first failure ends the job; nothing is retried.
//! Intermediate files live in a [`JobWorkspace`] that is removed on every
//! exit path.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use uuid::Uuid;

use crate::engine::core::{
    BackendPreference, ClipRenderSpec, ConcatSpec, CrossfadeSpec, DEFAULT_DISSOLVE_SECS,
    EffectConfig, EncoderBackend, EncoderSettings, ImageSet, JobRequest, JobStage, JobWorkspace,
    MuxSpec, OUTPUT_FPS, ProgressEvent, ShortImagePolicy, TimingPlan, build_filter_graph,
    concat_manifest, resolve_image_set, tool_available,
};
use crate::engine::error::{PipelineError, tool_failure};
use crate::engine::hardware::{DEFAULT_PROBE_TIMEOUT, select_backend};
use crate::engine::probe::{AudioTrack, format_clock, probe_audio_track};
use crate::engine::runner::{ProcessRunner, SystemRunner, ToolCommand};

/// Everything about a job that isn't its inputs. Built fresh per job, so no
/// encoder state leaks between jobs.
#[derive(Debug, Clone, PartialEq)]
pub struct JobSettings {
    pub ffmpeg: String,
    pub ffprobe: String,
    pub backend: BackendPreference,
    pub probe_timeout: Duration,
    pub encoder: EncoderSettings,
    /// Nominal dissolve length in seconds
    pub dissolve_secs: f64,
    pub short_image_policy: ShortImagePolicy,
    /// Appended to the final mux just before the output path
    pub extra_output_args: Vec<String>,
    /// Parent for job workspaces; system temp dir when `None`
    pub workspace_root: Option<PathBuf>,
}

impl Default for JobSettings {
    fn default() -> Self {
        Self {
            ffmpeg: "ffmpeg".to_string(),
            ffprobe: "ffprobe".to_string(),
            backend: BackendPreference::Auto,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            encoder: EncoderSettings::default(),
            dissolve_secs: DEFAULT_DISSOLVE_SECS,
            short_image_policy: ShortImagePolicy::Clamp,
            extra_output_args: Vec::new(),
            workspace_root: None,
        }
    }
}

/// Tracks the orchestrator's stage and forwards progress to the caller.
struct StageTracker<'a> {
    stage: JobStage,
    sink: &'a mut dyn FnMut(&ProgressEvent),
}

impl StageTracker<'_> {
    fn enter(&mut self, stage: JobStage, message: impl Into<String>) {
        debug_assert_eq!(self.stage.next(), Some(stage), "out-of-order stage transition");
        self.stage = stage;
        self.note(message);
    }

    fn note(&mut self, message: impl Into<String>) {
        (self.sink)(&ProgressEvent::new(self.stage, message));
    }

    fn fail(&mut self, message: impl Into<String>) {
        self.stage = JobStage::Failed;
        self.note(message);
    }
}

/// A configured pipeline bound to a process runner.
pub struct Pipeline<'r> {
    runner: &'r dyn ProcessRunner,
    settings: JobSettings,
}

impl<'r> Pipeline<'r> {
    pub fn new(runner: &'r dyn ProcessRunner, settings: JobSettings) -> Self {
        Self { runner, settings }
    }

    pub fn settings(&self) -> &JobSettings {
        &self.settings
    }

    /// Run one job to completion. Returns the output path on success.
    ///
    /// `on_progress` gets one event per stage transition (before the stage's
    /// work starts), one per rendered image, and a final `Done` or `Failed`.
    pub fn run<F>(&self, request: &JobRequest, on_progress: F) -> Result<PathBuf, PipelineError>
    where
        F: FnMut(&ProgressEvent),
    {
        self.run_job(Uuid::new_v4(), request, on_progress)
    }

    /// Same as [`Pipeline::run`], logging under a caller-chosen job id.
    pub fn run_job<F>(
        &self,
        job_id: Uuid,
        request: &JobRequest,
        mut on_progress: F,
    ) -> Result<PathBuf, PipelineError>
    where
        F: FnMut(&ProgressEvent),
    {
        let span = tracing::info_span!("job", id = %job_id);
        let _guard = span.enter();

        tracing::info!(
            images = %request.image_dir.display(),
            audio = %request.audio_path.display(),
            output = %request.output_path.display(),
            effects = %request.effects,
            "starting job"
        );

        let mut tracker = StageTracker {
            stage: JobStage::Idle,
            sink: &mut on_progress,
        };

        let result = self.execute(request, &mut tracker);
        match &result {
            Ok(path) => {
                tracing::info!(output = %path.display(), "job finished");
                tracker.enter(JobStage::Done, format!("Finished: {}", path.display()));
            }
            Err(e) => {
                tracing::warn!(error = %e, stage = ?tracker.stage, "job failed");
                tracker.fail(e.to_string());
            }
        }
        result
    }

    fn execute(
        &self,
        request: &JobRequest,
        tracker: &mut StageTracker<'_>,
    ) -> Result<PathBuf, PipelineError> {
        let s = &self.settings;

        tracker.enter(JobStage::CheckingTools, "Checking for ffmpeg...");
        if !tool_available(self.runner, &s.ffmpeg) {
            return Err(PipelineError::ToolMissing {
                program: s.ffmpeg.clone(),
            });
        }

        tracker.enter(
            JobStage::ResolvingInputs,
            format!("Looking for images in {}", request.image_dir.display()),
        );
        let images = resolve_image_set(&request.image_dir).map_err(|source| {
            PipelineError::ImageDir {
                path: request.image_dir.clone(),
                source,
            }
        })?;
        if images.is_empty() {
            return Err(PipelineError::NoImages(request.image_dir.clone()));
        }
        tracing::info!(count = images.len(), "images resolved");
        tracker.note(format!("Found {} images", images.len()));

        tracker.enter(JobStage::ProbingAudio, "Reading audio length...");
        let audio = probe_audio_track(self.runner, &s.ffprobe, &request.audio_path);
        if !audio.is_readable() {
            return Err(PipelineError::UnreadableAudio(request.audio_path.clone()));
        }
        let timing = TimingPlan::new(audio.duration_secs, images.len(), OUTPUT_FPS)
            .ok_or_else(|| PipelineError::UnreadableAudio(request.audio_path.clone()))?;
        tracker.note(format!(
            "Audio is {} long, {:.2}s per image",
            format_clock(audio.duration_secs),
            timing.duration_per_image
        ));

        let dissolve_secs = self.dissolve_secs(request.effects, &images, &timing)?;
        if let Some(d) = dissolve_secs.filter(|d| *d < s.dissolve_secs) {
            tracing::warn!(
                per_image = timing.duration_per_image,
                dissolve = d,
                "images too short for the configured dissolve, shortening it"
            );
            tracker.note(format!("Dissolve shortened to {:.2}s to fit each image", d));
        }

        tracker.enter(JobStage::SelectingBackend, "Checking for a GPU encoder...");
        let backend = select_backend(self.runner, &s.ffmpeg, s.backend, s.probe_timeout);
        tracing::info!(backend = backend.ffmpeg_name(), "encoder selected");
        tracker.note(format!("Encoding with {}", backend.display_name()));

        let workspace = JobWorkspace::create(s.workspace_root.as_deref())
            .map_err(PipelineError::Workspace)?;

        tracker.enter(
            JobStage::RenderingClips,
            format!("Rendering {} clips", images.len()),
        );
        let clips =
            self.render_clips(&images, &timing, request.effects, backend, &workspace, tracker)?;

        let timeline = match dissolve_secs {
            Some(d) => {
                tracker.enter(JobStage::AssemblingTimeline, "Applying dissolve transitions...");
                self.dissolve_clips(&clips, timing.duration_per_image, d, backend, &workspace)?
            }
            None if request.effects.dissolve => {
                // One image: nothing to dissolve into, the clip is the timeline
                tracker.enter(JobStage::AssemblingTimeline, "Single image, no transitions needed");
                clips[0].clone()
            }
            None => {
                tracker.enter(JobStage::AssemblingTimeline, "Joining clips...");
                self.concat_clips(&clips, &workspace)?
            }
        };

        tracker.enter(JobStage::Muxing, "Adding audio and writing the final video...");
        self.mux(&timeline, &audio, &request.output_path, backend)?;

        if let Err(e) = workspace.close() {
            tracing::warn!(error = %e, "could not remove job workspace");
        }
        Ok(request.output_path.clone())
    }

    /// Effective dissolve length, `None` when clips are joined without one.
    fn dissolve_secs(
        &self,
        effects: EffectConfig,
        images: &ImageSet,
        timing: &TimingPlan,
    ) -> Result<Option<f64>, PipelineError> {
        if !effects.dissolve || images.len() < 2 {
            return Ok(None);
        }
        let nominal = self.settings.dissolve_secs;
        self.settings
            .short_image_policy
            .resolve(timing.duration_per_image, nominal)
            .map(Some)
            .ok_or(PipelineError::ImagesTooShortForDissolve {
                per_image: timing.duration_per_image,
                dissolve: nominal,
            })
    }

    fn run_tool(&self, cmd: &ToolCommand) -> Option<String> {
        tracing::debug!(command = %cmd, "ffmpeg");
        tool_failure(&self.runner.run(cmd, None), &cmd.program)
    }

    fn render_clips(
        &self,
        images: &ImageSet,
        timing: &TimingPlan,
        effects: EffectConfig,
        backend: EncoderBackend,
        workspace: &JobWorkspace,
        tracker: &mut StageTracker<'_>,
    ) -> Result<Vec<PathBuf>, PipelineError> {
        let graph = build_filter_graph(
            effects.zoom,
            effects.blur_background,
            timing.frame_count,
            timing.fps,
        );
        let total = images.len();
        let mut clips = Vec::with_capacity(total);

        for (i, image) in images.iter().enumerate() {
            let name = display_name(image);
            tracker.note(format!("Rendering image {}/{}: {}", i + 1, total, name));

            let clip = workspace.clip_path(i);
            let cmd = ClipRenderSpec {
                image,
                duration_secs: timing.duration_per_image,
                filter_graph: &graph,
                fps: timing.fps,
                backend,
                encoder: &self.settings.encoder,
                output: &clip,
            }
            .to_command(&self.settings.ffmpeg);

            if let Some(detail) = self.run_tool(&cmd) {
                tracing::warn!(image = %name, %detail, "clip render failed");
                return Err(PipelineError::Render {
                    image: name,
                    detail,
                });
            }
            clips.push(clip);
        }

        Ok(clips)
    }

    fn concat_clips(
        &self,
        clips: &[PathBuf],
        workspace: &JobWorkspace,
    ) -> Result<PathBuf, PipelineError> {
        let manifest = workspace.manifest_path();
        fs::write(&manifest, concat_manifest(clips)).map_err(|e| {
            PipelineError::Assembly(format!("could not write concat manifest: {}", e))
        })?;

        let output = workspace.concat_output_path();
        let cmd = ConcatSpec {
            manifest: &manifest,
            output: &output,
        }
        .to_command(&self.settings.ffmpeg);

        match self.run_tool(&cmd) {
            Some(detail) => Err(PipelineError::Assembly(detail)),
            None => Ok(output),
        }
    }

    fn dissolve_clips(
        &self,
        clips: &[PathBuf],
        duration_per_image: f64,
        dissolve_secs: f64,
        backend: EncoderBackend,
        workspace: &JobWorkspace,
    ) -> Result<PathBuf, PipelineError> {
        let output = workspace.dissolve_output_path();
        let cmd = CrossfadeSpec {
            clips,
            duration_per_image,
            dissolve_secs,
            backend,
            encoder: &self.settings.encoder,
            output: &output,
        }
        .to_command(&self.settings.ffmpeg);

        match self.run_tool(&cmd) {
            Some(detail) => Err(PipelineError::Assembly(detail)),
            None => Ok(output),
        }
    }

    fn mux(
        &self,
        timeline: &Path,
        audio: &AudioTrack,
        output: &Path,
        backend: EncoderBackend,
    ) -> Result<(), PipelineError> {
        let cmd = MuxSpec {
            video: timeline,
            audio: &audio.path,
            backend,
            encoder: &self.settings.encoder,
            extra_args: &self.settings.extra_output_args,
            output,
        }
        .to_command(&self.settings.ffmpeg);

        if let Some(detail) = self.run_tool(&cmd) {
            // A half-written file must not look like a finished video
            if output.exists() {
                if let Err(e) = fs::remove_file(output) {
                    tracing::warn!(
                        output = %output.display(),
                        error = %e,
                        "could not remove partial output"
                    );
                }
            }
            return Err(PipelineError::Mux(detail));
        }
        Ok(())
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Entry point for callers that just want a video: real ffmpeg, default
/// settings, fresh backend probe.
pub fn run_pipeline<F>(
    image_dir: &Path,
    audio_path: &Path,
    output_path: &Path,
    effects: EffectConfig,
    on_progress: F,
) -> Result<PathBuf, PipelineError>
where
    F: FnMut(&ProgressEvent),
{
    let request = JobRequest {
        image_dir: image_dir.to_path_buf(),
        audio_path: audio_path.to_path_buf(),
        output_path: output_path.to_path_buf(),
        effects,
    };
    Pipeline::new(&SystemRunner, JobSettings::default()).run(&request, on_progress)
}
