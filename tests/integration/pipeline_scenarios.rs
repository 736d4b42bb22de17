// End-to-end pipeline runs against a scripted ffmpeg

use std::fs;

use stillcut::engine::{ErrorCategory, JobStage, Pipeline, PipelineError, ShortImagePolicy};

use crate::common::assertions::*;
use crate::common::fake_runner::ScriptedRunner;
use crate::common::helpers::*;

#[test]
fn test_three_images_plain_concat() {
    let fx = Fixture::with_images(3);
    let runner = ScriptedRunner::new().with_audio_duration(9.0);
    let mut log = ProgressLog::default();

    let out = Pipeline::new(&runner, fx.settings())
        .run(&fx.request(effects(false, false, false)), log.sink())
        .unwrap();

    assert_eq!(out, fx.output);
    assert!(fx.output.exists(), "final output should be written");

    let encodes = runner.encode_strings();
    assert_eq!(encodes.len(), 5, "3 clips + concat + mux: {:#?}", encodes);

    for (i, clip) in encodes[..3].iter().enumerate() {
        assert_cmd_has_flag_value(clip, "-t", "3");
        assert_cmd_has_flag_value(clip, "-r", "30");
        assert_cmd_contains(clip, &format!("img{}.png", i + 1));
        assert_cmd_contains(clip, &format!("clip_{:04}.mp4", i));
        assert_cmd_has_flag_value(clip, "-c:v", "libx264");
        assert_cmd_not_contains(clip, "zoompan");
        assert_cmd_not_contains(clip, "boxblur");
    }

    assert_cmd_has_flag_value(&encodes[3], "-f", "concat");
    assert_cmd_has_flag_value(&encodes[3], "-c", "copy");

    let mux = &encodes[4];
    assert_cmd_contains(mux, "concat_output.mp4");
    assert_cmd_contains(mux, "song.mp3");
    assert_cmd_contains(mux, "-shortest");
    assert_cmd_has_flag_value(mux, "-s", "1920x1080");
    assert_cmd_has_flag_value(mux, "-c:a", "aac");
    assert_cmd_has_flag_value(mux, "-b:a", "320k");
    assert!(mux.ends_with(&fx.output.to_string_lossy().to_string()));

    assert!(fx.leftover_workspaces().is_empty(), "workspace must be removed");

    let stages: Vec<JobStage> = log.events.iter().map(|e| e.stage).collect();
    assert_eq!(stages.first(), Some(&JobStage::CheckingTools));
    assert_eq!(stages.last(), Some(&JobStage::Done));
    assert!(log.messages().contains(&"Found 3 images"));
    assert!(
        log.messages()
            .iter()
            .any(|m| m.starts_with("Rendering image 2/3: img2.png"))
    );
}

#[test]
fn test_progress_stages_never_go_backwards() {
    let fx = Fixture::with_images(2);
    let runner = ScriptedRunner::new();
    let mut log = ProgressLog::default();

    Pipeline::new(&runner, fx.settings())
        .run(&fx.request(effects(true, true, true)), log.sink())
        .unwrap();

    let order = [
        JobStage::CheckingTools,
        JobStage::ResolvingInputs,
        JobStage::ProbingAudio,
        JobStage::SelectingBackend,
        JobStage::RenderingClips,
        JobStage::AssemblingTimeline,
        JobStage::Muxing,
        JobStage::Done,
    ];
    let positions: Vec<usize> = log
        .events
        .iter()
        .map(|e| order.iter().position(|s| *s == e.stage).unwrap())
        .collect();
    assert!(positions.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(positions.last(), Some(&(order.len() - 1)));
}

#[test]
fn test_images_render_in_natural_order() {
    let fx = Fixture::with_images(11);
    let runner = ScriptedRunner::new().with_audio_duration(22.0);

    Pipeline::new(&runner, fx.settings())
        .run(&fx.request(effects(false, false, false)), |_| {})
        .unwrap();

    let inputs: Vec<String> = runner
        .clip_renders()
        .iter()
        .map(|c| file_name(c.flag_value("-i").unwrap()))
        .collect();
    let expected: Vec<String> = (1..=11).map(|i| format!("img{}.png", i)).collect();
    assert_eq!(inputs, expected);
}

#[test]
fn test_effects_select_filter_branch() {
    let fx = Fixture::with_images(2);
    let runner = ScriptedRunner::new().with_audio_duration(6.0);

    Pipeline::new(&runner, fx.settings())
        .run(&fx.request(effects(true, true, false)), |_| {})
        .unwrap();

    for clip in runner.clip_renders() {
        let graph = clip.flag_value("-vf").unwrap();
        assert!(graph.contains("boxblur=80:10"), "{}", graph);
        // 3s at 30fps
        assert!(graph.contains("z='1+0.1*on/90'"), "{}", graph);
        assert!(graph.contains(":d=90:"), "{}", graph);
    }
}

#[test]
fn test_nvenc_used_everywhere_when_probe_succeeds() {
    let fx = Fixture::with_images(3);
    let runner = ScriptedRunner::new().with_nvenc(true);

    Pipeline::new(&runner, fx.settings())
        .run(&fx.request(effects(false, false, true)), |_| {})
        .unwrap();

    assert_eq!(runner.nvenc_probe_count(), 1);
    for cmd in runner.encodes() {
        if cmd.flag_value("-f") == Some("concat") {
            continue;
        }
        assert_eq!(cmd.flag_value("-c:v"), Some("h264_nvenc"), "{}", cmd);
    }

    let probe_timeout = runner
        .calls()
        .iter()
        .zip(runner.timeouts())
        .find(|(c, _)| c.output_target() == Some("-"))
        .and_then(|(_, t)| t);
    assert_eq!(probe_timeout, Some(std::time::Duration::from_secs(10)));
}

#[test]
fn test_failed_probe_falls_back_to_software_for_whole_job() {
    let fx = Fixture::with_images(3);
    let runner = ScriptedRunner::new().with_nvenc(false);

    Pipeline::new(&runner, fx.settings())
        .run(&fx.request(effects(true, false, true)), |_| {})
        .unwrap();

    for cmd in runner.encode_strings() {
        assert_cmd_not_contains(&cmd, "h264_nvenc");
    }
    assert!(
        runner
            .encode_strings()
            .iter()
            .filter(|c| !c.contains("-f concat"))
            .all(|c| c.contains("libx264"))
    );
}

#[test]
fn test_backend_is_probed_for_every_job() {
    let fx = Fixture::with_images(1);
    let runner = ScriptedRunner::new().with_nvenc(true);
    let pipeline = Pipeline::new(&runner, fx.settings());

    pipeline
        .run(&fx.request(effects(false, false, false)), |_| {})
        .unwrap();
    pipeline
        .run(&fx.request(effects(false, false, false)), |_| {})
        .unwrap();

    assert_eq!(runner.nvenc_probe_count(), 2);
}

#[test]
fn test_dissolve_chain_offsets() {
    let fx = Fixture::with_images(4);
    let runner = ScriptedRunner::new().with_audio_duration(12.0);

    Pipeline::new(&runner, fx.settings())
        .run(&fx.request(effects(false, false, true)), |_| {})
        .unwrap();

    let encodes = runner.encode_strings();
    assert_eq!(encodes.len(), 6, "4 clips + dissolve + mux");
    assert!(encodes.iter().all(|c| !c.contains("-f concat")));

    let xfade = runner.encodes()[4].clone();
    let graph = xfade.flag_value("-filter_complex").unwrap().to_string();
    assert_eq!(graph.matches("xfade=transition=fade").count(), 3);
    assert!(graph.contains("offset=2[v1]"));
    assert!(graph.contains("offset=4[v2]"));
    assert!(graph.ends_with("offset=6"));
    assert_eq!(xfade.args.iter().filter(|a| *a == "-i").count(), 4);

    assert_cmd_contains(&encodes[5], "dissolve_output.mp4");
}

#[test]
fn test_dissolve_with_single_image_uses_clip_directly() {
    let fx = Fixture::with_images(1);
    let runner = ScriptedRunner::new().with_audio_duration(5.0);

    Pipeline::new(&runner, fx.settings())
        .run(&fx.request(effects(false, false, true)), |_| {})
        .unwrap();

    let encodes = runner.encode_strings();
    assert_eq!(encodes.len(), 2, "1 clip + mux: {:#?}", encodes);
    assert_cmd_has_flag_value(&encodes[0], "-t", "5");
    assert!(encodes.iter().all(|c| !c.contains("xfade")));
    assert!(encodes.iter().all(|c| !c.contains("-f concat")));
    assert_cmd_contains(&encodes[1], "clip_0000.mp4");
}

#[test]
fn test_short_images_clamp_dissolve() {
    let fx = Fixture::with_images(3);
    let runner = ScriptedRunner::new().with_audio_duration(1.5);
    let mut log = ProgressLog::default();

    Pipeline::new(&runner, fx.settings())
        .run(&fx.request(effects(false, false, true)), log.sink())
        .unwrap();

    let xfade = runner
        .encodes()
        .into_iter()
        .find(|c| c.flag_value("-filter_complex").is_some())
        .unwrap();
    let graph = xfade.flag_value("-filter_complex").unwrap();
    assert!(graph.contains("duration=0.25:offset=0.25[v1]"), "{}", graph);
    assert!(graph.ends_with("duration=0.25:offset=0.5"), "{}", graph);
    assert!(log.messages().iter().any(|m| m.starts_with("Dissolve shortened")));
}

#[test]
fn test_short_images_rejected_before_rendering() {
    let fx = Fixture::with_images(3);
    let runner = ScriptedRunner::new().with_audio_duration(3.0);
    let settings = stillcut::engine::JobSettings {
        short_image_policy: ShortImagePolicy::Reject,
        ..fx.settings()
    };

    let err = Pipeline::new(&runner, settings)
        .run(&fx.request(effects(false, false, true)), |_| {})
        .unwrap_err();

    assert!(matches!(err, PipelineError::ImagesTooShortForDissolve { .. }));
    assert_eq!(err.category(), ErrorCategory::Precondition);
    assert!(runner.clip_renders().is_empty());
    assert!(!fx.output.exists());
}

#[test]
fn test_unreadable_audio_fails_before_rendering() {
    let fx = Fixture::with_images(3);
    let runner = ScriptedRunner::new().without_audio_duration();
    let mut log = ProgressLog::default();

    let err = Pipeline::new(&runner, fx.settings())
        .run(&fx.request(effects(false, false, false)), log.sink())
        .unwrap_err();

    assert!(matches!(err, PipelineError::UnreadableAudio(_)));
    assert!(runner.encodes().is_empty());
    assert!(fx.leftover_workspaces().is_empty());
    assert_eq!(log.events.last().map(|e| e.stage), Some(JobStage::Failed));

    let zero = ScriptedRunner::new().with_audio_duration(0.0);
    let err = Pipeline::new(&zero, fx.settings())
        .run(&fx.request(effects(false, false, false)), |_| {})
        .unwrap_err();
    assert!(matches!(err, PipelineError::UnreadableAudio(_)));
}

#[test]
fn test_empty_or_missing_image_folder() {
    let fx = Fixture::with_images(0);
    let runner = ScriptedRunner::new();

    let err = Pipeline::new(&runner, fx.settings())
        .run(&fx.request(effects(false, false, false)), |_| {})
        .unwrap_err();
    assert!(matches!(err, PipelineError::NoImages(_)));

    let mut request = fx.request(effects(false, false, false));
    request.image_dir = fx.root.path().join("nope");
    let err = Pipeline::new(&runner, fx.settings())
        .run(&request, |_| {})
        .unwrap_err();
    assert!(matches!(err, PipelineError::ImageDir { .. }));
    assert!(runner.encodes().is_empty());
}

#[test]
fn test_missing_ffmpeg_is_reported_first() {
    let fx = Fixture::with_images(2);
    let runner = ScriptedRunner::new().without_ffmpeg();

    let err = Pipeline::new(&runner, fx.settings())
        .run(&fx.request(effects(false, false, false)), |_| {})
        .unwrap_err();

    assert!(matches!(err, PipelineError::ToolMissing { .. }));
    assert!(err.to_string().contains("ffmpeg"));
    assert_eq!(runner.calls().len(), 1);
}

#[test]
fn test_render_failure_aborts_job() {
    let fx = Fixture::with_images(3);
    let runner = ScriptedRunner::new().failing_on("img2.png");

    let err = Pipeline::new(&runner, fx.settings())
        .run(&fx.request(effects(false, false, false)), |_| {})
        .unwrap_err();

    match &err {
        PipelineError::Render { image, detail } => {
            assert_eq!(image, "img2.png");
            assert!(detail.contains("exited with code 1"));
            assert!(detail.chars().count() < 600);
        }
        other => panic!("expected render error, got {:?}", other),
    }
    assert_eq!(err.category(), ErrorCategory::Render);

    // No third clip, no concat, no mux
    assert_eq!(runner.clip_renders().len(), 2);
    assert_eq!(runner.encodes().len(), 2);
    assert!(!fx.output.exists());
    assert!(fx.leftover_workspaces().is_empty());
}

#[test]
fn test_assembly_failure_is_categorized() {
    let fx = Fixture::with_images(2);
    let runner = ScriptedRunner::new().failing_on("-f concat");

    let err = Pipeline::new(&runner, fx.settings())
        .run(&fx.request(effects(false, false, false)), |_| {})
        .unwrap_err();

    assert_eq!(err.category(), ErrorCategory::Assembly);
    assert!(fx.leftover_workspaces().is_empty());
}

#[test]
fn test_mux_failure_leaves_no_output() {
    let fx = Fixture::with_images(2);
    let runner = ScriptedRunner::new().failing_on("-shortest");

    let err = Pipeline::new(&runner, fx.settings())
        .run(&fx.request(effects(false, false, false)), |_| {})
        .unwrap_err();

    assert!(matches!(err, PipelineError::Mux(_)));
    assert!(!fx.output.exists(), "partial output must be removed");
    assert!(fx.leftover_workspaces().is_empty());
}

#[test]
fn test_mux_failure_reported_when_output_cannot_be_removed() {
    let fx = Fixture::with_images(2);
    // A directory at the output path makes remove_file fail
    fs::create_dir(&fx.output).unwrap();
    let runner = ScriptedRunner::new().failing_on("-shortest");

    let err = Pipeline::new(&runner, fx.settings())
        .run(&fx.request(effects(false, false, false)), |_| {})
        .unwrap_err();

    assert!(matches!(err, PipelineError::Mux(_)));
    assert!(fx.output.is_dir());
    assert!(fx.leftover_workspaces().is_empty());
}

#[test]
fn test_extra_output_args_precede_output_path() {
    let fx = Fixture::with_images(1);
    let runner = ScriptedRunner::new();
    let settings = stillcut::engine::JobSettings {
        extra_output_args: vec!["-movflags".to_string(), "+faststart".to_string()],
        ..fx.settings()
    };

    Pipeline::new(&runner, settings)
        .run(&fx.request(effects(false, false, false)), |_| {})
        .unwrap();

    let mux = runner.encode_strings().pop().unwrap();
    assert_cmd_order(&mux, "-shortest", "-movflags +faststart");
    assert!(mux.ends_with("song_video.mp4"));
}
