#![allow(dead_code)]

//! Scripted stand-in for ffmpeg/ffprobe.
//!
//! Records every invocation, answers ffprobe with a configured duration,
//! answers the NVENC probe as configured and "encodes" by writing a small
//! file at the command's output path.

use std::fs;
use std::io;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use stillcut::engine::{ProcessRunner, ToolCommand, ToolOutput};

pub struct ScriptedRunner {
    audio_duration: Option<f64>,
    nvenc_works: bool,
    ffmpeg_missing: bool,
    fail_matching: Vec<String>,
    calls: Mutex<Vec<(ToolCommand, Option<Duration>)>>,
}

impl Default for ScriptedRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedRunner {
    /// 9 second audio, no working NVENC, every encode succeeds
    pub fn new() -> Self {
        Self {
            audio_duration: Some(9.0),
            nvenc_works: false,
            ffmpeg_missing: false,
            fail_matching: Vec::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_audio_duration(mut self, secs: f64) -> Self {
        self.audio_duration = Some(secs);
        self
    }

    /// ffprobe prints a format block without a duration
    pub fn without_audio_duration(mut self) -> Self {
        self.audio_duration = None;
        self
    }

    pub fn with_nvenc(mut self, works: bool) -> Self {
        self.nvenc_works = works;
        self
    }

    pub fn without_ffmpeg(mut self) -> Self {
        self.ffmpeg_missing = true;
        self
    }

    /// Any ffmpeg command whose rendered text contains `needle` exits 1
    pub fn failing_on(mut self, needle: &str) -> Self {
        self.fail_matching.push(needle.to_string());
        self
    }

    pub fn calls(&self) -> Vec<ToolCommand> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(cmd, _)| cmd.clone())
            .collect()
    }

    pub fn timeouts(&self) -> Vec<Option<Duration>> {
        self.calls.lock().unwrap().iter().map(|(_, t)| *t).collect()
    }

    /// ffmpeg invocations that write a file, in order
    pub fn encodes(&self) -> Vec<ToolCommand> {
        self.calls()
            .into_iter()
            .filter(|c| c.program == "ffmpeg" && !is_version(c) && !is_nvenc_probe(c))
            .collect()
    }

    pub fn encode_strings(&self) -> Vec<String> {
        self.encodes().iter().map(|c| c.arg_line()).collect()
    }

    pub fn nvenc_probe_count(&self) -> usize {
        self.calls().iter().filter(|c| is_nvenc_probe(c)).count()
    }

    pub fn clip_renders(&self) -> Vec<ToolCommand> {
        self.encodes()
            .into_iter()
            .filter(|c| c.args.iter().any(|a| a == "-loop"))
            .collect()
    }

    fn probe_output(&self) -> ToolOutput {
        let stdout = match self.audio_duration {
            Some(d) => format!(
                r#"{{"format": {{"filename": "song.mp3", "duration": "{:.6}"}}}}"#,
                d
            ),
            None => r#"{"format": {"filename": "song.mp3"}}"#.to_string(),
        };
        ToolOutput {
            exit_code: Some(0),
            stdout,
            stderr: String::new(),
        }
    }
}

fn is_version(cmd: &ToolCommand) -> bool {
    cmd.args.iter().any(|a| a == "-version")
}

fn is_nvenc_probe(cmd: &ToolCommand) -> bool {
    cmd.output_target() == Some("-") && cmd.flag_value("-c:v") == Some("h264_nvenc")
}

impl ProcessRunner for ScriptedRunner {
    fn run(&self, cmd: &ToolCommand, timeout: Option<Duration>) -> io::Result<ToolOutput> {
        self.calls.lock().unwrap().push((cmd.clone(), timeout));

        if cmd.program == "ffprobe" {
            return Ok(self.probe_output());
        }
        if self.ffmpeg_missing {
            return Err(io::Error::new(io::ErrorKind::NotFound, "No such file or directory"));
        }
        if is_version(cmd) {
            return Ok(ToolOutput {
                exit_code: Some(0),
                stdout: "ffmpeg version 6.1.1 Copyright (c) 2000-2023 the FFmpeg developers\n"
                    .to_string(),
                stderr: String::new(),
            });
        }
        if is_nvenc_probe(cmd) {
            return Ok(if self.nvenc_works {
                ToolOutput::success()
            } else {
                ToolOutput::failure(1, "Cannot load libcuda.so.1")
            });
        }

        let rendered = cmd.arg_line();
        if self.fail_matching.iter().any(|n| rendered.contains(n)) {
            if let Some(target) = cmd.args.last() {
                // ffmpeg leaves a truncated file behind on failure
                let _ = fs::write(target, b"partial");
            }
            return Ok(ToolOutput::failure(
                1,
                format!("{}: Error while processing the decoded data", rendered),
            ));
        }

        if let Some(target) = cmd.args.last() {
            let path = Path::new(target);
            if path.parent().is_some_and(|p| p.as_os_str().is_empty() || p.exists()) {
                fs::write(path, b"fake mp4")?;
            }
        }
        Ok(ToolOutput::success())
    }
}
