// Background job runner so callers can stay responsive during a render

use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};
use uuid::Uuid;

use super::core::{JobRequest, JobStage};
use super::pipeline::{JobSettings, Pipeline};
use super::runner::{ProcessRunner, SystemRunner};

/// Message from worker to main thread
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerMessage {
    /// Job started running
    JobStarted { job_id: Uuid },

    /// Progress update from the pipeline
    Progress {
        job_id: Uuid,
        stage: JobStage,
        message: String,
    },

    /// Job completed and the output file is written
    JobCompleted { job_id: Uuid, output: std::path::PathBuf },

    /// Job failed with error
    JobFailed { job_id: Uuid, error: String },
}

impl WorkerMessage {
    pub fn job_id(&self) -> Uuid {
        match self {
            Self::JobStarted { job_id }
            | Self::Progress { job_id, .. }
            | Self::JobCompleted { job_id, .. }
            | Self::JobFailed { job_id, .. } => *job_id,
        }
    }

    /// True for the last message a job sends
    pub fn is_final(&self) -> bool {
        matches!(self, Self::JobCompleted { .. } | Self::JobFailed { .. })
    }
}

/// Runs pipeline jobs on background threads and reports over a channel.
///
/// Each job gets its own thread and its own workspace. Jobs never share
/// encoder state, so several may run at once, though ffmpeg will compete
/// for the same CPU or GPU.
pub struct JobWorker {
    runner: Arc<dyn ProcessRunner>,
    tx: Sender<WorkerMessage>,
    rx: Receiver<WorkerMessage>,
}

impl Default for JobWorker {
    fn default() -> Self {
        Self::new()
    }
}

impl JobWorker {
    /// Create a worker that runs the real ffmpeg
    pub fn new() -> Self {
        Self::with_runner(Arc::new(SystemRunner))
    }

    /// Create a worker with a custom process runner
    pub fn with_runner(runner: Arc<dyn ProcessRunner>) -> Self {
        let (tx, rx) = mpsc::channel();
        Self { runner, tx, rx }
    }

    /// Get the receiver for worker messages
    pub fn receiver(&self) -> &Receiver<WorkerMessage> {
        &self.rx
    }

    /// Start a job in the background. Returns its id and the thread handle.
    pub fn spawn_job(&self, request: JobRequest, settings: JobSettings) -> (Uuid, JoinHandle<()>) {
        let job_id = Uuid::new_v4();
        let tx = self.tx.clone();
        let runner = Arc::clone(&self.runner);

        let handle = thread::spawn(move || {
            let _ = tx.send(WorkerMessage::JobStarted { job_id });

            let tx_progress = tx.clone();
            let pipeline = Pipeline::new(runner.as_ref(), settings);
            let result = pipeline.run_job(job_id, &request, |event| {
                let _ = tx_progress.send(WorkerMessage::Progress {
                    job_id,
                    stage: event.stage,
                    message: event.message.clone(),
                });
            });

            match result {
                Ok(output) => {
                    let _ = tx.send(WorkerMessage::JobCompleted { job_id, output });
                }
                Err(e) => {
                    let _ = tx.send(WorkerMessage::JobFailed {
                        job_id,
                        error: e.to_string(),
                    });
                }
            }
        });

        (job_id, handle)
    }
}
