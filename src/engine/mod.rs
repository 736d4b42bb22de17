// Rendering engine - independent of the CLI

pub mod core;
pub mod error;
pub mod hardware;
pub mod pipeline;
pub mod probe;
pub mod runner;
pub mod worker;

pub use self::core::*;
pub use error::{ErrorCategory, PipelineError};
pub use pipeline::{JobSettings, Pipeline, run_pipeline};
pub use runner::{DryRunRunner, ProcessRunner, SystemRunner, ToolCommand, ToolOutput};
pub use worker::{JobWorker, WorkerMessage};
