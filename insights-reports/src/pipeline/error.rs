//! Pipeline error types

use thiserror::Error;

use crate::generation::GenerationError;
use crate::pipeline::Stage;

/// Errors raised while running a stage
///
/// None of these are retried. A failed stage leaves the previous successful
/// artifact (if any) untouched.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// An upstream artifact the stage declares as a dependency is absent
    #[error("{0}")]
    MissingDependency(String),

    /// Request did not identify a valid report, stage or slot
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// No active prompt version exists for the stage's prompt key
    #[error("Prompt not configured: {0}")]
    PromptMissing(String),

    /// External generation service failed
    #[error("Generation service error: {0}")]
    Generation(#[from] GenerationError),

    /// Generation service answered with something other than the stage's shape
    #[error("Unexpected {stage} output: {reason}")]
    UnexpectedOutput { stage: Stage, reason: String },

    /// Artifact store or invocation log failure
    #[error(transparent)]
    Storage(#[from] insights_common::Error),
}

impl From<sqlx::Error> for PipelineError {
    fn from(err: sqlx::Error) -> Self {
        PipelineError::Storage(insights_common::Error::Database(err))
    }
}
