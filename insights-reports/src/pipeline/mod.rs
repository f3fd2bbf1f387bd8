//! Report generation pipeline
//!
//! Stage definitions, typed section bodies, the report aggregate and the
//! executor that runs one stage end to end.

mod artifact;
mod error;
mod executor;
mod input;
pub mod markdown;
pub mod sections;
mod stage;

pub use artifact::{Report, ReportSummary, SectionArtifact};
pub use error::PipelineError;
pub use executor::{StageExecutor, StageOutcome};
pub use sections::SectionBody;
pub use stage::{ReportKind, ReportRef, SectionKey, SectionSlot, SlotKind, Stage, StageRequest};
