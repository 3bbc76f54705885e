//! Remediation job lifecycle.
//!
//! A job only ever moves forward:
//!
//! ```text
//! Created → TopicExtracted → ContextRetrieved → Generated → Rendered → Delivered
//!    └──────────────┴───────────────┴──────────────┴───────────┴──→ Failed(stage)
//! ```

use std::fmt;

use thiserror::Error;

use crate::error::{Stage, StageFailure};
use crate::model::WeakStudent;

/// Where a job currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobState {
    Created,
    TopicExtracted,
    ContextRetrieved,
    Generated,
    Rendered,
    Delivered,
    Failed(Stage),
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Delivered | JobState::Failed(_))
    }

    /// The stage that runs next from this state, if any.
    pub fn next_stage(self) -> Option<Stage> {
        match self {
            JobState::Created => Some(Stage::TopicExtraction),
            JobState::TopicExtracted => Some(Stage::ContextRetrieval),
            JobState::ContextRetrieved => Some(Stage::Generation),
            JobState::Generated => Some(Stage::Rendering),
            JobState::Rendered => Some(Stage::Delivery),
            JobState::Delivered | JobState::Failed(_) => None,
        }
    }

    /// The state reached when `stage` completes successfully.
    pub fn after(stage: Stage) -> JobState {
        match stage {
            Stage::TopicExtraction => JobState::TopicExtracted,
            Stage::ContextRetrieval => JobState::ContextRetrieved,
            Stage::Generation => JobState::Generated,
            Stage::Rendering => JobState::Rendered,
            Stage::Delivery => JobState::Delivered,
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobState::Created => write!(f, "created"),
            JobState::TopicExtracted => write!(f, "topic_extracted"),
            JobState::ContextRetrieved => write!(f, "context_retrieved"),
            JobState::Generated => write!(f, "generated"),
            JobState::Rendered => write!(f, "rendered"),
            JobState::Delivered => write!(f, "delivered"),
            JobState::Failed(stage) => write!(f, "failed({stage})"),
        }
    }
}

/// Rejected state change.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("illegal job transition {from} -> {to}")]
pub struct TransitionError {
    pub from: JobState,
    pub to: JobState,
}

/// One weak student's remediation run.
#[derive(Debug, Clone)]
pub struct RemediationJob {
    pub student: WeakStudent,
    state: JobState,
    failure: Option<StageFailure>,
}

impl RemediationJob {
    pub fn new(student: WeakStudent) -> Self {
        Self {
            student,
            state: JobState::Created,
            failure: None,
        }
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn failure(&self) -> Option<&StageFailure> {
        self.failure.as_ref()
    }

    /// Record successful completion of `stage`.
    pub fn complete(&mut self, stage: Stage) -> Result<(), TransitionError> {
        let to = JobState::after(stage);
        if self.state.next_stage() != Some(stage) {
            return Err(TransitionError {
                from: self.state,
                to,
            });
        }
        tracing::debug!(student = %self.student.student_id(), from = %self.state, %to, "job advanced");
        self.state = to;
        Ok(())
    }

    /// Move to `Failed`. Allowed from any non-terminal state.
    pub fn fail(&mut self, failure: StageFailure) -> Result<(), TransitionError> {
        let to = JobState::Failed(failure.stage);
        if self.state.is_terminal() {
            return Err(TransitionError {
                from: self.state,
                to,
            });
        }
        tracing::warn!(
            student = %self.student.student_id(),
            stage = %failure.stage,
            reason = %failure.reason,
            "remediation job failed"
        );
        self.state = to;
        self.failure = Some(failure);
        Ok(())
    }
}
