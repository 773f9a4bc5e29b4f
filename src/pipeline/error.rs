//! Pipeline consistency issues.
//!
//! Loading never stops at an inconsistency. Each one is recorded as a
//! `PipelineIssue`, the offending edge is dropped, and the first issue is
//! reported as `PipelineInconsistent`.

use crate::error::RelionError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineIssue {
    #[error("{process} reads undeclared node {node}")]
    UnknownInputNode { process: String, node: String },

    #[error("{process} writes undeclared node {node}")]
    UnknownOutputNode { process: String, node: String },

    #[error("edge on node {node} references undeclared process {process}")]
    UnknownProcess { process: String, node: String },

    #[error("process {0} is declared more than once")]
    DuplicateProcess(String),

    #[error("job counter {counter} is not greater than job number {max_job} of {process}")]
    StaleCounter {
        counter: u32,
        max_job: u32,
        process: String,
    },

    #[error("cycle detected through {process}")]
    Cycle { process: String },
}

impl PipelineIssue {
    /// The process the issue is attributed to
    pub fn process(&self) -> &str {
        match self {
            PipelineIssue::UnknownInputNode { process, .. }
            | PipelineIssue::UnknownOutputNode { process, .. }
            | PipelineIssue::UnknownProcess { process, .. }
            | PipelineIssue::StaleCounter { process, .. }
            | PipelineIssue::Cycle { process } => process,
            PipelineIssue::DuplicateProcess(process) => process,
        }
    }
}

impl From<PipelineIssue> for RelionError {
    fn from(issue: PipelineIssue) -> Self {
        RelionError::PipelineInconsistent(issue.to_string())
    }
}
