//! Successor hints between job types
//!
//! A hint says: after a job of type `source`, a job of type `target` usually
//! follows, and this output of the source feeds that parameter of the
//! target. The UI offers the hints as "next job" suggestions with the input
//! fields filled in. The pipeline loader never looks at them.

use super::label_matches;
use crate::job::iteration::iteration_prefix;
use crate::job::{latest_iteration, JobDirectory, RelionJob};
use serde::Serialize;
use std::fmt;

/// Computes an output file name from the job directory; empty means none
pub type NodeResolver = fn(&JobDirectory) -> String;

/// Where a suggested input value comes from
#[derive(Clone)]
pub enum NodeSource {
    /// A fixed file name inside the source job directory
    File(String),
    Computed(NodeResolver),
}

impl NodeSource {
    /// Project-relative path of the output, `None` when there is nothing to suggest
    pub fn resolve(&self, job: &JobDirectory) -> Option<String> {
        let name = match self {
            NodeSource::File(name) => name.clone(),
            NodeSource::Computed(resolver) => resolver(job),
        };
        if name.is_empty() {
            return None;
        }
        Some(match job.process_name() {
            Some(process) => format!("{process}{name}"),
            None => job.file(name).to_string_lossy().into_owned(),
        })
    }
}

impl fmt::Debug for NodeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeSource::File(name) => f.debug_tuple("File").field(name).finish(),
            NodeSource::Computed(_) => f.write_str("Computed"),
        }
    }
}

impl From<&str> for NodeSource {
    fn from(name: &str) -> Self {
        NodeSource::File(name.to_string())
    }
}

impl From<NodeResolver> for NodeSource {
    fn from(resolver: NodeResolver) -> Self {
        NodeSource::Computed(resolver)
    }
}

/// One `(source, target)` pair with its node mapping.
#[derive(Debug, Clone)]
pub struct ConnectionHint {
    pub source: String,
    pub target: String,
    /// Source output -> target input parameter
    pub node_mapping: Vec<(NodeSource, String)>,
}

impl ConnectionHint {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            node_mapping: Vec::new(),
        }
    }

    pub fn map(mut self, from: impl Into<NodeSource>, param: impl Into<String>) -> Self {
        self.node_mapping.push((from.into(), param.into()));
        self
    }

    /// Resolved parameters; `None` when no mapping produced a value
    pub fn suggest(&self, job: &dyn RelionJob) -> Option<Suggestion> {
        let params: Vec<_> = self
            .node_mapping
            .iter()
            .filter_map(|(source, param)| Some((param.clone(), source.resolve(job.job_dir())?)))
            .collect();
        (!params.is_empty()).then(|| Suggestion {
            target: self.target.clone(),
            params,
        })
    }
}

/// A next job with its inputs filled in
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Suggestion {
    pub target: String,
    pub params: Vec<(String, String)>,
}

/// Hints matching the job's type label, resolved against its directory
pub fn suggest_next(hints: &[ConnectionHint], job: &dyn RelionJob) -> Vec<Suggestion> {
    let label = job.job_dir().job_type_label();
    hints
        .iter()
        .filter(|h| label_matches(&h.source, label))
        .filter_map(|h| h.suggest(job))
        .collect()
}

/// `run_itNNN_optimiser.star` of the latest iteration
pub fn latest_optimiser(job: &JobDirectory) -> String {
    latest_iteration(job.path())
        .map(|it| format!("{}optimiser.star", iteration_prefix(it)))
        .unwrap_or_default()
}

pub fn builtin_connections() -> Vec<ConnectionHint> {
    vec![
        ConnectionHint::new("relion.import", "relion.motioncorr")
            .map("movies.star", "input_star_mics"),
        ConnectionHint::new("relion.motioncorr", "relion.ctffind")
            .map("corrected_micrographs.star", "input_star_mics"),
        ConnectionHint::new("relion.class2d", "relion.select")
            .map(latest_optimiser as NodeResolver, "fn_model"),
        ConnectionHint::new("relion.class3d", "relion.select")
            .map(latest_optimiser as NodeResolver, "fn_model"),
        ConnectionHint::new("relion.refine3d", "relion.maskcreate")
            .map("run_class001.mrc", "fn_in"),
        ConnectionHint::new("relion.refine3d", "relion.postprocess")
            .map("run_half1_class001_unfil.mrc", "fn_in"),
        ConnectionHint::new("relion.refine3d", "relion.localres")
            .map("run_half1_class001_unfil.mrc", "fn_in"),
        ConnectionHint::new("relion.maskcreate", "relion.postprocess")
            .map("mask.mrc", "fn_mask"),
    ]
}
