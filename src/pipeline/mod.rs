//! RELION pipeline model
//!
//! `default_pipeline.star` at the project root records every process, the
//! data nodes they exchange and the edges between them. This module binds
//! that file ([`model`]) and builds a queryable DAG from it ([`graph`]).

pub mod error;
pub mod graph;
pub mod id;
pub mod model;
pub mod node_type;

pub use error::PipelineIssue;
pub use graph::{Node, Pipeline, Process, DEFAULT_PIPELINE};
pub use id::{normalize_process_name, JobId, JobIdAllocator, ProcessName};
pub use model::{
    InputEdgeRow, NodeRow, OutputEdgeRow, PipelineGeneral, PipelineStar, ProcessRow, ProcessStatus,
};
pub use node_type::NodeType;
