//! Typed bindings for `default_pipeline.star`.

use crate::error::Result;
use crate::star::{Loop, StarDocument, StarModel, StarRecord, StarValue};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Execution status of a pipeline process, spelled as RELION writes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProcessStatus {
    Scheduled,
    Running,
    Succeeded,
    Failed,
    Aborted,
}

impl ProcessStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessStatus::Scheduled => "Scheduled",
            ProcessStatus::Running => "Running",
            ProcessStatus::Succeeded => "Succeeded",
            ProcessStatus::Failed => "Failed",
            ProcessStatus::Aborted => "Aborted",
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(
            self,
            ProcessStatus::Succeeded | ProcessStatus::Failed | ProcessStatus::Aborted
        )
    }
}

impl fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl StarValue for ProcessStatus {
    fn type_name() -> &'static str {
        "process status"
    }

    fn parse_star(raw: &str) -> Option<Self> {
        match raw.trim() {
            "Scheduled" => Some(ProcessStatus::Scheduled),
            "Running" => Some(ProcessStatus::Running),
            "Succeeded" => Some(ProcessStatus::Succeeded),
            "Failed" => Some(ProcessStatus::Failed),
            "Aborted" => Some(ProcessStatus::Aborted),
            _ => None,
        }
    }

    fn to_star(&self) -> String {
        self.as_str().to_string()
    }

    fn example(index: usize) -> Self {
        const ALL: [ProcessStatus; 5] = [
            ProcessStatus::Succeeded,
            ProcessStatus::Running,
            ProcessStatus::Scheduled,
            ProcessStatus::Failed,
            ProcessStatus::Aborted,
        ];
        ALL[index % ALL.len()]
    }
}

crate::star_record! {
    #[derive(Debug, Clone, PartialEq)]
    pub struct PipelineGeneral in "pipeline_general" {
        pub job_counter: u32 => "rlnPipeLineJobCounter" = 1,
    }
}

crate::star_loop! {
    #[derive(Debug, Clone, PartialEq)]
    pub struct ProcessRow in "pipeline_processes" {
        pub name: String => "rlnPipeLineProcessName",
        pub alias: String => "rlnPipeLineProcessAlias" = "None".to_string(),
        pub type_label: String => "rlnPipeLineProcessTypeLabel",
        pub status: ProcessStatus => "rlnPipeLineProcessStatusLabel",
    }
}

crate::star_loop! {
    #[derive(Debug, Clone, PartialEq)]
    pub struct NodeRow in "pipeline_nodes" {
        pub name: String => "rlnPipeLineNodeName",
        pub type_label: String => "rlnPipeLineNodeTypeLabel",
        pub depth: Option<i32> => "rlnPipeLineNodeTypeLabelDepth",
    }
}

crate::star_loop! {
    #[derive(Debug, Clone, PartialEq)]
    pub struct InputEdgeRow in "pipeline_input_edges" {
        pub from_node: String => "rlnPipeLineEdgeFromNode",
        pub process: String => "rlnPipeLineEdgeProcess",
    }
}

crate::star_loop! {
    #[derive(Debug, Clone, PartialEq)]
    pub struct OutputEdgeRow in "pipeline_output_edges" {
        pub process: String => "rlnPipeLineEdgeProcess",
        pub to_node: String => "rlnPipeLineEdgeToNode",
    }
}

/// The whole `default_pipeline.star` (or a job's `job_pipeline.star`).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PipelineStar {
    pub general: Option<PipelineGeneral>,
    pub processes: Loop<ProcessRow>,
    pub nodes: Loop<NodeRow>,
    pub input_edges: Loop<InputEdgeRow>,
    pub output_edges: Loop<OutputEdgeRow>,
}

impl StarModel for PipelineStar {
    fn from_document(doc: &StarDocument) -> Result<Self> {
        let general = match doc.block(<PipelineGeneral as StarRecord>::BLOCK) {
            Some(_) => Some(<PipelineGeneral as StarRecord>::from_document(doc)?),
            None => None,
        };
        Ok(Self {
            general,
            processes: Loop::from_document_or_empty(doc)?,
            nodes: Loop::from_document_or_empty(doc)?,
            input_edges: Loop::from_document_or_empty(doc)?,
            output_edges: Loop::from_document_or_empty(doc)?,
        })
    }

    fn to_document(&self) -> StarDocument {
        let mut doc = StarDocument::new();
        if let Some(general) = &self.general {
            doc.insert(<PipelineGeneral as StarRecord>::BLOCK, general.to_block());
        }
        doc.insert(<ProcessRow as crate::star::LoopRow>::BLOCK, self.processes.to_block());
        if !self.nodes.is_empty() {
            doc.insert(<NodeRow as crate::star::LoopRow>::BLOCK, self.nodes.to_block());
        }
        if !self.input_edges.is_empty() {
            doc.insert(
                <InputEdgeRow as crate::star::LoopRow>::BLOCK,
                self.input_edges.to_block(),
            );
        }
        if !self.output_edges.is_empty() {
            doc.insert(
                <OutputEdgeRow as crate::star::LoopRow>::BLOCK,
                self.output_edges.to_block(),
            );
        }
        doc
    }

    /// A linear chain of `size` processes, each consuming its predecessor's output.
    fn example(size: usize) -> Self {
        let process = |i: usize| format!("Example/job{:03}/", i + 1);
        let node = |i: usize| format!("Example/job{:03}/output.star", i + 1);
        let label = "ParticleGroupMetadata.star".to_string();

        let processes = (0..size)
            .map(|i| ProcessRow {
                name: process(i),
                alias: "None".to_string(),
                type_label: "relion.external".to_string(),
                status: ProcessStatus::example(i),
            })
            .collect();
        let nodes = (0..size)
            .map(|i| NodeRow {
                name: node(i),
                type_label: label.clone(),
                depth: Some(1),
            })
            .collect();
        let input_edges = (1..size)
            .map(|i| InputEdgeRow {
                from_node: node(i - 1),
                process: process(i),
            })
            .collect();
        let output_edges = (0..size)
            .map(|i| OutputEdgeRow {
                process: process(i),
                to_node: node(i),
            })
            .collect();

        Self {
            general: Some(PipelineGeneral {
                job_counter: size as u32 + 1,
            }),
            processes,
            nodes,
            input_edges,
            output_edges,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PIPELINE: &str = r#"
# version 50001

data_pipeline_general

_rlnPipeLineJobCounter                       3

# version 50001

data_pipeline_processes

loop_
_rlnPipeLineProcessName #1
_rlnPipeLineProcessAlias #2
_rlnPipeLineProcessTypeLabel #3
_rlnPipeLineProcessStatusLabel #4
Import/job001/       None relion.importmovies  Succeeded
MotionCorr/job002/   None relion.motioncorr.own Running

# version 50001

data_pipeline_nodes

loop_
_rlnPipeLineNodeName #1
_rlnPipeLineNodeTypeLabel #2
_rlnPipeLineNodeTypeLabelDepth #3
Import/job001/movies.star MicrographMovieGroupMetadata.star.relion 1

# version 50001

data_pipeline_input_edges

loop_
_rlnPipeLineEdgeFromNode #1
_rlnPipeLineEdgeProcess #2
Import/job001/movies.star MotionCorr/job002/

# version 50001

data_pipeline_output_edges

loop_
_rlnPipeLineEdgeProcess #1
_rlnPipeLineEdgeToNode #2
Import/job001/ Import/job001/movies.star
"#;

    #[test]
    fn test_parse_pipeline_star() {
        let star = PipelineStar::validate_str(PIPELINE).unwrap();
        assert_eq!(star.general.as_ref().unwrap().job_counter, 3);
        assert_eq!(star.processes.len(), 2);
        assert_eq!(star.processes.rows()[1].status, ProcessStatus::Running);
        assert_eq!(star.nodes.rows()[0].depth, Some(1));
        assert_eq!(star.input_edges.rows()[0].process, "MotionCorr/job002/");
    }

    #[test]
    fn test_bad_status_is_schema_mismatch() {
        let text = PIPELINE.replace("Running", "Sleeping");
        let err = PipelineStar::validate_str(&text).unwrap_err();
        assert!(
            err.to_string()
                .contains("pipeline_processes[1].rlnPipeLineProcessStatusLabel"),
            "{err}"
        );
    }

    #[test]
    fn test_empty_blocks_are_optional() {
        let text = "data_pipeline_general\n_rlnPipeLineJobCounter 1\n\
                    data_pipeline_processes\nloop_\n_rlnPipeLineProcessName #1\n\
                    _rlnPipeLineProcessAlias #2\n_rlnPipeLineProcessTypeLabel #3\n\
                    _rlnPipeLineProcessStatusLabel #4\n";
        let star = PipelineStar::validate_str(text).unwrap();
        assert!(star.processes.is_empty());
        assert!(star.nodes.is_empty());
    }

    #[test]
    fn test_example_round_trips() {
        let star = PipelineStar::example(4);
        let again = PipelineStar::validate_str(&star.to_star_string()).unwrap();
        assert_eq!(again, star);
        assert_eq!(again.input_edges.len(), 3);
    }
}
