//! Builders for RELION project fixtures on a temporary directory

use himena_relion::job::{JobStar, JOB_STAR};
use himena_relion::mrc::MrcHeader;
use himena_relion::pipeline::{
    InputEdgeRow, NodeRow, OutputEdgeRow, PipelineGeneral, PipelineStar, ProcessRow,
    ProcessStatus, DEFAULT_PIPELINE,
};
use himena_relion::star::StarModel;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A project directory removed when the builder is dropped
pub struct ProjectBuilder {
    dir: TempDir,
}

impl ProjectBuilder {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.root().join(rel)
    }

    /// Create `rel` with a `job.star` of the given label and options
    pub fn job(&self, rel: &str, label: &str, options: &[(&str, &str)]) -> PathBuf {
        let dir = self.path(rel);
        fs::create_dir_all(&dir).unwrap();
        JobStar::new(label, options.iter().copied())
            .write(dir.join(JOB_STAR))
            .unwrap();
        dir
    }

    pub fn file(&self, rel: &str, content: &str) -> PathBuf {
        let path = self.path(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        path
    }

    /// Write an MRC header of the given shape
    pub fn mrc(&self, rel: &str, nx: u32, ny: u32, nz: u32) -> PathBuf {
        let path = self.path(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        let header = MrcHeader {
            nx,
            ny,
            nz,
            mode: 2,
            voxel_size: 1.5,
        };
        fs::write(&path, header.to_bytes()).unwrap();
        path
    }

    pub fn pipeline(&self, model: &PipelineStar) -> PathBuf {
        let path = self.path(DEFAULT_PIPELINE);
        model.write(&path).unwrap();
        path
    }
}

/// Builder for [`PipelineStar`] models
#[derive(Default)]
pub struct PipelineBuilder {
    model: PipelineStar,
}

impl PipelineBuilder {
    pub fn new(counter: u32) -> Self {
        let mut model = PipelineStar::default();
        model.general = Some(PipelineGeneral {
            job_counter: counter,
        });
        Self { model }
    }

    pub fn process(mut self, name: &str, label: &str) -> Self {
        self.model.processes.push(ProcessRow {
            name: name.to_string(),
            alias: "None".to_string(),
            type_label: label.to_string(),
            status: ProcessStatus::Succeeded,
        });
        self
    }

    /// A node produced by `process`
    pub fn output(mut self, process: &str, node: &str, label: &str) -> Self {
        self.model.nodes.push(NodeRow {
            name: node.to_string(),
            type_label: label.to_string(),
            depth: None,
        });
        self.model.output_edges.push(OutputEdgeRow {
            process: process.to_string(),
            to_node: node.to_string(),
        });
        self
    }

    pub fn input(mut self, node: &str, process: &str) -> Self {
        self.model.input_edges.push(InputEdgeRow {
            from_node: node.to_string(),
            process: process.to_string(),
        });
        self
    }

    pub fn build(self) -> PipelineStar {
        self.model
    }
}
