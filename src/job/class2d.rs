//! 2D classification jobs (`relion.class2d`).

use super::iteration::{iteration_prefix, IterativeJob};
use super::JobDirectory;
use crate::error::Result;
use crate::mrc::MapFile;

/// `Class2D/job###/`
#[derive(Debug, Clone)]
pub struct Class2DJob {
    dir: JobDirectory,
}

job_kind!(Class2DJob, ["relion.class2d"]);

impl IterativeJob for Class2DJob {}

impl Class2DJob {
    /// Number of iterations requested in `job.star`
    pub fn nr_iter(&self) -> Option<u32> {
        self.dir.get_job_param_as("nr_iter").ok()
    }

    pub fn nr_classes(&self) -> Option<u32> {
        self.dir.get_job_param_as("nr_classes").ok()
    }

    /// Class averages of an iteration, `run_itNNN_classes.mrcs`
    pub fn class_stack(&self, index: u32) -> Result<MapFile> {
        MapFile::open(self.dir.file(format!("{}classes.mrcs", iteration_prefix(index))))
    }
}
