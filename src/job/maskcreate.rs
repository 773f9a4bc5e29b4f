//! Mask creation jobs (`relion.maskcreate`).

use super::JobDirectory;
use crate::error::{OptionalOutput, Result};
use crate::mrc::MapFile;
use std::path::PathBuf;

/// `MaskCreate/job###/`
#[derive(Debug, Clone)]
pub struct MaskCreateJob {
    dir: JobDirectory,
}

job_kind!(MaskCreateJob, ["relion.maskcreate"]);

impl MaskCreateJob {
    /// `mask.mrc`, `None` while the job is running
    pub fn mask_mrc(&self) -> Result<Option<MapFile>> {
        MapFile::open(self.dir.file("mask.mrc")).optional()
    }

    /// The map the mask was derived from
    pub fn input_map(&self) -> Result<PathBuf> {
        Ok(self.dir.resolve_path(self.dir.get_job_param("fn_in")?))
    }

    pub fn threshold(&self) -> Option<f64> {
        self.dir.get_job_param_as("inimask_threshold").ok()
    }
}
