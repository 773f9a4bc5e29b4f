//! Viewers for jobs whose main output is a single density map.

use super::{file_name, is_log_file, job_as, settle, JobViewer, ViewStatus};
use crate::error::{OptionalOutput, Result};
use crate::job::{LocalResJob, LocalResOutputs, MaskCreateJob, PostProcessJob, RelionJob};
use crate::mrc::{MapFile, MrcHeader};
use std::any::Any;
use std::path::Path;

fn shape(header: &MrcHeader) -> (u32, u32, u32) {
    (header.nx, header.ny, header.nz)
}

/// Sharpened map and FSC curve of a post-processing job.
#[derive(Debug, Default)]
pub struct PostProcessViewer {
    status: ViewStatus,
    loads: u32,
    pub shape: Option<(u32, u32, u32)>,
    pub has_masked_map: bool,
    pub final_resolution: Option<f64>,
    /// `(resolution in 1/Å, corrected FSC)` per shell
    pub fsc: Vec<(f64, f64)>,
}

impl PostProcessViewer {
    fn load(&mut self, job: &PostProcessJob) -> Result<ViewStatus> {
        let Some(map) = job.map_mrc(false)? else {
            return Ok(ViewStatus::NotReady("postprocess.mrc not written yet".to_string()));
        };
        self.shape = Some(shape(&map.header));
        self.has_masked_map = job.map_mrc(true)?.is_some();
        self.final_resolution = job.general().optional()?.map(|g| g.final_resolution);
        self.fsc = job
            .fsc_dataframe()
            .optional()?
            .map(|rows| rows.iter().map(|r| (r.resolution, r.fsc_corrected)).collect())
            .unwrap_or_default();
        Ok(ViewStatus::Ready)
    }
}

impl JobViewer for PostProcessViewer {
    fn label(&self) -> &str {
        "Post-processing"
    }

    fn initialize(&mut self, job: &dyn RelionJob) -> Result<()> {
        self.loads += 1;
        let job: PostProcessJob = job_as(job);
        self.status = self.load(&job).or_else(settle)?;
        Ok(())
    }

    fn is_relevant(&self, _job_dir: &Path, path: &Path) -> bool {
        !is_log_file(path) && file_name(path).starts_with("postprocess")
    }

    fn status(&self) -> &ViewStatus {
        &self.status
    }

    fn load_count(&self) -> u32 {
        self.loads
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Local resolution map with its scale.
#[derive(Debug, Default)]
pub struct LocalResViewer {
    status: ViewStatus,
    loads: u32,
    pub outputs: Option<LocalResOutputs>,
    pub shape: Option<(u32, u32, u32)>,
}

impl LocalResViewer {
    fn load(&mut self, job: &LocalResJob) -> Result<ViewStatus> {
        let outputs = job.outputs()?;
        self.shape = Some(shape(&MapFile::open(&outputs.locres)?.header));
        self.outputs = Some(outputs);
        Ok(ViewStatus::Ready)
    }
}

impl JobViewer for LocalResViewer {
    fn label(&self) -> &str {
        "Local resolution"
    }

    fn initialize(&mut self, job: &dyn RelionJob) -> Result<()> {
        self.loads += 1;
        let job: LocalResJob = job_as(job);
        self.status = self.load(&job).or_else(settle)?;
        Ok(())
    }

    fn is_relevant(&self, _job_dir: &Path, path: &Path) -> bool {
        !is_log_file(path) && file_name(path).starts_with("relion_locres")
    }

    fn status(&self) -> &ViewStatus {
        &self.status
    }

    fn load_count(&self) -> u32 {
        self.loads
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// The mask a mask-creation job wrote.
#[derive(Debug, Default)]
pub struct MaskCreateViewer {
    status: ViewStatus,
    loads: u32,
    pub shape: Option<(u32, u32, u32)>,
    pub threshold: Option<f64>,
}

impl MaskCreateViewer {
    fn load(&mut self, job: &MaskCreateJob) -> Result<ViewStatus> {
        self.threshold = job.threshold();
        match job.mask_mrc()? {
            Some(mask) => {
                self.shape = Some(shape(&mask.header));
                Ok(ViewStatus::Ready)
            }
            None => Ok(ViewStatus::NotReady("mask.mrc not written yet".to_string())),
        }
    }
}

impl JobViewer for MaskCreateViewer {
    fn label(&self) -> &str {
        "Mask"
    }

    fn initialize(&mut self, job: &dyn RelionJob) -> Result<()> {
        self.loads += 1;
        let job: MaskCreateJob = job_as(job);
        self.status = self.load(&job).or_else(settle)?;
        Ok(())
    }

    fn is_relevant(&self, _job_dir: &Path, path: &Path) -> bool {
        file_name(path) == "mask.mrc"
    }

    fn status(&self) -> &ViewStatus {
        &self.status
    }

    fn load_count(&self) -> u32 {
        self.loads
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
