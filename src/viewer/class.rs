//! Viewers for the iterative classification and refinement jobs.

use super::{file_name, is_log_file, job_as, settle, JobViewer, ViewStatus};
use crate::error::Result;
use crate::job::iteration::is_iteration_output;
use crate::job::refine::ClassMap;
use crate::job::{Class2DJob, Class3DJob, InitialModelJob, IterativeJob, RelionJob, Refine3DJob};
use crate::mrc::MapFile;
use std::any::Any;
use std::path::Path;

/// Class averages of the current 2D classification iteration.
#[derive(Debug, Default)]
pub struct Class2DViewer {
    status: ViewStatus,
    loads: u32,
    pub iteration: Option<u32>,
    /// `rlnClassDistribution` per class
    pub distribution: Vec<f64>,
    pub resolutions: Vec<Option<f64>>,
    /// Images in `run_itNNN_classes.mrcs`
    pub stack_size: Option<usize>,
}

impl Class2DViewer {
    fn load(&mut self, job: &Class2DJob) -> Result<ViewStatus> {
        let Some(iteration) = job.current_iteration() else {
            return Ok(ViewStatus::NotReady("no iterations yet".to_string()));
        };
        self.iteration = Some(iteration);
        let model = job.model(iteration)?;
        self.distribution = model.iter().map(|c| c.class_distribution).collect();
        self.resolutions = model.iter().map(|c| c.estimated_resolution).collect();
        self.stack_size = Some(job.class_stack(iteration)?.len());
        Ok(ViewStatus::Ready)
    }
}

impl JobViewer for Class2DViewer {
    fn label(&self) -> &str {
        "2D classes"
    }

    fn initialize(&mut self, job: &dyn RelionJob) -> Result<()> {
        self.loads += 1;
        let job: Class2DJob = job_as(job);
        self.status = self.load(&job).or_else(settle)?;
        Ok(())
    }

    fn is_relevant(&self, _job_dir: &Path, path: &Path) -> bool {
        !is_log_file(path) && is_iteration_output(path)
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

/// Class volumes of Class3D, InitialModel and Refine3D jobs.
#[derive(Debug, Default)]
pub struct Class3DViewer {
    status: ViewStatus,
    loads: u32,
    pub iteration: Option<u32>,
    pub classes: Vec<ClassMap>,
    /// `(nx, ny, nz)` of the first class volume
    pub shape: Option<(u32, u32, u32)>,
    pub distribution: Vec<f64>,
}

impl Class3DViewer {
    fn load(&mut self, job: &dyn RelionJob) -> Result<ViewStatus> {
        let label = job.job_dir().job_type_label();
        let (iteration, classes, model) = if label.starts_with("relion.refine3d") {
            let job: Refine3DJob = job_as(job);
            Self::collect(&job, |it| job.classes(it))?
        } else if label.starts_with("relion.initialmodel") {
            let job: InitialModelJob = job_as(job);
            Self::collect(&job, |it| job.classes(it))?
        } else {
            let job: Class3DJob = job_as(job);
            Self::collect(&job, |it| job.classes(it))?
        };
        let Some(iteration) = iteration else {
            return Ok(ViewStatus::NotReady("no iterations yet".to_string()));
        };
        self.iteration = Some(iteration);
        self.shape = match classes.first() {
            Some((map, _)) => {
                let h = MapFile::open(map)?.header;
                Some((h.nx, h.ny, h.nz))
            }
            None => None,
        };
        self.classes = classes;
        self.distribution = model;
        Ok(ViewStatus::Ready)
    }

    #[allow(clippy::type_complexity)]
    fn collect<J, F>(job: &J, classes: F) -> Result<(Option<u32>, Vec<ClassMap>, Vec<f64>)>
    where
        J: IterativeJob,
        F: Fn(u32) -> Result<Vec<ClassMap>>,
    {
        let Some(iteration) = job.current_iteration() else {
            return Ok((None, Vec::new(), Vec::new()));
        };
        let maps = classes(iteration)?;
        let model = job
            .model(iteration)
            .map(|m| m.iter().map(|c| c.class_distribution).collect())
            .unwrap_or_default();
        Ok((Some(iteration), maps, model))
    }
}

impl JobViewer for Class3DViewer {
    fn label(&self) -> &str {
        "3D classes"
    }

    fn initialize(&mut self, job: &dyn RelionJob) -> Result<()> {
        self.loads += 1;
        self.status = self.load(job).or_else(settle)?;
        Ok(())
    }

    fn is_relevant(&self, _job_dir: &Path, path: &Path) -> bool {
        if is_log_file(path) {
            return false;
        }
        let name = file_name(path);
        is_iteration_output(path) || (name.starts_with("run_class") && name.ends_with(".mrc"))
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
