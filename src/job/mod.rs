//! Job directory model
//!
//! Every RELION process owns a folder `<JobTypeDir>/job###/` holding a
//! `job.star` with its parameters. [`JobDirectory`] is the generic view of
//! such a folder; the submodules add typed accessors per job type, selected
//! by the `rlnJobTypeLabel` of `job.star` through the registry.
//!
//! All accessors read the disk at call time. Files a job has not written yet
//! surface as [`RelionError::MissingOutput`], which
//! [`OptionalOutput::optional`](crate::error::OptionalOutput::optional)
//! turns into `None`.

/// Implement [`RelionJob`] and [`JobKind`] for a newtype over `JobDirectory`.
macro_rules! job_kind {
    ($ty:ident, [$($label:literal),+ $(,)?]) => {
        impl $crate::job::RelionJob for $ty {
            fn job_dir(&self) -> &$crate::job::JobDirectory {
                &self.dir
            }

            fn job_dir_mut(&mut self) -> &mut $crate::job::JobDirectory {
                &mut self.dir
            }

            fn as_any(&self) -> &dyn std::any::Any {
                self
            }
        }

        impl $crate::job::JobKind for $ty {
            const LABELS: &'static [&'static str] = &[$($label),+];

            fn from_dir(dir: $crate::job::JobDirectory) -> Self {
                Self { dir }
            }
        }

        impl std::ops::Deref for $ty {
            type Target = $crate::job::JobDirectory;

            fn deref(&self) -> &Self::Target {
                &self.dir
            }
        }
    };
}

pub(crate) use job_kind;

pub mod class2d;
pub mod external;
pub mod import;
pub mod iteration;
pub mod job_star;
pub mod localres;
pub mod maskcreate;
pub mod metadata;
pub mod motioncorr;
pub mod postprocess;
pub mod refine;
pub mod tomo;

use crate::error::{RelionError, Result, ResultExt};
use crate::pipeline::{JobId, Pipeline, PipelineStar};
use crate::star::{StarModel, StarValue};
use serde::Serialize;
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub use class2d::Class2DJob;
pub use external::ExternalJobDirectory;
pub use import::ImportJob;
pub use iteration::{iter_indices, latest_iteration, IterativeJob};
pub use job_star::{JobInfo, JobOptionRow, JobStar, JOB_STAR};
pub use localres::{LocalResJob, LocalResOutputs};
pub use maskcreate::MaskCreateJob;
pub use metadata::{MicrographRow, ModelClassRow, MovieRow, ParticleRow, TomogramRow};
pub use motioncorr::MotionCorrJob;
pub use postprocess::{FscRow, PostProcessGeneral, PostProcessJob};
pub use refine::{Class3DJob, InitialModelJob, Refine3DJob};
pub use tomo::{ReconstructParticlesJob, TomogramJob};

/// Exit marker files RELION writes into a finished job directory
pub const EXIT_SUCCESS: &str = "RELION_JOB_EXIT_SUCCESS";
pub const EXIT_FAILURE: &str = "RELION_JOB_EXIT_FAILURE";
pub const EXIT_ABORTED: &str = "RELION_JOB_EXIT_ABORTED";

/// Run state derived from the files in a job directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum JobState {
    Succeeded,
    Failed,
    Aborted,
    /// Log output exists but no exit marker yet
    Running,
    Unknown,
}

/// Generic view of one job folder.
#[derive(Debug, Clone)]
pub struct JobDirectory {
    path: PathBuf,
    job_star: JobStar,
}

impl JobDirectory {
    /// Open the job folder containing `job_star_path`
    pub fn from_job_star(job_star_path: impl AsRef<Path>) -> Result<Self> {
        let job_star_path = job_star_path.as_ref();
        let job_star = JobStar::validate_file(job_star_path)?;
        let path = job_star_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        debug!(
            "Parsed {} ({}, {} parameters)",
            job_star_path.display(),
            job_star.job.type_label,
            job_star.options.len()
        );
        Ok(Self { path, job_star })
    }

    /// Open a job folder by its path
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_job_star(path.as_ref().join(JOB_STAR))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn job_star(&self) -> &JobStar {
        &self.job_star
    }

    pub fn job_type_label(&self) -> &str {
        &self.job_star.job.type_label
    }

    pub fn job_is_continue(&self) -> bool {
        self.job_star.job.is_continue
    }

    pub fn job_is_tomo(&self) -> bool {
        self.job_star.job.is_tomo
    }

    /// Re-read `job.star` from disk
    pub fn reparse(&mut self) -> Result<()> {
        self.job_star = JobStar::validate_file(self.path.join(JOB_STAR))?;
        Ok(())
    }

    /// Parameters in file order
    pub fn params(&self) -> impl Iterator<Item = (&str, &str)> {
        self.job_star
            .options
            .iter()
            .map(|row| (row.variable.as_str(), row.value.as_str()))
    }

    pub fn get_job_param(&self, name: &str) -> Result<&str> {
        self.job_star
            .get(name)
            .ok_or_else(|| RelionError::schema(format!("joboptions_values.{name}"), "no such parameter"))
    }

    pub fn get_job_param_or<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        self.job_star.get(name).unwrap_or(default)
    }

    /// A parameter coerced like a STAR cell (`Yes`/`No` booleans, numbers)
    pub fn get_job_param_as<T: StarValue>(&self, name: &str) -> Result<T> {
        let raw = self.get_job_param(name)?;
        T::parse_star(raw).ok_or_else(|| {
            RelionError::schema(
                format!("joboptions_values.{name}"),
                format!("cannot coerce {raw:?} to {}", T::type_name()),
            )
        })
    }

    pub fn get_job_params_as_dict(&self) -> BTreeMap<String, String> {
        self.params()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    /// `<root>` for a job at `<root>/<JobTypeDir>/job###`
    pub fn project_root(&self) -> PathBuf {
        self.path
            .parent()
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .unwrap_or_default()
    }

    /// Resolve a project-relative path; absolute paths are returned as is
    pub fn resolve_path(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_root().join(path)
        }
    }

    pub fn job_number(&self) -> Option<JobId> {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(JobId::parse)
    }

    pub fn job_type_dir(&self) -> Option<&str> {
        self.path.parent()?.file_name()?.to_str()
    }

    /// `Class2D/job005/`, the name the pipeline uses for this job
    pub fn process_name(&self) -> Option<String> {
        Some(format!("{}/{}/", self.job_type_dir()?, self.job_number()?))
    }

    /// A file of this job; it may not exist yet
    pub fn file(&self, name: impl AsRef<Path>) -> PathBuf {
        self.path.join(name)
    }

    /// A file of this job, or `MissingOutput` when it is not there yet
    pub fn existing_file(&self, name: impl AsRef<Path>) -> Result<PathBuf> {
        let path = self.file(name);
        if path.exists() {
            Ok(path)
        } else {
            Err(RelionError::MissingOutput(path))
        }
    }

    pub fn state(&self) -> JobState {
        if self.file(EXIT_SUCCESS).exists() {
            JobState::Succeeded
        } else if self.file(EXIT_FAILURE).exists() {
            JobState::Failed
        } else if self.file(EXIT_ABORTED).exists() {
            JobState::Aborted
        } else if self.file("run.out").exists() {
            JobState::Running
        } else {
            JobState::Unknown
        }
    }

    fn read_text(&self, name: &str) -> Result<String> {
        let path = self.existing_file(name)?;
        fs::read_to_string(&path)
            .map_err(RelionError::from)
            .with_context(|| format!("Failed to read {}", path.display()))
    }

    pub fn run_out(&self) -> Result<String> {
        self.read_text("run.out")
    }

    pub fn run_err(&self) -> Result<String> {
        self.read_text("run.err")
    }

    pub fn note(&self) -> Result<String> {
        self.read_text("note.txt")
    }

    /// The job's own `job_pipeline.star`, with node paths resolved against the project root
    pub fn job_pipeline(&self) -> Result<Pipeline> {
        let model = PipelineStar::validate_file(self.file("job_pipeline.star"))?;
        Ok(Pipeline::from_model(model, self.project_root()))
    }
}

/// A job directory specialization, used through the registry as a trait object.
pub trait RelionJob: Any + Send + Sync + fmt::Debug {
    fn job_dir(&self) -> &JobDirectory;

    fn job_dir_mut(&mut self) -> &mut JobDirectory;

    fn as_any(&self) -> &dyn Any;

    /// Re-read `job.star`
    fn reparse(&mut self) -> Result<()> {
        self.job_dir_mut().reparse()
    }
}

impl dyn RelionJob {
    pub fn downcast_ref<T: RelionJob>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    pub fn is<T: RelionJob>(&self) -> bool {
        self.as_any().is::<T>()
    }
}

/// A concrete job class bound to one or more type labels.
pub trait JobKind: RelionJob + Sized {
    /// Labels this class handles; the first one is canonical
    const LABELS: &'static [&'static str];

    fn from_dir(dir: JobDirectory) -> Self;
}

impl RelionJob for JobDirectory {
    fn job_dir(&self) -> &JobDirectory {
        self
    }

    fn job_dir_mut(&mut self) -> &mut JobDirectory {
        self
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;

    fn job(root: &Path, label: &str) -> JobDirectory {
        let dir = root.join("Class2D/job005");
        fs::create_dir_all(&dir).unwrap();
        JobStar::new(label, [("nr_iter", "20"), ("do_ctf", "Yes"), ("fn_img", "Extract/job004/particles.star")])
            .write(dir.join(JOB_STAR))
            .unwrap();
        JobDirectory::open(&dir).unwrap()
    }

    #[test]
    fn test_params_and_paths() {
        let tmp = tempfile::tempdir().unwrap();
        let job = job(tmp.path(), "relion.class2d");
        assert_eq!(job.job_type_label(), "relion.class2d");
        assert_eq!(job.get_job_param("nr_iter").unwrap(), "20");
        assert_eq!(job.get_job_param_as::<u32>("nr_iter").unwrap(), 20);
        assert!(job.get_job_param_as::<bool>("do_ctf").unwrap());
        assert_eq!(job.get_job_param_or("tau_fudge", "2"), "2");
        assert!(job.get_job_param("missing").is_err());
        assert_eq!(job.get_job_params_as_dict().len(), 3);

        assert_eq!(job.project_root(), tmp.path());
        assert_eq!(
            job.resolve_path(job.get_job_param("fn_img").unwrap()),
            tmp.path().join("Extract/job004/particles.star")
        );
        assert_eq!(job.job_number(), Some(JobId(5)));
        assert_eq!(job.process_name().as_deref(), Some("Class2D/job005/"));
    }

    #[test]
    fn test_state_from_markers() {
        let tmp = tempfile::tempdir().unwrap();
        let job = job(tmp.path(), "relion.class2d");
        assert_eq!(job.state(), JobState::Unknown);
        fs::write(job.file("run.out"), "iteration 1\n").unwrap();
        assert_eq!(job.state(), JobState::Running);
        assert_eq!(job.run_out().unwrap(), "iteration 1\n");
        assert!(job.run_err().unwrap_err().is_missing_output());
        File::create(job.file(EXIT_FAILURE)).unwrap();
        assert_eq!(job.state(), JobState::Failed);
    }

    #[test]
    fn test_reparse_picks_up_changes() {
        let tmp = tempfile::tempdir().unwrap();
        let mut job = job(tmp.path(), "relion.class2d");
        JobStar::new("relion.class2d", [("nr_iter", "25")])
            .write(job.file(JOB_STAR))
            .unwrap();
        assert_eq!(job.get_job_param("nr_iter").unwrap(), "20");
        job.reparse().unwrap();
        assert_eq!(job.get_job_param("nr_iter").unwrap(), "25");
    }

    #[test]
    fn test_missing_job_star() {
        let tmp = tempfile::tempdir().unwrap();
        let err = JobDirectory::open(tmp.path()).unwrap_err();
        assert!(err.is_missing_output());
    }
}
