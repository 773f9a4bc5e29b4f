//! Headless job viewers
//!
//! A viewer summarizes one job directory for display. The rendering side
//! owns the widgets; this module owns what they show and when to refresh.
//!
//! # Refresh contract
//!
//! The change dispatcher hands every `(job_dir, path)` event to
//! [`JobViewer::on_job_updated`]. The viewer decides with a cheap
//! [`JobViewer::is_relevant`] predicate on the file name whether to rebuild
//! its state through [`JobViewer::initialize`]. Initialization only reads
//! the disk, so repeating it is harmless.
//!
//! Files a job has not written yet are not errors here: the viewer moves to
//! [`ViewStatus::NotReady`] and waits for the next event.

mod class;
mod log;
mod maps;

pub use class::{Class2DViewer, Class3DViewer};
pub use log::{ExternalViewer, LogViewer};
pub use maps::{LocalResViewer, MaskCreateViewer, PostProcessViewer};

use crate::error::{RelionError, Result};
use crate::job::{JobKind, RelionJob};
use std::any::Any;
use std::path::Path;
use tracing::debug;

/// What a viewer currently shows
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ViewStatus {
    /// Never initialized
    #[default]
    Empty,
    /// Outputs are not on disk yet
    NotReady(String),
    Ready,
    /// Outputs exist but could not be read; shown inline
    Failed(String),
}

impl ViewStatus {
    pub fn is_ready(&self) -> bool {
        matches!(self, ViewStatus::Ready)
    }
}

/// Display state for one job directory.
pub trait JobViewer: Any + Send {
    /// Name shown in the viewer tab
    fn label(&self) -> &str;

    /// Rebuild the state from disk
    fn initialize(&mut self, job: &dyn RelionJob) -> Result<()>;

    /// Whether a change to `path` inside `job_dir` affects this viewer
    fn is_relevant(&self, job_dir: &Path, path: &Path) -> bool;

    fn status(&self) -> &ViewStatus;

    /// How many times the state was rebuilt
    fn load_count(&self) -> u32;

    /// Re-initialize when the change is relevant; returns whether it was
    fn on_job_updated(&mut self, job: &dyn RelionJob, path: &Path) -> Result<bool> {
        if !self.is_relevant(job.job_dir().path(), path) {
            debug!("{}: ignoring change to {}", self.label(), path.display());
            return Ok(false);
        }
        self.initialize(job)?;
        Ok(true)
    }

    fn as_any(&self) -> &dyn Any;
}

impl dyn JobViewer {
    pub fn downcast_ref<T: JobViewer>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }
}

impl std::fmt::Debug for dyn JobViewer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobViewer")
            .field("label", &self.label())
            .field("status", self.status())
            .finish()
    }
}

/// Builds a fresh viewer for a job type
pub type ViewerFactory = fn() -> Box<dyn JobViewer>;

/// A [`ViewerFactory`] for any default-constructible viewer
pub fn new_viewer<V: JobViewer + Default>() -> Box<dyn JobViewer> {
    Box::new(V::default())
}

/// Viewer factories for the built-in job labels
pub fn builtin_viewers() -> Vec<(&'static str, ViewerFactory)> {
    vec![
        ("relion.class2d", new_viewer::<Class2DViewer> as ViewerFactory),
        ("relion.class3d", new_viewer::<Class3DViewer> as ViewerFactory),
        ("relion.initialmodel", new_viewer::<Class3DViewer> as ViewerFactory),
        ("relion.refine3d", new_viewer::<Class3DViewer> as ViewerFactory),
        ("relion.postprocess", new_viewer::<PostProcessViewer> as ViewerFactory),
        ("relion.localres", new_viewer::<LocalResViewer> as ViewerFactory),
        ("relion.maskcreate", new_viewer::<MaskCreateViewer> as ViewerFactory),
        ("relion.external", new_viewer::<ExternalViewer> as ViewerFactory),
    ]
}

/// Fallback for labels without a viewer of their own
pub fn default_viewer() -> Box<dyn JobViewer> {
    Box::new(LogViewer::default())
}

/// The job as `T`, rebuilt from its directory when it was opened generically
pub(crate) fn job_as<T: JobKind + Clone>(job: &dyn RelionJob) -> T {
    job.downcast_ref::<T>()
        .cloned()
        .unwrap_or_else(|| T::from_dir(job.job_dir().clone()))
}

/// Map a load error onto a status; programmer errors propagate
pub(crate) fn settle(err: RelionError) -> Result<ViewStatus> {
    if err.is_missing_output() {
        Ok(ViewStatus::NotReady(err.to_string()))
    } else if err.is_recoverable() {
        Ok(ViewStatus::Failed(err.to_string()))
    } else {
        Err(err)
    }
}

/// Run logs; map and table viewers never react to them
pub(crate) fn is_log_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("out" | "err")
    )
}

pub(crate) fn file_name(path: &Path) -> &str {
    path.file_name().and_then(|n| n.to_str()).unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_settle_classifies_errors() {
        let missing = RelionError::MissingOutput(PathBuf::from("postprocess.mrc"));
        assert!(matches!(settle(missing).unwrap(), ViewStatus::NotReady(_)));

        let broken = RelionError::schema("fsc.rlnResolution", "not a number");
        assert!(matches!(settle(broken).unwrap(), ViewStatus::Failed(_)));

        assert!(settle(RelionError::TooManyParameters { count: 11, max: 10 }).is_err());
    }

    #[test]
    fn test_log_files() {
        assert!(is_log_file(Path::new("PostProcess/job010/run.out")));
        assert!(is_log_file(Path::new("run.err")));
        assert!(!is_log_file(Path::new("postprocess.mrc")));
    }

    #[test]
    fn test_builtin_labels_are_unique() {
        let viewers = builtin_viewers();
        let mut labels: Vec<_> = viewers.iter().map(|(l, _)| *l).collect();
        labels.sort_unstable();
        labels.dedup();
        assert_eq!(labels.len(), viewers.len());
    }
}
