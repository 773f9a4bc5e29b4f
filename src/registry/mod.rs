//! Job registry
//!
//! Maps the `rlnJobTypeLabel` of a `job.star` to the job class that wraps
//! its directory and the viewer that shows it, and the import path of an
//! external job to its implementation.
//!
//! Registration happens at startup: built-in job types first, then
//! extensions, then user jobs. [`JobRegistry::seal`] ends that phase; later
//! registrations are logged and dropped.
//!
//! Lookup by label never fails. Labels RELION extends with a suffix
//! (`relion.class2d.em`) fall back to their base label, and unknown labels
//! get the generic [`JobDirectory`].

pub mod connections;

pub use connections::{builtin_connections, suggest_next, ConnectionHint, NodeResolver, NodeSource, Suggestion};

use crate::error::{RelionError, Result, ResultExt};
use crate::external::builtins::builtin_external_jobs;
use crate::external::{harvest, ExternalJob};
use crate::job::{
    Class2DJob, Class3DJob, ExternalJobDirectory, ImportJob, InitialModelJob, JobDirectory,
    JobKind, LocalResJob, MaskCreateJob, MotionCorrJob, PostProcessJob, ReconstructParticlesJob,
    Refine3DJob, RelionJob, TomogramJob, JOB_STAR,
};
use crate::viewer::{builtin_viewers, default_viewer, JobViewer, ViewerFactory};
use once_cell::sync::Lazy;
use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, error, info, warn};

/// Builds the job class for a directory
pub type JobConstructor = fn(JobDirectory) -> Box<dyn RelionJob>;

fn construct<T: JobKind>(dir: JobDirectory) -> Box<dyn RelionJob> {
    Box::new(T::from_dir(dir))
}

/// A registered job class
#[derive(Clone, Copy)]
pub struct JobClassInfo {
    pub type_id: TypeId,
    pub type_name: &'static str,
    pub construct: JobConstructor,
}

impl JobClassInfo {
    pub fn of<T: JobKind>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            construct: construct::<T>,
        }
    }
}

impl fmt::Debug for JobClassInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name)
    }
}

/// What is known about one type label
#[derive(Debug, Clone, Copy, Default)]
pub struct LabelEntry {
    pub class: Option<JobClassInfo>,
    pub viewer: Option<ViewerFactory>,
}

/// `pattern` equals `label`, or `label` extends it with `.suffix`
pub(crate) fn label_matches(pattern: &str, label: &str) -> bool {
    label == pattern
        || label
            .strip_prefix(pattern)
            .is_some_and(|rest| rest.starts_with('.'))
}

#[derive(Default)]
pub struct JobRegistry {
    by_label: HashMap<String, LabelEntry>,
    by_import_path: HashMap<String, Arc<dyn ExternalJob>>,
    connections: Vec<ConnectionHint>,
    sealed: bool,
}

impl JobRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with every built-in job type, viewer, external job and hint
    pub fn with_builtins() -> Result<Self> {
        let mut registry = Self::new();
        registry.register_job::<ImportJob>()?;
        registry.register_job::<MotionCorrJob>()?;
        registry.register_job::<Class2DJob>()?;
        registry.register_job::<InitialModelJob>()?;
        registry.register_job::<Class3DJob>()?;
        registry.register_job::<Refine3DJob>()?;
        registry.register_job::<MaskCreateJob>()?;
        registry.register_job::<PostProcessJob>()?;
        registry.register_job::<LocalResJob>()?;
        registry.register_job::<TomogramJob>()?;
        registry.register_job::<ReconstructParticlesJob>()?;
        registry.register_job::<ExternalJobDirectory>()?;
        for (label, factory) in builtin_viewers() {
            registry.register_viewer(label, factory);
        }
        for job in builtin_external_jobs() {
            registry.register_external_job(job)?;
        }
        for hint in builtin_connections() {
            registry.add_connection(hint);
        }
        Ok(registry)
    }

    fn accepting(&self, what: &str) -> bool {
        if self.sealed {
            warn!("Registry is sealed, ignoring registration of {what}");
        }
        !self.sealed
    }

    /// Bind every label of `T`; identical registrations are no-ops
    pub fn register_job<T: JobKind>(&mut self) -> Result<()> {
        let info = JobClassInfo::of::<T>();
        if !self.accepting(info.type_name) {
            return Ok(());
        }
        for label in T::LABELS {
            if let Some(existing) = self.by_label.get(*label).and_then(|e| e.class) {
                if existing.type_id != info.type_id {
                    return Err(RelionError::RegistryConflict {
                        key: label.to_string(),
                        existing: existing.type_name.to_string(),
                        incoming: info.type_name.to_string(),
                    });
                }
            }
        }
        for label in T::LABELS {
            self.by_label.entry(label.to_string()).or_default().class = Some(info);
        }
        debug!("Registered {} for {:?}", info.type_name, T::LABELS);
        Ok(())
    }

    /// Set the viewer for a label, replacing an earlier one
    pub fn register_viewer(&mut self, label: impl Into<String>, factory: ViewerFactory) {
        let label = label.into();
        if self.accepting(&format!("a viewer for {label}")) {
            self.by_label.entry(label).or_default().viewer = Some(factory);
        }
    }

    pub fn register_external_job(&mut self, job: Arc<dyn ExternalJob>) -> Result<()> {
        let path = job.import_path().to_string();
        if !self.accepting(&path) {
            return Ok(());
        }
        // parameter lists that cannot fit a job.star fail here, not at scheduling
        harvest(job.params()).with_context(|| format!("Cannot register {path}"))?;
        if let Some(existing) = self.by_import_path.get(&path) {
            if existing.class_name() != job.class_name() {
                return Err(RelionError::RegistryConflict {
                    key: path,
                    existing: existing.class_name().to_string(),
                    incoming: job.class_name().to_string(),
                });
            }
            return Ok(());
        }
        debug!("Registered external job {path}");
        self.by_import_path.insert(path, job);
        Ok(())
    }

    pub fn add_connection(&mut self, hint: ConnectionHint) {
        if self.accepting(&format!("hint {} -> {}", hint.source, hint.target)) {
            self.connections.push(hint);
        }
    }

    /// End the registration phase
    pub fn seal(&mut self) {
        if !self.sealed {
            info!(
                "Job registry sealed with {} labels and {} external jobs",
                self.by_label.len(),
                self.by_import_path.len()
            );
        }
        self.sealed = true;
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Entry for a label, trying shorter dotted prefixes when the full label is unknown
    pub fn lookup(&self, label: &str) -> Option<&LabelEntry> {
        let mut candidate = label;
        loop {
            if let Some(entry) = self.by_label.get(candidate) {
                return Some(entry);
            }
            candidate = &candidate[..candidate.rfind('.')?];
        }
    }

    pub fn pick_job_class(&self, import_path: &str) -> Option<Arc<dyn ExternalJob>> {
        self.by_import_path.get(import_path).cloned()
    }

    /// Wrap an opened directory in the class registered for its label
    pub fn job_for_dir(&self, dir: JobDirectory) -> Box<dyn RelionJob> {
        match self.lookup(dir.job_type_label()).and_then(|e| e.class) {
            Some(class) => (class.construct)(dir),
            None => {
                debug!("No job class for {:?}, using the generic one", dir.job_type_label());
                Box::new(dir)
            }
        }
    }

    /// Open a job folder (or its `job.star`) as its registered class
    pub fn job_directory_for(&self, path: impl AsRef<Path>) -> Result<Box<dyn RelionJob>> {
        let path = path.as_ref();
        let dir = if path.file_name().is_some_and(|n| n == JOB_STAR) {
            JobDirectory::from_job_star(path)?
        } else {
            JobDirectory::open(path)?
        };
        Ok(self.job_for_dir(dir))
    }

    /// Viewer for a job: the external job's own widget, the label's viewer, then the log viewer
    pub fn viewer_for(&self, job: &dyn RelionJob) -> Box<dyn JobViewer> {
        if let Some(external) = job.downcast_ref::<ExternalJobDirectory>() {
            let widget = external
                .import_path()
                .and_then(|path| self.pick_job_class(path))
                .and_then(|class| class.provide_widget(external));
            if let Some(widget) = widget {
                return widget;
            }
        }
        match self.lookup(job.job_dir().job_type_label()).and_then(|e| e.viewer) {
            Some(factory) => factory(),
            None => default_viewer(),
        }
    }

    pub fn suggest_next(&self, job: &dyn RelionJob) -> Vec<Suggestion> {
        suggest_next(&self.connections, job)
    }

    /// Registered labels, sorted
    pub fn labels(&self) -> Vec<&str> {
        let mut labels: Vec<_> = self.by_label.keys().map(String::as_str).collect();
        labels.sort_unstable();
        labels
    }

    /// Registered external jobs, sorted by import path
    pub fn external_jobs(&self) -> Vec<Arc<dyn ExternalJob>> {
        let mut jobs: Vec<_> = self.by_import_path.values().cloned().collect();
        jobs.sort_by(|a, b| a.import_path().cmp(b.import_path()));
        jobs
    }
}

impl fmt::Debug for JobRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobRegistry")
            .field("labels", &self.labels())
            .field("external_jobs", &self.by_import_path.len())
            .field("connections", &self.connections.len())
            .field("sealed", &self.sealed)
            .finish()
    }
}

static GLOBAL: Lazy<RwLock<JobRegistry>> = Lazy::new(|| {
    let registry = JobRegistry::with_builtins().unwrap_or_else(|e| {
        error!("Failed to register built-in jobs: {e}");
        JobRegistry::new()
    });
    RwLock::new(registry)
});

/// The process-wide registry, pre-populated with the built-ins
pub fn global() -> &'static RwLock<JobRegistry> {
    &GLOBAL
}

pub fn read() -> RwLockReadGuard<'static, JobRegistry> {
    GLOBAL.read().unwrap_or_else(PoisonError::into_inner)
}

pub fn write() -> RwLockWriteGuard<'static, JobRegistry> {
    GLOBAL.write().unwrap_or_else(PoisonError::into_inner)
}
