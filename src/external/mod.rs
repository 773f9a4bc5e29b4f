//! External job protocol
//!
//! RELION runs an "external" job by invoking the executable stored in the
//! `fn_exe` parameter of its `job.star`. For jobs provided by this
//! application that executable is `himena-relion <import_path>`; the rest of
//! the command line carries the parameters as `--name value` pairs.
//!
//! - [`ExternalJob`] - what a job declares: parameters, output nodes, `run`
//! - [`params`] - parameter types and command-line string parsing
//! - [`job_star`] - [`prep_job_star`] turns a declaration into a `job.star`
//! - [`cli`] - the command-line entry point RELION calls
//! - [`builtins`] - jobs that ship with the application

pub mod builtins;
pub mod cli;
pub mod job_star;
pub mod params;

pub use cli::{cli_args, describe, parse_args, run_external};
pub use job_star::{
    harvest, prep_job_star, prep_job_star_with_config, prep_job_star_with_env, Harvest,
    RESERVED_VARIABLES,
};
pub use params::{ParamSpec, ParamType, ParamValue, ParamValues};

use crate::job::ExternalJobDirectory;
use crate::pipeline::NodeType;
use crate::viewer::JobViewer;
use std::path::{Path, PathBuf};

/// Prefix of `fn_exe` for jobs this application runs
pub const TOOL_PREFIX: &str = "himena-relion ";

/// Generic `paramN_label`/`paramN_value` slots in `job.star`
pub const MAX_PARAMS: usize = 10;

/// Marker file listing the nodes an external job produced
pub const OUTPUT_NODES_STAR: &str = "RELION_OUTPUT_NODES.star";

/// Where a running external job writes and how it resolves input paths.
#[derive(Debug, Clone)]
pub struct RunContext {
    output_dir: PathBuf,
    project_root: PathBuf,
}

impl RunContext {
    /// RELION starts jobs from the project root, so that is the default root
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            project_root: PathBuf::from("."),
        }
    }

    pub fn with_project_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.project_root = root.into();
        self
    }

    /// The job directory as given on the command line
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Absolute location of the job directory
    pub fn output_path(&self, name: impl AsRef<Path>) -> PathBuf {
        self.resolve(&self.output_dir).join(name)
    }

    /// Resolve a project-relative input path
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_root.join(path)
        }
    }
}

/// A user-defined process RELION can schedule like a native job.
///
/// Parameters are declared explicitly through [`ExternalJob::params`].
/// Names `o`, `j` and the reserved `in_*` inputs map onto RELION's own
/// fields; everything else takes one of the generic parameter slots.
pub trait ExternalJob: Send + Sync + 'static {
    /// Dotted path the job is registered and invoked under
    fn import_path(&self) -> &str;

    /// Title shown in menus
    fn job_title(&self) -> &str {
        self.import_path()
            .rsplit('.')
            .next()
            .unwrap_or_else(|| self.import_path())
    }

    /// Menu the job is listed under
    fn menu_id(&self) -> Option<&str> {
        None
    }

    /// Files the job writes into its directory, with their node types
    fn output_nodes(&self) -> Vec<(String, NodeType)>;

    fn params(&self) -> Vec<ParamSpec>;

    fn run(&self, ctx: &RunContext, values: &ParamValues) -> anyhow::Result<()>;

    /// A job-specific viewer, tried before the label's viewer
    fn provide_widget(&self, job: &ExternalJobDirectory) -> Option<Box<dyn JobViewer>> {
        let _ = job;
        None
    }

    /// The `fn_exe` line RELION stores for this job
    fn fn_exe(&self) -> String {
        format!("{TOOL_PREFIX}{}", self.import_path())
    }

    /// Rust type name, used to tell registrations apart
    fn class_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

impl std::fmt::Debug for dyn ExternalJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExternalJob")
            .field("import_path", &self.import_path())
            .finish()
    }
}
