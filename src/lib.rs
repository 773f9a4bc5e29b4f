//! # himena-relion: RELION project model
//!
//! Typed access to a RELION cryo-EM project directory, the registry that maps
//! job types to accessors and viewers, and the protocol RELION uses to run
//! "external" jobs provided by this application.
//!
//! ## Architecture
//!
//! - **STAR**: [`star`] parses and writes STAR files and binds them to typed records
//! - **Pipeline**: [`pipeline`] reads `default_pipeline.star` into a process/node DAG
//! - **Jobs**: [`job`] wraps each `<JobTypeDir>/job###/` folder with typed accessors
//! - **Registry**: [`registry`] picks the accessor, viewer and follow-up jobs by label
//! - **External jobs**: [`external`] declares, prepares and runs user-defined jobs
//! - **Viewers**: [`viewer`] holds the headless state behind each job's display
//! - **Watching**: [`watch`] polls job folders on a thread and dispatches changes
//!
//! ## Example
//!
//! ```ignore
//! use himena_relion::{registry, Pipeline};
//!
//! let pipeline = Pipeline::from_project("/data/project")?;
//! for process in pipeline.processes() {
//!     let job = registry::read().job_directory_for(pipeline.root().join(&process.name))?;
//!     println!("{} {:?}", job.job_dir().job_type_label(), job.job_dir().state());
//! }
//! ```

pub mod config;
pub mod error;
pub mod external;
pub mod job;
pub mod mrc;
pub mod pipeline;
pub mod registry;
pub mod star;
pub mod viewer;
pub mod watch;

// Re-export commonly used types
pub use config::{AppConfig, RelionEnv};
pub use error::{OptionalOutput, RelionError, Result, ResultExt};
pub use external::{ExternalJob, ParamSpec, ParamType, ParamValue, ParamValues, RunContext};
pub use job::{JobDirectory, JobKind, JobState, RelionJob};
pub use pipeline::{NodeType, Pipeline, ProcessName};
pub use registry::JobRegistry;
pub use star::{StarDocument, StarModel};
pub use viewer::{JobViewer, ViewStatus};
pub use watch::{ChangeDispatcher, JobWatcher};
