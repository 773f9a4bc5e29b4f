//! Log and external job viewers.

use super::{file_name, is_log_file, job_as, settle, JobViewer, ViewStatus};
use crate::error::{OptionalOutput, Result};
use crate::external::cli::OutputNodeRow;
use crate::external::OUTPUT_NODES_STAR;
use crate::job::{ExternalJobDirectory, JobState, RelionJob};
use crate::star::{Loop, StarModel};
use std::any::Any;
use std::path::Path;

/// `run.out` and `run.err` of any job; the fallback viewer.
#[derive(Debug, Default)]
pub struct LogViewer {
    status: ViewStatus,
    loads: u32,
    pub stdout: String,
    pub stderr: String,
    pub state: Option<JobState>,
}

impl LogViewer {
    fn load(&mut self, job: &dyn RelionJob) -> Result<ViewStatus> {
        let dir = job.job_dir();
        self.state = Some(dir.state());
        let out = dir.run_out().optional()?;
        let err = dir.run_err().optional()?;
        if out.is_none() && err.is_none() {
            return Ok(ViewStatus::NotReady("no log output yet".to_string()));
        }
        self.stdout = out.unwrap_or_default();
        self.stderr = err.unwrap_or_default();
        Ok(ViewStatus::Ready)
    }
}

impl JobViewer for LogViewer {
    fn label(&self) -> &str {
        "Logs"
    }

    fn initialize(&mut self, job: &dyn RelionJob) -> Result<()> {
        self.loads += 1;
        self.status = self.load(job).or_else(settle)?;
        Ok(())
    }

    fn is_relevant(&self, _job_dir: &Path, path: &Path) -> bool {
        matches!(file_name(path), "run.out" | "run.err")
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

/// Parameters and declared outputs of an external job.
#[derive(Debug, Default)]
pub struct ExternalViewer {
    status: ViewStatus,
    loads: u32,
    pub import_path: Option<String>,
    pub params: Vec<(String, String)>,
    /// Node names from `RELION_OUTPUT_NODES.star`
    pub output_nodes: Vec<String>,
    pub state: Option<JobState>,
}

impl ExternalViewer {
    fn load(&mut self, job: &ExternalJobDirectory) -> Result<ViewStatus> {
        self.import_path = job.import_path().map(str::to_string);
        self.params = job
            .generic_params()
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        self.state = Some(job.state());
        self.output_nodes = Loop::<OutputNodeRow>::validate_file(job.file(OUTPUT_NODES_STAR))
            .optional()?
            .map(|rows| rows.into_rows().into_iter().map(|r| r.name).collect())
            .unwrap_or_default();
        Ok(ViewStatus::Ready)
    }
}

impl JobViewer for ExternalViewer {
    fn label(&self) -> &str {
        "External job"
    }

    fn initialize(&mut self, job: &dyn RelionJob) -> Result<()> {
        self.loads += 1;
        let job: ExternalJobDirectory = job_as(job);
        self.status = self.load(&job).or_else(settle)?;
        Ok(())
    }

    fn is_relevant(&self, _job_dir: &Path, path: &Path) -> bool {
        !is_log_file(path)
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{JobDirectory, JobStar, EXIT_SUCCESS, JOB_STAR};
    use std::fs;

    #[test]
    fn test_log_viewer_only_follows_logs() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("Import/job001");
        fs::create_dir_all(&dir).unwrap();
        JobStar::new("relion.import", [("fn_in_raw", "Movies/*.tiff")])
            .write(dir.join(JOB_STAR))
            .unwrap();
        let job = JobDirectory::open(&dir).unwrap();

        let mut viewer = LogViewer::default();
        viewer.initialize(&job).unwrap();
        assert!(matches!(viewer.status(), ViewStatus::NotReady(_)));

        fs::write(job.file("run.out"), "Importing 24 movies\n").unwrap();
        assert!(!viewer.on_job_updated(&job, &job.file("movies.star")).unwrap());
        assert!(viewer.on_job_updated(&job, &job.file("run.out")).unwrap());
        assert_eq!(viewer.stdout, "Importing 24 movies\n");
        assert_eq!(viewer.state, Some(JobState::Running));
    }

    #[test]
    fn test_external_viewer_reads_output_nodes() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("External/job003");
        fs::create_dir_all(&dir).unwrap();
        JobStar::new(
            "relion.external",
            [
                ("fn_exe", "himena-relion tests.Flip"),
                ("param1_label", "invert"),
                ("param1_value", "Yes"),
            ],
        )
        .write(dir.join(JOB_STAR))
        .unwrap();
        let rows: Loop<OutputNodeRow> = [OutputNodeRow {
            name: "External/job003/flipped.mrc".into(),
            type_label: "DensityMap.mrc".into(),
        }]
        .into_iter()
        .collect();
        rows.write(dir.join(OUTPUT_NODES_STAR)).unwrap();
        fs::write(dir.join(EXIT_SUCCESS), "").unwrap();

        let job = JobDirectory::open(&dir).unwrap();
        let mut viewer = ExternalViewer::default();
        viewer.initialize(&job).unwrap();
        assert_eq!(viewer.import_path.as_deref(), Some("tests.Flip"));
        assert_eq!(viewer.params, [("invert".to_string(), "Yes".to_string())]);
        assert_eq!(viewer.output_nodes, ["External/job003/flipped.mrc"]);
        assert_eq!(viewer.state, Some(JobState::Succeeded));
        assert!(!viewer.is_relevant(job.path(), &job.file("run.err")));
    }
}
