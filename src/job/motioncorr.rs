//! Motion correction jobs, single particle and tomography.

use super::metadata::{MicrographRow, TomogramRow};
use super::JobDirectory;
use crate::error::Result;
use crate::star::{Loop, StarModel};

/// `MotionCorr/job###/`
#[derive(Debug, Clone)]
pub struct MotionCorrJob {
    dir: JobDirectory,
}

job_kind!(MotionCorrJob, ["relion.motioncorr", "relion.motioncorrtomo"]);

impl MotionCorrJob {
    pub fn micrographs(&self) -> Result<Loop<MicrographRow>> {
        Loop::validate_file(self.dir.file("corrected_micrographs.star"))
    }

    /// Motion-corrected tilt series of a tomography job
    pub fn tilt_series(&self) -> Result<Loop<TomogramRow>> {
        Loop::validate_file(self.dir.file("corrected_tilt_series.star"))
    }

    /// Per-micrograph log files, `logfile.pdf` once the job finishes
    pub fn logfile(&self) -> Result<std::path::PathBuf> {
        self.dir.existing_file("logfile.pdf")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{JobKind, JobStar, JOB_STAR};
    use std::fs;

    #[test]
    fn test_micrographs() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("MotionCorr/job002");
        fs::create_dir_all(&dir).unwrap();
        JobStar::new("relion.motioncorr.own", [("bin_factor", "1")])
            .write(dir.join(JOB_STAR))
            .unwrap();
        let job = MotionCorrJob::from_dir(JobDirectory::open(&dir).unwrap());
        assert!(job.micrographs().unwrap_err().is_missing_output());

        fs::write(
            job.file("corrected_micrographs.star"),
            "data_micrographs\nloop_\n_rlnMicrographName #1\n_rlnMicrographMetadata #2\n\
             MotionCorr/job002/Movies/a.mrc MotionCorr/job002/Movies/a.star\n",
        )
        .unwrap();
        let mics = job.micrographs().unwrap();
        assert_eq!(mics.len(), 1);
        assert_eq!(mics.rows()[0].optics_group, None);
    }
}
