//! Tomography reconstruction jobs.

use super::metadata::TomogramRow;
use super::JobDirectory;
use crate::error::{OptionalOutput, Result};
use crate::mrc::MapFile;
use crate::star::{Loop, StarModel};
use std::path::PathBuf;

/// `Tomograms/job###/` (`relion.reconstructtomograms`)
#[derive(Debug, Clone)]
pub struct TomogramJob {
    dir: JobDirectory,
}

job_kind!(TomogramJob, ["relion.reconstructtomograms"]);

impl TomogramJob {
    pub fn tomograms(&self) -> Result<Loop<TomogramRow>> {
        Loop::validate_file(self.dir.file("tomograms.star"))
    }

    /// Reconstructed volumes listed in `tomograms.star`, resolved
    pub fn tomogram_paths(&self) -> Result<Vec<PathBuf>> {
        Ok(self
            .tomograms()?
            .iter()
            .filter_map(|row| row.reconstructed.as_deref())
            .map(|p| self.dir.resolve_path(p))
            .collect())
    }
}

/// `ReconstructParticleTomo/job###/` (`relion.reconstructparticletomo`)
#[derive(Debug, Clone)]
pub struct ReconstructParticlesJob {
    dir: JobDirectory,
}

job_kind!(ReconstructParticlesJob, ["relion.reconstructparticletomo"]);

impl ReconstructParticlesJob {
    pub fn merged_mrc(&self) -> Result<Option<MapFile>> {
        MapFile::open(self.dir.file("merged.mrc")).optional()
    }

    /// `half1.mrc` and `half2.mrc`, `None` until both exist
    pub fn half_maps(&self) -> Result<Option<(MapFile, MapFile)>> {
        let half1 = MapFile::open(self.dir.file("half1.mrc")).optional()?;
        let half2 = MapFile::open(self.dir.file("half2.mrc")).optional()?;
        Ok(half1.zip(half2))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{JobKind, JobStar, JOB_STAR};
    use crate::mrc::MrcHeader;
    use std::fs;

    fn open<J: JobKind>(root: &std::path::Path, dir: &str, label: &str) -> J {
        let dir = root.join(dir);
        fs::create_dir_all(&dir).unwrap();
        let mut star = JobStar::new(label, Vec::<(String, String)>::new());
        star.job.is_tomo = true;
        star.write(dir.join(JOB_STAR)).unwrap();
        J::from_dir(JobDirectory::open(&dir).unwrap())
    }

    #[test]
    fn test_tomograms() {
        let tmp = tempfile::tempdir().unwrap();
        let job: TomogramJob = open(tmp.path(), "Tomograms/job006", "relion.reconstructtomograms");
        assert!(job.job_is_tomo());
        fs::write(
            job.file("tomograms.star"),
            "data_global\nloop_\n_rlnTomoName #1\n_rlnTomoReconstructedTomogram #2\n\
             TS_01 Tomograms/job006/tomograms/rec_TS_01.mrc\n",
        )
        .unwrap();
        assert_eq!(
            job.tomogram_paths().unwrap(),
            vec![tmp.path().join("Tomograms/job006/tomograms/rec_TS_01.mrc")]
        );
    }

    #[test]
    fn test_half_maps_need_both() {
        let tmp = tempfile::tempdir().unwrap();
        let job: ReconstructParticlesJob = open(
            tmp.path(),
            "ReconstructParticleTomo/job009",
            "relion.reconstructparticletomo",
        );
        let header = MrcHeader {
            nx: 8,
            ny: 8,
            nz: 8,
            mode: 2,
            voxel_size: 3.0,
        }
        .to_bytes();
        fs::write(job.file("half1.mrc"), &header).unwrap();
        assert!(job.half_maps().unwrap().is_none());
        fs::write(job.file("half2.mrc"), &header).unwrap();
        assert!(job.half_maps().unwrap().is_some());
        assert!(job.merged_mrc().unwrap().is_none());
    }
}
