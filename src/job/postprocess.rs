//! Post-processing jobs (`relion.postprocess`).

use super::JobDirectory;
use crate::error::{OptionalOutput, Result};
use crate::mrc::MapFile;
use crate::star::{Loop, StarModel};

crate::star_record! {
    /// `general` block of `postprocess.star`
    #[derive(Debug, Clone, PartialEq)]
    pub struct PostProcessGeneral in "general" {
        pub final_resolution: f64 => "rlnFinalResolution",
        pub bfactor: Option<f64> => "rlnBfactorUsedForSharpening",
        pub unfiltered_half1: Option<String> => "rlnUnfilteredMapHalf1",
        pub unfiltered_half2: Option<String> => "rlnUnfilteredMapHalf2",
        pub mask_name: Option<String> => "rlnMaskName",
        pub randomise_from: Option<f64> => "rlnRandomiseFrom",
    }
}

crate::star_loop! {
    /// One shell of the `fsc` table
    #[derive(Debug, Clone, PartialEq)]
    pub struct FscRow in "fsc" {
        pub spectral_index: i32 => "rlnSpectralIndex",
        pub resolution: f64 => "rlnResolution",
        pub angstrom_resolution: f64 => "rlnAngstromResolution",
        pub fsc_corrected: f64 => "rlnFourierShellCorrelationCorrected",
        pub fsc_unmasked: Option<f64> => "rlnFourierShellCorrelationUnmaskedMaps",
        pub fsc_masked: Option<f64> => "rlnFourierShellCorrelationMaskedMaps",
        pub fsc_phase_randomized: Option<f64> => "rlnCorrectedFourierShellCorrelationPhaseRandomizedMaskedMaps",
    }
}

/// `PostProcess/job###/`
#[derive(Debug, Clone)]
pub struct PostProcessJob {
    dir: JobDirectory,
}

job_kind!(PostProcessJob, ["relion.postprocess"]);

impl PostProcessJob {
    /// The sharpened map, `None` until the job writes it
    pub fn map_mrc(&self, masked: bool) -> Result<Option<MapFile>> {
        let name = if masked {
            "postprocess_masked.mrc"
        } else {
            "postprocess.mrc"
        };
        MapFile::open(self.dir.file(name)).optional()
    }

    /// FSC curves from `postprocess.star`
    pub fn fsc_dataframe(&self) -> Result<Loop<FscRow>> {
        Loop::validate_file(self.dir.file("postprocess.star"))
    }

    pub fn general(&self) -> Result<PostProcessGeneral> {
        PostProcessGeneral::validate_file(self.dir.file("postprocess.star"))
    }

    /// Mask used for the masked FSC, resolved against the project root
    pub fn mask(&self) -> Option<std::path::PathBuf> {
        match self.dir.get_job_param_or("fn_mask", "") {
            "" => None,
            path => Some(self.dir.resolve_path(path)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{JobKind, JobStar, JOB_STAR};
    use crate::mrc::MrcHeader;
    use std::fs;

    const POSTPROCESS_STAR: &str = r#"
data_general

_rlnFinalResolution                     3.210000
_rlnBfactorUsedForSharpening          -85.400000
_rlnMaskName                  MaskCreate/job014/mask.mrc

data_fsc

loop_
_rlnSpectralIndex #1
_rlnResolution #2
_rlnAngstromResolution #3
_rlnFourierShellCorrelationCorrected #4
0 0.000000 999.000000 1.000000
1 0.004167 240.000000 0.999000
2 0.008333 120.000000 0.998000
"#;

    fn postprocess(root: &std::path::Path) -> PostProcessJob {
        let dir = root.join("PostProcess/job015");
        fs::create_dir_all(&dir).unwrap();
        JobStar::new("relion.postprocess", [("fn_mask", "MaskCreate/job014/mask.mrc")])
            .write(dir.join(JOB_STAR))
            .unwrap();
        PostProcessJob::from_dir(JobDirectory::open(&dir).unwrap())
    }

    #[test]
    fn test_map_appears_later() {
        let tmp = tempfile::tempdir().unwrap();
        let job = postprocess(tmp.path());
        assert!(job.map_mrc(false).unwrap().is_none());

        let header = MrcHeader {
            nx: 8,
            ny: 8,
            nz: 8,
            mode: 2,
            voxel_size: 1.0,
        };
        fs::write(job.file("postprocess.mrc"), header.to_bytes()).unwrap();
        assert_eq!(job.map_mrc(false).unwrap().unwrap().header, header);
        assert!(job.map_mrc(true).unwrap().is_none());
    }

    #[test]
    fn test_fsc_and_general() {
        let tmp = tempfile::tempdir().unwrap();
        let job = postprocess(tmp.path());
        fs::write(job.file("postprocess.star"), POSTPROCESS_STAR).unwrap();

        let fsc = job.fsc_dataframe().unwrap();
        assert_eq!(fsc.len(), 3);
        assert_eq!(
            fsc.column_as::<f64>("angstrom_resolution").unwrap(),
            vec![999.0, 240.0, 120.0]
        );
        let general = job.general().unwrap();
        assert_eq!(general.final_resolution, 3.21);
        assert_eq!(general.bfactor, Some(-85.4));
        assert_eq!(job.mask(), Some(tmp.path().join("MaskCreate/job014/mask.mrc")));
    }
}
