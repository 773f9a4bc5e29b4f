//! Row models for the RELION metadata tables that several job types share.

crate::star_loop! {
    #[derive(Debug, Clone, PartialEq)]
    pub struct ParticleRow in "particles" {
        pub image_name: String => "rlnImageName",
        pub micrograph_name: Option<String> => "rlnMicrographName",
        pub class_number: Option<i32> => "rlnClassNumber",
        pub optics_group: Option<i32> => "rlnOpticsGroup",
    }
}

crate::star_loop! {
    #[derive(Debug, Clone, PartialEq)]
    pub struct MicrographRow in "micrographs" {
        pub micrograph_name: String => "rlnMicrographName",
        pub metadata: Option<String> => "rlnMicrographMetadata",
        pub optics_group: Option<i32> => "rlnOpticsGroup",
    }
}

crate::star_loop! {
    #[derive(Debug, Clone, PartialEq)]
    pub struct MovieRow in "movies" {
        pub movie_name: String => "rlnMicrographMovieName",
        pub optics_group: Option<i32> => "rlnOpticsGroup",
    }
}

crate::star_loop! {
    /// One class of `run_itNNN_model.star`
    #[derive(Debug, Clone, PartialEq)]
    pub struct ModelClassRow in "model_classes" {
        pub reference_image: String => "rlnReferenceImage",
        pub class_distribution: f64 => "rlnClassDistribution",
        pub accuracy_rotations: Option<f64> => "rlnAccuracyRotations",
        pub accuracy_translations: Option<f64> => "rlnAccuracyTranslationsAngst",
        pub estimated_resolution: Option<f64> => "rlnEstimatedResolution",
    }
}

crate::star_loop! {
    /// One tomogram or tilt series of a `global` table
    #[derive(Debug, Clone, PartialEq)]
    pub struct TomogramRow in "global" {
        pub tomo_name: String => "rlnTomoName",
        pub tilt_series: Option<String> => "rlnTomoTiltSeriesStarFile",
        pub reconstructed: Option<String> => "rlnTomoReconstructedTomogram",
        pub pixel_size: Option<f64> => "rlnTomoTiltSeriesPixelSize",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::star::{Loop, StarModel};

    #[test]
    fn test_particles_next_to_optics_block() {
        let text = "data_optics\nloop_\n_rlnOpticsGroupName #1\n_rlnOpticsGroup #2\nopticsGroup1 1\n\
                    data_particles\nloop_\n_rlnImageName #1\n_rlnMicrographName #2\n_rlnOpticsGroup #3\n\
                    1@Extract/job004/a.mrcs MotionCorr/job002/a.mrc 1\n\
                    2@Extract/job004/a.mrcs MotionCorr/job002/a.mrc 1\n";
        let particles = Loop::<ParticleRow>::validate_str(text).unwrap();
        assert_eq!(particles.len(), 2);
        assert_eq!(particles.rows()[0].class_number, None);
        assert_eq!(particles.rows()[1].optics_group, Some(1));
    }
}
