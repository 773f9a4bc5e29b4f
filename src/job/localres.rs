//! Local resolution jobs (`relion.localres`).

use super::JobDirectory;
use crate::error::{OptionalOutput, Result};
use crate::mrc::MapFile;
use serde::Serialize;
use std::path::PathBuf;

/// Files a local-resolution viewer needs
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocalResOutputs {
    /// Map filtered by local resolution
    pub map: PathBuf,
    /// Per-voxel resolution
    pub locres: PathBuf,
    pub mask: Option<PathBuf>,
    /// Pixel size in Å, from `angpix` or the map header
    pub scale: Option<f64>,
}

/// `LocalRes/job###/`
#[derive(Debug, Clone)]
pub struct LocalResJob {
    dir: JobDirectory,
}

job_kind!(LocalResJob, ["relion.localres"]);

impl LocalResJob {
    /// The half map the job was run on (`fn_in`)
    pub fn input_half_map(&self) -> Result<PathBuf> {
        Ok(self.dir.resolve_path(self.dir.get_job_param("fn_in")?))
    }

    pub fn outputs(&self) -> Result<LocalResOutputs> {
        let map = self.dir.existing_file("relion_locres_filtered.mrc")?;
        let locres = self.dir.existing_file("relion_locres.mrc")?;
        let mask = match self.dir.get_job_param_or("fn_mask", "") {
            "" => None,
            path => Some(self.dir.resolve_path(path)),
        };
        let scale = match self.dir.get_job_param_as::<f64>("angpix") {
            Ok(angpix) if angpix > 0.0 => Some(angpix),
            _ => MapFile::open(&map)
                .optional()?
                .map(|m| m.header.voxel_size)
                .filter(|v| *v > 0.0),
        };
        Ok(LocalResOutputs {
            map,
            locres,
            mask,
            scale,
        })
    }
}
