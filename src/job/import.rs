//! Import jobs: movies, other node types and tomography tilt series.

use super::metadata::{MovieRow, TomogramRow};
use super::JobDirectory;
use crate::error::{RelionError, Result};
use crate::star::{Loop, StarModel};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// What an import job brought into the project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ImportKind {
    Movies,
    Other,
    Tomo,
}

/// `Import/job###/`
#[derive(Debug, Clone)]
pub struct ImportJob {
    dir: JobDirectory,
}

job_kind!(ImportJob, ["relion.import", "relion.importtomo"]);

impl ImportJob {
    pub fn kind(&self) -> ImportKind {
        let label = self.dir.job_type_label();
        if label.starts_with("relion.importtomo") || self.dir.job_is_tomo() {
            ImportKind::Tomo
        } else if label.ends_with(".movies") {
            ImportKind::Movies
        } else if label.ends_with(".other") {
            ImportKind::Other
        } else if self.dir.get_job_param_as::<bool>("do_raw").unwrap_or(false) {
            ImportKind::Movies
        } else {
            ImportKind::Other
        }
    }

    /// The STAR file the import produced
    pub fn output_star(&self) -> Result<PathBuf> {
        match self.kind() {
            ImportKind::Movies => self.dir.existing_file("movies.star"),
            ImportKind::Tomo => self.dir.existing_file("tilt_series.star"),
            ImportKind::Other => {
                let source = self.dir.get_job_param("fn_in_other")?;
                let name = Path::new(source).file_name().ok_or_else(|| {
                    RelionError::schema("joboptions_values.fn_in_other", "not a file path")
                })?;
                self.dir.existing_file(name)
            }
        }
    }

    pub fn movies(&self) -> Result<Loop<MovieRow>> {
        Loop::validate_file(self.dir.file("movies.star"))
    }

    /// Imported tilt series of a tomography project
    pub fn tilt_series(&self) -> Result<Loop<TomogramRow>> {
        Loop::validate_file(self.dir.file("tilt_series.star"))
    }
}
