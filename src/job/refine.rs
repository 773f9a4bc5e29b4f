//! 3D classification, initial model and auto-refine jobs.
//!
//! All three write per-iteration class volumes next to an optional angular
//! distribution `.bild`. Refine3D splits each volume into two half maps.

use super::iteration::{iteration_prefix, IterativeJob};
use super::JobDirectory;
use crate::error::{RelionError, Result};
use crate::mrc::MapFile;
use std::path::{Path, PathBuf};

/// A class volume and its angular distribution file, when written
pub type ClassMap = (PathBuf, Option<PathBuf>);

/// Collect `<stem>classNNN.mrc` for consecutive class numbers starting at 1.
fn collect_classes(dir: &Path, stem: &str) -> Result<Vec<ClassMap>> {
    let mut out = Vec::new();
    for class in 1.. {
        let map = dir.join(format!("{stem}class{class:03}.mrc"));
        if !map.exists() {
            break;
        }
        let bild = dir.join(format!("{stem}class{class:03}_angdist.bild"));
        out.push((map, bild.exists().then_some(bild)));
    }
    if out.is_empty() {
        return Err(RelionError::MissingOutput(
            dir.join(format!("{stem}class001.mrc")),
        ));
    }
    Ok(out)
}

/// `Class3D/job###/`
#[derive(Debug, Clone)]
pub struct Class3DJob {
    dir: JobDirectory,
}

job_kind!(Class3DJob, ["relion.class3d"]);

impl IterativeJob for Class3DJob {}

impl Class3DJob {
    /// `(run_itNNN_classNNN.mrc, angdist)` for every class of an iteration
    pub fn classes(&self, index: u32) -> Result<Vec<ClassMap>> {
        collect_classes(self.dir.path(), &iteration_prefix(index))
    }
}

/// `InitialModel/job###/`
#[derive(Debug, Clone)]
pub struct InitialModelJob {
    dir: JobDirectory,
}

job_kind!(InitialModelJob, ["relion.initialmodel"]);

impl IterativeJob for InitialModelJob {}

impl InitialModelJob {
    pub fn classes(&self, index: u32) -> Result<Vec<ClassMap>> {
        collect_classes(self.dir.path(), &iteration_prefix(index))
    }

    /// The symmetrized model written when the job finishes
    pub fn initial_model(&self) -> Result<MapFile> {
        MapFile::open(self.dir.file("initial_model.mrc"))
    }
}

/// `Refine3D/job###/`
#[derive(Debug, Clone)]
pub struct Refine3DJob {
    dir: JobDirectory,
}

job_kind!(Refine3DJob, ["relion.refine3d"]);

impl IterativeJob for Refine3DJob {}

impl Refine3DJob {
    /// Half-1 volumes of an iteration, `run_itNNN_half1_classNNN.mrc`
    pub fn classes(&self, index: u32) -> Result<Vec<ClassMap>> {
        collect_classes(
            self.dir.path(),
            &format!("{}half1_", iteration_prefix(index)),
        )
    }

    /// Both half maps of class 1 at an iteration
    pub fn half_maps(&self, index: u32) -> Result<(MapFile, MapFile)> {
        let prefix = iteration_prefix(index);
        Ok((
            MapFile::open(self.dir.file(format!("{prefix}half1_class001.mrc")))?,
            MapFile::open(self.dir.file(format!("{prefix}half2_class001.mrc")))?,
        ))
    }

    /// Final reconstruction, `run_class001.mrc`
    pub fn final_map(&self) -> Result<MapFile> {
        MapFile::open(self.dir.file("run_class001.mrc"))
    }

    /// Unfiltered final half maps, the usual input of PostProcess
    pub fn half_maps_unfiltered(&self) -> Result<(MapFile, MapFile)> {
        Ok((
            MapFile::open(self.dir.file("run_half1_class001_unfil.mrc"))?,
            MapFile::open(self.dir.file("run_half2_class001_unfil.mrc"))?,
        ))
    }
}
