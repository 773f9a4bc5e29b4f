//! `run_itNNN_*` file naming shared by the iterative jobs.

use super::metadata::{ModelClassRow, ParticleRow};
use super::RelionJob;
use crate::error::Result;
use crate::star::{Loop, StarModel};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

static ITERATION_FILE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^run_it(\d{3})_(.+)$").expect("literal pattern"));

/// Split `run_it010_model.star` into `(10, "model.star")`
pub fn parse_iteration_file(name: &str) -> Option<(u32, &str)> {
    let caps = ITERATION_FILE.captures(name)?;
    let index = caps.get(1)?.as_str().parse().ok()?;
    Some((index, caps.get(2)?.as_str()))
}

/// `run_it010_` prefix for an iteration
pub fn iteration_prefix(index: u32) -> String {
    format!("run_it{index:03}_")
}

/// Sorted, deduplicated iteration indices of files named `run_itNNN_<suffix>`
pub fn iter_indices(dir: &Path, suffix: &str) -> Vec<u32> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    entries
        .filter_map(|e| e.ok())
        .filter_map(|e| {
            let name = e.file_name();
            let (index, rest) = parse_iteration_file(name.to_str()?)?;
            (rest == suffix).then_some(index)
        })
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Index of the lexicographically last `run_itNNN_optimiser.star`
pub fn latest_iteration(dir: &Path) -> Option<u32> {
    let Ok(entries) = fs::read_dir(dir) else {
        return None;
    };
    entries
        .filter_map(|e| e.ok())
        .filter_map(|e| e.file_name().into_string().ok())
        .filter(|name| {
            parse_iteration_file(name).is_some_and(|(_, rest)| rest == "optimiser.star")
        })
        .max()
        .and_then(|name| parse_iteration_file(&name).map(|(index, _)| index))
}

/// Whether a changed file belongs to an iteration's outputs
pub fn is_iteration_output(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| parse_iteration_file(n).is_some())
}

/// Accessors shared by the jobs writing `run_itNNN_*` files.
pub trait IterativeJob: RelionJob {
    /// Iterations with a `run_itNNN_model.star`
    fn iter_indices(&self) -> Vec<u32> {
        iter_indices(self.job_dir().path(), "model.star")
    }

    /// Last iteration with an optimiser file, `None` before the first one
    fn latest_iteration(&self) -> Option<u32> {
        latest_iteration(self.job_dir().path())
    }

    /// The latest iteration, else the last one that wrote a model
    fn current_iteration(&self) -> Option<u32> {
        self.latest_iteration()
            .or_else(|| self.iter_indices().last().copied())
    }

    fn iteration_file(&self, index: u32, suffix: &str) -> PathBuf {
        self.job_dir()
            .file(format!("{}{suffix}", iteration_prefix(index)))
    }

    /// `model_classes` of `run_itNNN_model.star`
    fn model(&self, index: u32) -> Result<Loop<ModelClassRow>> {
        Loop::validate_file(self.iteration_file(index, "model.star"))
    }

    /// Path of `run_itNNN_data.star`
    fn data(&self, index: u32) -> Result<PathBuf> {
        self.job_dir()
            .existing_file(format!("{}data.star", iteration_prefix(index)))
    }

    fn particles(&self, index: u32) -> Result<Loop<ParticleRow>> {
        Loop::validate_file(self.data(index)?)
    }

    fn particle_count(&self, index: u32) -> Result<usize> {
        Ok(self.particles(index)?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;

    #[test]
    fn test_parse_iteration_file() {
        assert_eq!(
            parse_iteration_file("run_it010_model.star"),
            Some((10, "model.star"))
        );
        assert_eq!(parse_iteration_file("run_it1_model.star"), None);
        assert_eq!(parse_iteration_file("run.out"), None);
        assert_eq!(iteration_prefix(7), "run_it007_");
    }

    #[test]
    fn test_latest_iteration_uses_optimiser_files() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(latest_iteration(dir.path()), None);

        for name in [
            "run_it000_optimiser.star",
            "run_it025_optimiser.star",
            "run_it030_model.star",
            "run_it005_optimiser.star",
        ] {
            File::create(dir.path().join(name)).unwrap();
        }
        assert_eq!(latest_iteration(dir.path()), Some(25));
        assert_eq!(iter_indices(dir.path(), "optimiser.star"), vec![0, 5, 25]);
        assert_eq!(iter_indices(dir.path(), "model.star"), vec![30]);
    }

    #[test]
    fn test_missing_directory_has_no_iterations() {
        assert_eq!(latest_iteration(Path::new("/nonexistent/job")), None);
        assert!(iter_indices(Path::new("/nonexistent/job"), "model.star").is_empty());
    }
}
