//! Delivery of change events to viewers on the UI thread.

use super::{is_testing, JobWatcher};
use crate::error::Result;
use crate::job::{RelionJob, JOB_STAR};
use crate::registry::JobRegistry;
use crate::viewer::JobViewer;
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use tracing::{debug, error, warn};

struct Entry {
    job: Box<dyn RelionJob>,
    viewers: Vec<Box<dyn JobViewer>>,
}

/// Routes `(job_dir, path)` events to the viewers of that job directory.
///
/// The dispatcher does not look at file contents; relevance is decided by
/// each viewer.
#[derive(Default)]
pub struct ChangeDispatcher {
    entries: HashMap<PathBuf, Entry>,
    pending: VecDeque<(PathBuf, PathBuf)>,
}

impl ChangeDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a viewer to a job; a second viewer for the same directory joins the first
    pub fn register(&mut self, job: Box<dyn RelionJob>, viewer: Box<dyn JobViewer>) {
        let key = job.job_dir().path().to_path_buf();
        debug!("Dispatching changes in {} to {}", key.display(), viewer.label());
        self.entries
            .entry(key)
            .or_insert_with(|| Entry {
                job,
                viewers: Vec::new(),
            })
            .viewers
            .push(viewer);
    }

    /// Open a job through `registry`, initialize its viewer and register both
    pub fn open(&mut self, registry: &JobRegistry, job_dir: impl AsRef<Path>) -> Result<()> {
        let job = registry.job_directory_for(job_dir)?;
        let mut viewer = registry.viewer_for(job.as_ref());
        viewer.initialize(job.as_ref())?;
        self.register(job, viewer);
        Ok(())
    }

    /// Drop a job and its viewers; queued events for it are discarded on delivery
    pub fn unregister(&mut self, job_dir: &Path) -> bool {
        self.entries.remove(job_dir).is_some()
    }

    /// Report a change. Returns the number of viewers re-initialized, which is
    /// always 0 outside testing mode since delivery is deferred.
    pub fn notify(&mut self, job_dir: impl Into<PathBuf>, path: impl Into<PathBuf>) -> usize {
        let (job_dir, path) = (job_dir.into(), path.into());
        if is_testing() {
            self.deliver(&job_dir, &path)
        } else {
            self.pending.push_back((job_dir, path));
            0
        }
    }

    /// Deliver queued events in arrival order, once per distinct `(job_dir, path)`
    pub fn process_pending(&mut self) -> usize {
        let mut seen = HashSet::new();
        let events: Vec<_> = self
            .pending
            .drain(..)
            .filter(|event| seen.insert(event.clone()))
            .collect();
        events
            .iter()
            .map(|(job_dir, path)| self.deliver(job_dir, path))
            .sum()
    }

    /// Move everything the watcher has observed into [`Self::notify`]
    pub fn pump(&mut self, watcher: &JobWatcher) -> usize {
        let mut forwarded = 0;
        for event in watcher.try_iter() {
            self.notify(event.job_dir, event.path);
            forwarded += 1;
        }
        forwarded
    }

    fn deliver(&mut self, job_dir: &Path, path: &Path) -> usize {
        let Some(entry) = self.entries.get_mut(job_dir) else {
            debug!("No viewer for {}", job_dir.display());
            return 0;
        };
        if path.file_name().is_some_and(|n| n == JOB_STAR) {
            if let Err(e) = entry.job.reparse() {
                warn!("Failed to re-read {}: {}", path.display(), e);
            }
        }
        let mut updated = 0;
        for viewer in &mut entry.viewers {
            match viewer.on_job_updated(entry.job.as_ref(), path) {
                Ok(true) => updated += 1,
                Ok(false) => {}
                Err(e) => error!("{} failed to refresh: {}", viewer.label(), e),
            }
        }
        updated
    }

    pub fn viewers(&self, job_dir: &Path) -> impl Iterator<Item = &dyn JobViewer> {
        self.entries
            .get(job_dir)
            .into_iter()
            .flat_map(|e| e.viewers.iter().map(|v| v.as_ref()))
    }

    pub fn job(&self, job_dir: &Path) -> Option<&dyn RelionJob> {
        self.entries.get(job_dir).map(|e| e.job.as_ref())
    }

    /// Directories with registered viewers, for the watcher
    pub fn watched_dirs(&self) -> Vec<PathBuf> {
        let mut dirs: Vec<_> = self.entries.keys().cloned().collect();
        dirs.sort();
        dirs
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{JobDirectory, JobKind, JobStar, PostProcessJob};
    use crate::star::StarModel;
    use crate::viewer::{LogViewer, PostProcessViewer};
    use crate::watch::set_testing;
    use serial_test::serial;
    use std::fs;

    fn postprocess(root: &Path) -> PathBuf {
        let dir = root.join("PostProcess/job010");
        fs::create_dir_all(&dir).unwrap();
        JobStar::new("relion.postprocess", [("fn_mask", "")])
            .write(dir.join(JOB_STAR))
            .unwrap();
        dir
    }

    #[test]
    #[serial]
    fn test_deferred_delivery_coalesces() {
        set_testing(false);
        let tmp = tempfile::tempdir().unwrap();
        let dir = postprocess(tmp.path());
        let job = JobDirectory::open(&dir).unwrap();

        let mut dispatcher = ChangeDispatcher::new();
        dispatcher.register(Box::new(job), Box::new(LogViewer::default()));
        fs::write(dir.join("run.out"), "done\n").unwrap();

        assert_eq!(dispatcher.notify(&dir, dir.join("run.out")), 0);
        assert_eq!(dispatcher.notify(&dir, dir.join("run.out")), 0);
        assert_eq!(dispatcher.notify(&dir, dir.join("postprocess.star")), 0);
        assert_eq!(dispatcher.pending_len(), 3);

        assert_eq!(dispatcher.process_pending(), 1);
        assert_eq!(dispatcher.pending_len(), 0);
        let viewer = dispatcher.viewers(&dir).next().unwrap();
        assert_eq!(viewer.load_count(), 1);
    }

    #[test]
    #[serial]
    fn test_testing_mode_delivers_synchronously() {
        set_testing(true);
        let tmp = tempfile::tempdir().unwrap();
        let dir = postprocess(tmp.path());
        let job = Box::new(PostProcessJob::from_dir(JobDirectory::open(&dir).unwrap()));

        let mut dispatcher = ChangeDispatcher::new();
        dispatcher.register(job, Box::new(PostProcessViewer::default()));
        assert_eq!(dispatcher.notify(&dir, dir.join("run.out")), 0);
        assert_eq!(dispatcher.notify(&dir, dir.join("postprocess.mrc")), 1);
        assert_eq!(dispatcher.notify(tmp.path().join("Other/job001"), dir.join("x.mrc")), 0);
        set_testing(false);
    }

    #[test]
    #[serial]
    fn test_job_star_change_reparses() {
        set_testing(true);
        let tmp = tempfile::tempdir().unwrap();
        let dir = postprocess(tmp.path());
        let registry = JobRegistry::with_builtins().unwrap();

        let mut dispatcher = ChangeDispatcher::new();
        dispatcher.open(&registry, &dir).unwrap();
        JobStar::new("relion.postprocess", [("fn_mask", "MaskCreate/job011/mask.mrc")])
            .write(dir.join(JOB_STAR))
            .unwrap();
        dispatcher.notify(&dir, dir.join(JOB_STAR));
        let job = dispatcher.job(&dir).unwrap();
        assert_eq!(
            job.job_dir().get_job_param("fn_mask").unwrap(),
            "MaskCreate/job011/mask.mrc"
        );
        assert_eq!(dispatcher.watched_dirs(), [dir]);
        set_testing(false);
    }
}
