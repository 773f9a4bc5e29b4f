//! Background polling of job directories.

use crate::config::AppConfig;
use crate::error::Result;
use chrono::{DateTime, Local};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};

/// Longest uninterrupted sleep, so a stop request is seen quickly
const SLEEP_SLICE: Duration = Duration::from_millis(25);

/// A file inside a watched job directory was created or modified
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub job_dir: PathBuf,
    pub path: PathBuf,
    pub observed_at: DateTime<Local>,
}

/// Modification time and size per file
type Snapshot = HashMap<PathBuf, (SystemTime, u64)>;

fn snapshot(dir: &Path) -> Snapshot {
    let Ok(entries) = fs::read_dir(dir) else {
        return Snapshot::new();
    };
    entries
        .filter_map(|e| e.ok())
        .filter_map(|e| {
            let meta = e.metadata().ok()?;
            if !meta.is_file() {
                return None;
            }
            Some((e.path(), (meta.modified().ok()?, meta.len())))
        })
        .collect()
}

struct WatchWorker {
    snapshots: Vec<(PathBuf, Snapshot)>,
    sender: Sender<ChangeEvent>,
    running: Arc<AtomicBool>,
    interval: Duration,
    dropped_events: u64,
}

impl WatchWorker {
    fn run(&mut self) {
        info!("Job watcher started for {} directories", self.snapshots.len());
        while self.running.load(Ordering::SeqCst) {
            self.poll();
            self.sleep();
        }
        info!(
            "Job watcher stopped ({} events dropped)",
            self.dropped_events
        );
    }

    fn sleep(&self) {
        let mut remaining = self.interval;
        while !remaining.is_zero() && self.running.load(Ordering::SeqCst) {
            let slice = remaining.min(SLEEP_SLICE);
            thread::sleep(slice);
            remaining -= slice;
        }
    }

    fn poll(&mut self) {
        let mut events = Vec::new();
        for (dir, previous) in &mut self.snapshots {
            let current = snapshot(dir);
            let mut changed: Vec<_> = current
                .iter()
                .filter(|(path, stamp)| previous.get(*path) != Some(*stamp))
                .map(|(path, _)| path.clone())
                .collect();
            // oldest modification first, so events follow write order
            changed.sort_by_key(|p| current.get(p).map(|(t, _)| *t));
            let observed_at = Local::now();
            events.extend(changed.into_iter().map(|path| ChangeEvent {
                job_dir: dir.clone(),
                path,
                observed_at,
            }));
            *previous = current;
        }
        for event in events {
            self.send(event);
        }
    }

    /// Never blocks; a full queue drops the event
    fn send(&mut self, event: ChangeEvent) {
        match self.sender.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                self.dropped_events += 1;
                debug!("Event queue full, dropping {}", event.path.display());
            }
            Err(TrySendError::Disconnected(_)) => {
                self.running.store(false, Ordering::SeqCst);
            }
        }
    }
}

/// Polls a set of job directories until dropped.
pub struct JobWatcher {
    receiver: Receiver<ChangeEvent>,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl JobWatcher {
    /// Start watching; files already present are not reported
    pub fn spawn(job_dirs: Vec<PathBuf>, interval: Duration, capacity: usize) -> Result<Self> {
        let (sender, receiver) = bounded(capacity.max(1));
        let running = Arc::new(AtomicBool::new(true));
        let mut worker = WatchWorker {
            snapshots: job_dirs
                .into_iter()
                .map(|dir| {
                    let snap = snapshot(&dir);
                    (dir, snap)
                })
                .collect(),
            sender,
            running: running.clone(),
            interval,
            dropped_events: 0,
        };
        let handle = thread::Builder::new()
            .name("job-watcher".to_string())
            .spawn(move || worker.run())?;
        Ok(Self {
            receiver,
            running,
            handle: Some(handle),
        })
    }

    /// Start with the poll interval and queue size from `config`
    pub fn from_config(job_dirs: Vec<PathBuf>, config: &AppConfig) -> Result<Self> {
        Self::spawn(job_dirs, config.poll_interval(), config.channel_capacity)
    }

    pub fn events(&self) -> &Receiver<ChangeEvent> {
        &self.receiver
    }

    /// Events received so far, without waiting
    pub fn try_iter(&self) -> impl Iterator<Item = ChangeEvent> + '_ {
        self.receiver.try_iter()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Stop the thread and wait for it to exit
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Job watcher thread panicked");
            }
        }
    }
}

impl Drop for JobWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reports_new_and_modified_files() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("PostProcess/job010");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("job.star"), "data_job\n").unwrap();

        let watcher = JobWatcher::spawn(vec![dir.clone()], Duration::from_millis(10), 16).unwrap();
        fs::write(dir.join("run.out"), "started\n").unwrap();

        let event = watcher
            .events()
            .recv_timeout(Duration::from_secs(5))
            .unwrap();
        assert_eq!(event.job_dir, dir);
        assert_eq!(event.path, dir.join("run.out"));

        fs::write(dir.join("run.out"), "started\nfinished\n").unwrap();
        let event = watcher
            .events()
            .recv_timeout(Duration::from_secs(5))
            .unwrap();
        assert_eq!(event.path, dir.join("run.out"));
    }

    #[test]
    fn test_stops_on_drop() {
        let tmp = tempfile::tempdir().unwrap();
        let mut watcher =
            JobWatcher::spawn(vec![tmp.path().to_path_buf()], Duration::from_millis(10), 4).unwrap();
        assert!(watcher.is_running());
        watcher.stop();
        assert!(!watcher.is_running());
        assert!(watcher.handle.is_none());
    }
}
