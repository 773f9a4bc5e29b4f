//! Identity types for pipeline processes.
//!
//! RELION names every process `<JobTypeDir>/job###/`. `JobId` is the numeric
//! part, `ProcessName` the parsed pair, and `JobIdAllocator` hands out new
//! numbers starting from the pipeline counter.

use std::fmt;

/// Numeric job id, displayed as `job###`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct JobId(pub u32);

impl JobId {
    /// Parse a `job###` directory name
    pub fn parse(name: &str) -> Option<Self> {
        let digits = name.strip_prefix("job")?;
        if digits.len() < 3 || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok().map(JobId)
    }

    /// Find the `job###` component of a path such as `Class2D/job005/run.out`
    pub fn find_in_path(path: &str) -> Option<Self> {
        path.split(['/', '\\']).find_map(JobId::parse)
    }

    #[inline]
    pub fn number(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JobId({})", self.0)
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job{:03}", self.0)
    }
}

/// A parsed `<JobTypeDir>/job###/` process name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProcessName {
    pub job_type_dir: String,
    pub job: JobId,
}

impl ProcessName {
    pub fn new(job_type_dir: impl Into<String>, job: JobId) -> Self {
        Self {
            job_type_dir: job_type_dir.into(),
            job,
        }
    }

    /// Parse `Class2D/job005/` (the trailing slash is optional)
    pub fn parse(name: &str) -> Option<Self> {
        let trimmed = name.trim_end_matches('/');
        let (dir, job) = trimmed.rsplit_once('/')?;
        if dir.is_empty() || dir.contains('/') {
            return None;
        }
        Some(Self::new(dir, JobId::parse(job)?))
    }
}

impl fmt::Display for ProcessName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/", self.job_type_dir, self.job)
    }
}

/// Add the conventional trailing slash to a process name
pub fn normalize_process_name(name: &str) -> String {
    if name.ends_with('/') {
        name.to_string()
    } else {
        format!("{name}/")
    }
}

/// Hands out job ids, starting at the pipeline counter.
#[derive(Debug, Clone)]
pub struct JobIdAllocator {
    next: u32,
}

impl JobIdAllocator {
    pub fn new(counter: u32) -> Self {
        Self { next: counter }
    }

    /// The id the next call to `allocate` returns
    pub fn peek(&self) -> JobId {
        JobId(self.next)
    }

    pub fn allocate(&mut self) -> JobId {
        let id = JobId(self.next);
        self.next += 1;
        id
    }
}
