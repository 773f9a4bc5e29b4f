//! Bindings for a job's `job.star`.

use crate::error::Result;
use crate::star::{Loop, LoopRow, StarDocument, StarModel, StarRecord};

/// File name of the parameter file inside every job directory
pub const JOB_STAR: &str = "job.star";

crate::star_record! {
    #[derive(Debug, Clone, PartialEq)]
    pub struct JobInfo in "job" {
        pub type_label: String => "rlnJobTypeLabel",
        pub is_continue: bool => "rlnJobIsContinue" = false,
        pub is_tomo: bool => "rlnJobIsTomo" = false,
    }
}

crate::star_loop! {
    #[derive(Debug, Clone, PartialEq)]
    pub struct JobOptionRow in "joboptions_values" {
        pub variable: String => "rlnJobOptionVariable",
        pub value: String => "rlnJobOptionValue",
    }
}

/// The `job` record plus the ordered `joboptions_values` loop.
#[derive(Debug, Clone, PartialEq)]
pub struct JobStar {
    pub job: JobInfo,
    pub options: Loop<JobOptionRow>,
}

impl JobStar {
    pub fn new<I, K, V>(type_label: impl Into<String>, options: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            job: JobInfo {
                type_label: type_label.into(),
                is_continue: false,
                is_tomo: false,
            },
            options: options
                .into_iter()
                .map(|(k, v)| JobOptionRow {
                    variable: k.into(),
                    value: v.into(),
                })
                .collect(),
        }
    }

    /// Raw value of a variable; the first occurrence wins
    pub fn get(&self, variable: &str) -> Option<&str> {
        self.options
            .iter()
            .find(|row| row.variable == variable)
            .map(|row| row.value.as_str())
    }

    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.options.iter().map(|row| row.variable.as_str())
    }
}

impl StarModel for JobStar {
    fn from_document(doc: &StarDocument) -> Result<Self> {
        Ok(Self {
            job: <JobInfo as StarRecord>::from_document(doc)?,
            options: Loop::from_document_or_empty(doc)?,
        })
    }

    fn to_document(&self) -> StarDocument {
        let mut doc = StarDocument::new();
        doc.insert(<JobInfo as StarRecord>::BLOCK, self.job.to_block());
        doc.insert(<JobOptionRow as LoopRow>::BLOCK, self.options.to_block());
        doc
    }

    fn example(size: usize) -> Self {
        Self {
            job: <JobInfo as StarRecord>::example(size),
            options: Loop::example(size),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_job_star() {
        let text = r#"
# version 50001

data_job

_rlnJobTypeLabel             relion.class2d
_rlnJobIsContinue                       0
_rlnJobIsTomo                           0

# version 50001

data_joboptions_values

loop_
_rlnJobOptionVariable #1
_rlnJobOptionValue #2
  nr_iter         20
  fn_img   Extract/job007/particles.star
  other_args     ""
"#;
        let star = JobStar::validate_str(text).unwrap();
        assert_eq!(star.job.type_label, "relion.class2d");
        assert!(!star.job.is_continue);
        assert_eq!(star.get("nr_iter"), Some("20"));
        assert_eq!(star.get("other_args"), Some(""));
        assert_eq!(
            star.variables().collect::<Vec<_>>(),
            ["nr_iter", "fn_img", "other_args"]
        );
    }

    #[test]
    fn test_missing_type_label_is_reported() {
        let err = JobStar::validate_str("data_job\n_rlnJobIsContinue 0\n").unwrap_err();
        assert!(err.to_string().contains("job.rlnJobTypeLabel"), "{err}");
    }

    #[test]
    fn test_round_trip_keeps_order_and_empty_values() {
        let star = JobStar::new("relion.external", [("fn_exe", "a b"), ("in_mask", "")]);
        let again = JobStar::validate_str(&star.to_star_string()).unwrap();
        assert_eq!(again, star);
    }
}
