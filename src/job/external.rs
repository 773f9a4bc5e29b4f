//! External jobs (`relion.external`).

use super::JobDirectory;
use crate::error::Result;
use crate::external::TOOL_PREFIX;

/// `External/job###/`
#[derive(Debug, Clone)]
pub struct ExternalJobDirectory {
    dir: JobDirectory,
}

job_kind!(ExternalJobDirectory, ["relion.external"]);

impl ExternalJobDirectory {
    /// The executable line RELION runs for this job
    pub fn fn_exe(&self) -> Result<&str> {
        self.dir.get_job_param("fn_exe")
    }

    /// Dotted import path when `fn_exe` invokes this application
    pub fn import_path(&self) -> Option<&str> {
        let exe = self.fn_exe().ok()?;
        let path = exe.strip_prefix(TOOL_PREFIX)?.split_whitespace().next()?;
        (!path.is_empty()).then_some(path)
    }

    /// `paramN_label -> paramN_value` pairs that are set, in slot order
    pub fn generic_params(&self) -> Vec<(&str, &str)> {
        (1..=crate::external::MAX_PARAMS)
            .filter_map(|i| {
                let label = self.dir.get_job_param_or(&format!("param{i}_label"), "");
                let value = self.dir.get_job_param_or(&format!("param{i}_value"), "");
                (!label.is_empty()).then_some((label, value))
            })
            .collect()
    }
}
