//! Producing the `job.star` RELION needs to schedule an external job.

use super::params::{ParamSpec, ParamType, ParamValue, ParamValues};
use super::{ExternalJob, MAX_PARAMS};
use crate::config::{AppConfig, RelionEnv};
use crate::error::{RelionError, Result};
use crate::job::JobStar;
use tracing::warn;

/// Reserved input parameters: declared name -> `job.star` variable
pub const RESERVED_INPUTS: [(&str, &str); 6] = [
    ("in_movies", "in_mov"),
    ("in_mics", "in_mic"),
    ("in_parts", "in_part"),
    ("in_coords", "in_coords"),
    ("in_3dref", "in_3dref"),
    ("in_mask", "in_mask"),
];

/// Parameter name carrying the output directory; never written to `job.star`
pub const OUTPUT_PARAM: &str = "o";

/// Parameter name mapped onto `nr_threads`
pub const THREADS_PARAM: &str = "j";

/// Every variable of an external job's `joboptions_values`, in file order
pub const RESERVED_VARIABLES: [&str; 34] = [
    "do_queue",
    "fn_exe",
    "in_3dref",
    "in_coords",
    "in_mask",
    "in_mic",
    "in_mov",
    "in_part",
    "min_dedicated",
    "nr_threads",
    "other_args",
    "param1_label",
    "param2_label",
    "param3_label",
    "param4_label",
    "param5_label",
    "param6_label",
    "param7_label",
    "param8_label",
    "param9_label",
    "param10_label",
    "param1_value",
    "param2_value",
    "param3_value",
    "param4_value",
    "param5_value",
    "param6_value",
    "param7_value",
    "param8_value",
    "param9_value",
    "param10_value",
    "qsub",
    "qsubscript",
    "queuename",
];

/// `job.star` variable for a reserved input name
pub fn reserved_variable(name: &str) -> Option<&'static str> {
    RESERVED_INPUTS
        .iter()
        .find(|(declared, _)| *declared == name)
        .map(|(_, variable)| *variable)
}

/// Declared parameters sorted into the places they take in `job.star`
#[derive(Debug, Clone, Default)]
pub struct Harvest {
    /// `(job.star variable, spec)` for reserved inputs
    pub reserved: Vec<(&'static str, ParamSpec)>,
    pub threads: Option<ParamSpec>,
    /// Generic parameters in declaration order
    pub generic: Vec<ParamSpec>,
}

/// Sort a parameter list; more than [`MAX_PARAMS`] generic ones is an error
pub fn harvest(params: Vec<ParamSpec>) -> Result<Harvest> {
    let mut out = Harvest::default();
    for spec in params {
        if spec.name == OUTPUT_PARAM {
            continue;
        }
        if spec.name == THREADS_PARAM {
            if spec.ty != ParamType::Int {
                return Err(RelionError::BadValue {
                    value: spec.ty.to_string(),
                    expected: "int for the thread count".to_string(),
                });
            }
            out.threads = Some(spec);
        } else if let Some(variable) = reserved_variable(&spec.name) {
            out.reserved.push((variable, spec));
        } else {
            out.generic.push(spec);
        }
    }
    if out.generic.len() > MAX_PARAMS {
        return Err(RelionError::TooManyParameters {
            count: out.generic.len(),
            max: MAX_PARAMS,
        });
    }
    Ok(out)
}

fn value_for<'a>(spec: &'a ParamSpec, values: &'a ParamValues) -> Option<&'a ParamValue> {
    values.get(&spec.name).or(spec.default.as_ref())
}

/// Build the `job.star` for `job` with the environment of the user's `config.toml`
pub fn prep_job_star(job: &dyn ExternalJob, values: &ParamValues) -> Result<JobStar> {
    prep_job_star_with_config(job, values, &AppConfig::load_or_default())
}

/// Build the `job.star` for `job`; `RELION_*` variables still override `config`
pub fn prep_job_star_with_config(
    job: &dyn ExternalJob,
    values: &ParamValues,
    config: &AppConfig,
) -> Result<JobStar> {
    prep_job_star_with_env(job, values, &config.relion_env())
}

/// Build the `job.star` for `job`; values not given fall back to the declared defaults
pub fn prep_job_star_with_env(
    job: &dyn ExternalJob,
    values: &ParamValues,
    env: &RelionEnv,
) -> Result<JobStar> {
    let params = job.params();
    for name in values.keys() {
        if name != OUTPUT_PARAM && !params.iter().any(|p| &p.name == name) {
            warn!("{}: ignoring value for undeclared parameter {name}", job.import_path());
        }
    }
    let harvest = harvest(params)?;

    let text = |spec: &ParamSpec| {
        value_for(spec, values)
            .map(ParamValue::to_job_star)
            .unwrap_or_default()
    };

    let mut slots: Vec<(String, String)> = RESERVED_VARIABLES
        .iter()
        .map(|v| (v.to_string(), String::new()))
        .collect();
    let mut set = |variable: &str, value: String| {
        if let Some(slot) = slots.iter_mut().find(|(v, _)| v == variable) {
            slot.1 = value;
        }
    };

    set("do_queue", ParamValue::Bool(env.queue_use).to_job_star());
    set("fn_exe", job.fn_exe());
    set("min_dedicated", env.minimum_dedicated.to_string());
    set(
        "nr_threads",
        harvest
            .threads
            .as_ref()
            .and_then(|spec| value_for(spec, values))
            .map(ParamValue::to_job_star)
            .unwrap_or_else(|| "1".to_string()),
    );
    set("qsub", env.qsub_command.clone());
    set("qsubscript", env.qsub_template.clone());
    set("queuename", env.queue_name.clone());

    for (variable, spec) in &harvest.reserved {
        set(*variable, text(spec));
    }
    for (i, spec) in harvest.generic.iter().enumerate() {
        set(&format!("param{}_label", i + 1), spec.name.clone());
        set(&format!("param{}_value", i + 1), text(spec));
    }

    Ok(JobStar::new("relion.external", slots))
}
