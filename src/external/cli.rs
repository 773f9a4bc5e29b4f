//! Command-line side of external jobs.
//!
//! RELION calls `himena-relion <import_path> --o <job_dir> [--name value]*`,
//! adding flags of its own such as `--pipeline_control`. Declared parameters
//! are parsed by type, unknown flags are logged and skipped.

use super::job_star::{OUTPUT_PARAM, THREADS_PARAM};
use super::params::{ParamValue, ParamValues};
use super::{ExternalJob, RunContext, OUTPUT_NODES_STAR, TOOL_PREFIX};
use crate::error::{RelionError, Result, ResultExt};
use crate::job::{EXIT_FAILURE, EXIT_SUCCESS};
use crate::registry::JobRegistry;
use crate::star::{Loop, StarModel};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, error, info, warn};

crate::star_loop! {
    /// One row of `RELION_OUTPUT_NODES.star`
    #[derive(Debug, Clone, PartialEq)]
    pub struct OutputNodeRow in "output_nodes" {
        pub name: String => "rlnPipeLineNodeName",
        pub type_label: String => "rlnPipeLineNodeTypeLabel",
    }
}

/// The `--o` value, if present
fn find_output_dir(args: &[String]) -> Option<PathBuf> {
    args.iter()
        .position(|a| a == "--o")
        .and_then(|i| args.get(i + 1))
        .map(PathBuf::from)
}

/// Parse the arguments following the import path
///
/// A declared flag always takes the next token as its value, so values may
/// start with `--`. Booleans need an explicit `1` or `0`.
pub fn parse_args(job: &dyn ExternalJob, args: &[String]) -> Result<(PathBuf, ParamValues)> {
    let params = job.params();
    let mut output = None;
    let mut raw: BTreeMap<&str, &str> = BTreeMap::new();

    let mut i = 0;
    while i < args.len() {
        let arg = &args[i];
        let Some(name) = arg.strip_prefix("--") else {
            warn!("Ignoring stray argument {arg:?}");
            i += 1;
            continue;
        };

        if name == OUTPUT_PARAM || params.iter().any(|p| p.name == name) {
            let value = args
                .get(i + 1)
                .ok_or_else(|| RelionError::MissingArgument(name.to_string()))?;
            i += 2;
            if name == OUTPUT_PARAM {
                output = Some(PathBuf::from(value));
            } else {
                raw.insert(name, value.as_str());
            }
            continue;
        }

        // flags of RELION's own take a value only when one follows
        let has_value = args.get(i + 1).is_some_and(|v| !v.starts_with("--"));
        i += if has_value { 2 } else { 1 };
        if name == THREADS_PARAM {
            debug!("{} does not take a thread count", job.import_path());
        } else {
            warn!("Ignoring unknown flag --{name}");
        }
    }

    let mut values = ParamValues::new();
    for spec in params.iter().filter(|p| p.name != OUTPUT_PARAM) {
        let value = match raw.get(spec.name.as_str()) {
            Some(text) => spec
                .ty
                .parse_string(text)
                .with_context(|| format!("Failed to parse --{}", spec.name))?,
            None => spec
                .default
                .clone()
                .ok_or_else(|| RelionError::MissingArgument(spec.name.clone()))?,
        };
        values.insert(spec.name.clone(), value);
    }

    let output = output.ok_or_else(|| RelionError::MissingArgument(OUTPUT_PARAM.to_string()))?;
    Ok((output, values))
}

/// `--name value` pairs for a value set, in declaration order
pub fn cli_args(job: &dyn ExternalJob, values: &ParamValues) -> Vec<String> {
    job.params()
        .iter()
        .filter(|p| p.name != OUTPUT_PARAM)
        .filter_map(|p| {
            values
                .get(&p.name)
                .map(|v| [format!("--{}", p.name), v.to_cli()])
        })
        .flatten()
        .collect()
}

/// The full command line RELION runs for a job directory
pub fn invocation(job: &dyn ExternalJob, output_dir: &str, values: &ParamValues) -> Vec<String> {
    let mut argv: Vec<String> = TOOL_PREFIX
        .split_whitespace()
        .map(str::to_string)
        .collect();
    argv.push(job.import_path().to_string());
    argv.push(format!("--{OUTPUT_PARAM}"));
    argv.push(output_dir.to_string());
    argv.extend(cli_args(job, values));
    argv
}

/// JSON description of a job, printed by `--describe`
pub fn describe(job: &dyn ExternalJob) -> serde_json::Value {
    let outputs: Vec<_> = job
        .output_nodes()
        .into_iter()
        .map(|(name, ty)| serde_json::json!({ "name": name, "type": ty.label() }))
        .collect();
    serde_json::json!({
        "import_path": job.import_path(),
        "title": job.job_title(),
        "menu_id": job.menu_id(),
        "fn_exe": job.fn_exe(),
        "params": job.params(),
        "output_nodes": outputs,
    })
}

fn write_output_nodes(job: &dyn ExternalJob, ctx: &RunContext) -> Result<()> {
    let rows: Loop<OutputNodeRow> = job
        .output_nodes()
        .into_iter()
        .map(|(name, ty)| OutputNodeRow {
            name: ctx.output_dir().join(name).to_string_lossy().into_owned(),
            type_label: ty.label(),
        })
        .collect();
    if rows.is_empty() {
        return Ok(());
    }
    rows.write(ctx.output_path(OUTPUT_NODES_STAR))
}

fn touch(ctx: &RunContext, marker: &str) {
    let path = ctx.output_path(marker);
    if let Err(e) = fs::write(&path, b"") {
        warn!("Failed to write {}: {}", path.display(), e);
    }
}

/// Parse, run and mark the job directory with RELION's exit marker
pub fn run_external(job: &dyn ExternalJob, args: &[String]) -> anyhow::Result<()> {
    let result = parse_args(job, args)
        .map_err(anyhow::Error::from)
        .and_then(|(output, values)| {
            let ctx = RunContext::new(output);
            fs::create_dir_all(ctx.output_path(""))?;
            info!("Running {} in {}", job.import_path(), ctx.output_dir().display());
            job.run(&ctx, &values)?;
            write_output_nodes(job, &ctx)?;
            Ok(ctx)
        });

    match result {
        Ok(ctx) => {
            touch(&ctx, EXIT_SUCCESS);
            info!("{} finished", job.import_path());
            Ok(())
        }
        Err(e) => {
            error!("{} failed: {:#}", job.import_path(), e);
            if let Some(output) = find_output_dir(args) {
                let ctx = RunContext::new(output);
                if fs::create_dir_all(ctx.output_path("")).is_ok() {
                    touch(&ctx, EXIT_FAILURE);
                }
            }
            Err(e)
        }
    }
}

/// Look up `import_path` in a registry and run it
pub fn run_registered(
    registry: &JobRegistry,
    import_path: &str,
    args: &[String],
) -> anyhow::Result<()> {
    let job = registry
        .pick_job_class(import_path)
        .ok_or_else(|| RelionError::UnknownExternalJob(import_path.to_string()))?;
    run_external(job.as_ref(), args)
}
