//! External jobs that ship with the application.

use super::params::{ParamSpec, ParamType, ParamValue, ParamValues};
use super::{ExternalJob, RunContext};
use crate::error::RelionError;
use crate::pipeline::NodeType;
use crate::star::{LoopTable, StarBlock, StarDocument};
use anyhow::Context;
use std::sync::Arc;
use tracing::info;

/// Block holding the particle rows of a particles STAR file
const PARTICLES_BLOCK: &str = "particles";

/// Keep the first `n` particles of a particles STAR file.
///
/// Other blocks (optics groups) are copied unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct SubsetParticles;

impl SubsetParticles {
    pub const IMPORT_PATH: &'static str = "himena_relion.builtins.SubsetParticles";
    pub const OUTPUT: &'static str = "particles.star";
}

impl ExternalJob for SubsetParticles {
    fn import_path(&self) -> &str {
        Self::IMPORT_PATH
    }

    fn job_title(&self) -> &str {
        "Subset particles"
    }

    fn menu_id(&self) -> Option<&str> {
        Some("utilities")
    }

    fn output_nodes(&self) -> Vec<(String, NodeType)> {
        vec![(Self::OUTPUT.to_string(), NodeType::ParticleGroupMetadata)]
    }

    fn params(&self) -> Vec<ParamSpec> {
        vec![
            ParamSpec::new("in_parts", ParamType::Path).with_help("Input particles STAR file"),
            ParamSpec::new("n", ParamType::Int)
                .with_default(ParamValue::Int(100))
                .with_help("Number of particles to keep"),
        ]
    }

    fn run(&self, ctx: &RunContext, values: &ParamValues) -> anyhow::Result<()> {
        let input = values
            .get("in_parts")
            .and_then(ParamValue::as_path)
            .ok_or_else(|| RelionError::MissingArgument("in_parts".to_string()))?;
        let n = values.get("n").and_then(ParamValue::as_int).unwrap_or(100);
        anyhow::ensure!(n >= 0, "--n must not be negative, got {n}");

        let mut doc = StarDocument::read(ctx.resolve(input))?;
        let table = doc
            .block(PARTICLES_BLOCK)
            .and_then(StarBlock::as_loop)
            .with_context(|| format!("{} has no particles loop", input.display()))?;

        let mut subset = LoopTable::new(table.columns().iter().cloned());
        for row in table.rows().iter().take(n as usize) {
            subset.push_row(row.clone())?;
        }
        info!("Keeping {} of {} particles", subset.len(), table.len());

        doc.insert(PARTICLES_BLOCK, StarBlock::Loop(subset));
        doc.write(ctx.output_path(Self::OUTPUT))?;
        Ok(())
    }
}

/// Jobs registered in the process-wide registry at startup
pub fn builtin_external_jobs() -> Vec<Arc<dyn ExternalJob>> {
    vec![Arc::new(SubsetParticles)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::cli::run_external;
    use crate::job::ParticleRow;
    use crate::star::{Loop, StarModel};
    use std::path::PathBuf;

    fn particles(count: usize) -> StarDocument {
        let mut doc = StarDocument::new();
        let mut optics = LoopTable::new(["rlnOpticsGroup", "rlnImagePixelSize"]);
        optics.push_row(vec!["1".into(), "1.06".into()]).unwrap();
        doc.insert("optics", StarBlock::Loop(optics));
        let rows: Loop<ParticleRow> = (0..count)
            .map(|i| ParticleRow {
                image_name: format!("{:06}@Extract/job004/mic001.mrcs", i + 1),
                micrograph_name: Some("MotionCorr/job002/mic001.mrc".into()),
                class_number: None,
                optics_group: Some(1),
            })
            .collect();
        doc.insert(PARTICLES_BLOCK, rows.to_block());
        doc
    }

    #[test]
    fn test_subset_keeps_first_rows_and_other_blocks() {
        let tmp = tempfile::tempdir().unwrap();
        let input = tmp.path().join("input.star");
        particles(5).write(&input).unwrap();

        let mut values = ParamValues::new();
        values.insert("in_parts".into(), ParamValue::Path(input));
        values.insert("n".into(), ParamValue::Int(3));
        let ctx = RunContext::new(tmp.path().join("External/job007"));
        std::fs::create_dir_all(ctx.output_path("")).unwrap();
        SubsetParticles.run(&ctx, &values).unwrap();

        let out = StarDocument::read(ctx.output_path(SubsetParticles::OUTPUT)).unwrap();
        assert_eq!(out.block_names(), ["optics", "particles"]);
        let rows = Loop::<ParticleRow>::from_document(&out).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows.rows()[2].image_name, "000003@Extract/job004/mic001.mrcs");
    }

    #[test]
    fn test_subset_through_cli() {
        let tmp = tempfile::tempdir().unwrap();
        let input = tmp.path().join("input.star");
        particles(2).write(&input).unwrap();
        let out: PathBuf = tmp.path().join("External/job008");

        let args = vec![
            "--o".to_string(),
            out.to_string_lossy().into_owned(),
            "--in_parts".to_string(),
            input.to_string_lossy().into_owned(),
        ];
        run_external(&SubsetParticles, &args).unwrap();

        let rows = Loop::<ParticleRow>::validate_file(out.join("particles.star")).unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_missing_particles_block_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let input = tmp.path().join("input.star");
        StarDocument::new().write(&input).unwrap();
        let mut values = ParamValues::new();
        values.insert("in_parts".into(), ParamValue::Path(input));
        let ctx = RunContext::new(tmp.path());
        assert!(SubsetParticles.run(&ctx, &values).is_err());
    }
}
