//! Label lookup, the process-wide registry and next-job suggestions

mod common;

use common::builders::ProjectBuilder;
use himena_relion::external::builtins::SubsetParticles;
use himena_relion::external::{ExternalJob, ParamSpec, ParamValues, RunContext};
use himena_relion::job::{
    Class2DJob, ExternalJobDirectory, ImportJob, JobDirectory, MotionCorrJob, PostProcessJob,
    Refine3DJob,
};
use himena_relion::pipeline::NodeType;
use himena_relion::registry::{self, JobRegistry};
use himena_relion::viewer::{ExternalViewer, LogViewer, PostProcessViewer};
use proptest::prelude::*;
use serial_test::serial;
use std::sync::Arc;

#[test]
fn test_labels_with_suffixes_resolve_to_the_base_class() {
    let project = ProjectBuilder::new();
    let registry = JobRegistry::with_builtins().unwrap();

    let import = project.job("Import/job001", "relion.import.movies", &[]);
    let motioncorr = project.job("MotionCorr/job002", "relion.motioncorr.own", &[]);
    let refine = project.job("Refine3D/job010", "relion.refine3d", &[]);

    assert!(registry.job_directory_for(&import).unwrap().is::<ImportJob>());
    assert!(registry.job_directory_for(&motioncorr).unwrap().is::<MotionCorrJob>());
    assert!(registry.job_directory_for(&refine).unwrap().is::<Refine3DJob>());
}

#[test]
fn test_suggestions_follow_connections() {
    let project = ProjectBuilder::new();
    let registry = JobRegistry::with_builtins().unwrap();
    let dir = project.job("MaskCreate/job011", "relion.maskcreate", &[]);
    let job = registry.job_directory_for(&dir).unwrap();

    let suggestions = registry.suggest_next(job.as_ref());
    assert_eq!(suggestions.len(), 1);
    assert_eq!(suggestions[0].target, "relion.postprocess");
    assert_eq!(
        suggestions[0].params,
        vec![("fn_mask".to_string(), "MaskCreate/job011/mask.mrc".to_string())]
    );

    let dir = project.job("Class2D/job008", "relion.class2d", &[]);
    let job = registry.job_directory_for(&dir).unwrap();
    assert!(registry.suggest_next(job.as_ref()).is_empty());
}

#[test]
fn test_external_job_directory_gets_external_viewer() {
    let project = ProjectBuilder::new();
    let registry = JobRegistry::with_builtins().unwrap();
    let dir = project.job(
        "External/job005",
        "relion.external",
        &[("fn_exe", "himena-relion himena_relion.builtins.SubsetParticles")],
    );

    let job = registry.job_directory_for(&dir).unwrap();
    let external = job.downcast_ref::<ExternalJobDirectory>().unwrap();
    assert_eq!(external.import_path(), Some(SubsetParticles::IMPORT_PATH));
    assert!(registry
        .viewer_for(job.as_ref())
        .downcast_ref::<ExternalViewer>()
        .is_some());
}

/// Registered only by the test below, under a unique import path
struct GlobalProbe;

impl ExternalJob for GlobalProbe {
    fn import_path(&self) -> &str {
        "tests.registry_integration.GlobalProbe"
    }

    fn output_nodes(&self) -> Vec<(String, NodeType)> {
        Vec::new()
    }

    fn params(&self) -> Vec<ParamSpec> {
        Vec::new()
    }

    fn run(&self, _ctx: &RunContext, _values: &ParamValues) -> anyhow::Result<()> {
        Ok(())
    }
}

#[test]
#[serial]
fn test_global_registry_sees_registrations() {
    assert!(registry::read()
        .pick_job_class(SubsetParticles::IMPORT_PATH)
        .is_some());

    registry::write()
        .register_external_job(Arc::new(GlobalProbe))
        .unwrap();
    let paths: Vec<_> = registry::read()
        .external_jobs()
        .iter()
        .map(|job| job.import_path().to_string())
        .collect();
    assert!(paths.contains(&"tests.registry_integration.GlobalProbe".to_string()));

    // a second identical registration is a no-op
    registry::write()
        .register_external_job(Arc::new(GlobalProbe))
        .unwrap();
}

#[test]
#[serial]
fn test_global_registry_opens_jobs() {
    let project = ProjectBuilder::new();
    let dir = project.job("PostProcess/job012", "relion.postprocess", &[]);
    let registry = registry::read();
    let job = registry.job_directory_for(&dir).unwrap();
    assert!(job.is::<PostProcessJob>());
    assert!(registry
        .viewer_for(job.as_ref())
        .downcast_ref::<PostProcessViewer>()
        .is_some());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_any_label_opens_a_job(
        label in prop_oneof![
            "[a-z]{1,8}(\\.[a-z0-9]{1,6}){0,3}",
            "relion\\.class2d(\\.[a-z]{1,6}){0,2}",
            "relion\\.postprocess(\\.[a-z]{1,6}){0,2}",
        ]
    ) {
        let project = ProjectBuilder::new();
        let registry = JobRegistry::with_builtins().unwrap();
        let dir = project.job("Any/job001", &label, &[]);

        let job = registry.job_directory_for(&dir).unwrap();
        prop_assert_eq!(job.job_dir().job_type_label(), label.as_str());
        let _viewer = registry.viewer_for(job.as_ref());

        if label == "relion.class2d" || label.starts_with("relion.class2d.") {
            prop_assert!(job.is::<Class2DJob>());
        } else if label == "relion.postprocess" || label.starts_with("relion.postprocess.") {
            prop_assert!(job.is::<PostProcessJob>());
        } else if registry.lookup(&label).is_none() {
            prop_assert!(job.is::<JobDirectory>());
            prop_assert!(registry
                .viewer_for(job.as_ref())
                .downcast_ref::<LogViewer>()
                .is_some());
        }
    }
}
