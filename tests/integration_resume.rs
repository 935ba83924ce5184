//! Failure handling across runs: abort, continue, rollback and resume.

mod common;

use std::collections::BTreeSet;

use common::checkpoint_states;
use common::prelude::*;
use metarepo::config::{self, Mode};
use metarepo::engine::orchestrator::FailurePolicy;
use metarepo::engine::{ConversionOptions, NoopObserver, ResumeFrom};
use metarepo::error::Error;

fn three_components() -> TestFixture {
    TestFixture::new()
        .with_upstream("a", &[("a.txt", "a\n")])
        .with_upstream("b", &[("b.txt", "b\n")])
        .with_upstream("c", &[("c.txt", "c\n")])
        .with_manifest("reference", &[("a", &[]), ("b", &[]), ("c", &[])])
        .with_checkout("a")
        .with_checkout("b")
        .with_checkout("c")
}

fn set(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|n| n.to_string()).collect()
}

/// Non-atomic options so failed runs leave a checkpoint to resume.
fn keep_progress(policy: FailurePolicy) -> ConversionOptions {
    ConversionOptions {
        failure_policy: policy,
        atomic: false,
        create_backup: false,
        ..ConversionOptions::new(Mode::Vendored)
    }
}

fn resume(retry_failed: bool) -> ConversionOptions {
    ConversionOptions {
        resume: Some(ResumeFrom::default()),
        retry_failed,
        ..keep_progress(FailurePolicy::Abort)
    }
}

#[test]
fn test_abort_stops_at_first_failure_and_keeps_checkpoint() {
    let fixture = three_components();
    let (engine, recorder) = fixture.engine();
    recorder.fail("b");

    let err = engine
        .convert(&keep_progress(FailurePolicy::Abort), &mut NoopObserver)
        .unwrap_err();

    match &err {
        Error::ConversionAborted { component, .. } => assert_eq!(component, "b"),
        other => panic!("expected ConversionAborted, got {other:?}"),
    }

    let (completed, failed, pending) = checkpoint_states(&fixture.workspace());
    assert_eq!(completed, set(&["a"]));
    assert_eq!(failed, set(&["b"]));
    assert_eq!(pending, set(&["c"]));

    // c was never attempted
    assert!(fixture.workspace().component_dir("c").join(".git").is_dir());
}

#[test]
fn test_resume_after_abort_retries_and_finishes() {
    let fixture = three_components();
    let (engine, recorder) = fixture.engine();
    recorder.fail("b");
    engine
        .convert(&keep_progress(FailurePolicy::Abort), &mut NoopObserver)
        .unwrap_err();
    let calls = recorder.calls();

    recorder.heal("b");
    let result = engine.convert(&resume(true), &mut NoopObserver).unwrap();

    assert!(result.is_success());
    assert_eq!(result.skipped, vec!["a"]);
    assert_eq!(result.successful, vec!["b", "c"]);
    // a is not fetched again
    assert_eq!(recorder.calls(), calls + 2);
    assert!(engine.checkpoints().list().unwrap().is_empty());
    assert!(engine.verify().unwrap().is_empty());
}

#[test]
fn test_continue_records_failures_and_converts_the_rest() {
    let fixture = three_components();
    let (engine, recorder) = fixture.engine();
    recorder.fail("b");

    let result = engine
        .convert(&keep_progress(FailurePolicy::Continue), &mut NoopObserver)
        .unwrap();

    assert!(!result.is_success());
    assert_eq!(result.successful, vec!["a", "c"]);
    assert_eq!(result.failed.len(), 1);
    assert_eq!(result.failed[0].name, "b");
    assert!(result.verification.is_empty());

    let id = result.checkpoint_id.expect("partial run keeps its checkpoint");
    assert!(engine.checkpoints().load(&id).unwrap().is_some());
    let (completed, failed, pending) = checkpoint_states(&fixture.workspace());
    assert_eq!(completed, set(&["a", "c"]));
    assert_eq!(failed, set(&["b"]));
    assert!(pending.is_empty());
}

#[test]
fn test_resume_without_retry_leaves_failures_alone() {
    let fixture = three_components();
    let (engine, recorder) = fixture.engine();
    recorder.fail("b");
    engine
        .convert(&keep_progress(FailurePolicy::Continue), &mut NoopObserver)
        .unwrap();
    let calls = recorder.calls();

    recorder.heal("b");
    let result = engine.convert(&resume(false), &mut NoopObserver).unwrap();

    assert_eq!(recorder.calls(), calls);
    assert_eq!(result.skipped, vec!["a", "c"]);
    assert_eq!(result.failed.len(), 1);
    assert_eq!(result.failed[0].message, "failed in a previous attempt");
    assert!(result.checkpoint_id.is_some());
}

#[test]
fn test_resume_picks_up_components_added_to_the_manifest() {
    let fixture = three_components().with_upstream("d", &[("d.txt", "d\n")]);
    let (engine, recorder) = fixture.engine();
    recorder.fail("b");
    engine
        .convert(&keep_progress(FailurePolicy::Abort), &mut NoopObserver)
        .unwrap_err();

    let mut manifest = config::from_file(&fixture.workspace().manifest_path()).unwrap();
    let mut d = manifest.components["a"].clone();
    d.name = "d".to_string();
    d.repo = fixture.upstream("d").display().to_string();
    manifest.components.insert("d".to_string(), d);
    config::write(&fixture.workspace().manifest_path(), &manifest).unwrap();

    recorder.heal("b");
    let result = engine.convert(&resume(true), &mut NoopObserver).unwrap();
    assert_eq!(result.successful, vec!["b", "c", "d"]);
}

#[test]
fn test_resume_with_unknown_checkpoint_fails() {
    let fixture = three_components();
    let (engine, _recorder) = fixture.engine();

    let options = ConversionOptions {
        resume: Some(ResumeFrom {
            checkpoint_id: Some("checkpoint_19700101_000000".to_string()),
        }),
        ..keep_progress(FailurePolicy::Abort)
    };
    let err = engine.convert(&options, &mut NoopObserver).unwrap_err();
    assert!(matches!(err, Error::CheckpointNotFound { id: Some(_) }));
}

#[test]
fn test_resume_into_the_other_mode_is_rejected() {
    let fixture = three_components();
    let (engine, recorder) = fixture.engine();
    recorder.fail("b");
    engine
        .convert(&keep_progress(FailurePolicy::Abort), &mut NoopObserver)
        .unwrap_err();

    let options = ConversionOptions {
        target: Mode::Reference,
        ..resume(true)
    };
    let err = engine.convert(&options, &mut NoopObserver).unwrap_err();
    assert!(matches!(err, Error::Checkpoint { .. }));
}

#[test]
fn test_atomic_failure_restores_the_workspace_byte_for_byte() {
    let fixture = three_components();
    let ws = fixture.workspace();
    let (engine, recorder) = fixture.engine();
    recorder.fail("c");

    let manifests_before = snapshot_tree(&ws.manifests_dir);
    let components_before = snapshot_tree(&ws.components_dir);

    let err = engine
        .convert(&ConversionOptions::new(Mode::Vendored), &mut NoopObserver)
        .unwrap_err();

    let backup = match &err {
        Error::RolledBack { backup, source } => {
            assert!(matches!(**source, Error::ConversionAborted { .. }));
            backup.clone()
        }
        other => panic!("expected RolledBack, got {other:?}"),
    };

    assert_eq!(snapshot_tree(&ws.manifests_dir), manifests_before);
    assert_eq!(snapshot_tree(&ws.components_dir), components_before);
    assert!(engine.checkpoints().list().unwrap().is_empty());
    assert!(engine.backups().get(&backup).unwrap().is_some());
}

#[test]
fn test_rolled_back_resume_keeps_the_checkpoint_it_started_from() {
    let fixture = three_components();
    let ws = fixture.workspace();
    let (engine, recorder) = fixture.engine();
    recorder.fail("b");
    engine
        .convert(&keep_progress(FailurePolicy::Abort), &mut NoopObserver)
        .unwrap_err();
    let loaded = engine.checkpoints().load_latest().unwrap().unwrap();
    let components_before = snapshot_tree(&ws.components_dir);

    recorder.heal("b");
    recorder.fail("c");
    let options = ConversionOptions {
        resume: Some(ResumeFrom::default()),
        retry_failed: true,
        ..ConversionOptions::new(Mode::Vendored)
    };
    let err = engine.convert(&options, &mut NoopObserver).unwrap_err();

    assert!(matches!(err, Error::RolledBack { .. }));
    assert_eq!(snapshot_tree(&ws.components_dir), components_before);
    let checkpoints = engine.checkpoints().list().unwrap();
    assert_eq!(checkpoints, vec![loaded]);
    let (completed, failed, pending) = checkpoint_states(&ws);
    assert_eq!(completed, set(&["a"]));
    assert_eq!(failed, set(&["b"]));
    assert_eq!(pending, set(&["c"]));
}

#[test]
fn test_atomic_without_backup_cannot_roll_back() {
    let fixture = three_components();
    let (engine, recorder) = fixture.engine();
    recorder.fail("c");

    let options = ConversionOptions {
        create_backup: false,
        ..ConversionOptions::new(Mode::Vendored)
    };
    let err = engine.convert(&options, &mut NoopObserver).unwrap_err();

    assert!(matches!(err, Error::ConversionAborted { .. }));
    // a and b stay vendored
    assert!(!fixture.workspace().component_dir("a").join(".git").exists());
}

#[test]
fn test_backup_then_restore_recovers_an_earlier_state() {
    let fixture = three_components();
    let ws = fixture.workspace();
    let (engine, _recorder) = fixture.engine();

    let before = snapshot_tree(&ws.components_dir);
    let manifest_before = fixture.manifest();
    let backup = engine.backups().create(Some("pre-vendor"), true).unwrap();

    engine
        .convert(&keep_progress(FailurePolicy::Abort), &mut NoopObserver)
        .unwrap();
    assert_ne!(snapshot_tree(&ws.components_dir), before);

    engine.backups().restore(backup.name(), true).unwrap();
    assert_eq!(snapshot_tree(&ws.components_dir), before);
    assert_eq!(fixture.manifest(), manifest_before);
}
