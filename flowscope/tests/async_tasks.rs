//! Tracked async recipes fanned out over tokio tasks.

mod common;

use common::{child_dirs, expected_bulk_to_slabs_dirs, leaf_dirs, make_slabs};
use flowscope::prelude::*;
use futures::future::join_all;
use pretty_assertions::assert_eq;
use std::path::PathBuf;
use std::sync::Arc;

/// Runs `bulk_to_slabs_flow` with every job spawned as its own task.
async fn run_spawned(tracker: &Tracker, bulk: u32) -> anyhow::Result<Vec<PathBuf>> {
    let relax = Arc::new(track!(tracker, NodeKind::Job, common::relax_job_async));
    let fixed = Arc::new(track!(tracker, NodeKind::Job, common::static_job_async));

    let subflow = Arc::new(tracker.subflow("bulk_to_slabs_subflow", move |slabs: Vec<u32>| {
        let (relax, fixed) = (relax.clone(), fixed.clone());
        async move {
            let mut handles = Vec::new();
            for slab in slabs {
                let relax = relax.clone();
                handles.push(spawn_in_current_context(async move {
                    relax.call_async(slab).await
                }));
                let fixed = fixed.clone();
                handles.push(spawn_in_current_context(async move {
                    fixed.call_async(slab).await
                }));
            }

            join_all(handles)
                .await
                .into_iter()
                .map(|joined| Ok(joined??))
                .collect::<anyhow::Result<Vec<PathBuf>>>()
        }
    }));
    let flow = tracker.flow("bulk_to_slabs_flow", move |bulk: u32| {
        let subflow = subflow.clone();
        async move { subflow.call_async(make_slabs(bulk)).await }
    });

    flow.call_async(bulk).await
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_spawned_jobs_land_under_their_flow() {
    let tmp = tempfile::tempdir().unwrap();
    let tracker = Tracker::new(Settings::new().with_results_dir(tmp.path()));

    let dirs = run_spawned(&tracker, 1).await.unwrap();

    assert_eq!(dirs.len(), 8);
    assert_eq!(leaf_dirs(tmp.path()), expected_bulk_to_slabs_dirs());
    assert!(is_top_level());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_flows_get_separate_run_dirs() {
    let tmp = tempfile::tempdir().unwrap();
    let tracker = Tracker::new(
        Settings::new()
            .with_results_dir(tmp.path())
            .with_workflow_engine(WorkflowEngine::Prefect)
            .with_create_unique_dir(true),
    );

    let runs: Vec<_> = (0..3)
        .map(|bulk| {
            let tracker = tracker.clone();
            tokio::spawn(async move { run_spawned(&tracker, bulk).await })
        })
        .collect();
    for run in runs {
        run.await.unwrap().unwrap();
    }

    let run_dirs = child_dirs(tmp.path());
    assert_eq!(run_dirs.len(), 3);
    for run in &run_dirs {
        assert_eq!(leaf_dirs(&tmp.path().join(run)), expected_bulk_to_slabs_dirs());
    }
}

#[tokio::test]
async fn test_enveloped_task_restores_remote_context() {
    let tmp = tempfile::tempdir().unwrap();
    let tracker = Tracker::new(Settings::new().with_results_dir("/unused"));
    let relax = track!(tracker, NodeKind::Job, common::relax_job_async);

    let payload = {
        let _dir = push_directory_context(tmp.path().to_string_lossy());
        let _flow = flow_context("bulk_to_slabs_flow");
        let _sub = push_context("bulk_to_slabs_subflow", NodeKind::Subflow);
        Enveloped::capture(7_u32).to_json().unwrap()
    };

    let dir = relax
        .call_async_enveloped(Enveloped::from_json(&payload).unwrap())
        .await
        .unwrap();

    assert_eq!(
        dir,
        tmp.path()
            .join("bulk_to_slabs_flow/bulk_to_slabs_subflow/relax_job-0")
    );
    assert!(is_top_level());
}
