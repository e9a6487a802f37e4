
use std::sync::Arc;
use std::time::{Duration, Instant};

use harness::{test_config, write_file};
use mapfarm::farm::{FarmClient, LocalFarm, SubmitRequest};
use mapfarm::methods::{BlatMethod, MethodRegistry};
use mapfarm::orchestrator::barrier::wait_for;
use mapfarm::orchestrator::Orchestrator;
use mapfarm::store::{JobStatus, MappingTask, StatusStore};

#[tokio::test]
async fn farmless_wait_returns_immediately_with_one_milestone() {
    let root = tempfile::tempdir().unwrap();
    let config = test_config(root.path());
    let farm = LocalFarm::new();
    let mut store = StatusStore::in_memory(Vec::new()).await.unwrap();

    let names = vec!["exo_chr1".to_string(), "blat_chr1".to_string()];
    let started = Instant::now();
    wait_for(&farm, &mut store, &config, &names).await.unwrap();
    assert!(started.elapsed() < Duration::from_secs(5));

    let events = store.events().await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].status_tag, "mapping finished");
    // The barrier job never runs locally, so it leaves no output files.
    assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn local_array_job_substitutes_indices_and_redirects_output() {
    let root = tempfile::tempdir().unwrap();
    let mut req = SubmitRequest::new("echo chunk $LSB_JOBINDEX", "exo_local");
    req.array = Some((1, 3));
    req.out_file = root.path().join("exo_local.%I.out");
    req.err_file = root.path().join("exo_local.%I.err");

    let farm = LocalFarm::new();
    let id = farm.submit(req).await.unwrap();
    assert!(id.as_str().starts_with("local-"));

    for i in 1..=3 {
        let out =
            std::fs::read_to_string(root.path().join(format!("exo_local.{i}.out"))).unwrap();
        assert_eq!(out, format!("chunk {i}\n"));
        assert!(root.path().join(format!("exo_local.{i}.err")).exists());
    }
}

#[tokio::test]
async fn local_job_failure_is_not_a_submission_error() {
    let root = tempfile::tempdir().unwrap();
    let mut req = SubmitRequest::new("echo boom >&2; exit 3", "broken_local");
    req.out_file = root.path().join("broken_local.out");
    req.err_file = root.path().join("broken_local.err");

    // A non-zero exit belongs to farm accounting, not to submission.
    let farm = LocalFarm::new();
    farm.submit(req).await.unwrap();

    let err = std::fs::read_to_string(root.path().join("broken_local.err")).unwrap();
    assert_eq!(err, "boom\n");
}

#[tokio::test]
async fn farmless_batch_runs_and_recovers_end_to_end() {
    let root = tempfile::tempdir().unwrap();
    write_file(&root.path().join("queries.fa"), ">q1\nMSTNPKPQRK\n");
    write_file(&root.path().join("targets.fa"), ">t1\nACGTACGT\n");

    let mut registry = MethodRegistry::new();
    registry.register(Arc::new(BlatMethod::new("echo")));

    let store = StatusStore::in_memory(Vec::new()).await.unwrap();
    let mut orchestrator = Orchestrator::new(
        test_config(root.path()),
        registry,
        Arc::new(LocalFarm::new()),
        store,
    );

    let tasks = vec![MappingTask::new(
        "blat",
        root.path().join("queries.fa"),
        root.path().join("targets.fa"),
    )];
    let total = orchestrator.run_mapping(&tasks).await.unwrap();
    assert_eq!(total, 1);

    let jobs = orchestrator.store().all_jobs().await.unwrap();
    assert_eq!(jobs.len(), 1);
    let job = jobs[0].clone();
    assert_eq!(job.status, JobStatus::Submitted);
    // The job ran in-process; its stdout landed in the out file.
    let out = std::fs::read_to_string(&job.out_file).unwrap();
    assert!(out.contains("-out=psl"));

    // Farm accounting marks the job failed; recovery resubmits it locally.
    orchestrator
        .store()
        .update_status(&job.job_id, job.array_index, JobStatus::Failed)
        .await
        .unwrap();
    let resubmitted = orchestrator.fix_failed_jobs().await.unwrap();
    assert_eq!(resubmitted, 1);

    let recovered = orchestrator.store().all_jobs().await.unwrap()[0].clone();
    assert_ne!(recovered.job_id, job.job_id);
    assert_eq!(recovered.status, JobStatus::Submitted);
    assert!(recovered.out_file.exists());
}
