
use harness::{test_config, write_file, FakeFarm};
use mapfarm::orchestrator::barrier::{scan_error_files, wait_for};
use mapfarm::store::StatusStore;

#[tokio::test]
async fn empty_job_set_is_a_noop_that_still_records_the_milestone() {
    let root = tempfile::tempdir().unwrap();
    let config = test_config(root.path());
    let farm = FakeFarm::new();
    let mut store = StatusStore::in_memory(Vec::new()).await.unwrap();

    wait_for(&farm, &mut store, &config, &[]).await.unwrap();

    assert_eq!(farm.submission_count(), 0);
    let events = store.events().await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].status_tag, "mapping finished");
}

#[tokio::test]
async fn barrier_job_is_interactive_and_conjoins_distinct_names() {
    let root = tempfile::tempdir().unwrap();
    let config = test_config(root.path());
    let farm = FakeFarm::new();
    let mut store = StatusStore::in_memory(Vec::new()).await.unwrap();

    let names = vec![
        "exo_chr1".to_string(),
        "blat_chr1".to_string(),
        "exo_chr1".to_string(),
    ];
    wait_for(&farm, &mut store, &config, &names).await.unwrap();

    let submissions = farm.submissions();
    assert_eq!(submissions.len(), 1);
    let barrier = &submissions[0];
    assert!(barrier.interactive);
    assert_eq!(
        barrier.dependency.as_deref(),
        Some("ended(exo_chr1) && ended(blat_chr1)")
    );

    let events = store.events().await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].status_tag, "mapping finished");
}

#[tokio::test]
async fn rejected_barrier_submission_is_not_fatal() {
    let root = tempfile::tempdir().unwrap();
    let config = test_config(root.path());
    let farm = FakeFarm::new();
    farm.set_rejecting(true);
    let mut store = StatusStore::in_memory(Vec::new()).await.unwrap();

    let names = vec!["exo_chr1".to_string()];
    wait_for(&farm, &mut store, &config, &names).await.unwrap();

    // Status inspection through the store stays possible: the milestone is
    // still recorded.
    let events = store.events().await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].status_tag, "mapping finished");
}

#[tokio::test]
async fn error_file_scan_reports_only_non_empty_err_files() {
    let root = tempfile::tempdir().unwrap();
    write_file(&root.path().join("job_a.err"), "");
    write_file(&root.path().join("job_b.err"), "Killed by LSF\n");
    write_file(&root.path().join("job_c.err"), "segfault\n");
    write_file(&root.path().join("job_b.out"), "not an error file\n");

    let files = scan_error_files(root.path()).unwrap();
    let names: Vec<String> = files
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["job_b.err", "job_c.err"]);
}

#[tokio::test]
async fn missing_root_dir_is_an_io_error() {
    let root = tempfile::tempdir().unwrap();
    let missing = root.path().join("gone");
    assert!(scan_error_files(&missing).is_err());
}
