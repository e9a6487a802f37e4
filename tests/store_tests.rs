
use std::path::Path;

use harness::{count_features_between, insert_features, job_record, store_with_feature_table};
use mapfarm::config::DependentTable;
use mapfarm::store::{JobStatus, StatusStore};

#[tokio::test]
async fn insert_and_fetch_round_trip() {
    let store = StatusStore::in_memory(Vec::new()).await.unwrap();
    let root = Path::new("/work/mapping");

    let job = job_record("exonerate_chr1_a1", 3, "exonerate", root, JobStatus::Submitted);
    store.insert_job(&job).await.unwrap();

    let fetched = store.job("exonerate_chr1_a1", 3).await.unwrap().unwrap();
    assert_eq!(fetched.job_id, "exonerate_chr1_a1");
    assert_eq!(fetched.array_index, 3);
    assert_eq!(fetched.method, "exonerate");
    assert_eq!(fetched.status, JobStatus::Submitted);
    assert_eq!(fetched.map_file, root.join("exonerate_chr1_a1.3.map"));
    assert_eq!(fetched.root_dir, root);
    assert!(fetched.range_start.is_none());
    assert!(fetched.range_end.is_none());

    assert!(store.job("exonerate_chr1_a1", 4).await.unwrap().is_none());
}

#[tokio::test]
async fn failed_jobs_filters_by_status() {
    let store = StatusStore::in_memory(Vec::new()).await.unwrap();
    let root = Path::new("/work");

    for (id, status) in [
        ("job_a", JobStatus::Successful),
        ("job_b", JobStatus::Failed),
        ("job_c", JobStatus::Submitted),
        ("job_d", JobStatus::Failed),
    ] {
        store
            .insert_job(&job_record(id, 1, "blat", root, status))
            .await
            .unwrap();
    }

    let failed = store.failed_jobs().await.unwrap();
    let ids: Vec<&str> = failed.iter().map(|j| j.job_id.as_str()).collect();
    assert_eq!(ids, vec!["job_b", "job_d"]);
}

#[tokio::test]
async fn status_updates_follow_farm_accounting() {
    let store = StatusStore::in_memory(Vec::new()).await.unwrap();
    store
        .insert_job(&job_record("job_a", 1, "blat", Path::new("/w"), JobStatus::Submitted))
        .await
        .unwrap();
    store
        .insert_job(&job_record("job_b", 1, "blat", Path::new("/w"), JobStatus::Submitted))
        .await
        .unwrap();

    store
        .update_status("job_a", 1, JobStatus::Running)
        .await
        .unwrap();
    let job = store.job("job_a", 1).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Running);

    store
        .update_status("job_a", 1, JobStatus::Failed)
        .await
        .unwrap();
    let failed = store.failed_jobs().await.unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].job_id, "job_a");

    // Only the addressed row moves.
    let other = store.job("job_b", 1).await.unwrap().unwrap();
    assert_eq!(other.status, JobStatus::Submitted);
}

#[tokio::test]
async fn range_updates_and_clearing() {
    let store = StatusStore::in_memory(Vec::new()).await.unwrap();
    let root = Path::new("/work");
    store
        .insert_job(&job_record("job_a", 1, "blat", root, JobStatus::Running))
        .await
        .unwrap();

    store
        .set_affected_range("job_a", 1, Some(100), Some(250))
        .await
        .unwrap();
    let job = store.job("job_a", 1).await.unwrap().unwrap();
    assert_eq!(job.range_start, Some(100));
    assert_eq!(job.range_end, Some(250));
    assert!(!job.has_one_sided_range());

    store.clear_affected_range("job_a", 1).await.unwrap();
    let job = store.job("job_a", 1).await.unwrap().unwrap();
    assert!(job.range_start.is_none());
    assert!(job.range_end.is_none());
}

#[tokio::test]
async fn one_sided_range_is_representable() {
    // Farm accounting writes the range fields; the store must be able to
    // hold the anomalous state so recovery can report it.
    let store = StatusStore::in_memory(Vec::new()).await.unwrap();
    store
        .insert_job(&job_record("job_a", 1, "blat", Path::new("/w"), JobStatus::Failed))
        .await
        .unwrap();
    store
        .set_affected_range("job_a", 1, Some(500), None)
        .await
        .unwrap();

    let job = store.job("job_a", 1).await.unwrap().unwrap();
    assert!(job.has_one_sided_range());
}

#[tokio::test]
async fn reassign_gives_new_identity_and_submitted_status() {
    let store = StatusStore::in_memory(Vec::new()).await.unwrap();
    store
        .insert_job(&job_record("old_name", 2, "exonerate", Path::new("/w"), JobStatus::Failed))
        .await
        .unwrap();

    store.reassign_job("old_name", 2, "new_name").await.unwrap();

    assert!(store.job("old_name", 2).await.unwrap().is_none());
    let job = store.job("new_name", 2).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Submitted);
    assert_eq!(job.array_index, 2);
}

#[tokio::test]
async fn delete_derived_range_spans_all_dependent_tables() {
    let store = StatusStore::in_memory(vec![
        DependentTable::new("alignment_feature", "feature_id"),
        DependentTable::new("alignment_xref", "feature_id"),
    ])
    .await
    .unwrap();
    for table in ["alignment_feature", "alignment_xref"] {
        sqlx::query(&format!(
            "CREATE TABLE {table} (feature_id INTEGER PRIMARY KEY, score REAL)"
        ))
        .execute(store.pool())
        .await
        .unwrap();
        for id in [10_i64, 20, 30, 40] {
            sqlx::query(&format!(
                "INSERT INTO {table} (feature_id, score) VALUES (?, 1.0)"
            ))
            .bind(id)
            .execute(store.pool())
            .await
            .unwrap();
        }
    }

    let deleted = store.delete_derived_range(15, 35).await.unwrap();
    assert_eq!(deleted, 4); // 20 and 30 from each table

    use sqlx::Row;
    for table in ["alignment_feature", "alignment_xref"] {
        let row = sqlx::query(&format!("SELECT COUNT(*) AS n FROM {table}"))
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(row.get::<i64, _>("n"), 2);
    }
}

#[tokio::test]
async fn events_are_append_only_and_ordered() {
    let store = StatusStore::in_memory(Vec::new()).await.unwrap();
    store.record_event("sequences dumped").await.unwrap();
    store.record_event("mapping submitted").await.unwrap();
    store.record_event("mapping finished").await.unwrap();

    let events = store.events().await.unwrap();
    let tags: Vec<&str> = events.iter().map(|e| e.status_tag.as_str()).collect();
    assert_eq!(tags, vec!["sequences dumped", "mapping submitted", "mapping finished"]);
}

#[tokio::test]
async fn suspended_preserves_in_memory_data() {
    let mut store = store_with_feature_table().await;
    insert_features(&store, [1, 2, 3]).await;

    let answer = store.suspended(async { 42 }).await.unwrap();
    assert_eq!(answer, 42);

    // An in-memory database must survive the suspension untouched.
    assert_eq!(count_features_between(&store, 0, 100).await, 3);
}
