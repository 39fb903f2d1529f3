mod support;

use backend::store::{AssociationStore, StoreError};
use backend::topology::Topology;
use chrono::{TimeDelta, Utc};
use common::jobs::{ProgressOutcome, ProgressReport};
use common::model::association::{DownloadState, InvariantViolation, TemplatePoolAssociation};
use support::{move_pool, seed_topology, temp_store};

fn in_progress(pool: i64, template: i64, percent: u8, job: i64) -> ProgressReport {
    ProgressReport::new(pool, template, DownloadState::DownloadInProgress, Some(job)).percent(percent)
}

fn downloaded(pool: i64, template: i64, path: &str, job: i64) -> ProgressReport {
    ProgressReport::new(pool, template, DownloadState::Downloaded, Some(job))
        .percent(100)
        .local_path(path)
}

fn failed(pool: i64, template: i64, percent: u8, error: &str, job: i64) -> ProgressReport {
    ProgressReport::new(pool, template, DownloadState::DownloadError, Some(job))
        .percent(percent)
        .error_text(error)
}

fn pool_ids(rows: &[TemplatePoolAssociation]) -> Vec<i64> {
    rows.iter().map(|a| a.pool_id).collect()
}

#[test]
fn progress_download_and_late_report_from_superseded_job() {
    let (_dir, store) = temp_store();
    seed_topology(store.db_path(), &[(1, 2, 1)], &[(9, 1)]);

    store.create(9, 5, DownloadState::NotDownloaded).unwrap();
    assert_eq!(
        store.record_progress(&in_progress(9, 5, 40, 1)).unwrap(),
        ProgressOutcome::Applied
    );
    let found = store.find(9, 5).unwrap().unwrap();
    assert_eq!(found.download_state, DownloadState::DownloadInProgress);
    assert_eq!(found.download_percent, 40);
    assert_eq!(found.job_id, Some(1));

    store.record_progress(&downloaded(9, 5, "/data/tmpl5", 1)).unwrap();
    assert!(store.is_available(5, 1).unwrap());

    // A retried copy by job 2 succeeds, then job 1's lost timeout shows up.
    store.record_progress(&downloaded(9, 5, "/data/tmpl5", 2)).unwrap();
    assert_eq!(
        store
            .record_progress(&failed(9, 5, 40, "timeout", 1))
            .unwrap(),
        ProgressOutcome::Stale
    );

    let stored = store.find(9, 5).unwrap().unwrap();
    assert_eq!(stored.download_state, DownloadState::Downloaded);
    assert_eq!(stored.local_path, "/data/tmpl5");
    assert_eq!(stored.download_percent, 100);
    assert_eq!(stored.job_id, Some(2));
    assert!(stored.error_string.is_empty());
}

#[test]
fn older_job_never_changes_state_once_newer_job_reported() {
    let (_dir, store) = temp_store();
    store.record_progress(&in_progress(3, 7, 10, 2)).unwrap();

    for report in [
        in_progress(3, 7, 90, 1),
        downloaded(3, 7, "/old", 1),
        failed(3, 7, 5, "disk full", 1),
    ] {
        assert_eq!(store.record_progress(&report).unwrap(), ProgressOutcome::Stale);
    }

    let stored = store.find(3, 7).unwrap().unwrap();
    assert_eq!(stored.download_state, DownloadState::DownloadInProgress);
    assert_eq!(stored.download_percent, 10);
    assert_eq!(stored.job_id, Some(2));
}

#[test]
fn same_job_keeps_the_most_recent_report() {
    let (_dir, store) = temp_store();
    let now = Utc::now();
    store
        .record_progress(&in_progress(1, 1, 60, 4).reported_at(now))
        .unwrap();

    let earlier = in_progress(1, 1, 30, 4).reported_at(now - TimeDelta::seconds(5));
    assert_eq!(store.record_progress(&earlier).unwrap(), ProgressOutcome::Stale);

    // Re-sending the same report is accepted and changes nothing.
    let resend = in_progress(1, 1, 60, 4).reported_at(now);
    assert_eq!(store.record_progress(&resend).unwrap(), ProgressOutcome::Applied);

    let stored = store.find(1, 1).unwrap().unwrap();
    assert_eq!(stored.download_percent, 60);
}

#[test]
fn report_without_job_is_stale_against_a_job_lineage() {
    let (_dir, store) = temp_store();
    store.record_progress(&in_progress(2, 2, 50, 1)).unwrap();
    let orphan = ProgressReport::new(2, 2, DownloadState::Unknown, None);
    assert_eq!(store.record_progress(&orphan).unwrap(), ProgressOutcome::Stale);
}

#[test]
fn any_job_takes_over_an_association_without_one() {
    let (_dir, store) = temp_store();
    store.create(2, 2, DownloadState::NotDownloaded).unwrap();
    let report = in_progress(2, 2, 1, 1).reported_at(Utc::now() - TimeDelta::hours(1));
    assert_eq!(store.record_progress(&report).unwrap(), ProgressOutcome::Applied);
}

#[test]
fn record_progress_creates_missing_association() {
    let (_dir, store) = temp_store();
    assert!(store.find(4, 4).unwrap().is_none());
    store.record_progress(&in_progress(4, 4, 12, 1)).unwrap();
    assert_eq!(store.find(4, 4).unwrap().unwrap().download_percent, 12);
}

#[test]
fn at_most_one_association_per_pair() {
    let (_dir, store) = temp_store();
    store.create(9, 5, DownloadState::NotDownloaded).unwrap();
    store.create(9, 5, DownloadState::DownloadInProgress).unwrap();
    for job in 1..=5 {
        store.record_progress(&in_progress(9, 5, 20, job)).unwrap();
    }
    let mut record = TemplatePoolAssociation::new(9, 5, DownloadState::Unknown);
    record.job_id = Some(9);
    store.upsert(&record).unwrap();
    store.upsert(&record).unwrap();

    assert_eq!(store.list_by_template(5).unwrap().len(), 1);
    assert_eq!(store.list_by_pool(9).unwrap().len(), 1);
}

#[test]
fn writes_breaking_invariants_are_rejected() {
    let (_dir, store) = temp_store();

    let no_path = ProgressReport::new(9, 5, DownloadState::Downloaded, Some(1)).percent(100);
    match store.record_progress(&no_path) {
        Err(StoreError::InconsistentState { violation, .. }) => {
            assert_eq!(violation, InvariantViolation::MissingLocalPath)
        }
        other => panic!("expected rejection, got {:?}", other),
    }

    let partial = downloaded(9, 5, "/data/tmpl5", 1).percent(80);
    assert!(matches!(
        store.record_progress(&partial),
        Err(StoreError::InconsistentState { .. })
    ));

    let mut silent_error = TemplatePoolAssociation::new(9, 5, DownloadState::DownloadError);
    silent_error.download_percent = 30;
    let err = store.upsert(&silent_error).unwrap_err();
    assert!(!err.is_retryable());

    assert!(store.find(9, 5).unwrap().is_none());
}

#[test]
fn error_text_is_cleared_by_a_successful_retry() {
    let (_dir, store) = temp_store();
    store.record_progress(&failed(6, 6, 70, "checksum mismatch", 1)).unwrap();
    assert_eq!(
        store.find(6, 6).unwrap().unwrap().error_string,
        "checksum mismatch"
    );

    store.record_progress(&in_progress(6, 6, 5, 2)).unwrap();
    let stored = store.find(6, 6).unwrap().unwrap();
    assert_eq!(stored.download_state, DownloadState::DownloadInProgress);
    assert!(stored.error_string.is_empty());
}

#[test]
fn status_queries_filter_by_state_and_pool() {
    let (_dir, store) = temp_store();
    store.record_progress(&downloaded(1, 5, "/p1/t5", 1)).unwrap();
    store.record_progress(&downloaded(2, 5, "/p2/t5", 1)).unwrap();
    store.record_progress(&in_progress(3, 5, 50, 1)).unwrap();
    store.record_progress(&failed(4, 5, 10, "io", 1)).unwrap();
    store.record_progress(&downloaded(1, 6, "/p1/t6", 1)).unwrap();

    let ready = store.list_by_status(5, DownloadState::Downloaded, None).unwrap();
    assert_eq!(pool_ids(&ready), vec![1, 2]);

    let ready_on_two = store
        .list_by_status(5, DownloadState::Downloaded, Some(2))
        .unwrap();
    assert_eq!(pool_ids(&ready_on_two), vec![2]);

    assert!(store
        .list_by_status(5, DownloadState::Abandoned, None)
        .unwrap()
        .is_empty());

    let active = store
        .list_by_states_any(
            5,
            &[DownloadState::DownloadInProgress, DownloadState::DownloadError],
        )
        .unwrap();
    assert_eq!(pool_ids(&active), vec![3, 4]);
    assert!(store.list_by_states_any(5, &[]).unwrap().is_empty());

    assert_eq!(store.list_by_pool(1).unwrap().len(), 2);
    assert_eq!(store.list_by_template(5).unwrap().len(), 4);
    assert!(store.list_by_template(99).unwrap().is_empty());
}

#[test]
fn topology_scoped_query_has_no_duplicate_rows() {
    let (_dir, store) = temp_store();
    seed_topology(
        store.db_path(),
        &[(1, 2, 1), (2, 2, 1), (3, 3, 1), (4, 2, 8)],
        &[(9, 1), (9, 2), (10, 3), (11, 4)],
    );
    for pool in [9, 10, 11] {
        store
            .record_progress(&downloaded(pool, 5, &format!("/p{}/t5", pool), 1))
            .unwrap();
    }
    store.record_progress(&in_progress(9, 6, 40, 1)).unwrap();

    let pod = store
        .list_by_status_in_topology(5, DownloadState::Downloaded, 1, Some(2))
        .unwrap();
    assert_eq!(pool_ids(&pod), vec![9]);

    let datacenter = store
        .list_by_status_in_topology(5, DownloadState::Downloaded, 1, None)
        .unwrap();
    assert_eq!(pool_ids(&datacenter), vec![9, 10]);

    assert!(store
        .list_by_status_in_topology(5, DownloadState::Downloaded, 7, None)
        .unwrap()
        .is_empty());
}

#[test]
fn unreadable_topology_means_unreachable() {
    let (dir, store) = temp_store();
    store.record_progress(&downloaded(9, 5, "/data/tmpl5", 1)).unwrap();

    assert!(store
        .list_by_status_in_topology(5, DownloadState::Downloaded, 1, Some(2))
        .unwrap()
        .is_empty());
    assert!(!store.is_available(5, 1).unwrap());
    assert!(store.find_by_host_template(1, 5).unwrap().is_none());

    // Same answer when the inventory lives in another database that is missing its tables.
    let elsewhere = AssociationStore::with_topology(
        store.db_path(),
        Topology::new(dir.path().join("inventory.sqlite")),
    )
    .unwrap();
    assert!(!elsewhere.is_available(5, 1).unwrap());
}

#[test]
fn availability_requires_a_downloaded_copy_on_a_reachable_pool() {
    let (_dir, store) = temp_store();
    seed_topology(
        store.db_path(),
        &[(1, 2, 1), (2, 2, 1)],
        &[(9, 1), (10, 2)],
    );
    store.record_progress(&in_progress(9, 5, 99, 1)).unwrap();
    store.record_progress(&downloaded(10, 5, "/p10/t5", 1)).unwrap();

    assert!(!store.is_available(5, 1).unwrap());
    assert!(store.is_available(5, 2).unwrap());
    assert!(!store.is_available(6, 2).unwrap());
    assert!(!store.is_available(5, 42).unwrap());

    // Pools move between hosts; availability follows the inventory.
    move_pool(store.db_path(), 10, 1);
    assert!(store.is_available(5, 1).unwrap());
    assert!(!store.is_available(5, 2).unwrap());
}

#[test]
fn host_lookup_returns_the_first_match() {
    let (_dir, store) = temp_store();
    seed_topology(store.db_path(), &[(1, 2, 1)], &[(9, 1), (10, 1), (11, 1)]);
    store.create(10, 5, DownloadState::NotDownloaded).unwrap();
    store.create(9, 5, DownloadState::NotDownloaded).unwrap();
    store.create(11, 6, DownloadState::NotDownloaded).unwrap();

    let all = store.list_by_host_template(1, 5).unwrap();
    assert_eq!(pool_ids(&all), vec![10, 9]);
    let first = store.find_by_host_template(1, 5).unwrap().unwrap();
    assert_eq!(first.pool_id, 10);
    assert!(store.find_by_host_template(1, 7).unwrap().is_none());
}

#[test]
fn create_is_idempotent_and_only_accepts_initial_states() {
    let (_dir, store) = temp_store();
    let created = store.create(9, 5, DownloadState::DownloadInProgress).unwrap();
    assert_eq!(created.download_state, DownloadState::DownloadInProgress);
    assert_eq!(created.download_percent, 0);

    store.record_progress(&in_progress(9, 5, 70, 1)).unwrap();
    let again = store.create(9, 5, DownloadState::NotDownloaded).unwrap();
    assert_eq!(again.id, created.id);
    assert_eq!(again.download_percent, 70);

    assert!(matches!(
        store.create(9, 6, DownloadState::Downloaded),
        Err(StoreError::InvalidInitialState(DownloadState::Downloaded))
    ));
}

#[test]
fn upsert_replaces_the_record_for_the_pair() {
    let (_dir, store) = temp_store();
    let first = store.create(9, 5, DownloadState::NotDownloaded).unwrap();

    let mut record = TemplatePoolAssociation::new(9, 5, DownloadState::Downloaded);
    record.download_percent = 100;
    record.local_path = "/seeded/t5".to_string();
    record.error_string = "left over".to_string();
    let stored = store.upsert(&record).unwrap();

    assert_eq!(stored.id, first.id);
    assert_eq!(stored.download_state, DownloadState::Downloaded);
    assert_eq!(stored.local_path, "/seeded/t5");
    assert!(stored.error_string.is_empty());
}

#[test]
fn removed_pairs_start_fresh() {
    let (_dir, store) = temp_store();
    let first = store.create(9, 5, DownloadState::NotDownloaded).unwrap();
    store.record_progress(&in_progress(9, 5, 80, 3)).unwrap();

    assert!(store.remove(9, 5).unwrap());
    assert!(!store.remove(9, 5).unwrap());
    assert!(store.find(9, 5).unwrap().is_none());

    let second = store.create(9, 5, DownloadState::NotDownloaded).unwrap();
    assert_ne!(second.id, first.id);
    assert_eq!(second.job_id, None);
    // Lineage starts over, so job 1 is no longer considered stale.
    assert_eq!(
        store.record_progress(&in_progress(9, 5, 10, 1)).unwrap(),
        ProgressOutcome::Applied
    );
}

#[test]
fn pool_and_template_removal() {
    let (_dir, store) = temp_store();
    for (pool, template) in [(1, 5), (1, 6), (2, 5), (3, 7)] {
        store.create(pool, template, DownloadState::NotDownloaded).unwrap();
    }
    assert_eq!(store.remove_by_pool(1).unwrap(), 2);
    assert_eq!(store.remove_by_template(5).unwrap(), 1);
    assert_eq!(store.remove_by_pool(1).unwrap(), 0);
    assert_eq!(pool_ids(&store.list_by_template(7).unwrap()), vec![3]);
}

#[test]
fn abandon_follows_job_lineage() {
    let (_dir, store) = temp_store();
    store.record_progress(&in_progress(9, 5, 30, 2)).unwrap();

    assert_eq!(store.abandon(9, 5, Some(1)).unwrap(), ProgressOutcome::Stale);
    assert_eq!(store.abandon(9, 5, Some(2)).unwrap(), ProgressOutcome::Applied);

    let stored = store.find(9, 5).unwrap().unwrap();
    assert_eq!(stored.download_state, DownloadState::Abandoned);
    assert_eq!(stored.job_id, Some(2));
}

#[test]
fn store_reopens_existing_database() {
    let (_dir, store) = temp_store();
    store.record_progress(&downloaded(9, 5, "/data/tmpl5", 1)).unwrap();
    let reopened = AssociationStore::open(store.db_path()).unwrap();
    assert!(reopened.find(9, 5).unwrap().unwrap().is_ready());
}
