//! Cross-component pipeline tests
//!
//! Drives the whole pipeline against wiremock catalog/bundle/metadata
//! endpoints and the in-memory store.

use hepsync_common::ids::InspireId;
use hepsync_core::fetch::FetchError;
use hepsync_core::finalize::{Finalizer, StoreFinalizer};
use hepsync_core::store::{CreateOutcome, MemoryStore, SubmissionStore};
use hepsync_core::submission::models::{PublicationRecord, SubmissionStatus};
use hepsync_core::{DispatchMode, SyncConfig, SyncError, SyncService};
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const GOOD_BUNDLE: &str = "\
---
comment: Measurement of something interesting
---
name: Table 1
data:
  independent_variables:
  - header: {name: X}
    values: [{value: 1}]
  dependent_variables:
  - header: {name: Y}
    qualifiers: []
    values: [{value: 2}]
---
name: Table 2
data:
  independent_variables: []
  dependent_variables: []
";

// Table 2's payload is not a mapping and Table 3 references a table file
// that does not exist; both must be reported.
const BAD_BUNDLE: &str = "\
---
comment: Broken measurement
---
name: Table 1
data:
  independent_variables: []
  dependent_variables: []
---
name: Table 2
data: 5
---
name: Table 3
";

struct Harness {
    server: MockServer,
    store: Arc<MemoryStore>,
    service: SyncService,
    _data_dir: TempDir,
    _tmp_dir: TempDir,
}

async fn harness(mode: DispatchMode) -> Harness {
    let server = MockServer::start().await;
    let data_dir = tempfile::tempdir().unwrap();
    let tmp_dir = tempfile::tempdir().unwrap();

    let config = SyncConfig {
        catalog_url: format!("{}/allids", server.uri()),
        bundle_url_template: format!("{}/view/{{id}}/yaml", server.uri()),
        inspire_url: format!("{}/api/literature", server.uri()),
        id_prefix: "ins".to_string(),
        data_dir: data_dir.path().to_path_buf(),
        tmp_dir: tmp_dir.path().to_path_buf(),
        http_timeout_secs: 5,
        concurrency: 4,
    };

    let store = Arc::new(MemoryStore::new());
    let store_dyn: Arc<dyn SubmissionStore> = store.clone();
    let finalizer: Arc<dyn Finalizer> = Arc::new(StoreFinalizer::new(store_dyn.clone()));
    let service = SyncService::new(config, store_dyn, finalizer, mode).unwrap();

    Harness {
        server,
        store,
        service,
        _data_dir: data_dir,
        _tmp_dir: tmp_dir,
    }
}

async fn mount_bundle(server: &MockServer, id: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/view/{id}/yaml")))
        .respond_with(ResponseTemplate::new(200).set_body_string(body.to_string()))
        .mount(server)
        .await;
}

async fn mount_inspire(server: &MockServer, numeric: &str, title: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/api/literature/{numeric}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "title": title,
            "authors": ["A. Author"],
            "abstract": "We measure things.",
            "doi": "10.1000/demo",
            "arxiv_id": "1601.00001",
            "collaboration": "DEMO"
        })))
        .mount(server)
        .await;
}

fn publication(id: &str) -> PublicationRecord {
    PublicationRecord {
        inspire_id: InspireId::new(id),
        title: "Seeded".to_string(),
        authors: vec![],
        abstract_text: None,
        doi: None,
        arxiv_id: None,
        collaboration: None,
    }
}

#[tokio::test]
async fn test_first_pass_creates_and_finalises() {
    let h = harness(DispatchMode::Sync).await;
    mount_bundle(&h.server, "ins1001", GOOD_BUNDLE).await;
    mount_inspire(&h.server, "1001", "First pass").await;

    let summary = h
        .service
        .load_records(vec![InspireId::new("ins1001")])
        .await;
    assert!(summary.is_clean());

    let recid = h
        .store
        .find(&InspireId::new("ins1001"))
        .await
        .unwrap()
        .expect("record must exist");
    let submission = h.store.load(recid).await.unwrap().unwrap();
    assert_eq!(submission.status, SubmissionStatus::Finished);
    assert_eq!(submission.version, 1);
    assert_eq!(submission.tables.len(), 2);
    assert_eq!(submission.publication.title, "First pass");
}

#[tokio::test]
async fn test_second_pass_is_idempotent() {
    let h = harness(DispatchMode::Sync).await;
    mount_bundle(&h.server, "ins1001", GOOD_BUNDLE).await;
    mount_inspire(&h.server, "1001", "Idempotent").await;

    let ids = vec![InspireId::new("ins1001")];
    assert!(h.service.load_records(ids.clone()).await.is_clean());
    let recid = h
        .store
        .find(&InspireId::new("ins1001"))
        .await
        .unwrap()
        .unwrap();

    let summary = h.service.load_records(ids).await;
    assert!(summary.is_clean());

    // Same single record, refreshed in place: no duplicate aggregate, no
    // extra table artifacts, one more version.
    assert_eq!(h.store.len().await, 1);
    let submission = h.store.load(recid).await.unwrap().unwrap();
    assert_eq!(submission.recid, recid);
    assert_eq!(submission.version, 2);
    assert_eq!(submission.tables.len(), 2);
}

#[tokio::test]
async fn test_invalid_bundle_commits_nothing_and_names_every_file() {
    let h = harness(DispatchMode::Sync).await;
    mount_bundle(&h.server, "ins2001", BAD_BUNDLE).await;
    mount_inspire(&h.server, "2001", "Broken").await;

    let summary = h
        .service
        .load_records(vec![InspireId::new("ins2001")])
        .await;
    assert_eq!(summary.failed(), 1);

    match &summary.units[0].result {
        Err(SyncError::Submission { report, .. }) => {
            let files: Vec<_> = report.files().collect();
            assert_eq!(files, vec!["data2.yaml", "data3.yaml"]);
        },
        other => panic!("expected submission failure, got {other:?}"),
    }

    // Rolled back entirely: the store never saw the record.
    assert!(h
        .store
        .find(&InspireId::new("ins2001"))
        .await
        .unwrap()
        .is_none());
    assert!(h.store.is_empty().await);
}

#[tokio::test]
async fn test_failed_update_leaves_previous_version_untouched() {
    let h = harness(DispatchMode::Sync).await;
    Mock::given(method("GET"))
        .and(path("/view/ins2002/yaml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(GOOD_BUNDLE))
        .up_to_n_times(1)
        .mount(&h.server)
        .await;
    mount_inspire(&h.server, "2002", "Original title").await;

    let ids = vec![InspireId::new("ins2002")];
    assert!(h.service.load_records(ids.clone()).await.is_clean());
    let recid = h
        .store
        .find(&InspireId::new("ins2002"))
        .await
        .unwrap()
        .unwrap();

    // The good bundle mock is exhausted; the next fetch sees a broken one.
    mount_bundle(&h.server, "ins2002", BAD_BUNDLE).await;
    let summary = h.service.load_records(ids).await;
    assert_eq!(summary.failed(), 1);

    let submission = h.store.load(recid).await.unwrap().unwrap();
    assert_eq!(submission.version, 1);
    assert_eq!(submission.tables.len(), 2);
    assert_eq!(submission.publication.title, "Original title");
    assert_eq!(submission.status, SubmissionStatus::Finished);
}

#[tokio::test]
async fn test_metadata_only_update_touches_publication_and_version_only() {
    let h = harness(DispatchMode::Sync).await;
    mount_bundle(&h.server, "ins3001", GOOD_BUNDLE).await;
    Mock::given(method("GET"))
        .and(path("/api/literature/3001"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "title": "Old title"
        })))
        .up_to_n_times(1)
        .mount(&h.server)
        .await;

    let ids = vec![InspireId::new("ins3001")];
    assert!(h.service.load_records(ids.clone()).await.is_clean());
    let recid = h
        .store
        .find(&InspireId::new("ins3001"))
        .await
        .unwrap()
        .unwrap();
    let before = h.store.load(recid).await.unwrap().unwrap();

    mount_inspire(&h.server, "3001", "New title").await;
    let summary = h.service.update_records(ids, true).await;
    assert!(summary.is_clean());

    let after = h.store.load(recid).await.unwrap().unwrap();
    assert_eq!(after.publication.title, "New title");
    assert_eq!(after.version, before.version + 1);
    assert_eq!(after.tables, before.tables);
}

#[tokio::test]
async fn test_metadata_only_update_of_unknown_record_fails() {
    let h = harness(DispatchMode::Sync).await;
    let summary = h
        .service
        .update_records(vec![InspireId::new("ins404")], true)
        .await;
    assert_eq!(summary.failed(), 1);
    assert!(matches!(
        summary.units[0].result,
        Err(SyncError::UnknownRecord(_))
    ));
}

#[tokio::test]
async fn test_listing_applies_prefix_and_drops_zero_ids() {
    let h = harness(DispatchMode::Sync).await;
    Mock::given(method("GET"))
        .and(path("/allids"))
        .respond_with(ResponseTemplate::new(200).set_body_string("[1001,0,0][0,5,5][1002,9,9]"))
        .mount(&h.server)
        .await;

    let ids = h.service.list_since(None).await.unwrap();
    assert_eq!(ids, vec![InspireId::new("ins1001"), InspireId::new("ins1002")]);
}

#[tokio::test]
async fn test_fan_out_isolates_the_failing_unit() {
    let h = harness(DispatchMode::Async).await;

    let ids: Vec<InspireId> = (0..10)
        .map(|i| InspireId::new(format!("ins40{i:02}")))
        .collect();
    for (i, id) in ids.iter().enumerate() {
        if i == 5 {
            // This identifier's fetch always fails.
            Mock::given(method("GET"))
                .and(path(format!("/view/{id}/yaml")))
                .respond_with(ResponseTemplate::new(404))
                .mount(&h.server)
                .await;
        } else {
            mount_bundle(&h.server, id.as_str(), GOOD_BUNDLE).await;
        }
        mount_inspire(&h.server, id.numeric(), "Fan out").await;
    }

    let summary = h.service.load_records(ids.clone()).await;
    assert_eq!(summary.succeeded(), 9);
    assert_eq!(summary.failed(), 1);

    // Outcomes come back in submission order, untouched by the failure.
    let reported: Vec<_> = summary.units.iter().map(|u| u.inspire_id.clone()).collect();
    assert_eq!(reported, ids);

    for (i, unit) in summary.units.iter().enumerate() {
        if i == 5 {
            assert!(matches!(
                unit.result,
                Err(SyncError::Fetch(FetchError::NotFound(_)))
            ));
            assert!(h.store.find(&unit.inspire_id).await.unwrap().is_none());
        } else {
            let recid = h.store.find(&unit.inspire_id).await.unwrap().unwrap();
            let submission = h.store.load(recid).await.unwrap().unwrap();
            assert_eq!(submission.status, SubmissionStatus::Finished);
        }
    }
}

#[tokio::test]
async fn test_simultaneous_creates_commit_exactly_one_record() {
    let store = Arc::new(MemoryStore::new());
    let id = InspireId::new("ins5001");

    let mut handles = Vec::new();
    for _ in 0..25 {
        let store = store.clone();
        let id = id.clone();
        handles.push(tokio::spawn(async move {
            store.create_if_absent(&id, &publication("ins5001")).await
        }));
    }

    let mut created = 0;
    for handle in handles {
        match handle.await.unwrap().unwrap() {
            CreateOutcome::Created(_) => created += 1,
            CreateOutcome::Exists(_) => {},
        }
    }

    assert_eq!(created, 1);
    assert_eq!(store.len().await, 1);
}

#[tokio::test]
async fn test_missing_ids_reports_only_absent_records() {
    let h = harness(DispatchMode::Sync).await;
    Mock::given(method("GET"))
        .and(path("/allids"))
        .respond_with(ResponseTemplate::new(200).set_body_string("[1001,0,0][1002,9,9]"))
        .mount(&h.server)
        .await;

    h.store
        .create_if_absent(&InspireId::new("ins1001"), &publication("ins1001"))
        .await
        .unwrap();

    let missing = h.service.missing_ids().await.unwrap();
    assert_eq!(missing, vec![InspireId::new("ins1002")]);
}

#[tokio::test]
async fn test_unload_removes_the_record_once() {
    let h = harness(DispatchMode::Sync).await;
    let id = InspireId::new("ins6001");
    h.store
        .create_if_absent(&id, &publication("ins6001"))
        .await
        .unwrap();

    assert!(h.service.unload(&id).await.unwrap());
    assert!(!h.service.unload(&id).await.unwrap());
    assert!(h.store.is_empty().await);
}
