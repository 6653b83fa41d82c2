//! HTTP sources and release metadata against a mock server

mod common;

use common::{test_context, test_store, FakeFtpConnector, TEST_BUCKET};
use gwas_ingest::release::{fetch_release_info, ReleaseInfoError};
use gwas_ingest::storage::ObjectStore;
use gwas_ingest::transfer::{HttpToStorage, TransferError, TransferJob, TransferManager, Transferable};
use serde_json::json;
use std::io::Write;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

// ============================================================================
// HTTP transfers
// ============================================================================

#[tokio::test]
async fn test_http_transfer() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/files/ancestries.tsv"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"studyId\tancestry\n".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let store = test_store().await;
    let ctx = test_context(store.clone(), FakeFtpConnector::new());
    let job = HttpToStorage::new(
        &format!("{}/files/ancestries.tsv", server.uri()),
        "gs://gwas_catalog_inputs/ancestries.tsv",
    )
    .unwrap();

    let upload = job.transfer(&ctx).await.unwrap();

    assert_eq!(upload.size, 17);
    let stored = store.get(TEST_BUCKET, "ancestries.tsv").await.unwrap();
    assert_eq!(&stored[..], b"studyId\tancestry\n");
}

#[tokio::test]
async fn test_server_errors_are_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/studies.tsv"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .with_priority(1)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/studies.tsv"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(1)
        .mount(&server)
        .await;

    let store = test_store().await;
    let ctx = test_context(store.clone(), FakeFtpConnector::new());
    let job = HttpToStorage::new(
        &format!("{}/studies.tsv", server.uri()),
        "gs://gwas_catalog_inputs/studies.tsv",
    )
    .unwrap();

    job.transfer(&ctx).await.unwrap();
    assert_eq!(store.object_count(TEST_BUCKET).await, 1);
}

#[tokio::test]
async fn test_not_found_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let store = test_store().await;
    let ctx = test_context(store, FakeFtpConnector::new());
    let job = HttpToStorage::new(
        &format!("{}/missing.tsv", server.uri()),
        "gs://gwas_catalog_inputs/missing.tsv",
    )
    .unwrap();

    let err = job.transfer(&ctx).await.unwrap_err();
    assert!(matches!(err, TransferError::HttpStatus { status: 404, .. }));
}

#[tokio::test]
async fn test_http_zip_is_unpacked() {
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    writer
        .start_file("associations.tsv", zip::write::SimpleFileOptions::default())
        .unwrap();
    writer.write_all(b"snp\tp\n").unwrap();
    let archive = writer.finish().unwrap().into_inner();

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/associations.zip"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(archive))
        .mount(&server)
        .await;

    let store = test_store().await;
    let ctx = test_context(store.clone(), FakeFtpConnector::new());
    let job = HttpToStorage::new(
        &format!("{}/associations.zip", server.uri()),
        "gs://gwas_catalog_inputs/associations.tsv",
    )
    .unwrap();

    job.transfer(&ctx).await.unwrap();
    let stored = store.get(TEST_BUCKET, "associations.tsv").await.unwrap();
    assert_eq!(&stored[..], b"snp\tp\n");
}

#[tokio::test]
async fn test_http_batch() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("data"))
        .expect(3)
        .mount(&server)
        .await;

    let store = test_store().await;
    let manager = TransferManager::new(test_context(store.clone(), FakeFtpConnector::new()), 10);
    let jobs: Vec<TransferJob> = ["a", "b", "c"]
        .iter()
        .map(|name| {
            TransferJob::remote(
                &format!("{}/{}.tsv", server.uri(), name),
                &format!("gs://gwas_catalog_inputs/{}.tsv", name),
            )
            .unwrap()
        })
        .collect();

    let report = manager.transfer(jobs).await.unwrap();
    assert_eq!(report.succeeded.len(), 3);
    assert_eq!(store.object_count(TEST_BUCKET).await, 3);
}

// ============================================================================
// Release metadata
// ============================================================================

#[tokio::test]
async fn test_fetch_release_info() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gwas/api/search/stats"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "date": "2025-01-31",
            "studies": 7000,
            "efoversion": "v3.73.0",
            "ensemblbuild": "113",
        })))
        .mount(&server)
        .await;

    let url = format!("{}/gwas/api/search/stats", server.uri());
    let info = fetch_release_info(&reqwest::Client::new(), &url).await.unwrap();

    assert_eq!(info.efo_version().as_deref(), Some("v3.73.0"));
    assert_eq!(info.ensembl_build().as_deref(), Some("113"));
    assert_eq!(info.get("studies"), Some(&json!(7000)));
}

#[tokio::test]
async fn test_release_info_error_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let url = format!("{}/stats", server.uri());
    let err = fetch_release_info(&reqwest::Client::new(), &url).await.unwrap_err();
    assert!(matches!(err, ReleaseInfoError::Status { status: 500, .. }));
}
