use std::ops::Deref;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::Bytes;
use hubsync::error::ErrorKind;
use hubsync::repository::hub::HubRepository;
use hubsync::repository::{CommitOptions, Repository};
use hubsync_config::shared::HubConfig;
use hubsync_telemetry::tracing::init_test_tracing;
use secrecy::SecretString;
use serde_json::{Value, json};
use sha2::{Digest, Sha256};
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

const TOKEN: &str = "hf_test_token";
const TREE_ENDPOINT: &str = "/api/datasets/org/observations/tree/main";
const REVISION_ENDPOINT: &str = "/api/datasets/org/observations/revision/main";
const PREUPLOAD_ENDPOINT: &str = "/api/datasets/org/observations/preupload/main";
const COMMIT_ENDPOINT: &str = "/api/datasets/org/observations/commit/main";
const LFS_BATCH_ENDPOINT: &str = "/datasets/org/observations.git/info/lfs/objects/batch";
const SNAPSHOT: &str = "data/train-00000-of-00001.parquet";

/// Mock of the hub HTTP API for the `org/observations` dataset.
struct HubMock {
    server: MockServer,
}

impl HubMock {
    async fn start() -> Self {
        init_test_tracing();
        Self {
            server: MockServer::start().await,
        }
    }

    fn repository(&self) -> HubRepository {
        let config = HubConfig {
            endpoint: self.server.uri(),
            revision: "main".to_string(),
            token: Some(SecretString::new(TOKEN.to_string())),
            timeout_secs: 5,
        };

        HubRepository::new(&config, "org/observations").unwrap()
    }

    async fn mock_preupload(&self, mode: &str) {
        Mock::given(method("POST"))
            .and(path(PREUPLOAD_ENDPOINT))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "files": [{ "path": SNAPSHOT, "uploadMode": mode, "shouldIgnore": false }],
            })))
            .named("preupload")
            .expect(1)
            .mount(self)
            .await;
    }

    async fn mock_commit(&self, status: u16) {
        Mock::given(method("POST"))
            .and(path(COMMIT_ENDPOINT))
            .and(header("content-type", "application/x-ndjson"))
            .respond_with(ResponseTemplate::new(status).set_body_json(json!({
                "commitOid": "0123456789abcdef0123456789abcdef01234567",
                "commitUrl": "https://hub.test/commit",
            })))
            .named("commit")
            .expect(1)
            .mount(self)
            .await;
    }

    /// Returns the NDJSON lines of the commit request.
    async fn commit_lines(&self) -> Vec<Value> {
        let requests = self.received_requests().await.unwrap();
        let commit = requests
            .iter()
            .find(|request| request.url.path() == COMMIT_ENDPOINT)
            .unwrap();

        body_lines(commit)
    }
}

impl Deref for HubMock {
    type Target = MockServer;

    fn deref(&self) -> &Self::Target {
        &self.server
    }
}

fn body_lines(request: &Request) -> Vec<Value> {
    String::from_utf8(request.body.clone())
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

#[tokio::test]
async fn list_files_follows_pagination() {
    let hub = HubMock::start().await;
    let next = format!("{}{TREE_ENDPOINT}?recursive=true&cursor=page2", hub.uri());

    Mock::given(method("GET"))
        .and(path(TREE_ENDPOINT))
        .and(query_param("recursive", "true"))
        .and(header("authorization", format!("Bearer {TOKEN}").as_str()))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("link", format!("<{next}>; rel=\"next\"").as_str())
                .set_body_json(json!([
                    { "type": "directory", "path": "data", "oid": "d1", "size": 0 },
                    { "type": "file", "path": "data/a.json", "oid": "f1", "size": 20 },
                ])),
        )
        .expect(1)
        .mount(&hub)
        .await;
    Mock::given(method("GET"))
        .and(path(TREE_ENDPOINT))
        .and(query_param("cursor", "page2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "type": "file", "path": "data/b.json", "oid": "f2", "size": 20 },
        ])))
        .with_priority(1)
        .expect(1)
        .mount(&hub)
        .await;

    let files = hub.repository().list_files().await.unwrap();

    assert_eq!(files, ["data/a.json", "data/b.json"]);
}

#[tokio::test]
async fn download_returns_file_content() {
    let hub = HubMock::start().await;
    Mock::given(method("GET"))
        .and(path("/datasets/org/observations/resolve/main/data/a.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"image_md5":"h1"}"#))
        .expect(1)
        .mount(&hub)
        .await;

    let content = hub.repository().download("data/a.json").await.unwrap();

    assert_eq!(content, Bytes::from_static(br#"{"image_md5":"h1"}"#));
}

#[tokio::test]
async fn missing_file_is_not_found() {
    let hub = HubMock::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/datasets/org/observations/resolve/main/{SNAPSHOT}")))
        .respond_with(ResponseTemplate::new(404).set_body_string("Entry not found"))
        .mount(&hub)
        .await;

    let err = hub.repository().download(SNAPSHOT).await.unwrap_err();

    assert!(err.is_not_found());
    assert!(err.detail().unwrap().contains("Entry not found"));
}

#[tokio::test]
async fn file_exists_maps_head_status() {
    let hub = HubMock::start().await;
    Mock::given(method("HEAD"))
        .and(path(format!("/datasets/org/observations/resolve/main/{SNAPSHOT}")))
        .respond_with(ResponseTemplate::new(200))
        .mount(&hub)
        .await;
    Mock::given(method("HEAD"))
        .and(path("/datasets/org/observations/resolve/main/data/missing.json"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&hub)
        .await;
    let repository = hub.repository();

    assert!(repository.file_exists(SNAPSHOT).await.unwrap());
    assert!(!repository.file_exists("data/missing.json").await.unwrap());
}

#[tokio::test]
async fn head_commit_reads_revision_sha() {
    let hub = HubMock::start().await;
    Mock::given(method("GET"))
        .and(path(REVISION_ENDPOINT))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "org/observations",
            "sha": "5f0c2e6bd1a0b8f4b9d2c4e1f3a5b7c9d0e1f2a3",
        })))
        .mount(&hub)
        .await;

    let head = hub.repository().head_commit().await.unwrap();

    assert_eq!(
        head.as_deref(),
        Some("5f0c2e6bd1a0b8f4b9d2c4e1f3a5b7c9d0e1f2a3")
    );
}

#[tokio::test]
async fn regular_upload_is_committed_inline() {
    let hub = HubMock::start().await;
    hub.mock_preupload("regular").await;
    hub.mock_commit(200).await;

    let commit = CommitOptions::new("Add 1 observation(s) to train")
        .with_parent_commit(Some("abc123".to_string()));
    hub.repository()
        .upload_file(SNAPSHOT, Bytes::from_static(b"PAR1 tiny"), &commit)
        .await
        .unwrap();

    let lines = hub.commit_lines().await;
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["key"], "header");
    assert_eq!(lines[0]["value"]["summary"], "Add 1 observation(s) to train");
    assert_eq!(lines[0]["value"]["parentCommit"], "abc123");
    assert_eq!(lines[1]["key"], "file");
    assert_eq!(lines[1]["value"]["path"], SNAPSHOT);
    assert_eq!(lines[1]["value"]["encoding"], "base64");
    assert_eq!(lines[1]["value"]["content"], BASE64.encode(b"PAR1 tiny"));
}

#[tokio::test]
async fn lfs_upload_goes_through_batch_api() {
    let hub = HubMock::start().await;
    let content = Bytes::from_static(b"PAR1 pretend this is large");
    let oid = format!("{:x}", Sha256::digest(&content));

    hub.mock_preupload("lfs").await;
    Mock::given(method("POST"))
        .and(path(LFS_BATCH_ENDPOINT))
        .and(header("accept", "application/vnd.git-lfs+json"))
        .and(body_string_contains(oid.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "transfer": "basic",
            "objects": [{
                "oid": oid,
                "size": content.len(),
                "actions": {
                    "upload": {
                        "href": format!("{}/lfs/upload/{oid}", hub.uri()),
                        "header": { "x-amz-meta-test": "1" },
                    },
                    "verify": { "href": format!("{}/lfs/verify", hub.uri()) },
                },
            }],
        })))
        .expect(1)
        .mount(&hub)
        .await;
    Mock::given(method("PUT"))
        .and(path(format!("/lfs/upload/{oid}")))
        .and(header("x-amz-meta-test", "1"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&hub)
        .await;
    Mock::given(method("POST"))
        .and(path("/lfs/verify"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&hub)
        .await;
    hub.mock_commit(200).await;

    hub.repository()
        .upload_file(SNAPSHOT, content.clone(), &CommitOptions::new("Rebuild train"))
        .await
        .unwrap();

    let lines = hub.commit_lines().await;
    assert!(lines[0]["value"].get("parentCommit").is_none());
    assert_eq!(lines[1]["key"], "lfsFile");
    assert_eq!(lines[1]["value"]["oid"], oid.as_str());
    assert_eq!(lines[1]["value"]["size"], content.len());
    assert_eq!(lines[1]["value"]["algo"], "sha256");
}

#[tokio::test]
async fn multipart_lfs_upload_is_unsupported() {
    let hub = HubMock::start().await;
    hub.mock_preupload("lfs").await;
    Mock::given(method("POST"))
        .and(path(LFS_BATCH_ENDPOINT))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "transfer": "basic",
            "objects": [{
                "oid": "ignored",
                "size": 4,
                "actions": {
                    "upload": {
                        "href": format!("{}/lfs/multipart", hub.uri()),
                        "header": { "chunk_size": "5242880", "00001": "https://part-1" },
                    },
                },
            }],
        })))
        .mount(&hub)
        .await;

    let err = hub
        .repository()
        .upload_file(SNAPSHOT, Bytes::from_static(b"PAR1"), &CommitOptions::new("Push"))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::UnsupportedUpload);
}

#[tokio::test]
async fn delete_commits_a_deleted_file_operation() {
    let hub = HubMock::start().await;
    hub.mock_commit(200).await;

    hub.repository()
        .delete_file(SNAPSHOT, &CommitOptions::new("Delete train snapshot before rebuild"))
        .await
        .unwrap();

    let lines = hub.commit_lines().await;
    assert_eq!(
        lines[1],
        json!({ "key": "deletedFile", "value": { "path": SNAPSHOT } })
    );
}

#[tokio::test]
async fn commit_status_codes_map_to_error_kinds() {
    for (status, kind) in [
        (401, ErrorKind::AuthenticationError),
        (403, ErrorKind::PermissionDenied),
        (409, ErrorKind::CommitConflict),
        (412, ErrorKind::CommitConflict),
        (500, ErrorKind::RemoteError),
    ] {
        let hub = HubMock::start().await;
        hub.mock_commit(status).await;

        let err = hub
            .repository()
            .delete_file(SNAPSHOT, &CommitOptions::new("Delete snapshot"))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), kind, "status {status}");
    }
}
