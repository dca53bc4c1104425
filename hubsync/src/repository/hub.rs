use std::collections::HashMap;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::Bytes;
use hubsync_config::shared::HubConfig;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, LINK};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{Value, json};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::error::{ErrorKind, SyncResult};
use crate::repository::{CommitOptions, Repository};
use crate::{bail, sync_error};

/// Media type of Git LFS batch requests and responses.
const LFS_MEDIA_TYPE: &str = "application/vnd.git-lfs+json";

/// Media type of commit request bodies, one operation per line.
const NDJSON_MEDIA_TYPE: &str = "application/x-ndjson";

/// Number of leading bytes sent to the preupload endpoint.
const PREUPLOAD_SAMPLE_SIZE: usize = 512;

const USER_AGENT: &str = concat!("hubsync/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
struct TreeEntry {
    #[serde(rename = "type")]
    kind: String,
    path: String,
}

#[derive(Debug, Deserialize)]
struct RevisionInfo {
    sha: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PreuploadFile {
    path: String,
    upload_mode: UploadMode,
}

#[derive(Debug, Deserialize)]
struct PreuploadResponse {
    files: Vec<PreuploadFile>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum UploadMode {
    Regular,
    Lfs,
}

#[derive(Debug, Deserialize)]
struct LfsAction {
    href: String,
    #[serde(default)]
    header: HashMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
struct LfsActions {
    upload: Option<LfsAction>,
    verify: Option<LfsAction>,
}

#[derive(Debug, Deserialize)]
struct LfsObjectError {
    code: u16,
    message: String,
}

#[derive(Debug, Deserialize)]
struct LfsObject {
    #[serde(default)]
    actions: Option<LfsActions>,
    #[serde(default)]
    error: Option<LfsObjectError>,
}

#[derive(Debug, Deserialize)]
struct LfsBatchResponse {
    #[serde(default)]
    transfer: Option<String>,
    objects: Vec<LfsObject>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommitResponse {
    #[serde(default)]
    commit_oid: Option<String>,
}

/// Change applied by a single commit.
enum Operation<'a> {
    Regular { path: &'a str, content: &'a [u8] },
    Lfs { path: &'a str, oid: &'a str, size: usize },
    Delete { path: &'a str },
}

impl Operation<'_> {
    fn to_line(&self) -> Value {
        match self {
            Operation::Regular { path, content } => json!({
                "key": "file",
                "value": {
                    "path": path,
                    "content": BASE64.encode(content),
                    "encoding": "base64",
                },
            }),
            Operation::Lfs { path, oid, size } => json!({
                "key": "lfsFile",
                "value": {
                    "path": path,
                    "algo": "sha256",
                    "oid": oid,
                    "size": size,
                },
            }),
            Operation::Delete { path } => json!({
                "key": "deletedFile",
                "value": { "path": path },
            }),
        }
    }
}

/// Dataset repository hosted on a Hugging Face compatible hub.
///
/// Listing, downloading and committing go through the hub HTTP API. Files the hub asks to
/// store in LFS are uploaded with the basic Git LFS transfer before being committed.
#[derive(Debug, Clone)]
pub struct HubRepository {
    client: Client,
    endpoint: Url,
    repo_id: String,
    revision: String,
    token: Option<SecretString>,
}

impl HubRepository {
    /// Creates a repository client for `repo_id` from the hub settings.
    ///
    /// The token is taken from the settings or, when absent, from the environment.
    pub fn new(config: &HubConfig, repo_id: impl Into<String>) -> SyncResult<Self> {
        let endpoint = Url::parse(&config.endpoint).map_err(|err| {
            sync_error!(
                ErrorKind::ConfigError,
                "Invalid hub endpoint",
                detail = config.endpoint.clone(),
                source: err
            )
        })?;

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint,
            repo_id: repo_id.into(),
            revision: config.revision.clone(),
            token: config.resolve_token(),
        })
    }

    /// Returns the revision this client targets.
    pub fn revision(&self) -> &str {
        &self.revision
    }

    fn url<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> SyncResult<Url> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| {
                sync_error!(
                    ErrorKind::ConfigError,
                    "Hub endpoint cannot carry a path",
                    self.endpoint.as_str()
                )
            })?
            .pop_if_empty()
            .extend(segments);

        Ok(url)
    }

    /// Builds `api/datasets/{repo_id}/{action}/{revision}`.
    fn api_url(&self, action: &str) -> SyncResult<Url> {
        self.url(
            ["api", "datasets"]
                .into_iter()
                .chain(self.repo_id.split('/'))
                .chain([action, self.revision.as_str()]),
        )
    }

    fn resolve_url(&self, path: &str) -> SyncResult<Url> {
        self.url(
            ["datasets"]
                .into_iter()
                .chain(self.repo_id.split('/'))
                .chain(["resolve", self.revision.as_str()])
                .chain(path.split('/')),
        )
    }

    fn lfs_batch_url(&self) -> SyncResult<Url> {
        let git_repo = format!("{}.git", self.repo_id);
        self.url(
            ["datasets"]
                .into_iter()
                .chain(git_repo.split('/'))
                .chain(["info", "lfs", "objects", "batch"]),
        )
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let request = self.client.request(method, url);
        match &self.token {
            Some(token) => request.bearer_auth(token.expose_secret()),
            None => request,
        }
    }

    async fn preupload(&self, path: &str, content: &[u8]) -> SyncResult<UploadMode> {
        let sample = &content[..content.len().min(PREUPLOAD_SAMPLE_SIZE)];
        let body = json!({
            "files": [{
                "path": path,
                "sample": BASE64.encode(sample),
                "size": content.len(),
            }],
        });

        let response = self
            .request(Method::POST, self.api_url("preupload")?)
            .json(&body)
            .send()
            .await?;
        let response: PreuploadResponse = check_status(response, "Preupload request failed")
            .await?
            .json()
            .await?;

        match response.files.into_iter().find(|file| file.path == path) {
            Some(file) => Ok(file.upload_mode),
            None => bail!(
                ErrorKind::RemoteError,
                "Preupload response does not mention the file",
                path
            ),
        }
    }

    async fn upload_lfs(&self, oid: &str, content: Bytes) -> SyncResult<()> {
        let size = content.len();
        let body = json!({
            "operation": "upload",
            "transfers": ["basic"],
            "objects": [{ "oid": oid, "size": size }],
            "hash_algo": "sha256",
            "ref": { "name": self.revision },
        });

        let response = self
            .request(Method::POST, self.lfs_batch_url()?)
            .header(ACCEPT, LFS_MEDIA_TYPE)
            .header(CONTENT_TYPE, LFS_MEDIA_TYPE)
            .body(body.to_string())
            .send()
            .await?;
        let batch: LfsBatchResponse = check_status(response, "LFS batch request failed")
            .await?
            .json()
            .await?;

        if let Some(transfer) = &batch.transfer
            && transfer != "basic"
        {
            bail!(
                ErrorKind::UnsupportedUpload,
                "Hub requested an unsupported LFS transfer",
                transfer
            );
        }

        let Some(object) = batch.objects.into_iter().next() else {
            bail!(
                ErrorKind::RemoteError,
                "LFS batch response has no objects",
                oid
            );
        };

        if let Some(error) = object.error {
            bail!(
                ErrorKind::RemoteError,
                "Hub rejected the LFS object",
                format!("{}: {}", error.code, error.message)
            );
        }

        // No actions means the hub already stores the object.
        let actions = object.actions.unwrap_or_default();
        let Some(upload) = actions.upload else {
            debug!(oid, "lfs object already present");
            return Ok(());
        };

        if upload.header.contains_key("chunk_size") {
            bail!(
                ErrorKind::UnsupportedUpload,
                "Hub requested a multipart LFS upload",
                oid
            );
        }

        let mut request = self.client.put(&upload.href).body(content);
        for (name, value) in &upload.header {
            request = request.header(name, value);
        }
        check_status(request.send().await?, "LFS upload failed").await?;
        debug!(oid, size, "uploaded lfs object");

        if let Some(verify) = actions.verify {
            let mut request = self
                .request(Method::POST, parse_href(&verify.href)?)
                .header(ACCEPT, LFS_MEDIA_TYPE)
                .header(CONTENT_TYPE, LFS_MEDIA_TYPE)
                .body(json!({ "oid": oid, "size": size }).to_string());
            for (name, value) in &verify.header {
                request = request.header(name, value);
            }
            check_status(request.send().await?, "LFS verification failed").await?;
        }

        Ok(())
    }

    async fn commit(&self, operation: Operation<'_>, options: &CommitOptions) -> SyncResult<()> {
        let mut header = json!({
            "summary": options.message,
            "description": "",
        });
        if let Some(parent) = &options.parent_commit {
            header["parentCommit"] = Value::String(parent.clone());
        }

        let body = [json!({ "key": "header", "value": header }), operation.to_line()]
            .iter()
            .map(Value::to_string)
            .collect::<Vec<_>>()
            .join("\n");

        let response = self
            .request(Method::POST, self.api_url("commit")?)
            .header(CONTENT_TYPE, NDJSON_MEDIA_TYPE)
            .body(body)
            .send()
            .await?;
        let response: CommitResponse = check_status(response, "Commit request failed")
            .await?
            .json()
            .await?;

        info!(
            repo_id = %self.repo_id,
            revision = %self.revision,
            commit = response.commit_oid.as_deref().unwrap_or("unknown"),
            message = %options.message,
            "created commit"
        );

        Ok(())
    }
}

impl Repository for HubRepository {
    fn repo_id(&self) -> &str {
        &self.repo_id
    }

    async fn list_files(&self) -> SyncResult<Vec<String>> {
        let mut url = self.api_url("tree")?;
        url.query_pairs_mut().append_pair("recursive", "true");

        let mut paths = Vec::new();
        let mut next = Some(url);
        while let Some(url) = next.take() {
            let response = self.request(Method::GET, url).send().await?;
            let response = check_status(response, "Listing repository files failed").await?;
            next = next_page(response.headers());

            let entries: Vec<TreeEntry> = response.json().await?;
            paths.extend(
                entries
                    .into_iter()
                    .filter(|entry| entry.kind == "file")
                    .map(|entry| entry.path),
            );
        }

        debug!(repo_id = %self.repo_id, files = paths.len(), "listed repository files");

        Ok(paths)
    }

    async fn download(&self, path: &str) -> SyncResult<Bytes> {
        let response = self
            .request(Method::GET, self.resolve_url(path)?)
            .send()
            .await?;
        let content = check_status(response, "Downloading file failed")
            .await?
            .bytes()
            .await?;

        debug!(repo_id = %self.repo_id, path, size = content.len(), "downloaded file");

        Ok(content)
    }

    async fn file_exists(&self, path: &str) -> SyncResult<bool> {
        let response = self
            .request(Method::HEAD, self.resolve_url(path)?)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        check_status(response, "Checking file presence failed").await?;

        Ok(true)
    }

    async fn head_commit(&self) -> SyncResult<Option<String>> {
        let response = self
            .request(Method::GET, self.api_url("revision")?)
            .send()
            .await?;
        let info: RevisionInfo = check_status(response, "Resolving revision failed")
            .await?
            .json()
            .await?;

        Ok(Some(info.sha))
    }

    async fn delete_file(&self, path: &str, commit: &CommitOptions) -> SyncResult<()> {
        self.commit(Operation::Delete { path }, commit).await
    }

    async fn upload_file(
        &self,
        path: &str,
        content: Bytes,
        commit: &CommitOptions,
    ) -> SyncResult<()> {
        match self.preupload(path, &content).await? {
            UploadMode::Regular => {
                self.commit(
                    Operation::Regular {
                        path,
                        content: &content,
                    },
                    commit,
                )
                .await
            }
            UploadMode::Lfs => {
                let oid = format!("{:x}", Sha256::digest(&content));
                let size = content.len();
                self.upload_lfs(&oid, content).await?;
                self.commit(
                    Operation::Lfs {
                        path,
                        oid: &oid,
                        size,
                    },
                    commit,
                )
                .await
            }
        }
    }
}

/// Returns `response` when it succeeded, otherwise maps its status to an error kind.
async fn check_status(response: Response, description: &'static str) -> SyncResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let kind = match status {
        StatusCode::UNAUTHORIZED => ErrorKind::AuthenticationError,
        StatusCode::FORBIDDEN => ErrorKind::PermissionDenied,
        StatusCode::NOT_FOUND => ErrorKind::NotFound,
        StatusCode::CONFLICT | StatusCode::PRECONDITION_FAILED => ErrorKind::CommitConflict,
        _ => ErrorKind::RemoteError,
    };

    let url = response.url().to_string();
    let body = response.text().await.unwrap_or_default();

    Err(sync_error!(
        kind,
        description,
        detail = format!("{status} from {url}: {body}")
    ))
}

fn parse_href(href: &str) -> SyncResult<Url> {
    Url::parse(href).map_err(|err| {
        sync_error!(
            ErrorKind::RemoteError,
            "Hub returned an invalid URL",
            detail = href.to_string(),
            source: err
        )
    })
}

/// Extracts the `rel="next"` target of a `Link` header.
fn next_page(headers: &HeaderMap) -> Option<Url> {
    let link = headers.get(LINK)?.to_str().ok()?;

    link.split(',').find_map(|entry| {
        let (target, params) = entry.split_once(';')?;
        let is_next = params
            .split(';')
            .any(|param| param.trim().replace(' ', "") == "rel=\"next\"");
        if !is_next {
            return None;
        }

        let target = target.trim().strip_prefix('<')?.strip_suffix('>')?;
        Url::parse(target).ok()
    })
}

#[cfg(test)]
mod tests {
    use reqwest::header::HeaderValue;

    use super::*;

    fn repository(endpoint: &str, repo_id: &str, revision: &str) -> HubRepository {
        let config = HubConfig {
            endpoint: endpoint.to_string(),
            revision: revision.to_string(),
            token: None,
            timeout_secs: 5,
        };
        HubRepository::new(&config, repo_id).unwrap()
    }

    #[test]
    fn api_urls_encode_revision_as_one_segment() {
        let repository = repository("https://hub.test", "org/observations", "refs/pr/1");

        assert_eq!(
            repository.api_url("tree").unwrap().as_str(),
            "https://hub.test/api/datasets/org/observations/tree/refs%2Fpr%2F1"
        );
    }

    #[test]
    fn resolve_urls_keep_file_path_segments() {
        let repository = repository("https://hub.test/", "org/observations", "main");

        assert_eq!(
            repository
                .resolve_url("data/train-00000-of-00001.parquet")
                .unwrap()
                .as_str(),
            "https://hub.test/datasets/org/observations/resolve/main/data/train-00000-of-00001.parquet"
        );
        assert_eq!(
            repository.lfs_batch_url().unwrap().as_str(),
            "https://hub.test/datasets/org/observations.git/info/lfs/objects/batch"
        );
    }

    #[test]
    fn next_page_follows_link_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            LINK,
            HeaderValue::from_static(
                "<https://hub.test/prev>; rel=\"prev\", <https://hub.test/api/tree?cursor=abc>; rel=\"next\"",
            ),
        );

        assert_eq!(
            next_page(&headers).unwrap().as_str(),
            "https://hub.test/api/tree?cursor=abc"
        );
        assert!(next_page(&HeaderMap::new()).is_none());
    }

    #[test]
    fn invalid_endpoint_is_a_config_error() {
        let config = HubConfig {
            endpoint: "not a url".to_string(),
            revision: "main".to_string(),
            token: None,
            timeout_secs: 5,
        };

        let err = HubRepository::new(&config, "org/observations").unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ConfigError);
    }
}
