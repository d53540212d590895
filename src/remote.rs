//! Remote document access.
//!
//! The task list lives in one file of a hosted gist. The only primitives are
//! "read the whole document" and "replace the file's content"; there is no
//! conditional write, so concurrent overwrites race and the last one wins.

use crate::config::RemoteConfig;
use crate::error::StorageError;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use tracing::{debug, error};

/// Longest slice of an error body kept in `RemoteRejected`.
const ERROR_BODY_LIMIT: usize = 200;

/// Whole-document read/overwrite access to the stored task list.
///
/// One attempt per call; retries are the caller's decision.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch the current content of the task file.
    async fn fetch(&self) -> Result<String, StorageError>;

    /// Replace the content of the task file.
    async fn overwrite(&self, content: &str) -> Result<(), StorageError>;
}

/// Gist read envelope; only the fields we use.
#[derive(Debug, Deserialize)]
struct GistEnvelope {
    #[serde(default)]
    files: HashMap<String, GistFile>,
}

#[derive(Debug, Deserialize)]
struct GistFile {
    content: Option<String>,
    #[serde(default)]
    truncated: bool,
    raw_url: Option<String>,
}

/// Field-scoped partial update body: only the named file is replaced.
#[derive(Debug, Serialize)]
struct GistPatch<'a> {
    files: BTreeMap<&'a str, FileContent<'a>>,
}

#[derive(Debug, Serialize)]
struct FileContent<'a> {
    content: &'a str,
}

/// `DocumentStore` backed by the GitHub gists API.
pub struct GistClient {
    client: Client,
    api_url: String,
    gist_id: String,
    token: String,
    filename: String,
    user_agent: String,
}

impl GistClient {
    /// Build a client from configuration. Fails if the document id or token is missing.
    pub fn new(config: &RemoteConfig) -> anyhow::Result<Self> {
        let gist_id = config
            .gist_id
            .clone()
            .ok_or_else(|| anyhow::anyhow!("remote document id is not configured"))?;
        let token = config
            .token
            .clone()
            .ok_or_else(|| anyhow::anyhow!("remote write credential is not configured"))?;
        let client = Client::builder().timeout(config.timeout()).build()?;

        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            gist_id,
            token,
            filename: config.filename.clone(),
            user_agent: config.user_agent.clone(),
        })
    }

    fn gist_url(&self) -> String {
        format!("{}/gists/{}", self.api_url, self.gist_id)
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.client
            .request(method, url)
            .bearer_auth(&self.token)
            .header(ACCEPT, "application/vnd.github+json")
            .header(USER_AGENT, &self.user_agent)
    }

    async fn send(
        &self,
        request: RequestBuilder,
        label: &str,
        url: &str,
    ) -> Result<Response, StorageError> {
        debug!("{} {}", label, url);
        let response = request.send().await.map_err(|e| {
            error!("{} {} failed: {}", label, url, e);
            StorageError::from_transport(e)
        })?;
        let status = response.status();
        debug!("{} {} -> {}", label, url, status.as_u16());

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let body: String = body.chars().take(ERROR_BODY_LIMIT).collect();
            error!("{} {} rejected: {} {}", label, url, status.as_u16(), body);
            return Err(StorageError::RemoteRejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn fetch_raw(&self, raw_url: &str) -> Result<String, StorageError> {
        let response = self
            .send(self.request(Method::GET, raw_url), "GET", raw_url)
            .await?;
        response.text().await.map_err(StorageError::from_transport)
    }
}

#[async_trait]
impl DocumentStore for GistClient {
    async fn fetch(&self) -> Result<String, StorageError> {
        let url = self.gist_url();
        let response = self
            .send(self.request(Method::GET, &url), "GET", &url)
            .await?;
        let body = response.text().await.map_err(StorageError::from_transport)?;

        let envelope: GistEnvelope = serde_json::from_str(&body).map_err(|e| {
            StorageError::MalformedDocument(format!("unexpected gist response: {}", e))
        })?;
        let file = envelope.files.get(&self.filename).ok_or_else(|| {
            StorageError::MalformedDocument(format!("file {} not found in gist", self.filename))
        })?;

        if file.truncated
            && let Some(raw_url) = file.raw_url.as_deref()
        {
            debug!("{} is truncated, fetching raw content", self.filename);
            return self.fetch_raw(raw_url).await;
        }

        file.content.clone().ok_or_else(|| {
            StorageError::MalformedDocument(format!("file {} has no content", self.filename))
        })
    }

    async fn overwrite(&self, content: &str) -> Result<(), StorageError> {
        let url = self.gist_url();
        let mut files = BTreeMap::new();
        files.insert(self.filename.as_str(), FileContent { content });
        let patch = GistPatch { files };

        self.send(self.request(Method::PATCH, &url).json(&patch), "PATCH", &url)
            .await?;
        Ok(())
    }
}

/// In-process `DocumentStore` for tests and local experiments.
///
/// Records every successful overwrite so callers can assert whether a write happened.
#[derive(Debug, Default)]
pub struct MemoryDocument {
    content: Mutex<String>,
    writes: Mutex<Vec<String>>,
    reject_writes: Mutex<Option<u16>>,
}

impl MemoryDocument {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: Mutex::new(content.into()),
            ..Default::default()
        }
    }

    /// Document holding an empty task list.
    pub fn empty() -> Self {
        Self::new("[]")
    }

    /// Current content.
    pub fn content(&self) -> String {
        self.content
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Number of successful overwrites so far.
    pub fn write_count(&self) -> usize {
        self.writes.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Make subsequent overwrites fail with the given status (`None` to accept again).
    pub fn reject_writes_with(&self, status: Option<u16>) {
        *self.reject_writes.lock().unwrap_or_else(|e| e.into_inner()) = status;
    }
}

#[async_trait]
impl DocumentStore for MemoryDocument {
    async fn fetch(&self) -> Result<String, StorageError> {
        Ok(self.content())
    }

    async fn overwrite(&self, content: &str) -> Result<(), StorageError> {
        if let Some(status) = *self.reject_writes.lock().unwrap_or_else(|e| e.into_inner()) {
            return Err(StorageError::RemoteRejected {
                status,
                body: "write rejected".to_string(),
            });
        }
        *self.content.lock().unwrap_or_else(|e| e.into_inner()) = content.to_string();
        self.writes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(content.to_string());
        Ok(())
    }
}
