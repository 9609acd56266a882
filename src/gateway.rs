//! Typed client for the analysis service.
//!
//! Each call is a single round trip: no retries and no client-side timeout.

use crate::model::{AnalysisResult, AskRequest, AskResponse, RemoteError, SystemStatus};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected HTTP status {0}")]
    Status(StatusCode),
    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),
    /// The service answered with an explicit `error` field.
    #[error("{0}")]
    Remote(String),
    #[error("could not read {}: {source}", .path.display())]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A file selected for upload, already read into memory.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub async fn read(path: &Path) -> Result<Self, GatewayError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| GatewayError::File {
                path: path.to_path_buf(),
                source,
            })?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload.csv")
            .to_string();
        Ok(Self { file_name, bytes })
    }
}

#[async_trait]
pub trait Gateway: Send + Sync {
    async fn check_status(&self) -> Result<SystemStatus, GatewayError>;
    async fn analyze(&self, file: UploadFile) -> Result<AnalysisResult, GatewayError>;
    async fn ask(&self, request: &AskRequest) -> Result<String, GatewayError>;
}

pub struct HttpGateway {
    http: reqwest::Client,
    base_url: String,
}

impl HttpGateway {
    pub fn new(base_url: &str, user_agent: &str) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(user_agent)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl Gateway for HttpGateway {
    async fn check_status(&self) -> Result<SystemStatus, GatewayError> {
        tracing::debug!("GET /status");
        let status = self
            .http
            .get(self.url("/status"))
            .send()
            .await?
            .error_for_status()?
            .json::<SystemStatus>()
            .await?;
        Ok(status)
    }

    async fn analyze(&self, file: UploadFile) -> Result<AnalysisResult, GatewayError> {
        tracing::debug!(file = %file.file_name, bytes = file.bytes.len(), "POST /analyze");
        let part = Part::bytes(file.bytes)
            .file_name(file.file_name)
            .mime_str("text/csv")?;
        let form = Form::new().part("file", part);
        let resp = self
            .http
            .post(self.url("/analyze"))
            .multipart(form)
            .send()
            .await?;
        let status = resp.status();
        let body = resp.bytes().await?;
        decode_analyze_response(status, &body)
    }

    async fn ask(&self, request: &AskRequest) -> Result<String, GatewayError> {
        tracing::debug!(question = %request.question, "POST /ask");
        let resp = self
            .http
            .post(self.url("/ask"))
            .json(request)
            .send()
            .await?
            .error_for_status()?
            .json::<AskResponse>()
            .await?;
        Ok(resp.answer)
    }
}

/// A non-empty `error` field wins over the HTTP status: the service reports
/// bad uploads as 400 with `{error}`. An empty one counts as no error.
fn decode_analyze_response(status: StatusCode, body: &[u8]) -> Result<AnalysisResult, GatewayError> {
    if let Ok(RemoteError { error }) = serde_json::from_slice::<RemoteError>(body) {
        if !error.is_empty() {
            return Err(GatewayError::Remote(error));
        }
    }
    if !status.is_success() {
        return Err(GatewayError::Status(status));
    }
    Ok(serde_json::from_slice(body)?)
}
