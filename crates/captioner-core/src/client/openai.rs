//! OpenAI batch API client
//!
//! Uses reqwest against the Files and Batches endpoints of an OpenAI-compatible API.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};

use super::{
    BatchJob, BatchService, RemoteFile, BATCH_DESCRIPTION, BATCH_ENDPOINT, COMPLETION_WINDOW,
};
use crate::config::DEFAULT_API_BASE;
use crate::{Error, Result};

/// OpenAI batch API client
pub struct OpenAiBatchClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl OpenAiBatchClient {
    /// Create a client for the public OpenAI API
    pub fn new(api_key: &str) -> Result<Self> {
        Self::with_base_url(api_key, DEFAULT_API_BASE)
    }

    /// Create a client for an OpenAI-compatible API rooted at `base_url`
    /// (e.g. `https://api.openai.com/v1`).
    pub fn with_base_url(api_key: &str, base_url: &str) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(Error::config(
                "missing API key (pass --api_key or set OPENAI_API_KEY)",
            ));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Turn a non-success response into `Error::Api`
    async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = match serde_json::from_str::<ApiErrorResponse>(&body) {
            Ok(error) => error.error.message,
            Err(_) if body.is_empty() => status
                .canonical_reason()
                .unwrap_or("unknown error")
                .to_string(),
            Err(_) => body,
        };

        Err(Error::Api {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl BatchService for OpenAiBatchClient {
    async fn upload_batch_file(&self, path: &Path) -> Result<RemoteFile> {
        let contents = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "batch.jsonl".to_string());

        let part = Part::bytes(contents)
            .file_name(file_name)
            .mime_str("application/jsonl")?;
        let form = Form::new().text("purpose", "batch").part("file", part);

        let response = self
            .client
            .post(self.url("files"))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;

        let file: RemoteFile = Self::check(response).await?.json().await?;
        tracing::debug!(file_id = %file.id, "Uploaded {:?}", path);
        Ok(file)
    }

    async fn create_batch(&self, input_file_id: &str) -> Result<BatchJob> {
        let request = CreateBatchRequest {
            input_file_id,
            endpoint: BATCH_ENDPOINT,
            completion_window: COMPLETION_WINDOW,
            metadata: HashMap::from([("description", BATCH_DESCRIPTION)]),
        };

        let response = self
            .client
            .post(self.url("batches"))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        Ok(Self::check(response).await?.json().await?)
    }

    async fn get_batch(&self, batch_id: &str) -> Result<BatchJob> {
        let response = self
            .client
            .get(self.url(&format!("batches/{}", batch_id)))
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        Ok(Self::check(response).await?.json().await?)
    }

    async fn file_content(&self, file_id: &str) -> Result<Bytes> {
        let response = self
            .client
            .get(self.url(&format!("files/{}/content", file_id)))
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        Ok(Self::check(response).await?.bytes().await?)
    }
}

// OpenAI API types

#[derive(Debug, Serialize)]
struct CreateBatchRequest<'a> {
    input_file_id: &'a str,
    endpoint: &'a str,
    completion_window: &'a str,
    metadata: HashMap<&'a str, &'a str>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}
