//! AnthropicBatchClient - Message Batches API adapter
//!
//! - `POST /v1/messages/batches` で一括投入
//! - `GET /v1/messages/batches/{id}` で状態取得
//! - `GET /v1/messages/batches/{id}/results` で JSONL の結果取得

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};

use crate::config::RemoteConfig;
use crate::domain::{
    BatchError, BatchId, BatchRequest, BatchStatus, RequestCounts, Result, TaskId, TaskOutcome,
};
use crate::ports::{BatchClient, BatchHandle};

const BATCHES_PATH: &str = "/v1/messages/batches";

/// HTTP client for the remote batch service.
#[derive(Clone, Debug)]
pub struct AnthropicBatchClient {
    http: Client,
    base_url: String,
    api_key: String,
    api_version: String,
}

impl AnthropicBatchClient {
    pub fn new(remote: &RemoteConfig, api_key: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .timeout(remote.request_timeout())
            .build()
            .map_err(|e| BatchError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url: remote.api_base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            api_version: remote.api_version.clone(),
        })
    }

    fn url(&self, suffix: &str) -> String {
        format!("{}{}{}", self.base_url, BATCHES_PATH, suffix)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", &self.api_version)
    }

    async fn fetch_batch(&self, batch_id: &BatchId) -> std::result::Result<MessageBatch, String> {
        let response = self
            .authorized(self.http.get(self.url(&format!("/{batch_id}"))))
            .send()
            .await
            .map_err(|e| e.to_string())?;
        let response = ok_or_api_error(response).await?;
        response.json().await.map_err(|e| e.to_string())
    }
}

#[async_trait]
impl BatchClient for AnthropicBatchClient {
    async fn submit(&self, requests: &[BatchRequest]) -> Result<BatchHandle> {
        tracing::debug!(requests = requests.len(), "creating message batch");
        let response = self
            .authorized(self.http.post(self.url("")))
            .json(&CreateBatch { requests })
            .send()
            .await
            .map_err(|e| BatchError::Submission(e.to_string()))?;
        let response = ok_or_api_error(response)
            .await
            .map_err(BatchError::Submission)?;
        let batch: MessageBatch = response
            .json()
            .await
            .map_err(|e| BatchError::Submission(format!("unreadable response: {e}")))?;

        // A freshly created batch that reports an unknown status is still created.
        let status = BatchStatus::from_remote(&batch.processing_status)
            .unwrap_or(BatchStatus::Submitted);
        Ok(BatchHandle {
            batch_id: BatchId::new(batch.id),
            status,
            counts: batch.request_counts,
        })
    }

    async fn status(&self, batch_id: &BatchId) -> Result<BatchHandle> {
        let batch = self
            .fetch_batch(batch_id)
            .await
            .map_err(|msg| BatchError::retrieval(batch_id, msg))?;
        let status = BatchStatus::from_remote(&batch.processing_status).ok_or_else(|| {
            BatchError::retrieval(
                batch_id,
                format!("unknown processing_status {:?}", batch.processing_status),
            )
        })?;
        Ok(BatchHandle {
            batch_id: batch_id.clone(),
            status,
            counts: batch.request_counts,
        })
    }

    async fn results(&self, batch_id: &BatchId) -> Result<Vec<TaskOutcome>> {
        let response = self
            .authorized(self.http.get(self.url(&format!("/{batch_id}/results"))))
            .send()
            .await
            .map_err(|e| BatchError::retrieval(batch_id, e.to_string()))?;
        let response = ok_or_api_error(response)
            .await
            .map_err(|msg| BatchError::retrieval(batch_id, msg))?;
        let body = response
            .text()
            .await
            .map_err(|e| BatchError::retrieval(batch_id, e.to_string()))?;

        parse_results(&body).map_err(|msg| BatchError::retrieval(batch_id, msg))
    }
}

/// Pass 2xx responses through; turn anything else into `HTTP <code>: <message>`.
async fn ok_or_api_error(response: Response) -> std::result::Result<Response, String> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(format!("HTTP {}: {}", status.as_u16(), api_error_message(&body)))
}

fn api_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string())
}

/// Parse the JSONL results stream.
fn parse_results(body: &str) -> std::result::Result<Vec<TaskOutcome>, String> {
    body.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(n, line)| {
            serde_json::from_str::<ResultLine>(line)
                .map(ResultLine::into_outcome)
                .map_err(|e| format!("malformed result line {}: {e}", n + 1))
        })
        .collect()
}

// ---- wire types ----

#[derive(Serialize)]
struct CreateBatch<'a> {
    requests: &'a [BatchRequest],
}

#[derive(Deserialize)]
struct MessageBatch {
    id: String,
    processing_status: String,
    #[serde(default)]
    request_counts: Option<RequestCounts>,
}

#[derive(Deserialize)]
struct ResultLine {
    custom_id: TaskId,
    result: ResultBody,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ResultBody {
    Succeeded { message: ResponseMessage },
    Errored { error: serde_json::Value },
    Canceled,
    Expired,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

impl ResultLine {
    fn into_outcome(self) -> TaskOutcome {
        match self.result {
            ResultBody::Succeeded { message } => {
                let text = message
                    .content
                    .into_iter()
                    .filter_map(|block| match block {
                        ContentBlock::Text { text } => Some(text),
                        ContentBlock::Other => None,
                    })
                    .collect::<Vec<_>>()
                    .join("\n");
                TaskOutcome::succeeded(self.custom_id, text)
            }
            ResultBody::Errored { error } => {
                // {"type":"error","error":{"type":"...","message":"..."}} or flatter shapes
                let message = error
                    .pointer("/error/message")
                    .or_else(|| error.get("message"))
                    .and_then(|m| m.as_str())
                    .map(str::to_string)
                    .unwrap_or_else(|| error.to_string());
                TaskOutcome::errored(self.custom_id, message)
            }
            ResultBody::Canceled => TaskOutcome::errored(self.custom_id, "canceled"),
            ResultBody::Expired => TaskOutcome::errored(self.custom_id, "expired"),
        }
    }
}
