//! Thin client over the generation backend's REST surface.
//!
//! Four endpoints are used: `POST /prompt` to queue a job graph,
//! `GET /history/{id}` to poll it, `GET /view` to download an output,
//! and `POST /queue` to drop an abandoned job.

use serde::Deserialize;

use crate::history::ImageRef;

/// Handle to one ComfyUI server. Cheap to clone.
#[derive(Clone)]
pub struct ComfyUIApi {
    http: reqwest::Client,
    base_url: String,
}

/// Acknowledgement of a queued job.
#[derive(Debug)]
pub struct SubmitResponse {
    pub prompt_id: String,
    /// Queue position reported by the server, if any.
    pub number: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct QueuedBody {
    #[serde(default)]
    prompt_id: Option<String>,
    #[serde(default)]
    number: Option<i64>,
}

#[derive(Debug, thiserror::Error)]
pub enum ComfyUIApiError {
    /// Transport failure or undecodable body.
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("ComfyUI API error ({status}): {body}")]
    ApiError { status: u16, body: String },

    #[error("ComfyUI response missing field `{0}`")]
    MissingField(&'static str),
}

impl ComfyUIApi {
    /// `base_url` is the server root, e.g. `http://host:8188`.
    pub fn new(base_url: String) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Share an existing connection pool.
    pub fn with_client(http: reqwest::Client, base_url: String) -> Self {
        let base_url = base_url.trim_end_matches('/').to_string();
        Self { http, base_url }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    /// Queue `workflow` under `client_id` and return the job identifier.
    ///
    /// A 2xx body without a non-empty `prompt_id` is treated as
    /// [`ComfyUIApiError::MissingField`].
    pub async fn submit_workflow(
        &self,
        workflow: &serde_json::Value,
        client_id: &str,
    ) -> Result<SubmitResponse, ComfyUIApiError> {
        let payload = serde_json::json!({ "prompt": workflow, "client_id": client_id });
        let response = self.http.post(self.endpoint("prompt")).json(&payload).send().await?;
        let queued: QueuedBody = into_success(response).await?.json().await?;

        match queued.prompt_id {
            Some(prompt_id) if !prompt_id.is_empty() => Ok(SubmitResponse {
                prompt_id,
                number: queued.number,
            }),
            _ => Err(ComfyUIApiError::MissingField("prompt_id")),
        }
    }

    /// Remove `prompt_id` from the server queue.
    pub async fn cancel_execution(&self, prompt_id: &str) -> Result<(), ComfyUIApiError> {
        let payload = serde_json::json!({ "delete": [prompt_id] });
        let response = self.http.post(self.endpoint("queue")).json(&payload).send().await?;
        into_success(response).await.map(drop)
    }

    /// Raw history document for `prompt_id`; `{}` while the job is
    /// still queued or running.
    pub async fn get_history(&self, prompt_id: &str) -> Result<serde_json::Value, ComfyUIApiError> {
        let url = self.endpoint(&format!("history/{prompt_id}"));
        let response = self.http.get(url).send().await?;
        Ok(into_success(response).await?.json().await?)
    }

    /// Download the bytes of one output image.
    ///
    /// `subfolder` and `type` are only sent when the history entry
    /// carried non-empty values.
    pub async fn view_image(&self, image: &ImageRef) -> Result<Vec<u8>, ComfyUIApiError> {
        let optional = [("subfolder", image.subfolder.as_deref()), ("type", image.kind.as_deref())];
        let query: Vec<(&str, &str)> = std::iter::once(("filename", image.filename.as_str()))
            .chain(
                optional
                    .into_iter()
                    .filter_map(|(k, v)| v.filter(|v| !v.is_empty()).map(|v| (k, v))),
            )
            .collect();

        let response = self.http.get(self.endpoint("view")).query(&query).send().await?;
        Ok(into_success(response).await?.bytes().await?.to_vec())
    }
}

/// Pass 2xx responses through; turn anything else into
/// [`ComfyUIApiError::ApiError`] carrying the body text.
async fn into_success(response: reqwest::Response) -> Result<reqwest::Response, ComfyUIApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<unreadable body>".to_string());
    Err(ComfyUIApiError::ApiError {
        status: status.as_u16(),
        body,
    })
}
