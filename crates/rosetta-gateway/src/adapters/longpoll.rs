//! Long-poll transport for media-generation providers.
//!
//! Video generation does not stream: `POST models/{model}:predictLongRunning`
//! returns an operation name, and the adapter polls `GET {base}/{name}` on a
//! fixed interval until the operation reports `done`. The finished result is
//! surfaced as a single text delta carrying the media URI, so downstream
//! consumers see an ordinary one-event stream. Dropping the stream abandons
//! the poll loop; no further requests are made.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use rosetta_core::Role;

use crate::api_error::provider_error;
use crate::error::{GatewayError, GatewayResult};
use crate::registry::{ProviderDescriptor, TransportKind};

use super::{AdapterRequest, RawEventStream, RawProviderEvent, TransportAdapter};

/// Header carrying the API key.
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Polling cadence and patience for long-running operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LongPollConfig {
    /// Delay between consecutive status polls.
    pub interval: Duration,
    /// Total time to wait before giving up on the operation.
    pub max_wait: Duration,
}

impl Default for LongPollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            max_wait: Duration::from_secs(600),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Wire shapes
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct PredictRequest {
    instances: Vec<Instance>,
}

#[derive(Serialize)]
struct Instance {
    prompt: String,
}

#[derive(Deserialize)]
struct OperationHandle {
    name: String,
}

#[derive(Deserialize)]
struct Operation {
    done: Option<bool>,
    error: Option<OperationError>,
    response: Option<OperationResult>,
}

#[derive(Deserialize)]
struct OperationError {
    code: Option<i64>,
    message: Option<String>,
}

/// The result payload has shipped under two shapes; both are probed.
#[derive(Deserialize)]
struct OperationResult {
    #[serde(rename = "generateVideoResponse")]
    generate_video_response: Option<VideoResponse>,
    #[serde(rename = "generatedVideos")]
    generated_videos: Option<Vec<GeneratedVideo>>,
}

#[derive(Deserialize)]
struct VideoResponse {
    #[serde(rename = "generatedSamples")]
    generated_samples: Option<Vec<GeneratedVideo>>,
}

#[derive(Deserialize)]
struct GeneratedVideo {
    video: Option<VideoRef>,
}

#[derive(Deserialize)]
struct VideoRef {
    uri: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Translation
// ─────────────────────────────────────────────────────────────────────────────

/// The prompt for a generation request is the newest user turn.
fn latest_prompt(request: &AdapterRequest) -> String {
    request
        .turns
        .iter()
        .rev()
        .find(|turn| turn.role == Role::User)
        .map(|turn| turn.content.clone())
        .unwrap_or_default()
}

/// Extract the media URI from a finished operation.
fn result_uri(operation: &Operation) -> Option<String> {
    let result = operation.response.as_ref()?;

    let samples = result
        .generate_video_response
        .as_ref()
        .and_then(|r| r.generated_samples.as_ref())
        .or(result.generated_videos.as_ref())?;

    samples
        .first()?
        .video
        .as_ref()?
        .uri
        .clone()
}

// ─────────────────────────────────────────────────────────────────────────────
// Adapter
// ─────────────────────────────────────────────────────────────────────────────

/// Adapter for the long-poll transport.
pub struct LongPollAdapter {
    client: reqwest::Client,
    config: LongPollConfig,
}

impl LongPollAdapter {
    /// Create an adapter with the default polling cadence.
    #[must_use]
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_config(client, LongPollConfig::default())
    }

    /// Create an adapter with an explicit polling cadence.
    #[must_use]
    pub fn with_config(client: reqwest::Client, config: LongPollConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl TransportAdapter for LongPollAdapter {
    fn transport(&self) -> TransportKind {
        TransportKind::LongPoll
    }

    async fn open(
        &self,
        descriptor: &ProviderDescriptor,
        credential: &str,
        request: &AdapterRequest,
    ) -> GatewayResult<RawEventStream> {
        let start_url = format!(
            "{}/models/{}:predictLongRunning",
            descriptor.base_endpoint, request.model
        );
        let body = PredictRequest {
            instances: vec![Instance {
                prompt: latest_prompt(request),
            }],
        };

        debug!(model = %request.model, "starting long-running generation");

        let response = self
            .client
            .post(&start_url)
            .header(API_KEY_HEADER, credential)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(provider_error(status.as_u16(), &body_text));
        }

        let handle: OperationHandle = response.json().await?;
        let poll_url = format!("{}/{}", descriptor.base_endpoint, handle.name);
        let operation_name = handle.name;
        let client = self.client.clone();
        let credential = credential.to_string();
        let config = self.config;

        let stream = async_stream::stream! {
            let started = tokio::time::Instant::now();

            loop {
                tokio::time::sleep(config.interval).await;

                if started.elapsed() > config.max_wait {
                    yield Err(GatewayError::Transport {
                        message: format!(
                            "operation {operation_name} timed out after {}s",
                            config.max_wait.as_secs()
                        ),
                    });
                    return;
                }

                let poll = match client
                    .get(&poll_url)
                    .header(API_KEY_HEADER, &credential)
                    .send()
                    .await
                {
                    Ok(response) => response,
                    Err(e) => {
                        yield Err(e.into());
                        return;
                    }
                };

                let status = poll.status();
                if !status.is_success() {
                    let body_text = poll.text().await.unwrap_or_default();
                    yield Err(provider_error(status.as_u16(), &body_text));
                    return;
                }

                let state: Operation = match poll.json().await {
                    Ok(operation) => operation,
                    Err(e) => {
                        yield Err(e.into());
                        return;
                    }
                };

                if let Some(error) = state.error {
                    let code = error.code.and_then(|c| u16::try_from(c).ok()).unwrap_or(500);
                    yield Err(GatewayError::Provider {
                        status: code,
                        message: error
                            .message
                            .unwrap_or_else(|| "long-running operation failed".into()),
                    });
                    return;
                }

                if state.done.unwrap_or(false) {
                    match result_uri(&state) {
                        Some(uri) => yield Ok(RawProviderEvent::TextDelta(uri)),
                        None => {
                            yield Err(GatewayError::Provider {
                                status: 500,
                                message: format!(
                                    "operation {operation_name} finished without a result URI"
                                ),
                            });
                        }
                    }
                    return;
                }

                debug!(operation = %operation_name, "generation still running");
            }
        };

        Ok(Box::pin(stream))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
