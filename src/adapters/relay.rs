//! Stream relay for the upstream event stream.
//!
//! Forwards the body of `POST {base}/orchestrate/stream` chunk by chunk,
//! exactly as received. The streams here are pull-based: nothing is read
//! from the upstream until the caller asks for the next item, so the
//! caller's consumption rate is the relay's read rate.

use std::time::Duration;

use anyhow::{Context, Result};
use async_stream::stream;
use async_trait::async_trait;
use bytes::Bytes;
use futures::{pin_mut, Stream, StreamExt};
use tracing::{debug, warn};

use crate::config::RelayConfig;
use crate::domain::events::StreamEvent;
use crate::domain::wire::OrchestrateRequest;

use super::sse::{decode_event, SseDecoder, SseError, BACKEND_UNREACHABLE_FRAME};
use super::Transport;

/// Relay for the streaming transport.
pub struct StreamRelay {
    base_url: String,
    read_timeout: Duration,
    client: reqwest::Client,
}

impl StreamRelay {
    /// Create a relay for the configured upstream.
    pub fn new(config: &RelayConfig) -> Result<Self> {
        Ok(Self {
            base_url: config.base_url.clone(),
            read_timeout: config.request_timeout,
            client: super::http_client(config, false)?,
        })
    }

    /// Open the upstream stream and forward its chunks verbatim.
    ///
    /// If the connection cannot be established, the stream carries
    /// exactly one synthetic `error` frame and ends. If the connection
    /// drops (or a read times out) after it was established, the stream
    /// simply ends; the consumer treats an end without a `complete`
    /// event as an implicit failure.
    pub fn stream(&self, request: OrchestrateRequest) -> impl Stream<Item = Bytes> + Send + 'static {
        let client = self.client.clone();
        let url = format!("{}/orchestrate/stream", self.base_url);
        let read_timeout = self.read_timeout;

        stream! {
            match client.post(&url).json(&request).send().await {
                Ok(response) => {
                    debug!(status = %response.status(), "upstream stream connected");
                    let body = response.bytes_stream();
                    pin_mut!(body);

                    loop {
                        match tokio::time::timeout(read_timeout, body.next()).await {
                            Ok(Some(Ok(chunk))) => yield chunk,
                            Ok(Some(Err(error))) => {
                                warn!(%error, "upstream stream dropped mid-read");
                                break;
                            }
                            Ok(None) => break,
                            Err(_) => {
                                warn!(timeout = ?read_timeout, "upstream stream read timed out");
                                break;
                            }
                        }
                    }
                }
                Err(error) => {
                    warn!(%error, "upstream stream connection failed");
                    yield Bytes::from_static(BACKEND_UNREACHABLE_FRAME.as_bytes());
                }
            }
        }
    }

    /// The same stream, decoded into typed events at this boundary.
    ///
    /// Unknown event types are skipped; malformed payloads surface as
    /// `Err` items for the coordinator to treat as protocol violations.
    pub fn events(
        &self,
        request: OrchestrateRequest,
    ) -> impl Stream<Item = Result<StreamEvent, SseError>> + Send + 'static {
        let bytes = self.stream(request);

        stream! {
            pin_mut!(bytes);
            let mut decoder = SseDecoder::new();

            while let Some(chunk) = bytes.next().await {
                for frame in decoder.push(&chunk) {
                    match decode_event(&frame) {
                        Ok(Some(event)) => yield Ok(event),
                        Ok(None) => {}
                        Err(error) => yield Err(error),
                    }
                }
            }
        }
    }
}

#[async_trait]
impl Transport for StreamRelay {
    fn name(&self) -> &str {
        "stream-relay"
    }

    async fn health_check(&self) -> Result<()> {
        let probe = self.client.get(format!("{}/", self.base_url)).send();
        let response = tokio::time::timeout(self.read_timeout, probe)
            .await
            .context("Upstream health check timed out")?
            .context("Upstream health check failed")?;

        if !response.status().is_success() {
            anyhow::bail!("Upstream health check returned {}", response.status());
        }
        Ok(())
    }
}
