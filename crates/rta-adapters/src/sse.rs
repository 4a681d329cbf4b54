//! Server-push telemetry source.
//!
//! Each data source serves an endless `text/event-stream` response at
//! `{base_url}{source.stream_path()}`.  Only `data:` lines carry payloads;
//! comments, `event:` lines and blank separators are ignored.  The payload
//! text is handed to the monitor undecoded, so a terminal line such as
//! `data: End of data` reaches it as an ordinary (malformed) record.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use reqwest::header::{ACCEPT, HeaderValue};
use tracing::{debug, info};
use url::Url;

use rta_kernel::{KernelError, PayloadStream, Source, TelemetrySource};

use crate::error::{AdapterError, Result};

/// Default data-source server.
pub const DEFAULT_STREAM_URL: &str = "http://localhost:3001";

/// Connection timeout in seconds.  The stream itself has no deadline.
const CONNECT_TIMEOUT_SECS: u64 = 10;

// ---------------------------------------------------------------------------
// Line decoder
// ---------------------------------------------------------------------------

/// Incremental `data:` line extractor.
///
/// Bytes may arrive split at arbitrary points; partial lines are buffered
/// until their newline arrives.
#[derive(Debug, Default)]
pub struct SseLineDecoder {
    buffer: Vec<u8>,
}

impl SseLineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return the payloads of every completed `data:` line.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut payloads = Vec::new();
        while let Some(newline) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline).collect();
            if let Some(payload) = data_payload(&line) {
                payloads.push(payload);
            }
        }
        payloads
    }

    /// Flush a final line that was not newline-terminated.
    pub fn finish(&mut self) -> Option<String> {
        let line = std::mem::take(&mut self.buffer);
        data_payload(&line)
    }
}

/// Extract the payload of one raw line, if it is a non-empty `data:` line.
fn data_payload(line: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(line);
    let payload = text.trim_end_matches(['\r', '\n']).strip_prefix("data:")?.trim();
    (!payload.is_empty()).then(|| payload.to_owned())
}

// ---------------------------------------------------------------------------
// SseTelemetrySource
// ---------------------------------------------------------------------------

/// Opens one HTTP stream per subscription.
#[derive(Debug, Clone)]
pub struct SseTelemetrySource {
    base_url: String,
    http: reqwest::Client,
}

impl SseTelemetrySource {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let base_url = base_url.into();
        Url::parse(&base_url)
            .map_err(|e| AdapterError::ConfigError(format!("invalid stream url `{base_url}`: {e}")))?;

        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| AdapterError::ConfigError(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_owned(),
            http,
        })
    }

    /// The stream URL for `source`.
    pub fn endpoint(&self, source: Source) -> String {
        format!("{}{}", self.base_url, source.stream_path())
    }

    async fn open(&self, source: Source) -> Result<PayloadStream> {
        let endpoint = self.endpoint(source);
        let resp = self
            .http
            .get(&endpoint)
            .header(ACCEPT, HeaderValue::from_static("text/event-stream"))
            .send()
            .await
            .map_err(|e| AdapterError::Http {
                endpoint: endpoint.clone(),
                reason: e.to_string(),
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AdapterError::Status {
                endpoint,
                status: status.as_u16(),
                body,
            });
        }

        info!(endpoint = %endpoint, "telemetry stream opened");
        let body = resp
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()))
            .boxed();
        Ok(payloads(body, source))
    }
}

#[async_trait]
impl TelemetrySource for SseTelemetrySource {
    async fn subscribe(&self, source: Source) -> rta_kernel::Result<PayloadStream> {
        self.open(source)
            .await
            .map_err(|e| e.into_transport(source.to_string()))
    }
}

/// Decoder state threaded through the payload stream.
struct PayloadState {
    body: BoxStream<'static, reqwest::Result<Vec<u8>>>,
    decoder: SseLineDecoder,
    pending: VecDeque<String>,
    finished: bool,
    source: Source,
}

/// Turn a raw byte stream into a stream of `data:` payloads.
///
/// A read error yields one `Err` item and ends the stream.
fn payloads(body: BoxStream<'static, reqwest::Result<Vec<u8>>>, source: Source) -> PayloadStream {
    let state = PayloadState {
        body,
        decoder: SseLineDecoder::new(),
        pending: VecDeque::new(),
        finished: false,
        source,
    };

    futures::stream::unfold(state, |mut st| async move {
        loop {
            if let Some(payload) = st.pending.pop_front() {
                return Some((Ok(payload), st));
            }
            if st.finished {
                return None;
            }
            match st.body.next().await {
                Some(Ok(chunk)) => st.pending.extend(st.decoder.push(&chunk)),
                Some(Err(e)) => {
                    st.finished = true;
                    let err = KernelError::StreamTransport {
                        source_name: st.source.to_string(),
                        reason: e.to_string(),
                    };
                    return Some((Err(err), st));
                }
                None => {
                    debug!(source = %st.source, "telemetry stream closed by server");
                    st.finished = true;
                    st.pending.extend(st.decoder.finish());
                }
            }
        }
    })
    .boxed()
}
