//! In-memory transport for pipeline and auth tests

use super::{Outcome, RequestDescriptor, Response, Transport, TransportError};
use async_trait::async_trait;
use http::{HeaderMap, Method, StatusCode};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

type Responder = Box<dyn Fn(&RequestDescriptor) -> Outcome + Send + Sync>;

/// What the transport saw for one dispatch.
#[derive(Debug, Clone)]
pub(crate) struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    pub body: Option<serde_json::Value>,
    pub authorization: Option<String>,
    pub timeout: Duration,
    pub attempt: u32,
    pub at: Instant,
}

/// Replays queued outcomes in order, then falls back to a responder.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    queue: Mutex<VecDeque<Outcome>>,
    fallback: Mutex<Option<Responder>>,
    latency: Mutex<Duration>,
    seen: Mutex<Vec<RecordedRequest>>,
}

impl std::fmt::Debug for ScriptedTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedTransport").finish_non_exhaustive()
    }
}

pub(crate) fn json_response(status: u16, body: serde_json::Value) -> Outcome {
    Ok(Response::new(
        StatusCode::from_u16(status).expect("valid status"),
        HeaderMap::new(),
        serde_json::to_vec(&body).expect("serializable body"),
        Duration::ZERO,
    ))
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_json(&self, status: u16, body: serde_json::Value) {
        self.queue.lock().unwrap().push_back(json_response(status, body));
    }

    pub fn push_status(&self, status: u16, times: usize) {
        for _ in 0..times {
            self.push_json(status, serde_json::json!({}));
        }
    }

    pub fn push_error(&self, error: TransportError) {
        self.queue.lock().unwrap().push_back(Err(error));
    }

    pub fn respond_with(
        &self,
        responder: impl Fn(&RequestDescriptor) -> Outcome + Send + Sync + 'static,
    ) {
        *self.fallback.lock().unwrap() = Some(Box::new(responder));
    }

    /// Every dispatch sleeps this long before answering.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap() = latency;
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.seen.lock().unwrap().clone()
    }

    pub fn requests_to(&self, path: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.path == path)
            .collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: &RequestDescriptor) -> Outcome {
        self.seen.lock().unwrap().push(RecordedRequest {
            method: request.method().clone(),
            path: request.path().to_string(),
            headers: request.headers().clone(),
            body: request.body().cloned(),
            authorization: request
                .headers()
                .get(http::header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .map(String::from),
            timeout: request.timeout_duration(),
            attempt: request.attempt(),
            at: Instant::now(),
        });

        let latency = *self.latency.lock().unwrap();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        if let Some(outcome) = self.queue.lock().unwrap().pop_front() {
            return outcome;
        }

        match self.fallback.lock().unwrap().as_ref() {
            Some(responder) => responder(request),
            None => Err(TransportError::Other("script exhausted".to_string())),
        }
    }

    fn base_url(&self) -> &str {
        "scripted://"
    }
}
