//! Scripted transport for tests.
//!
//! Responses are queued per `(method, path)`. The last queued response for a
//! route repeats once the queue is drained; unscripted routes answer 404.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use futures_util::future::BoxFuture;
use parking_lot::Mutex;

use crate::error::TransportError;
use crate::transport::{ApiRequest, ApiResponse, Method, Transport};

#[derive(Debug, Clone)]
struct Scripted {
    delay: Duration,
    result: Result<ApiResponse, String>,
}

#[derive(Debug, Default)]
pub struct MockTransport {
    routes: Mutex<HashMap<(Method, String), VecDeque<Scripted>>>,
    calls: Mutex<Vec<ApiRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, method: Method, path: &str, status: u16, body: serde_json::Value) -> &Self {
        self.respond_after(method, path, Duration::ZERO, status, body)
    }

    /// Like [`MockTransport::respond`], but the response arrives after `delay`
    /// (tokio time, so paused-clock tests stay deterministic).
    pub fn respond_after(
        &self,
        method: Method,
        path: &str,
        delay: Duration,
        status: u16,
        body: serde_json::Value,
    ) -> &Self {
        let body = serde_json::to_vec(&body).unwrap_or_default();
        self.push(method, path, Scripted {
            delay,
            result: Ok(ApiResponse { status, body }),
        })
    }

    /// Scripts a connection-level failure.
    pub fn fail(&self, method: Method, path: &str, reason: &str) -> &Self {
        self.push(method, path, Scripted {
            delay: Duration::ZERO,
            result: Err(reason.to_string()),
        })
    }

    pub fn calls(&self) -> Vec<ApiRequest> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn calls_to(&self, method: Method, path: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.method == method && c.path == path)
            .count()
    }

    fn push(&self, method: Method, path: &str, scripted: Scripted) -> &Self {
        self.routes
            .lock()
            .entry((method, path.to_string()))
            .or_default()
            .push_back(scripted);
        self
    }

    fn next(&self, method: Method, path: &str) -> Option<Scripted> {
        let mut routes = self.routes.lock();
        let queue = routes.get_mut(&(method, path.to_string()))?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

impl Transport for MockTransport {
    fn send(&self, request: ApiRequest) -> BoxFuture<'_, Result<ApiResponse, TransportError>> {
        let scripted = self.next(request.method, &request.path);
        self.calls.lock().push(request);
        Box::pin(async move {
            let Some(scripted) = scripted else {
                return Ok(ApiResponse {
                    status: 404,
                    body: br#"{"detail": "Not found."}"#.to_vec(),
                });
            };
            if !scripted.delay.is_zero() {
                tokio::time::sleep(scripted.delay).await;
            }
            scripted.result.map_err(TransportError::Unavailable)
        })
    }
}
