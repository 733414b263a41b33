//! Scripted transport shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use jsinfo_fetch::transport::{Transport, TransportError};
use jsinfo_fetch::{FetchClient, RequestKey, RetryPolicy};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

type Responder = Box<dyn Fn(&RequestKey, usize) -> Result<Value, TransportError> + Send + Sync>;

/// Answers every call through a responder closure, counting calls and
/// recording the keys it was asked for.
pub struct ScriptedTransport {
    responder: Responder,
    delay: Duration,
    calls: AtomicUsize,
    seen: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    /// `responder` receives the key and the 0-based call number.
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&RequestKey, usize) -> Result<Value, TransportError> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Replay `script` in order, then answer `fallback` forever.
    pub fn script(
        script: Vec<Result<Value, TransportError>>,
        fallback: Result<Value, TransportError>,
    ) -> Self {
        let script = Mutex::new(VecDeque::from(script));
        Self::new(move |_, _| {
            script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| fallback.clone())
        })
    }

    pub fn always(response: Result<Value, TransportError>) -> Self {
        Self::new(move |_, _| response.clone())
    }

    /// Every call sleeps this long before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn get_json(&self, key: &RequestKey) -> Result<Value, TransportError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(key.canonical());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        (self.responder)(key, n)
    }
}

/// Client over `transport` with its own cache and in-flight registry.
pub fn client_with(transport: Arc<ScriptedTransport>, policy: RetryPolicy) -> Arc<FetchClient> {
    Arc::new(
        FetchClient::builder()
            .transport(transport)
            .retry_policy(policy)
            .isolated()
            .build()
            .unwrap(),
    )
}

pub fn client(transport: Arc<ScriptedTransport>) -> Arc<FetchClient> {
    client_with(transport, RetryPolicy::default())
}

pub fn http_error(status: u16, body: &str) -> TransportError {
    TransportError::Http {
        status,
        body: body.to_string(),
    }
}
