use super::state::{reduce, Effect, FetchEvent, FetchPhase, FetchState, Outcome};
use super::{FetchSnapshot, RetryPolicy};
use crate::cache::RequestKey;
use crate::client::{classify, is_ambiguous_empty, FailureClass, FetchClient};
use crate::transport::TransportError;
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

struct Slot {
    key: Option<RequestKey>,
    dependencies: Vec<String>,
    state: FetchState,
}

struct Inner {
    id: Uuid,
    client: Arc<FetchClient>,
    policy: RetryPolicy,
    slot: Mutex<Slot>,
    snapshots: watch::Sender<FetchSnapshot>,
    shutdown: CancellationToken,
}

/// Per-consumer fetcher with retry/backoff state.
///
/// Calls and retry timers run as tokio tasks; all methods must be called
/// from within a runtime. Dropping the fetcher cancels pending timers and
/// stops waiting on pending calls (the calls themselves still settle and
/// populate the cache).
pub struct RetryFetcher {
    inner: Arc<Inner>,
}

impl RetryFetcher {
    pub fn new(client: Arc<FetchClient>) -> Self {
        let policy = client.retry_policy().clone();
        Self::with_policy(client, policy)
    }

    pub fn with_policy(client: Arc<FetchClient>, policy: RetryPolicy) -> Self {
        let state = FetchState::new(&policy);
        let (snapshots, _) = watch::channel(FetchSnapshot::from_state(&state));
        Self {
            inner: Arc::new(Inner {
                id: Uuid::new_v4(),
                client,
                policy,
                slot: Mutex::new(Slot {
                    key: None,
                    dependencies: Vec::new(),
                    state,
                }),
                snapshots,
                shutdown: CancellationToken::new(),
            }),
        }
    }

    /// Create a fetcher and immediately start fetching `key`.
    pub fn for_key(client: Arc<FetchClient>, key: RequestKey) -> Self {
        let fetcher = Self::new(client);
        fetcher.set_key(Some(key));
        fetcher
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    /// Point the fetcher at `key`. `None` means "don't fetch yet".
    ///
    /// Setting the key it already has is a no-op; any other key starts a
    /// fresh cycle with all counters reset.
    pub fn set_key(&self, key: Option<RequestKey>) {
        let generation = {
            let mut slot = self.inner.lock();
            if slot.key == key {
                return;
            }
            slot.key = key;
            self.inner.restart(&mut slot)
        };
        if let Some(generation) = generation {
            self.inner.begin(generation);
        }
    }

    /// Force a fresh cycle whenever `dependencies` differs from the last list,
    /// independent of key identity.
    pub fn set_dependencies(&self, dependencies: Vec<String>) {
        let generation = {
            let mut slot = self.inner.lock();
            if slot.dependencies == dependencies {
                return;
            }
            slot.dependencies = dependencies;
            self.inner.restart(&mut slot)
        };
        if let Some(generation) = generation {
            self.inner.begin(generation);
        }
    }

    /// Re-fetch the current key (polling, or a retry button after failure).
    ///
    /// No-op while a call is in flight. After `Failed` a fresh cycle starts.
    pub fn refresh(&self) {
        let generation = {
            let mut slot = self.inner.lock();
            if slot.key.is_none() {
                return;
            }
            if matches!(slot.state.phase, FetchPhase::Failed(_)) {
                self.inner.restart(&mut slot)
            } else {
                Some(slot.state.generation)
            }
        };
        if let Some(generation) = generation {
            self.inner.begin(generation);
        }
    }

    pub fn key(&self) -> Option<RequestKey> {
        self.inner.lock().key.clone()
    }

    pub fn state(&self) -> FetchState {
        self.inner.lock().state.clone()
    }

    pub fn snapshot(&self) -> FetchSnapshot {
        self.inner.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<FetchSnapshot> {
        self.inner.snapshots.subscribe()
    }

    /// Wait until `loading` is false. Does not resolve while no key is set.
    pub async fn settled(&self) -> FetchSnapshot {
        let mut rx = self.subscribe();
        let snapshot = match rx.wait_for(|s| !s.loading).await {
            Ok(s) => s.clone(),
            Err(_) => self.snapshot(),
        };
        snapshot
    }
}

impl Drop for RetryFetcher {
    fn drop(&mut self) {
        self.inner.shutdown.cancel();
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn publish(&self, state: &FetchState) {
        let next = FetchSnapshot::from_state(state);
        self.snapshots.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }

    /// Start a new generation; returns it if there is a key to fetch.
    fn restart(&self, slot: &mut Slot) -> Option<u64> {
        let event = if slot.key.is_some() {
            FetchEvent::Reset
        } else {
            FetchEvent::Clear
        };
        reduce(&mut slot.state, event, &self.policy);
        self.publish(&slot.state);
        debug!(
            fetcher = %self.id,
            key = ?slot.key.as_ref().map(RequestKey::canonical),
            generation = slot.state.generation,
            "fetch cycle reset"
        );
        slot.key.as_ref().map(|_| slot.state.generation)
    }

    fn begin(self: &Arc<Self>, generation: u64) {
        let key = {
            let mut slot = self.lock();
            let Some(key) = slot.key.clone() else {
                return;
            };
            match reduce(&mut slot.state, FetchEvent::Begin { generation }, &self.policy) {
                Effect::Issue { .. } => {}
                _ => {
                    debug!(fetcher = %self.id, key = %key, generation, "skipping fetch");
                    return;
                }
            }
            self.publish(&slot.state);
            key
        };

        let inner = Arc::clone(self);
        tokio::spawn(async move {
            let mut guard = CallGuard {
                inner: Arc::clone(&inner),
                generation,
                armed: true,
            };
            let result = tokio::select! {
                _ = inner.shutdown.cancelled() => return,
                result = inner.client.get(&key) => result,
            };
            let outcome = inner.interpret(&key, result);
            guard.armed = false;
            inner.settle(generation, &key, outcome);
        });
    }

    fn interpret(&self, key: &RequestKey, result: Result<Value, TransportError>) -> Outcome {
        match result {
            Ok(value) if is_ambiguous_empty(&value, self.client.response_key()) => {
                debug!(fetcher = %self.id, key = %key, "empty payload");
                Outcome::Empty
            }
            Ok(value) => Outcome::Data(value),
            Err(e) => {
                let class = classify(&e);
                debug!(fetcher = %self.id, key = %key, error = %e, class = ?class, "call failed");
                Outcome::Failure {
                    class,
                    message: e.user_message(),
                }
            }
        }
    }

    fn settle(self: &Arc<Self>, generation: u64, key: &RequestKey, outcome: Outcome) {
        let effect = {
            let mut slot = self.lock();
            let effect = reduce(
                &mut slot.state,
                FetchEvent::Settled {
                    generation,
                    outcome,
                },
                &self.policy,
            );
            self.publish(&slot.state);
            match &slot.state.phase {
                FetchPhase::Failed(reason) if effect != Effect::Discarded => warn!(
                    fetcher = %self.id,
                    key = %key,
                    retries = slot.state.retry_count,
                    errors = slot.state.error_count,
                    reason = reason.as_str(),
                    "fetch failed"
                ),
                FetchPhase::ConfirmedEmpty => {
                    info!(fetcher = %self.id, key = %key, "backend reported permanent failure, publishing empty result")
                }
                _ => {}
            }
            effect
        };

        match effect {
            Effect::ScheduleRetry { delay, generation } => self.schedule(delay, generation),
            Effect::Discarded => {
                debug!(fetcher = %self.id, key = %key, generation, "discarding stale response")
            }
            Effect::None | Effect::Issue { .. } => {}
        }
    }

    fn schedule(self: &Arc<Self>, delay: Duration, generation: u64) {
        debug!(fetcher = %self.id, delay_ms = delay.as_millis() as u64, generation, "scheduling re-attempt");
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            tokio::select! {
                _ = inner.shutdown.cancelled() => {}
                _ = tokio::time::sleep(delay) => inner.begin(generation),
            }
        });
    }
}

/// Clears `is_call_in_flight` if a call task ends without settling.
struct CallGuard {
    inner: Arc<Inner>,
    generation: u64,
    armed: bool,
}

impl Drop for CallGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if self.inner.shutdown.is_cancelled() {
            let mut slot = self.inner.lock();
            if slot.state.generation == self.generation {
                slot.state.is_call_in_flight = false;
            }
            return;
        }
        warn!(fetcher = %self.inner.id, generation = self.generation, "fetch task ended without a result");
        let key = self.inner.lock().key.clone();
        if let Some(key) = key {
            self.inner.settle(
                self.generation,
                &key,
                Outcome::Failure {
                    class: FailureClass::Other,
                    message: "fetch task aborted".to_string(),
                },
            );
        }
    }
}
