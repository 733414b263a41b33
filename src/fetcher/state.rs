//! Fetch state machine.
//!
//! The reducer is pure: it mutates a [`FetchState`] in response to a
//! [`FetchEvent`] and returns the [`Effect`] the runtime glue must carry out.
//! Timers and network calls live in [`super::RetryFetcher`].
//!
//! ```text
//!   Idle ──Reset──► Fetching ──data──────────────► Succeeded
//!                      │   ──permanent failure───► ConfirmedEmpty
//!                      │   ──empty / transient───► AmbiguousEmpty(n) ──timer──► Fetching
//!                      │   ──other failure (≤ max)─┘
//!                      └── cap reached / too many errors ──► Failed(reason)
//! ```

use super::policy::RetryPolicy;
use super::FetchError;
use crate::client::FailureClass;
use serde_json::{Map, Value};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchPhase {
    /// No key yet.
    Idle,
    Fetching,
    /// Waiting for re-attempt `n` after an empty or transient answer.
    AmbiguousEmpty(u32),
    Succeeded,
    /// The backend can never produce data for this key; empty result published.
    ConfirmedEmpty,
    Failed(String),
}

impl FetchPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            FetchPhase::Succeeded | FetchPhase::ConfirmedEmpty | FetchPhase::Failed(_)
        )
    }
}

/// Per-consumer fetch state. Never shared between consumers.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchState {
    pub phase: FetchPhase,
    pub data: Option<Value>,
    pub loading: bool,
    pub error: Option<FetchError>,
    pub retry_delay: Duration,
    pub retry_count: u32,
    pub error_count: u32,
    pub has_succeeded_once: bool,
    pub is_call_in_flight: bool,
    /// Bumped on every reset; attempts carry the generation they were issued for.
    pub generation: u64,
}

impl FetchState {
    pub fn new(policy: &RetryPolicy) -> Self {
        Self {
            phase: FetchPhase::Idle,
            data: None,
            loading: true,
            error: None,
            retry_delay: policy.initial_delay,
            retry_count: 0,
            error_count: 0,
            has_succeeded_once: false,
            is_call_in_flight: false,
            generation: 0,
        }
    }
}

/// What a settled call produced, already interpreted.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Data(Value),
    Empty,
    Failure { class: FailureClass, message: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum FetchEvent {
    /// Key or dependencies changed: start a fresh cycle. Followed by `Begin`.
    Reset,
    /// Key removed: back to `Idle` until a new key arrives.
    Clear,
    /// Request to issue a call for `generation`.
    Begin { generation: u64 },
    Settled { generation: u64, outcome: Outcome },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    None,
    /// Issue a call for the current generation.
    Issue { generation: u64 },
    /// Sleep, then send `Begin { generation }`.
    ScheduleRetry { delay: Duration, generation: u64 },
    /// A result for an older generation arrived and was dropped.
    Discarded,
}

pub fn reduce(state: &mut FetchState, event: FetchEvent, policy: &RetryPolicy) -> Effect {
    match event {
        FetchEvent::Reset => {
            let generation = state.generation.wrapping_add(1);
            *state = FetchState::new(policy);
            state.generation = generation;
            state.phase = FetchPhase::Fetching;
            Effect::None
        }
        FetchEvent::Clear => {
            let generation = state.generation.wrapping_add(1);
            *state = FetchState::new(policy);
            state.generation = generation;
            Effect::None
        }
        FetchEvent::Begin { generation } => {
            if generation != state.generation
                || state.is_call_in_flight
                || matches!(state.phase, FetchPhase::Idle | FetchPhase::Failed(_))
            {
                return Effect::None;
            }
            state.is_call_in_flight = true;
            if !state.phase.is_terminal() {
                state.phase = FetchPhase::Fetching;
            }
            Effect::Issue { generation }
        }
        FetchEvent::Settled {
            generation,
            outcome,
        } => {
            if generation != state.generation {
                return Effect::Discarded;
            }
            state.is_call_in_flight = false;
            settle(state, outcome, policy)
        }
    }
}

fn settle(state: &mut FetchState, outcome: Outcome, policy: &RetryPolicy) -> Effect {
    match outcome {
        Outcome::Data(value) => {
            state.data = Some(value);
            state.loading = false;
            state.error = None;
            state.has_succeeded_once = true;
            state.phase = FetchPhase::Succeeded;
            recovered(state, policy);
            Effect::None
        }
        // A poll that comes back empty after real data keeps the old data.
        Outcome::Empty if state.has_succeeded_once => {
            state.loading = false;
            state.phase = FetchPhase::Succeeded;
            recovered(state, policy);
            Effect::None
        }
        Outcome::Empty => retry_later(state, policy),
        Outcome::Failure {
            class: FailureClass::Permanent,
            ..
        } => {
            if !state.has_succeeded_once {
                state.data = Some(Value::Object(Map::new()));
            }
            state.loading = false;
            state.error = None;
            state.phase = FetchPhase::ConfirmedEmpty;
            Effect::None
        }
        Outcome::Failure {
            class: FailureClass::Transient,
            ..
        } => retry_later(state, policy),
        Outcome::Failure {
            class: FailureClass::Other,
            message,
        } => {
            state.error_count += 1;
            if state.error_count <= policy.max_errors {
                retry_later(state, policy)
            } else {
                fail(state, FetchError::new(message))
            }
        }
    }
}

/// Hiccups from earlier polls do not count against later ones.
fn recovered(state: &mut FetchState, policy: &RetryPolicy) {
    state.retry_count = 0;
    state.error_count = 0;
    state.retry_delay = policy.initial_delay;
}

fn retry_later(state: &mut FetchState, policy: &RetryPolicy) -> Effect {
    state.retry_count += 1;
    if state.retry_count >= policy.max_retries {
        return fail(state, FetchError::timed_out());
    }
    let delay = state.retry_delay;
    state.retry_delay = state.retry_delay.saturating_add(policy.step);
    state.phase = FetchPhase::AmbiguousEmpty(state.retry_count);
    Effect::ScheduleRetry {
        delay,
        generation: state.generation,
    }
}

fn fail(state: &mut FetchState, error: FetchError) -> Effect {
    state.loading = false;
    state.phase = FetchPhase::Failed(error.message.clone());
    state.error = Some(error);
    Effect::None
}
