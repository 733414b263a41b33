//! Retry-fetcher behavior against a scripted backend.
//!
//! All tests run on paused time, so backoff sleeps advance instantly.

mod common;

use common::{client, client_with, http_error, ScriptedTransport};
use jsinfo_fetch::fetcher::{FetchPhase, TIMED_OUT_MESSAGE};
use jsinfo_fetch::transport::TransportError;
use jsinfo_fetch::{RequestKey, RetryFetcher, RetryPolicy};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

#[tokio::test(start_paused = true)]
async fn warm_up_empties_are_retried_with_growing_delay() {
    let transport = Arc::new(ScriptedTransport::script(
        vec![Ok(json!({})), Ok(json!({})), Ok(json!({}))],
        Ok(json!({"providers": [1, 2]})),
    ));
    let started = Instant::now();
    let fetcher = RetryFetcher::for_key(client(transport.clone()), RequestKey::new("providers"));

    let snapshot = fetcher.settled().await;

    assert_eq!(snapshot.data, Some(json!({"providers": [1, 2]})));
    assert!(snapshot.error.is_none());
    assert!(!snapshot.loading);
    assert_eq!(transport.calls(), 4);
    // 100ms + 200ms + 300ms of backoff.
    assert!(started.elapsed() >= Duration::from_millis(600));
    assert_eq!(fetcher.state().phase, FetchPhase::Succeeded);
}

#[tokio::test(start_paused = true)]
async fn endless_empties_stop_at_attempt_cap() {
    let transport = Arc::new(ScriptedTransport::always(Ok(json!({}))));
    let fetcher = RetryFetcher::for_key(client(transport.clone()), RequestKey::new("index"));

    let snapshot = fetcher.settled().await;

    assert_eq!(transport.calls(), 50);
    assert!(snapshot.data.is_none());
    assert_eq!(snapshot.error.unwrap().message, TIMED_OUT_MESSAGE);
    assert!(!snapshot.loading);
    assert!(!snapshot.is_validating);

    // No further attempts once failed.
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(transport.calls(), 50);
}

#[tokio::test(start_paused = true)]
async fn auth_failure_is_confirmed_empty() {
    let transport = Arc::new(ScriptedTransport::always(Err(http_error(
        500,
        r#"{"error": "SASL authentication failed for user \"jsinfo\""}"#,
    ))));
    let fetcher = RetryFetcher::for_key(client(transport.clone()), RequestKey::new("index"));

    let snapshot = fetcher.settled().await;

    assert_eq!(transport.calls(), 1);
    assert_eq!(snapshot.data, Some(json!({})));
    assert!(snapshot.error.is_none());
    assert_eq!(fetcher.state().phase, FetchPhase::ConfirmedEmpty);
}

#[tokio::test(start_paused = true)]
async fn structured_permanent_code_is_confirmed_empty() {
    let transport = Arc::new(ScriptedTransport::always(Err(http_error(
        503,
        r#"{"error": {"code": "db_authentication_failed"}}"#,
    ))));
    let fetcher = RetryFetcher::for_key(client(transport.clone()), RequestKey::new("index"));

    assert_eq!(fetcher.settled().await.data, Some(json!({})));
    assert_eq!(transport.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn other_errors_fail_after_threshold() {
    let transport = Arc::new(ScriptedTransport::always(Err(http_error(
        500,
        r#"{"error": "relation \"providers\" does not exist"}"#,
    ))));
    let fetcher = RetryFetcher::for_key(client(transport.clone()), RequestKey::new("providers"));

    let snapshot = fetcher.settled().await;

    // Five tolerated, the sixth is terminal.
    assert_eq!(transport.calls(), 6);
    assert_eq!(
        snapshot.error.unwrap().message,
        "relation \"providers\" does not exist"
    );
    assert!(matches!(fetcher.state().phase, FetchPhase::Failed(_)));
}

#[tokio::test(start_paused = true)]
async fn transient_failures_do_not_count_as_errors() {
    let mut script = Vec::new();
    for _ in 0..8 {
        script.push(Err(TransportError::Timeout { after_ms: 25_000 }));
    }
    let transport = Arc::new(ScriptedTransport::script(script, Ok(json!({"ok": 1}))));
    let fetcher = RetryFetcher::for_key(client(transport.clone()), RequestKey::new("index"));

    let snapshot = fetcher.settled().await;

    assert_eq!(snapshot.data, Some(json!({"ok": 1})));
    assert_eq!(transport.calls(), 9);
    assert_eq!(fetcher.state().error_count, 0);
}

#[tokio::test(start_paused = true)]
async fn result_for_previous_key_is_discarded() {
    let transport = Arc::new(
        ScriptedTransport::new(|key, _| Ok(json!({"path": key.path()})))
            .with_delay(Duration::from_secs(1)),
    );
    let fetcher = RetryFetcher::new(client(transport.clone()));

    fetcher.set_key(Some(RequestKey::new("provider/a")));
    tokio::time::sleep(Duration::from_millis(10)).await;
    fetcher.set_key(Some(RequestKey::new("provider/b")));

    let snapshot = fetcher.settled().await;
    assert_eq!(snapshot.data, Some(json!({"path": "provider/b"})));

    // Let the first call settle too; it must not overwrite anything.
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(fetcher.snapshot().data, Some(json!({"path": "provider/b"})));
    assert_eq!(transport.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn key_change_resets_counters() {
    let transport = Arc::new(ScriptedTransport::new(|key, _| {
        if key.path() == "empty" {
            Ok(json!({}))
        } else {
            Ok(json!({"v": 1}))
        }
    }));
    let fetcher = RetryFetcher::new(client(transport.clone()));

    fetcher.set_key(Some(RequestKey::new("empty")));
    tokio::time::sleep(Duration::from_millis(350)).await;
    assert!(fetcher.state().retry_count > 0);

    fetcher.set_key(Some(RequestKey::new("full")));
    let snapshot = fetcher.settled().await;
    assert_eq!(snapshot.data, Some(json!({"v": 1})));
    let state = fetcher.state();
    assert_eq!(state.retry_count, 0);
    assert_eq!(state.retry_delay, Duration::from_millis(100));
}

#[tokio::test(start_paused = true)]
async fn same_key_is_noop() {
    let transport = Arc::new(ScriptedTransport::always(Ok(json!({"v": 1}))));
    let fetcher = RetryFetcher::for_key(client(transport.clone()), RequestKey::new("index"));
    fetcher.settled().await;
    let generation = fetcher.state().generation;

    fetcher.set_key(Some(RequestKey::new("index")));

    assert_eq!(fetcher.state().generation, generation);
    assert_eq!(transport.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn empty_poll_after_success_keeps_data() {
    let transport = Arc::new(ScriptedTransport::script(
        vec![Ok(json!({"v": 1}))],
        Ok(json!({})),
    ));
    let client = client(transport.clone());
    let key = RequestKey::new("index");
    let fetcher = RetryFetcher::for_key(client.clone(), key.clone());
    fetcher.settled().await;

    client.invalidate(&key).await.unwrap();
    let mut updates = fetcher.subscribe();
    fetcher.refresh();
    assert!(fetcher.snapshot().is_validating);
    updates.wait_for(|s| !s.is_validating).await.unwrap();

    assert_eq!(transport.calls(), 2);
    let snapshot = fetcher.snapshot();
    assert_eq!(snapshot.data, Some(json!({"v": 1})));
    assert!(snapshot.error.is_none());
    assert!(!snapshot.loading);
}

#[tokio::test(start_paused = true)]
async fn refresh_after_failure_starts_over() {
    let transport = Arc::new(ScriptedTransport::new(|_, n| {
        if n == 0 {
            Err(http_error(500, "boom"))
        } else {
            Ok(json!({"v": n}))
        }
    }));
    let policy = RetryPolicy::default().with_max_errors(0);
    let fetcher = RetryFetcher::for_key(client_with(transport.clone(), policy), RequestKey::new("index"));

    let failed = fetcher.settled().await;
    assert!(failed.error.is_some());

    fetcher.refresh();
    assert!(fetcher.snapshot().loading);
    let snapshot = fetcher.settled().await;
    assert_eq!(snapshot.data, Some(json!({"v": 1})));
    assert!(snapshot.error.is_none());
}

#[tokio::test(start_paused = true)]
async fn dependency_change_forces_new_cycle() {
    let transport = Arc::new(ScriptedTransport::always(Ok(json!({"v": 1}))));
    let fetcher = RetryFetcher::for_key(client(transport.clone()), RequestKey::new("index"));
    fetcher.settled().await;
    let generation = fetcher.state().generation;

    fetcher.set_dependencies(vec!["2024-01-01".into()]);
    assert_eq!(fetcher.state().generation, generation + 1);
    fetcher.settled().await;

    fetcher.set_dependencies(vec!["2024-01-01".into()]);
    assert_eq!(fetcher.state().generation, generation + 1);
}

#[tokio::test(start_paused = true)]
async fn no_key_means_no_fetch() {
    let transport = Arc::new(ScriptedTransport::always(Ok(json!({"v": 1}))));
    let fetcher = RetryFetcher::new(client(transport.clone()));

    tokio::time::sleep(Duration::from_secs(5)).await;
    let snapshot = fetcher.snapshot();
    assert!(snapshot.loading);
    assert!(snapshot.data.is_none());
    assert_eq!(transport.calls(), 0);

    fetcher.set_key(Some(RequestKey::new("index")));
    fetcher.settled().await;
    fetcher.set_key(None);
    assert_eq!(fetcher.state().phase, FetchPhase::Idle);
    assert!(fetcher.snapshot().loading);
}

#[tokio::test(start_paused = true)]
async fn fetchers_on_same_key_share_calls() {
    let transport = Arc::new(
        ScriptedTransport::always(Ok(json!({"v": 1}))).with_delay(Duration::from_millis(200)),
    );
    let client = client(transport.clone());
    let key = RequestKey::new("index");

    let a = RetryFetcher::for_key(client.clone(), key.clone());
    let b = RetryFetcher::for_key(client.clone(), key);
    let (sa, sb) = tokio::join!(a.settled(), b.settled());

    assert_eq!(sa.data, sb.data);
    assert_eq!(transport.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn dropping_fetcher_cancels_pending_retry() {
    let transport = Arc::new(ScriptedTransport::always(Ok(json!({}))));
    let fetcher = RetryFetcher::for_key(client(transport.clone()), RequestKey::new("index"));

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(transport.calls(), 1);
    assert!(matches!(fetcher.state().phase, FetchPhase::AmbiguousEmpty(1)));

    drop(fetcher);
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(transport.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn recovered_polls_do_not_accumulate_errors() {
    // Every poll hits one failure, then recovers on the re-attempt.
    let transport = Arc::new(ScriptedTransport::new(|_, n| {
        if n % 2 == 1 {
            Err(http_error(500, r#"{"error": "hiccup"}"#))
        } else {
            Ok(json!({"n": n}))
        }
    }));
    let client = client(transport.clone());
    let key = RequestKey::new("index");
    let fetcher = RetryFetcher::for_key(client.clone(), key.clone());
    fetcher.settled().await;

    for poll in 1..=8 {
        client.invalidate(&key).await.unwrap();
        let mut updates = fetcher.subscribe();
        fetcher.refresh();
        updates.wait_for(|s| !s.is_validating).await.unwrap();

        let state = fetcher.state();
        assert_eq!(state.phase, FetchPhase::Succeeded, "poll {poll}");
        assert_eq!(state.error_count, 0);
        assert_eq!(state.retry_count, 0);
        assert_eq!(state.retry_delay, Duration::from_millis(100));
    }

    assert_eq!(transport.calls(), 17);
    let snapshot = fetcher.snapshot();
    assert!(snapshot.error.is_none());
    assert_eq!(snapshot.data, Some(json!({"n": 16})));
}
