//! # Request/Response Flows
//!
//! ```text
//! Shell ──request(echo)──→ Router ──→ Content inbox
//!   ↑                                     │ on_request handler
//!   └──── ReplyFuture ←── Correlator ←── response
//! ```
//!
//! Covers round trips, verbatim handler errors, fast failure for unknown
//! destinations, timeouts and at-most-once settlement.

#[cfg(test)]
mod tests {
    use crate::integration::fixtures::{host, window};
    use serde_json::{json, Value};
    use shared_bus::RequestOptions;
    use shared_types::{RequestError, SurfaceId};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::Instant;

    #[tokio::test]
    async fn test_echo_round_trip() {
        let host = host();
        let shell = window(&host, SurfaceId::Shell);
        let content = window(&host, SurfaceId::Content);
        let _echo = content.on_request("echo", |payload, _from| async move {
            Ok::<_, String>(payload)
        });

        let reply = shell
            .request(SurfaceId::Content, "echo", json!({"v": 1}), RequestOptions::default())
            .await;
        assert_eq!(reply, Ok(json!({"v": 1})));

        let snapshot = host.snapshot();
        assert_eq!(snapshot.pending_requests, 0);
        assert_eq!(snapshot.active_timers, 0);
    }

    #[tokio::test]
    async fn test_concurrent_requests_resolve_independently() {
        let host = host();
        let shell = window(&host, SurfaceId::Shell);
        let content = window(&host, SurfaceId::Content);
        let _double = content.on_request("double", |payload: Value, _from| async move {
            let n = payload.as_i64().ok_or("not a number")?;
            Ok::<_, &str>(json!(n * 2))
        });

        let replies: Vec<_> = (0..25)
            .map(|i| {
                shell.request(SurfaceId::Content, "double", json!(i), RequestOptions::default())
            })
            .collect();
        let results = futures::future::join_all(replies).await;

        for (i, result) in results.into_iter().enumerate() {
            assert_eq!(result.unwrap(), json!(i as i64 * 2));
        }
        assert_eq!(host.snapshot().requests_resolved, 25);
    }

    #[tokio::test]
    async fn test_handler_error_is_verbatim() {
        let host = host();
        let shell = window(&host, SurfaceId::Shell);
        let content = window(&host, SurfaceId::Content);
        let _double = content.on_request("double", |payload: Value, _from| async move {
            let n = payload.as_i64().ok_or("not a number")?;
            Ok::<_, &str>(json!(n * 2))
        });

        let err = shell
            .request(SurfaceId::Content, "double", json!("x"), RequestOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err, RequestError::Handler("not a number".into()));
        assert_eq!(err.to_string(), "not a number");
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_destination_fails_immediately() {
        let host = host();
        let shell = window(&host, SurfaceId::Shell);

        let started = Instant::now();
        let err = shell
            .request(SurfaceId::Settings, "settings.get", Value::Null, RequestOptions::default())
            .await
            .unwrap_err();

        assert_eq!(err, RequestError::DestinationUnavailable { to: SurfaceId::Settings });
        assert_eq!(started.elapsed(), Duration::ZERO);
        assert_eq!(host.snapshot().active_timers, 0);
        assert_eq!(host.snapshot().requests_issued, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_fires_after_bound() {
        let host = host();
        let shell = window(&host, SurfaceId::Shell);
        let _content = window(&host, SurfaceId::Content);

        let started = Instant::now();
        let err = shell
            .request(
                SurfaceId::Content,
                "never-answered",
                Value::Null,
                RequestOptions::with_timeout(Duration::from_millis(100)),
            )
            .await
            .unwrap_err();
        let waited = started.elapsed();

        assert!(err.is_timeout());
        assert!(waited >= Duration::from_millis(100));
        assert!(waited < Duration::from_millis(110));
        assert_eq!(host.snapshot().requests_timed_out, 1);
        assert_eq!(host.snapshot().pending_requests, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_handler_settles_once() {
        let host = host();
        let shell = window(&host, SurfaceId::Shell);
        let content = window(&host, SurfaceId::Content);

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let _slow = content.on_request("slow", move |_payload, _from| {
            counter.fetch_add(1, Ordering::SeqCst);
            async move {
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok::<_, String>(json!("late"))
            }
        });

        let err = shell
            .request(
                SurfaceId::Content,
                "slow",
                Value::Null,
                RequestOptions::with_timeout(Duration::from_millis(100)),
            )
            .await
            .unwrap_err();
        assert!(err.is_timeout());

        // Let the handler finish; its response finds nothing to settle
        tokio::time::sleep(Duration::from_millis(200)).await;
        let snapshot = host.snapshot();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(snapshot.requests_timed_out, 1);
        assert_eq!(snapshot.requests_resolved, 0);
        assert_eq!(snapshot.unmatched_responses, 1);
    }

    #[tokio::test]
    async fn test_configured_timeout_is_default() {
        let host = crate::integration::fixtures::host_with(shared_bus::BusConfig {
            request_timeout_ms: 1234,
            ..Default::default()
        });
        assert_eq!(
            host.router().correlator().default_timeout(),
            Duration::from_millis(1234)
        );
    }

    #[tokio::test]
    async fn test_unhandled_request_rejected_when_configured() {
        let host = crate::integration::fixtures::host_with(shared_bus::BusConfig {
            reject_unhandled_requests: true,
            ..Default::default()
        });
        let shell = window(&host, SurfaceId::Shell);
        let _content = window(&host, SurfaceId::Content);

        let err = shell
            .request(SurfaceId::Content, "missing", Value::Null, RequestOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, RequestError::Handler(message) if message.contains("missing")));
    }
}
