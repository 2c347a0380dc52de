//! # Lifecycle Flows
//!
//! Surfaces open, close and re-open; the host broadcasts status and shuts
//! down cleanly with requests in flight.

#[cfg(test)]
mod tests {
    use crate::integration::fixtures::{all_surfaces, host, host_with, window};
    use mesh_host::{HostConfig, MeshRuntime};
    use serde_json::{json, Value};
    use shared_bus::{BusConfig, HostError, RequestOptions, STATUS_CHANNEL};
    use shared_types::{RequestError, SurfaceId};
    use std::time::Duration;
    use tokio::time::timeout;
    use tokio_stream::StreamExt;

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_drains_pending_requests() {
        let host = host();
        let [shell, _content, _settings] = all_surfaces(&host);

        let replies: Vec<_> = [SurfaceId::Content, SurfaceId::Settings, SurfaceId::Content]
            .into_iter()
            .map(|to| {
                shell.request(
                    to,
                    "unanswered",
                    Value::Null,
                    RequestOptions::with_timeout(Duration::from_secs(10)),
                )
            })
            .collect();
        assert_eq!(host.snapshot().active_timers, 3);

        assert_eq!(host.shutdown("closing"), 3);

        let snapshot = host.snapshot();
        assert_eq!(snapshot.pending_requests, 0);
        assert_eq!(snapshot.active_timers, 0);

        for reply in replies {
            assert_eq!(reply.await, Err(RequestError::Cancelled("closing".into())));
        }

        // Past every original deadline: nothing times out afterwards
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(host.snapshot().requests_timed_out, 0);
        assert_eq!(host.snapshot().requests_cancelled, 3);
    }

    #[tokio::test]
    async fn test_requests_after_shutdown_fail_fast() {
        let host = host();
        let [shell, _content, _settings] = all_surfaces(&host);
        host.shutdown("closing");

        let err = shell
            .request(SurfaceId::Content, "echo", Value::Null, RequestOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err, RequestError::DestinationUnavailable { to: SurfaceId::Content });
        assert!(!shell.send_to(SurfaceId::Content, "x", Value::Null));

        let err = host
            .open_surface(SurfaceId::Content, shared_bus::SurfaceKind::Window)
            .unwrap_err();
        assert_eq!(err, HostError::ShutDown);
    }

    #[tokio::test]
    async fn test_recreated_surface_overwrites_binding() {
        let host = host();
        let shell = window(&host, SurfaceId::Shell);
        let first = window(&host, SurfaceId::Settings);
        let _v1 = first.on_request("version", |_p, _f| async { Ok::<_, String>(json!(1)) });

        let second = window(&host, SurfaceId::Settings);
        let _v2 = second.on_request("version", |_p, _f| async { Ok::<_, String>(json!(2)) });

        let reply = shell
            .request(SurfaceId::Settings, "version", Value::Null, RequestOptions::default())
            .await;
        assert_eq!(reply, Ok(json!(2)));
        assert_eq!(host.transport().attached_count(), 2);
    }

    #[tokio::test]
    async fn test_destroyed_surface_not_found() {
        let host = host();
        let shell = window(&host, SurfaceId::Shell);
        let _settings = window(&host, SurfaceId::Settings);

        assert!(host.on_surface_destroyed(SurfaceId::Settings));
        let err = shell
            .request(SurfaceId::Settings, "settings.get", Value::Null, RequestOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Surface settings not found or not ready");
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_ticks_while_surfaces_live() {
        let host = host_with(BusConfig {
            status_interval_ms: Some(30_000),
            ..Default::default()
        });
        let shell = window(&host, SurfaceId::Shell);
        let mut status = shell.messages(STATUS_CHANNEL);
        assert!(host.start_status_broadcast());

        for _ in 0..2 {
            let tick = status.next().await.unwrap();
            assert_eq!(tick.payload["activeSurfaces"], json!(["shell"]));
        }

        host.shutdown("closing");
        assert!(!host.start_status_broadcast());
    }

    #[tokio::test]
    async fn test_runtime_end_to_end() {
        let mut config = HostConfig::default();
        config.layout.open_settings = true;

        let mut runtime = MeshRuntime::new(config).unwrap();
        runtime.start().unwrap();

        let content = runtime.endpoint(SurfaceId::Content).unwrap();
        let mut changes = runtime
            .endpoint(SurfaceId::Shell)
            .unwrap()
            .messages("settings.changed");

        content
            .request(
                SurfaceId::Settings,
                "settings.set",
                json!({"key": "notifications", "value": false}),
                RequestOptions::default(),
            )
            .await
            .unwrap();
        let change = timeout(Duration::from_millis(200), changes.next())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(change.payload["key"], json!("notifications"));

        let value = content
            .request(
                SurfaceId::Settings,
                "settings.get",
                json!({"key": "notifications"}),
                RequestOptions::default(),
            )
            .await
            .unwrap();
        assert_eq!(value, json!(false));

        assert_eq!(runtime.shutdown(shared_bus::SHUTDOWN_REASON), 0);
        assert!(runtime.host().is_shut_down());
    }
}
