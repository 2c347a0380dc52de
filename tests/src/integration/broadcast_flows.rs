//! # Broadcast Flows
//!
//! Fan-out excludes the sender, host broadcasts reach everyone, stale
//! handles drop out of fan-out and per-destination order is preserved.

#[cfg(test)]
mod tests {
    use crate::integration::fixtures::{all_surfaces, host, window};
    use parking_lot::Mutex;
    use serde_json::json;
    use shared_bus::{SurfaceKind, STATUS_CHANNEL};
    use shared_types::SurfaceId;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::timeout;
    use tokio_stream::StreamExt;

    const WAIT: Duration = Duration::from_millis(200);

    #[tokio::test]
    async fn test_broadcast_excludes_sender() {
        let host = host();
        let [shell, content, settings] = all_surfaces(&host);

        let mut at_shell = shell.messages("theme");
        let mut at_content = content.messages("theme");
        let mut at_settings = settings.messages("theme");

        assert_eq!(settings.broadcast("theme", json!("dark")), 2);

        let a = timeout(WAIT, at_shell.next()).await.unwrap().unwrap();
        let b = timeout(WAIT, at_content.next()).await.unwrap().unwrap();
        assert_eq!(a.from, SurfaceId::Settings);
        assert_eq!(b.payload, json!("dark"));

        assert!(timeout(Duration::from_millis(50), at_settings.next()).await.is_err());
    }

    #[tokio::test]
    async fn test_host_broadcast_reaches_all() {
        let host = host();
        let surfaces = all_surfaces(&host);
        let mut streams: Vec<_> = surfaces.iter().map(|s| s.messages(STATUS_CHANNEL)).collect();

        let status = json!({"activeSurfaces": ["shell", "content", "settings"]});
        let delivered = host.router().broadcast_all(STATUS_CHANNEL, status);
        assert_eq!(delivered, 3);

        for stream in &mut streams {
            let message = timeout(WAIT, stream.next()).await.unwrap().unwrap();
            assert_eq!(message.from, SurfaceId::Host);
        }
    }

    #[tokio::test]
    async fn test_stale_handle_excluded_from_fan_out() {
        let host = host();
        let shell = window(&host, SurfaceId::Shell);
        let settings = window(&host, SurfaceId::Settings);

        // Content whose inbox is gone without a destroy notification
        let (handle, inbox) = host.transport().attach(SurfaceKind::EmbeddedView {
            host: SurfaceId::Shell,
        });
        host.on_surface_created(SurfaceId::Content, handle).unwrap();
        drop(inbox);

        let mut at_shell = shell.messages("unread");
        assert_eq!(settings.broadcast("unread", json!(5)), 1);
        assert!(!host.router().registry().is_ready(SurfaceId::Content));
        assert_eq!(host.snapshot().live_surfaces, vec![SurfaceId::Shell, SurfaceId::Settings]);

        // The stale handle is no longer attempted
        let failed = host.snapshot().failed_deliveries;
        assert_eq!(settings.broadcast("unread", json!(6)), 1);
        assert_eq!(host.snapshot().failed_deliveries, failed);

        assert_eq!(timeout(WAIT, at_shell.next()).await.unwrap().unwrap().payload, json!(5));
        assert_eq!(timeout(WAIT, at_shell.next()).await.unwrap().unwrap().payload, json!(6));
    }

    #[tokio::test]
    async fn test_send_to_stale_surface_reports_false() {
        let host = host();
        let shell = window(&host, SurfaceId::Shell);
        let (handle, inbox) = host.transport().attach(SurfaceKind::Window);
        host.on_surface_created(SurfaceId::Settings, handle).unwrap();
        drop(inbox);

        assert!(!shell.send_to(SurfaceId::Settings, "x", json!(null)));
        assert!(!shell.send_to(SurfaceId::Settings, "x", json!(null)));
    }

    #[tokio::test]
    async fn test_listener_stops_after_unsubscribe() {
        let host = host();
        let shell = window(&host, SurfaceId::Shell);
        let content = window(&host, SurfaceId::Content);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let subscription = content.on_message("unread", move |message| {
            sink.lock().push(message.payload.clone());
        });
        let mut watcher = content.messages("unread");

        shell.send_to(SurfaceId::Content, "unread", json!(1));
        timeout(WAIT, watcher.next()).await.unwrap().unwrap();

        drop(subscription);
        shell.send_to(SurfaceId::Content, "unread", json!(2));
        timeout(WAIT, watcher.next()).await.unwrap().unwrap();

        assert_eq!(*seen.lock(), vec![json!(1)]);
    }

    #[tokio::test]
    async fn test_per_channel_order_to_one_destination() {
        let host = host();
        let shell = window(&host, SurfaceId::Shell);
        let content = window(&host, SurfaceId::Content);

        let seq = content.messages("seq");
        let other = content.messages("other");
        for i in 0..100 {
            shell.send_to(SurfaceId::Content, "seq", json!(i));
            shell.send_to(SurfaceId::Content, "other", json!(-i));
        }

        let received: Vec<_> = timeout(WAIT, seq.take(100).collect::<Vec<_>>()).await.unwrap();
        let order: Vec<_> = received.iter().map(|m| m.payload.as_i64().unwrap()).collect();
        assert_eq!(order, (0..100).collect::<Vec<_>>());

        let others: Vec<_> = timeout(WAIT, other.take(100).collect::<Vec<_>>()).await.unwrap();
        assert_eq!(others.len(), 100);
    }
}
