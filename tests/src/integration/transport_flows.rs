//! # Transport Flows
//!
//! The router only depends on the `Transport` trait, so a different
//! delivery mechanism plugs in without router or correlator changes.
//! Also covers envelopes arriving as JSON from a surface.

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;
    use serde_json::{json, Value};
    use shared_bus::{
        Correlator, HandleId, RouteOutcome, Router, SurfaceHandle, SurfaceKind, SurfaceRegistry,
        Transport,
    };
    use shared_types::{Envelope, MessageKind, RequestError, SurfaceId};
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::time::Duration;

    /// Records deliveries; handles in `dead` reject them.
    #[derive(Default)]
    struct RecordingTransport {
        delivered: Mutex<Vec<(HandleId, String, Envelope)>>,
        dead: Mutex<HashSet<HandleId>>,
    }

    impl Transport for RecordingTransport {
        fn deliver(&self, handle: &SurfaceHandle, channel: &str, envelope: &Envelope) -> bool {
            if self.dead.lock().contains(&handle.id()) {
                return false;
            }
            self.delivered
                .lock()
                .push((handle.id(), channel.to_string(), envelope.clone()));
            true
        }
    }

    fn router(transport: Arc<RecordingTransport>) -> Router {
        let registry = Arc::new(SurfaceRegistry::new());
        for (raw, id) in SurfaceId::all().into_iter().enumerate() {
            let handle = SurfaceHandle::new(HandleId::new(raw as u64 + 1), SurfaceKind::Window);
            registry.register(id, handle).unwrap();
        }
        Router::new(
            registry,
            transport,
            Arc::new(Correlator::new(Duration::from_secs(30))),
        )
    }

    #[tokio::test]
    async fn test_custom_transport_round_trip() {
        let transport = Arc::new(RecordingTransport::default());
        let router = router(Arc::clone(&transport));

        let reply = router.dispatch_request(
            SurfaceId::Shell,
            SurfaceId::Content,
            "echo",
            json!({"v": 1}),
            None,
        );

        let request = transport.delivered.lock()[0].2.clone();
        assert_eq!(request.kind, MessageKind::Request);

        // The remote side answers over the wire
        let wire = Envelope::response(
            SurfaceId::Content,
            SurfaceId::Shell,
            "echo",
            request.correlation_id.unwrap(),
            Ok(request.payload),
        )
        .to_json()
        .unwrap();
        let response = Envelope::from_json(&wire).unwrap();

        assert_eq!(router.route_inbound(response), RouteOutcome::Settled);
        assert_eq!(reply.await, Ok(json!({"v": 1})));
    }

    #[tokio::test]
    async fn test_dead_handle_marks_surface_stale() {
        let transport = Arc::new(RecordingTransport::default());
        let router = router(Arc::clone(&transport));
        transport.dead.lock().insert(HandleId::new(3));

        assert_eq!(router.broadcast_except(SurfaceId::Shell, "x", Value::Null), 1);
        assert_eq!(router.registry().live_ids(), vec![SurfaceId::Shell, SurfaceId::Content]);

        let err = router
            .dispatch_request(SurfaceId::Shell, SurfaceId::Settings, "x", Value::Null, None)
            .await
            .unwrap_err();
        assert_eq!(err, RequestError::DestinationUnavailable { to: SurfaceId::Settings });
    }

    #[tokio::test]
    async fn test_wire_error_response() {
        let transport = Arc::new(RecordingTransport::default());
        let router = router(Arc::clone(&transport));

        let reply =
            router.dispatch_request(SurfaceId::Settings, SurfaceId::Shell, "x", Value::Null, None);
        let correlation_id = reply.correlation_id().unwrap();

        let wire = format!(
            r#"{{"kind":"response","from":"shell","to":"settings","channel":"x","correlationId":"{correlation_id}","error":"disk full"}}"#
        );
        let response = Envelope::from_json(&wire).unwrap();
        assert_eq!(router.route_inbound(response), RouteOutcome::Settled);
        assert_eq!(reply.await, Err(RequestError::Handler("disk full".into())));
    }

    #[test]
    fn test_inbound_broadcast_json() {
        let transport = Arc::new(RecordingTransport::default());
        let router = router(Arc::clone(&transport));

        let json = r#"{"kind":"broadcast","from":"content","channel":"unread","payload":4}"#;
        let envelope = Envelope::from_json(json).unwrap();
        assert_eq!(router.route_inbound(envelope), RouteOutcome::Delivered { count: 2 });

        let delivered = transport.delivered.lock();
        let targets: Vec<_> = delivered.iter().map(|(h, _, _)| h.raw()).collect();
        assert_eq!(targets, vec![1, 3]);
    }
}
