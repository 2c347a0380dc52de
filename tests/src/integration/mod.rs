//! Integration flows.

pub mod broadcast_flows;
pub mod lifecycle_flows;
pub mod request_flows;
pub mod transport_flows;

#[cfg(test)]
pub(crate) mod fixtures {
    use shared_bus::{BusConfig, SurfaceEndpoint, SurfaceHost, SurfaceKind};
    use shared_types::SurfaceId;
    use std::sync::Arc;

    /// Host with default configuration.
    pub fn host() -> Arc<SurfaceHost> {
        host_with(BusConfig::default())
    }

    pub fn host_with(config: BusConfig) -> Arc<SurfaceHost> {
        Arc::new(SurfaceHost::new(config).expect("valid config"))
    }

    /// Open `id` as a top-level window.
    pub fn window(host: &SurfaceHost, id: SurfaceId) -> SurfaceEndpoint {
        host.open_surface(id, SurfaceKind::Window).expect("surface opens")
    }

    /// Open shell, content (embedded) and settings.
    pub fn all_surfaces(host: &SurfaceHost) -> [SurfaceEndpoint; 3] {
        let shell = window(host, SurfaceId::Shell);
        let content = host
            .open_surface(
                SurfaceId::Content,
                SurfaceKind::EmbeddedView {
                    host: SurfaceId::Shell,
                },
            )
            .expect("surface opens");
        let settings = window(host, SurfaceId::Settings);
        [shell, content, settings]
    }
}
