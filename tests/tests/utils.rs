use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use mock_service::MockConfig;
use std::net::SocketAddr;
use std::sync::OnceLock;
use tokio::net::TcpListener;

/// Installs logging and the Prometheus recorder once per test binary.
#[allow(unused)]
pub fn init() -> &'static PrometheusHandle {
    static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

    HANDLE.get_or_init(|| {
        let _ = tracing_subscriber::FmtSubscriber::builder()
            .with_env_filter("loadgen=debug,items_load=debug,mock_service=debug,axum::rejection=trace")
            .try_init();

        PrometheusBuilder::new()
            .install_recorder()
            .expect("Prometheus recorder installs once per process")
    })
}

/// Serves a fresh mock items service on an ephemeral local port.
#[allow(unused)]
pub async fn start_mock(config: MockConfig) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        if let Err(err) = mock_service::run(listener, config).await {
            tracing::error!("Mock service stopped: {err}");
        }
    });
    addr
}

#[allow(unused)]
pub fn host(addr: SocketAddr) -> String {
    format!("http://{addr}")
}
