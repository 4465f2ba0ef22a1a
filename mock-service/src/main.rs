use metrics_exporter_prometheus::PrometheusBuilder;
use mock_service::prelude::*;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

const DEFAULT_ADDR: &str = "0.0.0.0:3002";
const DEFAULT_LOG_FILTER: &str = "mock_service=info,tower_http=info";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    if let Ok(metrics_addr) = std::env::var("MOCK_METRICS_ADDR") {
        let metrics_addr: SocketAddr = metrics_addr.parse()?;
        PrometheusBuilder::new()
            .with_http_listener(metrics_addr)
            .install()?;
        info!("Serving Prometheus metrics on {metrics_addr}");
    }

    let addr: SocketAddr = std::env::var("MOCK_ADDR")
        .unwrap_or_else(|_| DEFAULT_ADDR.to_string())
        .parse()?;
    let config = MockConfig::from_env();
    info!("Fault injection: {config:?}");

    tokio::spawn(tps_measure_task());

    let listener = TcpListener::bind(addr).await?;
    run(listener, config).await?;
    Ok(())
}
