use items_load::ApiUser;
use loadgen::{Swarm, SwarmConfig};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

const DEFAULT_LOG_FILTER: &str = "items_load=info,loadgen=info";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let config = SwarmConfig::from_args()?;
    let stats = Swarm::<ApiUser>::new(config)?.run().await?;

    println!("{stats}");
    Ok(())
}
