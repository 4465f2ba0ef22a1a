mod utils;
#[allow(unused)]
use utils::*;

#[cfg(feature = "integration")]
mod tests {
    use super::*;
    use items_load::ApiUser;
    use loadgen::prelude::*;
    use mock_service::MockConfig;
    use std::time::Duration;

    #[tokio::test(flavor = "multi_thread")]
    #[ntest::timeout(30_000)]
    async fn items_profile_against_mock() -> anyhow::Result<()> {
        init();
        let addr = start_mock(MockConfig {
            seed_items: 50,
            ..Default::default()
        })
        .await;

        let config = SwarmConfig::new(&host(addr))?
            .users(30)
            .spawn_rate(30)
            .run_time(Duration::from_secs(10))
            .stats_interval(Duration::from_secs(2));
        let stats = Swarm::<ApiUser>::new(config)?.run().await?;
        println!("{stats}");

        assert_eq!(stats.users, 30);

        let list = stats.request("GET", "/items").unwrap();
        assert!(list.success > 0);
        assert_eq!(list.failure, 0);

        // Only ids 1..=50 exist, so roughly half of these reads miss.
        let read = stats.request("GET", "/items/[id]").unwrap();
        assert!(read.total() > 0);

        let create = stats.request("POST", "/items").unwrap();
        assert!(create.success > 0);
        assert_eq!(create.failure, 0);

        let lists = stats.task_executions("list_items").unwrap();
        let creates = stats.task_executions("create_item").unwrap();
        assert!(lists > creates, "{stats}");
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    #[ntest::timeout(30_000)]
    async fn items_profile_under_injected_faults() -> anyhow::Result<()> {
        init();
        let addr = start_mock(MockConfig {
            seed_items: 100,
            wrong_id_probability: Some(100),
            latency: Some(Duration::from_millis(50)),
            ..Default::default()
        })
        .await;

        let config = SwarmConfig::new(&host(addr))?
            .users(30)
            .spawn_rate(30)
            .run_time(Duration::from_secs(10));
        let stats = Swarm::<ApiUser>::new(config)?.run().await?;

        let read = stats.request("GET", "/items/[id]").unwrap();
        assert_eq!(read.success, 0, "{stats}");
        assert!(read.failure > 0);

        let list = stats.request("GET", "/items").unwrap();
        assert!(list.latency_p50 >= Duration::from_millis(50), "{stats}");
        Ok(())
    }
}
