mod utils;
#[allow(unused)]
use utils::*;

use loadgen::prelude::*;
use mock_service::MockConfig;
use std::time::Duration;

/// Forgets the JSON content type, so every create is rejected.
struct HeaderlessUser {
    client: HttpClient,
}

impl User for HeaderlessUser {
    fn new(client: HttpClient) -> Self {
        Self { client }
    }

    fn wait_time() -> WaitTime {
        WaitTime::constant(Duration::from_millis(20))
    }

    fn tasks() -> Vec<Task<Self>> {
        vec![raw_create()]
    }
}

#[task]
async fn raw_create(user: &mut HeaderlessUser) -> TaskResult {
    user.client
        .post("/items")
        .body(r#"{"id": "1", "name": "abcdefgh"}"#)
        .send()
        .await?;
    Ok(())
}

// Logs are captured by `traced_test`, so this binary skips `init()`.
#[tracing_test::traced_test]
#[tokio::test(flavor = "multi_thread")]
#[ntest::timeout(10_000)]
async fn missing_content_type_is_a_failure() -> anyhow::Result<()> {
    let addr = start_mock(MockConfig::default()).await;

    let config = SwarmConfig::new(&host(addr))?
        .users(2)
        .spawn_rate(100)
        .run_time(Duration::from_secs(1))
        .stats_interval(Duration::from_millis(250));
    let stats = Swarm::<HeaderlessUser>::new(config)?.run().await?;

    let post = stats.request("POST", "/items").unwrap();
    assert_eq!(post.success, 0);
    assert!(post.failure > 0);
    assert_eq!(post.failure_rate(), 1.0);

    assert!(logs_contain("Task failed"));
    assert!(logs_contain("POST /items failed with status 415"));
    Ok(())
}
