mod utils;
#[allow(unused)]
use utils::*;

use loadgen::prelude::*;
use loadgen::TaskError;
use mock_service::MockConfig;
use reqwest::header::{HeaderValue, CONTENT_TYPE};
use reqwest::StatusCode;
use std::num::NonZeroU32;
use std::time::Duration;

/// Lists items three times as often as it creates them, with almost no think-time.
struct EagerUser {
    client: HttpClient,
    created: usize,
}

impl User for EagerUser {
    fn new(client: HttpClient) -> Self {
        Self { client, created: 0 }
    }

    async fn on_start(&mut self) {
        self.client
            .set_header(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    }

    fn wait_time() -> WaitTime {
        WaitTime::constant(Duration::from_millis(10))
    }

    fn tasks() -> Vec<Task<Self>> {
        vec![list(), create()]
    }
}

#[task(weight = 3)]
async fn list(user: &mut EagerUser) -> TaskResult {
    let res = user.client.get("/items").send().await?;
    if !res.status().is_success() {
        return Err(TaskError::Custom(format!("unexpected {}", res.status())));
    }
    Ok(())
}

#[task]
async fn create(user: &mut EagerUser) -> TaskResult {
    user.created += 1;
    let body = serde_json::json!({"name": format!("eager{}", user.created)});
    user.client.post("/items").json(&body).send().await?;
    Ok(())
}

fn config(addr: std::net::SocketAddr) -> anyhow::Result<SwarmConfig> {
    Ok(SwarmConfig::new(&host(addr))?
        .users(4)
        .spawn_rate(100)
        .run_time(Duration::from_secs(2))
        .stats_interval(Duration::from_millis(500)))
}

#[tokio::test(flavor = "multi_thread")]
#[ntest::timeout(10_000)]
async fn eager_users_follow_weights() -> anyhow::Result<()> {
    let metrics = init();
    let addr = start_mock(MockConfig::default()).await;

    let stats = Swarm::<EagerUser>::new(config(addr)?)?.run().await?;

    assert_eq!(stats.users, 4);
    assert_eq!(stats.total_failures(), 0, "{stats}");

    let lists = stats.task_executions("list").unwrap();
    let creates = stats.task_executions("create").unwrap();
    assert!(creates > 10, "{stats}");
    assert!(lists > creates * 2, "{stats}");

    let get = stats.request("GET", "/items").unwrap();
    let post = stats.request("POST", "/items").unwrap();
    // A task counts as executed before its request completes.
    assert!(get.success <= lists && get.success + 4 >= lists, "{stats}");
    assert!(post.success > 0);
    assert!(post.latency_p99 >= post.latency_p50);

    let rendered = metrics.render();
    assert!(rendered.contains("loadgen_requests_success"), "{rendered}");
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
#[ntest::timeout(10_000)]
async fn throttled_requests_are_failures() -> anyhow::Result<()> {
    init();
    let addr = start_mock(MockConfig {
        throttle_tps: NonZeroU32::new(5),
        ..Default::default()
    })
    .await;

    let stats = Swarm::<EagerUser>::new(config(addr)?)?.run().await?;

    let get = stats.request("GET", "/items").unwrap();
    assert!(get.success > 0, "{stats}");
    assert!(get.failure > get.success, "{stats}");
    Ok(())
}

#[tokio::test]
async fn request_error_carries_status() -> anyhow::Result<()> {
    init();
    let addr = start_mock(MockConfig::default()).await;
    let client = HttpClient::new(reqwest::Client::new(), host(addr).parse()?);

    let err = client
        .get("/items/404")
        .name("/items/[id]")
        .send()
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
    assert!(err.to_string().contains("/items/[id]"), "{err}");
    Ok(())
}
