use crate::item::{self, Item};
use loadgen::prelude::*;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use reqwest::header::{HeaderValue, CONTENT_TYPE};
use std::time::Duration;
use tracing::trace;

pub const MIN_WAIT: Duration = Duration::from_secs(1);
pub const MAX_WAIT: Duration = Duration::from_secs(5);

/// A client of the items API
///
/// Lists items most of the time, reads a random id less often, and occasionally creates an item.
pub struct ApiUser {
    client: HttpClient,
    rng: SmallRng,
}

impl User for ApiUser {
    fn new(client: HttpClient) -> Self {
        Self {
            client,
            rng: SmallRng::from_entropy(),
        }
    }

    async fn on_start(&mut self) {
        self.client
            .set_header(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        trace!("Session headers: {:?}", self.client.headers());
    }

    fn wait_time() -> WaitTime {
        WaitTime::between(MIN_WAIT, MAX_WAIT)
    }

    fn tasks() -> Vec<Task<Self>> {
        vec![list_items(), get_item_by_id(), create_item()]
    }
}

#[task(weight = 3)]
async fn list_items(user: &mut ApiUser) -> TaskResult {
    user.client.get("/items").send().await?;
    Ok(())
}

// NOTE: Ids are not tracked from `create_item`, so most of these reads are expected to 404.
#[task(weight = 2)]
async fn get_item_by_id(user: &mut ApiUser) -> TaskResult {
    let id = item::random_read_id(&mut user.rng);
    user.client
        .get(&format!("/items/{id}"))
        .name("/items/[id]")
        .send()
        .await?;
    Ok(())
}

#[task(weight = 1)]
async fn create_item(user: &mut ApiUser) -> TaskResult {
    let item = Item::random(&mut user.rng);
    user.client.post("/items").json(&item).send().await?;
    Ok(())
}
