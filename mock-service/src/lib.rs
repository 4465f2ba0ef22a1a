use axum::{
    debug_handler,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use metrics::{counter, gauge};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::num::NonZeroU32;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, PoisonError, RwLock,
};
use std::time::{Duration, SystemTime};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

pub mod prelude {
    pub use crate::{router, run, tps_measure_task, MockConfig, NewItem, StoredItem};
}

const DEFAULT_LATENCY_MS: u64 = 800;
const DEFAULT_WRONG_ID_PROBABILITY: u32 = 50;

/// Fault injection and seeding for the mock items service.
#[derive(Debug, Clone, Default)]
pub struct MockConfig {
    /// Delay added to every request.
    pub latency: Option<Duration>,
    /// Percentage (0-100) of `GET /items/:id` requests whose id is swapped for one that does not
    /// exist.
    pub wrong_id_probability: Option<u32>,
    /// Requests beyond this rate fail as throttled.
    pub throttle_tps: Option<NonZeroU32>,
    /// Content reads and writes fail as `AccessDenied`.
    pub simulate_access_errors: bool,
    /// Pre-populate ids `1..=seed_items`.
    pub seed_items: usize,
}

impl MockConfig {
    /// Read `INJECT_LATENCY`/`LATENCY_AMOUNT`, `INJECT_WRONG_IDS`/`WRONG_ID_PROBABILITY`,
    /// `THROTTLE_TPS`, `SIMULATE_S3_ACCESS_ERRORS` and `SEED_ITEMS`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let flag = |key: &str| lookup(key).is_some_and(|v| v == "true");
        let number = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());

        Self {
            latency: flag("INJECT_LATENCY").then(|| {
                Duration::from_millis(number("LATENCY_AMOUNT").unwrap_or(DEFAULT_LATENCY_MS))
            }),
            wrong_id_probability: flag("INJECT_WRONG_IDS").then(|| {
                number("WRONG_ID_PROBABILITY")
                    .map(|p| p.min(100) as u32)
                    .unwrap_or(DEFAULT_WRONG_ID_PROBABILITY)
            }),
            throttle_tps: number("THROTTLE_TPS")
                .and_then(|tps| u32::try_from(tps).ok())
                .and_then(NonZeroU32::new),
            simulate_access_errors: flag("SIMULATE_S3_ACCESS_ERRORS"),
            seed_items: number("SEED_ITEMS").unwrap_or(0) as usize,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredItem {
    pub id: String,
    pub name: String,
    pub s3_key: String,
    pub content: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewItem {
    pub id: Option<String>,
    pub name: String,
    pub content: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PutResponse {
    id: String,
    name: String,
    s3_key: String,
    success: bool,
}

pub async fn run(listener: TcpListener, config: MockConfig) -> std::io::Result<()> {
    info!("Mock items service listening on {}", listener.local_addr()?);
    axum::serve(listener, router(config)).await
}

pub fn router(config: MockConfig) -> Router {
    let state = Arc::new(AppState::new(config));
    Router::new()
        .route("/items", get(list_items).post(put_item))
        .route("/items/:id", get(get_item))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

struct AppState {
    items: RwLock<BTreeMap<String, StoredItem>>,
    throttle: Option<DefaultDirectRateLimiter>,
    config: MockConfig,
}

impl AppState {
    fn new(config: MockConfig) -> Self {
        let items = (1..=config.seed_items)
            .map(|n| {
                let item = stored_item(n.to_string(), format!("item{n}"), None);
                (item.id.clone(), item)
            })
            .collect();

        Self {
            items: RwLock::new(items),
            throttle: config.throttle_tps.map(rate_limiter),
            config,
        }
    }

    async fn before_request(&self, route: &'static str) -> Result<(), ApiError> {
        TPS_MEASURE.fetch_add(1, Ordering::Relaxed);
        counter!("mock-server.requests", "route" => route).increment(1);

        if let Some(latency) = self.config.latency {
            debug!("Injecting {latency:?} latency");
            tokio::time::sleep(latency).await;
        }

        if let Some(limiter) = &self.throttle {
            if limiter.check().is_err() {
                counter!("mock-server.throttled", "route" => route).increment(1);
                return Err(ApiError::Throttled);
            }
        }

        Ok(())
    }

    /// Content lives next to the item record under its `s3Key`; touching it fails when access
    /// errors are simulated.
    fn access_content(&self, item: &StoredItem, op: &'static str) -> Result<(), ApiError> {
        if self.config.simulate_access_errors {
            counter!("mock-server.access_denied", "op" => op).increment(1);
            debug!("Simulating access error on {op} of {}", item.s3_key);
            return Err(ApiError::AccessDenied(item.s3_key.clone()));
        }
        Ok(())
    }

    fn maybe_wrong_id(&self, id: String) -> String {
        match self.config.wrong_id_probability {
            Some(p) if rand::thread_rng().gen_range(0..100) < p => {
                let wrong = wrong_id(&id);
                debug!("Injecting wrong id: original={id}, wrong={wrong}");
                wrong
            }
            _ => id,
        }
    }
}

#[debug_handler]
async fn list_items(State(state): State<Arc<AppState>>) -> Result<Json<Vec<StoredItem>>, ApiError> {
    state.before_request("list_items").await?;
    let items = state
        .items
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .values()
        .cloned()
        .collect();
    Ok(Json(items))
}

#[debug_handler]
async fn get_item(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<StoredItem>, ApiError> {
    let id = state.maybe_wrong_id(id);
    state.before_request("get_item").await?;

    let item = state
        .items
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(&id)
        .cloned()
        .ok_or(ApiError::NotFound(id))?;

    state.access_content(&item, "read")?;
    Ok(Json(item))
}

#[debug_handler]
async fn put_item(
    State(state): State<Arc<AppState>>,
    Json(new): Json<NewItem>,
) -> Result<Json<PutResponse>, ApiError> {
    state.before_request("put_item").await?;

    let id = new
        .id
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let item = stored_item(id, new.name, new.content);
    state.access_content(&item, "write")?;
    let response = PutResponse {
        id: item.id.clone(),
        name: item.name.clone(),
        s3_key: item.s3_key.clone(),
        success: true,
    };

    state
        .items
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(item.id.clone(), item);
    Ok(Json(response))
}

#[derive(Debug)]
enum ApiError {
    NotFound(String),
    Throttled,
    AccessDenied(String),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    message: String,
    error_type: &'static str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            ApiError::NotFound(id) => (
                StatusCode::NOT_FOUND,
                "NotFound",
                format!("Item with ID {id} not found"),
            ),
            ApiError::Throttled => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "ProvisionedThroughputExceededException",
                "Rate of requests exceeds the allowed throughput".to_string(),
            ),
            ApiError::AccessDenied(key) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "AccessDenied",
                format!("Access Denied for content {key}"),
            ),
        };
        (
            status,
            Json(ErrorBody {
                message,
                error_type,
            }),
        )
            .into_response()
    }
}

/** Utils **/

fn stored_item(id: String, name: String, content: Option<String>) -> StoredItem {
    let content = content.unwrap_or_else(|| format!("Default content for {name}"));
    StoredItem {
        s3_key: format!("items/{id}.json"),
        id,
        name,
        content,
        created_at: humantime::format_rfc3339_millis(SystemTime::now()).to_string(),
    }
}

/// A `wrong-xxxxxxxx` id that is never equal to `original`.
fn wrong_id(original: &str) -> String {
    let mut rng = rand::thread_rng();
    loop {
        let suffix: String = (0..8)
            .map(|_| char::from(rng.sample(Alphanumeric)).to_ascii_lowercase())
            .collect();
        let candidate = format!("wrong-{suffix}");
        if candidate != original {
            return candidate;
        }
    }
}

pub fn rate_limiter(tps: NonZeroU32) -> DefaultDirectRateLimiter {
    RateLimiter::direct(Quota::per_second(tps))
}

/** TPS Printer **/

static TPS_MEASURE: AtomicU64 = AtomicU64::new(0);

pub async fn tps_measure_task() {
    loop {
        tokio::time::sleep(Duration::from_millis(1000)).await;
        let transactions = TPS_MEASURE.swap(0, Ordering::Relaxed);
        info!("{transactions} TPS");
        gauge!("mock-server.tps").set(transactions as f64);
    }
}
