use crate::stats::{RequestKey, StatsRegistry};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::{trace, warn};

/// Transaction hook used by [`HttpClient`](crate::HttpClient) to record every request. May also
/// be used directly to record a non-HTTP action under a custom key.
pub async fn transaction_hook<F, R, E>(key: RequestKey, func: F) -> Result<R, E>
where
    F: Future<Output = Result<R, E>>,
{
    if let Ok(registry) = TRANSACTION_HOOK.try_with(|v| v.clone()) {
        let start = Instant::now();
        let res = func.await;
        let elapsed = start.elapsed();

        trace!("{key} took {elapsed:?} (ok={})", res.is_ok());
        registry.record(&key, elapsed, res.is_ok());

        #[cfg(feature = "metrics")]
        {
            let (method, name) = (key.method().to_string(), key.name().to_string());
            metrics::histogram!("loadgen.requests.latency", "method" => method.clone(), "name" => name.clone())
                .record(elapsed.as_secs_f64());
            if res.is_ok() {
                metrics::counter!("loadgen.requests.success", "method" => method, "name" => name)
                    .increment(1);
            } else {
                metrics::counter!("loadgen.requests.failure", "method" => method, "name" => name)
                    .increment(1);
            }
        }

        res
    } else {
        warn!("No transaction hook available; {key} will not be recorded.");
        func.await
    }
}

#[cfg(feature = "metrics")]
pub(crate) fn describe_metrics() {
    use std::sync::Once;

    static DESCRIBE: Once = Once::new();
    DESCRIBE.call_once(|| {
        metrics::describe_histogram!(
            "loadgen.requests.latency",
            metrics::Unit::Seconds,
            "Request latency"
        );
        metrics::describe_counter!(
            "loadgen.requests.success",
            metrics::Unit::Count,
            "Successful requests"
        );
        metrics::describe_counter!(
            "loadgen.requests.failure",
            metrics::Unit::Count,
            "Failed requests"
        );
    });
}

tokio::task_local! {
    pub(crate) static TRANSACTION_HOOK: Arc<StatsRegistry>;
}
