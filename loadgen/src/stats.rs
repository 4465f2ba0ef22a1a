use metrics_util::AtomicBucket;
use pdatastructs::tdigest::{TDigest, K1};
use reqwest::Method;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;
use tracing::error;

const TDIGEST_BACKLOG_SIZE: usize = 100;

/// Method plus display name under which a request is aggregated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestKey {
    method: String,
    name: String,
}

impl RequestKey {
    pub fn new(method: &Method, name: impl Into<String>) -> Self {
        Self {
            method: method.as_str().to_string(),
            name: name.into(),
        }
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.name)
    }
}

/// Statistics for a single request key over a whole run.
#[derive(Debug, Clone)]
pub struct RequestStatistics {
    pub key: RequestKey,
    pub success: u64,
    pub failure: u64,
    pub rps: f64,
    pub latency_mean: Duration,
    pub latency_p50: Duration,
    pub latency_p90: Duration,
    pub latency_p99: Duration,
}

impl RequestStatistics {
    pub fn total(&self) -> u64 {
        self.success + self.failure
    }

    pub fn failure_rate(&self) -> f64 {
        if self.total() == 0 {
            0.
        } else {
            self.failure as f64 / self.total() as f64
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskStatistics {
    pub name: &'static str,
    pub executions: u64,
}

/// Statistics for a completed run
#[derive(Debug, Clone)]
pub struct RunStatistics {
    pub elapsed: Duration,
    pub users: usize,
    pub requests: Vec<RequestStatistics>,
    pub tasks: Vec<TaskStatistics>,
}

impl RunStatistics {
    pub fn request(&self, method: &str, name: &str) -> Option<&RequestStatistics> {
        self.requests
            .iter()
            .find(|r| r.key.method() == method && r.key.name() == name)
    }

    pub fn task_executions(&self, name: &str) -> Option<u64> {
        self.tasks
            .iter()
            .find(|t| t.name == name)
            .map(|t| t.executions)
    }

    pub fn total_requests(&self) -> u64 {
        self.requests.iter().map(RequestStatistics::total).sum()
    }

    pub fn total_failures(&self) -> u64 {
        self.requests.iter().map(|r| r.failure).sum()
    }
}

impl fmt::Display for RunStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Ran {} users for {}",
            self.users,
            humantime::format_duration(Duration::from_millis(self.elapsed.as_millis() as u64))
        )?;
        writeln!(
            f,
            "{:<7} {:<28} {:>8} {:>8} {:>9} {:>10} {:>10} {:>10}",
            "Type", "Name", "# reqs", "# fails", "req/s", "p50", "p90", "p99"
        )?;
        for r in &self.requests {
            writeln!(
                f,
                "{:<7} {:<28} {:>8} {:>8} {:>9.2} {:>10} {:>10} {:>10}",
                r.key.method(),
                r.key.name(),
                r.total(),
                r.failure,
                r.rps,
                format_latency(r.latency_p50),
                format_latency(r.latency_p90),
                format_latency(r.latency_p99),
            )?;
        }
        writeln!(
            f,
            "{:<7} {:<28} {:>8} {:>8}",
            "",
            "Aggregated",
            self.total_requests(),
            self.total_failures()
        )?;
        writeln!(f)?;
        writeln!(f, "{:<36} {:>8}", "Task", "# runs")?;
        for t in &self.tasks {
            writeln!(f, "{:<36} {:>8}", t.name, t.executions)?;
        }
        Ok(())
    }
}

fn format_latency(latency: Duration) -> String {
    format!("{}ms", latency.as_millis())
}

/// Request counters shared by every user of a run.
///
/// Success/failure counts and latencies are lock-free to record. Latencies land in an
/// `AtomicBucket` and are folded into the t-digest by [`StatsRegistry::drain`], which the swarm
/// calls on every progress tick, and once more when statistics are collected.
pub(crate) struct StatsRegistry {
    entries: RwLock<HashMap<RequestKey, Arc<RequestEntry>>>,
    task_names: Vec<&'static str>,
    task_counts: Vec<AtomicU64>,
    users: AtomicUsize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct Totals {
    pub requests: u64,
    pub failures: u64,
}

impl StatsRegistry {
    pub fn new(task_names: Vec<&'static str>) -> Self {
        let task_counts = task_names.iter().map(|_| AtomicU64::new(0)).collect();
        Self {
            entries: RwLock::new(HashMap::new()),
            task_names,
            task_counts,
            users: AtomicUsize::new(0),
        }
    }

    pub fn record(&self, key: &RequestKey, latency: Duration, success: bool) {
        let entry = self.entry(key);
        if success {
            entry.success.fetch_add(1, Ordering::Relaxed);
        } else {
            entry.failure.fetch_add(1, Ordering::Relaxed);
        }
        entry.latency.push(latency);
    }

    pub fn record_task(&self, idx: usize) {
        if let Some(count) = self.task_counts.get(idx) {
            count.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn user_spawned(&self) {
        self.users.fetch_add(1, Ordering::Relaxed);
    }

    pub fn users(&self) -> usize {
        self.users.load(Ordering::Relaxed)
    }

    pub fn totals(&self) -> Totals {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.values().fold(Totals::default(), |acc, entry| {
            let success = entry.success.load(Ordering::Relaxed);
            let failure = entry.failure.load(Ordering::Relaxed);
            Totals {
                requests: acc.requests + success + failure,
                failures: acc.failures + failure,
            }
        })
    }

    /// Move buffered latencies into each key's digest.
    pub fn drain(&self) {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        for entry in entries.values() {
            entry.drain();
        }
    }

    #[cfg(test)]
    pub fn buffered_latencies(&self) -> usize {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.values().map(|entry| entry.latency.data().len()).sum()
    }

    pub fn collect(&self, elapsed: Duration) -> RunStatistics {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let mut requests: Vec<_> = entries
            .iter()
            .map(|(key, entry)| entry.collect(key.clone(), elapsed))
            .collect();
        requests.sort_by(|a, b| a.key.cmp(&b.key));

        let tasks = self
            .task_names
            .iter()
            .zip(&self.task_counts)
            .map(|(name, count)| TaskStatistics {
                name: *name,
                executions: count.load(Ordering::Relaxed),
            })
            .collect();

        RunStatistics {
            elapsed,
            users: self.users(),
            requests,
            tasks,
        }
    }

    fn entry(&self, key: &RequestKey) -> Arc<RequestEntry> {
        {
            let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(entry) = entries.get(key) {
                return entry.clone();
            }
        }

        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key.clone())
            .or_insert_with(|| Arc::new(RequestEntry::new()))
            .clone()
    }
}

struct RequestEntry {
    success: AtomicU64,
    failure: AtomicU64,
    latency: AtomicBucket<Duration>,
    digest: Mutex<LatencyDigest>,
}

impl RequestEntry {
    fn new() -> Self {
        Self {
            success: AtomicU64::new(0),
            failure: AtomicU64::new(0),
            latency: AtomicBucket::new(),
            digest: Mutex::new(LatencyDigest::new()),
        }
    }

    fn drain(&self) {
        let mut digest = self.digest.lock().unwrap_or_else(PoisonError::into_inner);
        self.latency.clear_with(|dur| digest.insert_all(dur));
    }

    fn collect(&self, key: RequestKey, elapsed: Duration) -> RequestStatistics {
        self.drain();
        let digest = self.digest.lock().unwrap_or_else(PoisonError::into_inner);

        let success = self.success.load(Ordering::Relaxed);
        let failure = self.failure.load(Ordering::Relaxed);
        let rps = if elapsed.is_zero() {
            0.
        } else {
            (success + failure) as f64 / elapsed.as_secs_f64()
        };

        RequestStatistics {
            key,
            success,
            failure,
            rps,
            latency_mean: digest.mean(),
            latency_p50: digest.quantile(0.5),
            latency_p90: digest.quantile(0.9),
            latency_p99: digest.quantile(0.99),
        }
    }
}

#[derive(Debug, Clone)]
struct LatencyDigest {
    digest: TDigest<K1>,
    count: u64,
    sum: Duration,
}

impl LatencyDigest {
    fn new() -> Self {
        Self {
            // TODO: Tune compression once we have latency distributions from real targets
            digest: TDigest::new(K1::new(10.), TDIGEST_BACKLOG_SIZE),
            count: 0,
            sum: Duration::ZERO,
        }
    }

    fn insert_all(&mut self, latencies: &[Duration]) {
        for latency in latencies {
            self.digest.insert(latency.as_secs_f64());
            self.count += 1;
            self.sum += *latency;
        }
    }

    fn mean(&self) -> Duration {
        if self.count == 0 {
            Duration::ZERO
        } else {
            Duration::from_nanos((self.sum.as_nanos() / self.count as u128) as u64)
        }
    }

    fn quantile(&self, quantile: f64) -> Duration {
        if self.count == 0 {
            return Duration::ZERO;
        }

        let secs = self.digest.quantile(quantile);
        // NOTE: TDigest can return NaN for sparse digests.
        if secs.is_finite() && secs >= 0. {
            Duration::from_secs_f64(secs)
        } else {
            error!("Non-finite latency quantile ({quantile}); reporting zero.");
            Duration::ZERO
        }
    }
}
