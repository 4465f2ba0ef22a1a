//! Swarm runner
use crate::client::HttpClient;
use crate::config::SwarmConfig;
use crate::error::{ConfigError, SwarmError};
use crate::stats::{RunStatistics, StatsRegistry};
use crate::task::TaskSet;
use crate::transaction::TRANSACTION_HOOK;
use crate::user::User;
use crate::wait::WaitTime;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use rand::rngs::SmallRng;
use rand::SeedableRng;
use reqwest::Client;
use std::marker::PhantomData;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
#[allow(unused_imports)]
use tracing::{debug, error, info, instrument, trace, warn, Instrument};

/// Runs many concurrent copies of a [`User`] against a host
///
/// # Example
/// ```ignore
/// let config = SwarmConfig::new("http://localhost:3002")?
///     .users(100)
///     .spawn_rate(10)
///     .run_time(Duration::from_secs(300));
///
/// let stats = Swarm::<ApiUser>::new(config)?.run().await?;
/// println!("{stats}");
/// ```
pub struct Swarm<U> {
    config: SwarmConfig,
    spawn_rate: NonZeroU32,
    tasks: Arc<TaskSet<U>>,
    wait_time: WaitTime,
    client: Client,
    _user: PhantomData<fn() -> U>,
}

impl<U: User> Swarm<U> {
    pub fn new(config: SwarmConfig) -> Result<Self, SwarmError> {
        config.validate()?;
        let spawn_rate = NonZeroU32::new(config.spawn_rate).ok_or(ConfigError::ZeroSpawnRate)?;

        let wait_time = U::wait_time();
        wait_time.validate()?;

        let tasks = TaskSet::new(U::tasks())?;
        let client = Client::builder().build()?;

        Ok(Self {
            config,
            spawn_rate,
            tasks: Arc::new(tasks),
            wait_time,
            client,
            _user: PhantomData,
        })
    }

    #[instrument(name = "swarm", skip_all, fields(host = %self.config.host))]
    pub async fn run(self) -> Result<RunStatistics, SwarmError> {
        info!(
            "Running {} users (spawn rate {}/s, wait {}) with tasks {:?}",
            self.config.users, self.spawn_rate, self.wait_time, self.tasks
        );

        #[cfg(feature = "metrics")]
        crate::transaction::describe_metrics();

        let registry = Arc::new(StatsRegistry::new(self.tasks.names()));
        let start = Instant::now();

        let mut pool = UserPool {
            handles: vec![],
            tasks: self.tasks.clone(),
            wait_time: self.wait_time,
            client: HttpClient::new(self.client.clone(), self.config.host.clone()),
            registry: registry.clone(),
        };

        let load = async {
            tokio::join!(
                pool.ramp(self.config.users, self.spawn_rate),
                report_progress(&registry, self.config.stats_interval),
            );
        };

        // NOTE: Ramping and reporting never finish on their own; the stop signal ends the run.
        let stopped = tokio::select! {
            _ = load => Ok(()),
            res = stop_signal(self.config.run_time) => res,
        };

        pool.shutdown().await;
        stopped?;

        let stats = registry.collect(start.elapsed());
        info!(
            "Swarm complete: {} requests, {} failures",
            stats.total_requests(),
            stats.total_failures()
        );
        Ok(stats)
    }
}

struct UserPool<U> {
    handles: Vec<JoinHandle<()>>,
    tasks: Arc<TaskSet<U>>,
    wait_time: WaitTime,
    client: HttpClient,
    registry: Arc<StatsRegistry>,
}

impl<U: User> UserPool<U> {
    async fn ramp(&mut self, users: usize, spawn_rate: NonZeroU32) {
        let limiter = spawn_limiter(spawn_rate);
        while self.handles.len() < users {
            limiter.until_ready().await;
            self.spawn_user();
        }
        info!("All {users} users spawned");
    }

    fn spawn_user(&mut self) {
        let id = self.handles.len();
        let client = self.client.clone();
        let tasks = self.tasks.clone();
        let wait_time = self.wait_time;
        let registry = self.registry.clone();

        self.registry.user_spawned();
        self.handles.push(tokio::spawn(TRANSACTION_HOOK.scope(
            self.registry.clone(),
            user_loop::<U>(client, tasks, wait_time, registry)
                .instrument(tracing::debug_span!("user", id)),
        )));
        trace!("Spawned user {id}");
    }

    async fn shutdown(self) {
        for handle in &self.handles {
            handle.abort();
        }
        for handle in self.handles {
            if let Err(err) = handle.await {
                if !err.is_cancelled() {
                    error!("User task failed: {err}");
                }
            }
        }
    }
}

async fn user_loop<U: User>(
    client: HttpClient,
    tasks: Arc<TaskSet<U>>,
    wait_time: WaitTime,
    registry: Arc<StatsRegistry>,
) {
    let mut rng = SmallRng::from_entropy();
    let mut user = U::new(client);
    user.on_start().await;

    loop {
        let (idx, task) = tasks.choose(&mut rng);
        registry.record_task(idx);

        if let Err(err) = task.run(&mut user).await {
            debug!(task = task.name(), "Task failed: {err}");
        }

        tokio::time::sleep(wait_time.sample(&mut rng)).await;
    }
}

async fn report_progress(registry: &StatsRegistry, stats_interval: Duration) {
    let mut interval = tokio::time::interval(stats_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    debug!(
        "Reporting progress every {}",
        humantime::format_duration(stats_interval)
    );

    // NOTE: First tick completes instantly
    let mut last_tick = interval.tick().await;
    let mut last = registry.totals();
    loop {
        let tick = interval.tick().await;
        let elapsed = tick.duration_since(last_tick);
        registry.drain();

        let totals = registry.totals();
        let rps = (totals.requests - last.requests) as f64 / elapsed.as_secs_f64();
        info!(
            "users={} requests={} failures={} rps={rps:.2}",
            registry.users(),
            totals.requests,
            totals.failures
        );
        last = totals;
        last_tick = tick;
    }
}

async fn stop_signal(run_time: Option<Duration>) -> Result<(), SwarmError> {
    match run_time {
        Some(run_time) => {
            tokio::time::sleep(run_time).await;
            info!("Run time of {} elapsed", humantime::format_duration(run_time));
        }
        None => {
            tokio::signal::ctrl_c().await.map_err(SwarmError::Signal)?;
            info!("Received Ctrl-C, stopping");
        }
    }
    Ok(())
}

fn spawn_limiter(spawn_rate: NonZeroU32) -> DefaultDirectRateLimiter {
    RateLimiter::direct(Quota::per_second(spawn_rate).allow_burst(NonZeroU32::MIN))
}
