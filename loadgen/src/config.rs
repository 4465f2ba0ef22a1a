use crate::error::ConfigError;
use clap::Parser;
use std::time::Duration;
use url::Url;

const DEFAULT_USERS: usize = 10;
const DEFAULT_SPAWN_RATE: u32 = 1;
const DEFAULT_STATS_INTERVAL: Duration = Duration::from_secs(5);

/// Swarm configuration
///
/// Built either programmatically with the builder methods, or from the command line (and
/// environment) with [`SwarmConfig::from_args`].
#[derive(Clone, Debug)]
pub struct SwarmConfig {
    pub host: Url,
    pub users: usize,
    pub spawn_rate: u32,
    pub run_time: Option<Duration>,
    pub stats_interval: Duration,
}

impl SwarmConfig {
    pub fn new(host: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            host: parse_host(host)?,
            users: DEFAULT_USERS,
            spawn_rate: DEFAULT_SPAWN_RATE,
            run_time: None,
            stats_interval: DEFAULT_STATS_INTERVAL,
        })
    }

    /// Use the default CLI arguments.
    ///
    /// `-H`, `--host` base URL of the system under test (required)
    ///
    /// `-u`, `--users` number of concurrent users (default `10`)
    ///
    /// `-r`, `--spawn-rate` users started per second (default `1`)
    ///
    /// `-t`, `--run-time` stop after this long, e.g. `30s` or `5m` (default: until Ctrl-C)
    ///
    /// `--stats-interval` how often progress is logged (default `5s`)
    ///
    /// Every flag can also be supplied through its `LOADGEN_*` environment variable.
    ///
    /// # Example
    /// ```ignore
    /// $ ./items-load -H http://localhost:3002 -u 50 -r 5 -t 2m
    /// $ LOADGEN_HOST=http://localhost:3002 ./items-load
    /// ```
    pub fn from_args() -> Result<Self, ConfigError> {
        Cli::parse().into_config()
    }

    pub fn users(mut self, users: usize) -> Self {
        self.users = users;
        self
    }

    pub fn spawn_rate(mut self, spawn_rate: u32) -> Self {
        self.spawn_rate = spawn_rate;
        self
    }

    pub fn run_time(mut self, run_time: Duration) -> Self {
        self.run_time = Some(run_time);
        self
    }

    pub fn stats_interval(mut self, stats_interval: Duration) -> Self {
        self.stats_interval = stats_interval;
        self
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.users == 0 {
            return Err(ConfigError::ZeroUsers);
        }
        if self.spawn_rate == 0 {
            return Err(ConfigError::ZeroSpawnRate);
        }
        if self.stats_interval.is_zero() {
            return Err(ConfigError::ZeroStatsInterval);
        }
        Ok(())
    }
}

#[derive(Parser, Debug)]
#[command(version, about = "Simulated-user load generator")]
pub struct Cli {
    #[arg(short = 'H', long, env = "LOADGEN_HOST")]
    pub host: String,

    #[arg(short, long, env = "LOADGEN_USERS", default_value_t = DEFAULT_USERS)]
    pub users: usize,

    #[arg(short = 'r', long, env = "LOADGEN_SPAWN_RATE", default_value_t = DEFAULT_SPAWN_RATE)]
    pub spawn_rate: u32,

    #[arg(short = 't', long, env = "LOADGEN_RUN_TIME", value_parser = humantime::parse_duration)]
    pub run_time: Option<Duration>,

    #[arg(long, env = "LOADGEN_STATS_INTERVAL", default_value = "5s", value_parser = humantime::parse_duration)]
    pub stats_interval: Duration,
}

impl Cli {
    pub fn into_config(self) -> Result<SwarmConfig, ConfigError> {
        let mut config = SwarmConfig::new(&self.host)?
            .users(self.users)
            .spawn_rate(self.spawn_rate)
            .stats_interval(self.stats_interval);
        config.run_time = self.run_time;
        config.validate()?;
        Ok(config)
    }
}

fn parse_host(host: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(host)?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(ConfigError::UnsupportedScheme(scheme.to_string())),
    }
}
