#![doc = include_str!("../README.md")]

// Lets `#[task]` expansions resolve `::loadgen` from inside this crate.
extern crate self as loadgen;

pub mod client;
pub mod config;
pub mod error;
pub mod stats;
pub mod swarm;
pub mod task;
#[doc(hidden)]
pub mod transaction;
pub mod user;
pub mod wait;


pub use client::HttpClient;
pub use config::{Cli, SwarmConfig};
pub use error::{ConfigError, RequestError, SwarmError, TaskError};
pub use loadgen_macros::task;
pub use stats::{RequestKey, RequestStatistics, RunStatistics, TaskStatistics};
pub use swarm::Swarm;
pub use task::{Task, TaskResult, TaskSet};
pub use user::User;
pub use wait::WaitTime;

pub mod prelude {
    pub use crate::client::HttpClient;
    pub use crate::config::SwarmConfig;
    pub use crate::stats::RunStatistics;
    pub use crate::swarm::Swarm;
    pub use crate::task::{Task, TaskResult};
    pub use crate::user::User;
    pub use crate::wait::WaitTime;
    pub use loadgen_macros::task;
}
