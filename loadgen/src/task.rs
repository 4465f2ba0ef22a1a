//! Weighted tasks and task selection
use crate::error::{ConfigError, TaskError};
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

pub type TaskResult = Result<(), TaskError>;

pub type TaskFuture<'a> = Pin<Box<dyn Future<Output = TaskResult> + Send + 'a>>;

pub type TaskFunction<U> = Arc<dyn for<'a> Fn(&'a mut U) -> TaskFuture<'a> + Send + Sync>;

/// A single user action
///
/// Not intended for manual creation, use the [`#[task]`](loadgen_macros::task) macro which turns
/// an `async fn(&mut U) -> TaskResult` into a function returning a `Task<U>`.
pub struct Task<U> {
    name: &'static str,
    weight: u32,
    func: TaskFunction<U>,
}

impl<U> Task<U> {
    #[doc(hidden)]
    pub fn new(name: &'static str, weight: u32, func: TaskFunction<U>) -> Self {
        Self { name, weight, func }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn weight(&self) -> u32 {
        self.weight
    }

    /// Override the weight given in the `#[task]` attribute.
    pub fn with_weight(mut self, weight: u32) -> Self {
        self.weight = weight;
        self
    }

    pub fn run<'a>(&self, user: &'a mut U) -> TaskFuture<'a> {
        (self.func)(user)
    }
}

impl<U> Clone for Task<U> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            weight: self.weight,
            func: self.func.clone(),
        }
    }
}

impl<U> fmt::Debug for Task<U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("weight", &self.weight)
            .finish()
    }
}

/// The set of tasks a user chooses from, biased by weight.
pub struct TaskSet<U> {
    tasks: Vec<Task<U>>,
    index: WeightedIndex<u32>,
}

impl<U> TaskSet<U> {
    pub fn new(tasks: Vec<Task<U>>) -> Result<Self, ConfigError> {
        if tasks.is_empty() {
            return Err(ConfigError::NoTasks);
        }
        let index = WeightedIndex::new(tasks.iter().map(Task::weight))?;
        Ok(Self { tasks, index })
    }

    /// Pick a task with probability `weight / total_weight`, along with its position in the set.
    pub fn choose<R: Rng + ?Sized>(&self, rng: &mut R) -> (usize, &Task<U>) {
        let idx = self.index.sample(rng);
        (idx, &self.tasks[idx])
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.tasks.iter().map(Task::name).collect()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

impl<U> fmt::Debug for TaskSet<U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.tasks.iter()).finish()
    }
}
