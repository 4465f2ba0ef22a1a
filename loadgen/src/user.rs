use crate::client::HttpClient;
use crate::task::Task;
use crate::wait::WaitTime;
use std::future::Future;

/// A simulated user
///
/// The [`Swarm`](crate::Swarm) builds one value per simulated user, each around its own
/// [`HttpClient`], calls [`User::on_start`] once, and then repeatedly runs one of
/// [`User::tasks`] (chosen by weight) followed by a [`User::wait_time`] pause.
///
/// # Example
/// ```ignore
/// use loadgen::prelude::*;
/// use std::time::Duration;
///
/// struct Browser {
///     client: HttpClient,
/// }
///
/// impl User for Browser {
///     fn new(client: HttpClient) -> Self {
///         Self { client }
///     }
///
///     fn wait_time() -> WaitTime {
///         WaitTime::constant(Duration::from_secs(1))
///     }
///
///     fn tasks() -> Vec<Task<Self>> {
///         vec![home()]
///     }
/// }
///
/// #[task]
/// async fn home(user: &mut Browser) -> TaskResult {
///     user.client.get("/").send().await?;
///     Ok(())
/// }
/// ```
pub trait User: Sized + Send + 'static {
    fn new(client: HttpClient) -> Self;

    /// Runs once per user before its first task.
    fn on_start(&mut self) -> impl Future<Output = ()> + Send {
        async {}
    }

    fn wait_time() -> WaitTime;

    fn tasks() -> Vec<Task<Self>>;
}
