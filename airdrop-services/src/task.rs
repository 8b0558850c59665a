//! Stoppable background loops

use std::future::Future;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::warn;

/// Handle to a spawned background loop
///
/// Dropping the handle also stops the loop: the shutdown receiver resolves
/// once its sender is gone.
#[derive(Debug)]
pub struct BackgroundTask {
    name: &'static str,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl BackgroundTask {
    /// Spawn `body`, handing it the receiver that resolves on [`BackgroundTask::stop`]
    pub fn spawn<F, Fut>(name: &'static str, body: F) -> Self
    where
        F: FnOnce(oneshot::Receiver<()>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        Self {
            name,
            shutdown: Some(shutdown_tx),
            handle: tokio::spawn(body(shutdown_rx)),
        }
    }

    /// Signal the loop and wait for it to exit
    pub async fn stop(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Err(e) = (&mut self.handle).await {
            warn!("{} task ended abnormally: {}", self.name, e);
        }
    }
}
