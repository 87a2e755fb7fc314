//! Supervised fire-and-forget work that must not outlive shutdown.

use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, error, warn};

#[derive(Clone, Default)]
pub struct BackgroundTasks {
    tasks: Arc<Mutex<JoinSet<()>>>,
}

impl BackgroundTasks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `fut` detached from the request. Errors and panics are logged
    /// with `task` as context and never propagate.
    pub fn spawn<F>(&self, task: &'static str, fut: F)
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let supervised = async move {
            match AssertUnwindSafe(fut).catch_unwind().await {
                Ok(Ok(())) => debug!(task, "Background task finished"),
                Ok(Err(e)) => error!(task, error = ?e, "Background task failed"),
                Err(panic) => {
                    error!(task, panic = %panic_message(panic.as_ref()), "Background task panicked");
                }
            }
        };

        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        while tasks.try_join_next().is_some() {}
        tasks.spawn(supervised);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Waits up to `grace` for outstanding tasks, then aborts the rest.
    /// Returns `true` when everything finished in time.
    pub async fn drain(&self, grace: Duration) -> bool {
        let mut tasks = std::mem::take(
            &mut *self.tasks.lock().unwrap_or_else(PoisonError::into_inner),
        );
        let pending = tasks.len();
        if pending > 0 {
            debug!(pending, "Waiting for background tasks");
        }

        let finished = tokio::time::timeout(grace, async {
            while tasks.join_next().await.is_some() {}
        })
        .await
        .is_ok();

        if !finished {
            warn!(
                remaining = tasks.len(),
                "Background tasks did not finish within grace period, aborting"
            );
            tasks.abort_all();
        }
        finished
    }
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
