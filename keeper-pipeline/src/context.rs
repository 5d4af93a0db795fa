//! Per-cycle state and the lock that keeps cycles from overlapping.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use keeper_clients::notifier::{notify_best_effort, Notifier};
use tokio::sync::{Mutex, MutexGuard};
use tracing::error;

use crate::error::CycleError;

/// Failure flag and notifier for one cycle. A fresh context is created for
/// every cycle, so a failure never leaks into the next one.
pub struct RunContext {
  failed: AtomicBool,
  notifier: Arc<dyn Notifier>,
}

impl RunContext {
  #[must_use]
  pub fn new(notifier: Arc<dyn Notifier>) -> RunContext {
    RunContext {
      failed: AtomicBool::new(false),
      notifier,
    }
  }

  #[must_use]
  pub fn has_failed(&self) -> bool {
    self.failed.load(Ordering::SeqCst)
  }

  #[must_use]
  pub fn notifier(&self) -> &dyn Notifier {
    self.notifier.as_ref()
  }

  /// Logs, notifies and raises the failure flag. The flag is only ever set,
  /// so concurrent services may record without coordination.
  pub async fn record_failure(&self, service: &str, err: &anyhow::Error) {
    let detail = format!("{err:#}");
    error!(service, error = %detail, "service failed");
    self.failed.store(true, Ordering::SeqCst);
    notify_best_effort(
      self.notifier.as_ref(),
      &format!("{service} failed"),
      &detail,
    )
    .await;
  }

  /// Runs a service step, recording its failure instead of propagating it.
  pub async fn guard<T>(
    &self,
    service: &str,
    step: impl Future<Output = anyhow::Result<T>>,
  ) -> Option<T> {
    match step.await {
      Ok(value) => Some(value),
      Err(err) => {
        self.record_failure(service, &err).await;
        None
      }
    }
  }
}

/// Rejects a cycle while another one holds the lock.
#[derive(Default)]
pub struct RunLock {
  inner: Mutex<()>,
}

impl RunLock {
  #[must_use]
  pub fn new() -> RunLock {
    RunLock::default()
  }

  /// # Errors
  /// * `CycleInProgress` if the lock is held
  pub fn try_acquire(&self) -> Result<MutexGuard<'_, ()>, CycleError> {
    self
      .inner
      .try_lock()
      .map_err(|_| CycleError::CycleInProgress)
  }
}
