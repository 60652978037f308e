use std::sync::Weak;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Repeating cleanup task owned by a pipeline component.
///
/// The task holds only a weak reference to its target and stops when the
/// target is dropped, when [`SweepTask::stop`] is called or when the
/// `SweepTask` itself is dropped.
#[derive(Debug)]
pub(crate) struct SweepTask {
    token: CancellationToken,
}

impl SweepTask {
    /// Start sweeping `target` every `period`.
    ///
    /// Returns `None` outside a tokio runtime or for a zero period; the
    /// component then relies on lazy cleanup only.
    pub(crate) fn spawn<T, F>(
        name: &'static str,
        target: Weak<T>,
        period: Duration,
        sweep: F,
    ) -> Option<Self>
    where
        T: Send + Sync + 'static,
        F: Fn(&T) + Send + 'static,
    {
        if period.is_zero() {
            return None;
        }
        let Ok(handle) = Handle::try_current() else {
            debug!(component = name, "No tokio runtime, periodic sweep disabled");
            return None;
        };

        let token = CancellationToken::new();
        let child = token.clone();
        handle.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // First tick completes immediately
            ticker.tick().await;
            loop {
                tokio::select! {
                    () = child.cancelled() => break,
                    _ = ticker.tick() => {
                        let Some(target) = target.upgrade() else { break };
                        sweep(&target);
                    }
                }
            }
            debug!(component = name, "Periodic sweep stopped");
        });

        Some(Self { token })
    }

    pub(crate) fn stop(&self) {
        self.token.cancel();
    }
}

impl Drop for SweepTask {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
