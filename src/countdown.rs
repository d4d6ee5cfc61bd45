//! Owned timers with guaranteed cancellation.
//!
//! Every background timer in the crate is a [`ScopedTask`]: dropping the owner
//! aborts the task, so no callback can fire after its view is gone and a
//! remount never doubles a timer.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};

/// A spawned task that is aborted when this handle is dropped.
#[derive(Debug)]
pub struct ScopedTask {
    handle: Option<JoinHandle<()>>,
}

impl ScopedTask {
    /// Spawn `future` on the current Tokio runtime.
    pub fn spawn<F>(future: F) -> Self
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        Self {
            handle: Some(tokio::spawn(future)),
        }
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for ScopedTask {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Seconds-remaining countdown decremented once per second down to zero.
///
/// The channel lives as long as the countdown, so receivers taken before a
/// [`restart`](Self::restart) see the new run too.
///
/// ```rust,ignore
/// let mut countdown = Countdown::start(300);
/// let mut ticks = countdown.subscribe();
/// while ticks.changed().await.is_ok() {
///     render(*ticks.borrow());
/// }
/// ```
#[derive(Debug)]
pub struct Countdown {
    remaining: Arc<watch::Sender<u64>>,
    task: Option<ScopedTask>,
}

impl Countdown {
    /// Start counting down from `secs`. A zero countdown is finished immediately.
    #[must_use]
    pub fn start(secs: u64) -> Self {
        let mut countdown = Self::idle();
        countdown.restart(secs);
        countdown
    }

    /// An already-finished countdown.
    #[must_use]
    pub fn idle() -> Self {
        let (tx, _) = watch::channel(0);
        Self {
            remaining: Arc::new(tx),
            task: None,
        }
    }

    /// Abandon the current run and count down from `secs` on the same channel.
    pub fn restart(&mut self, secs: u64) {
        self.restart_then(secs, || {});
    }

    /// Like [`restart`](Self::restart), running `on_finish` just before zero is published.
    ///
    /// `on_finish` is dropped without running if the countdown is cancelled.
    pub fn restart_then<F>(&mut self, secs: u64, on_finish: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.cancel();
        if secs == 0 {
            on_finish();
            self.remaining.send_replace(0);
            return;
        }
        self.remaining.send_replace(secs);

        let tx = Arc::clone(&self.remaining);
        self.task = Some(ScopedTask::spawn(async move {
            let period = Duration::from_secs(1);
            let mut ticker = time::interval_at(Instant::now() + period, period);
            let mut left = secs;
            while left > 1 {
                ticker.tick().await;
                left -= 1;
                tx.send_replace(left);
            }
            ticker.tick().await;
            on_finish();
            tx.send_replace(0);
        }));
    }

    #[must_use]
    pub fn remaining(&self) -> u64 {
        *self.remaining.borrow()
    }

    /// Receiver notified on every tick.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.remaining.subscribe()
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.remaining() > 0 && self.task.as_ref().is_some_and(ScopedTask::is_running)
    }

    /// Stop ticking; the remaining value freezes where it was.
    pub fn cancel(&mut self) {
        if let Some(mut task) = self.task.take() {
            task.cancel();
        }
    }

    /// Wait until the countdown reaches zero.
    ///
    /// Returns `false` if it was cancelled first.
    pub async fn finished(&mut self) -> bool {
        if self.remaining() == 0 {
            return true;
        }
        if !self.is_running() {
            return false;
        }
        self.remaining.subscribe().wait_for(|left| *left == 0).await.is_ok()
    }
}
