//! The watchdog controller.
//!
//! [`Watchdog`] owns the configuration and the probe scheduler. It builds the
//! stall handler from a [`StallPolicy`], starts probing on construction and
//! stops probing when dropped.

use std::time::Duration;

use crate::config::WatchdogConfig;
use crate::error::WatchdogResult;
use crate::policy::{StallPolicy, WatchdogOptions};
use crate::probe::ProbeScheduler;
use crate::queue::{MainQueueHandle, TaskQueue};
use crate::stats::ProbeStats;

/// Lifecycle of a [`Watchdog`].
///
/// ```text
/// Constructed ──start──► Running ──teardown──► Stopped
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogState {
    /// Configured, probe thread not yet spawned.
    Constructed,
    /// Probe thread is running.
    Running,
    /// Probe thread cancelled and joined (terminal).
    Stopped,
}

impl WatchdogState {
    /// Get the state as a string slice.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Constructed => "Constructed",
            Self::Running => "Running",
            Self::Stopped => "Stopped",
        }
    }
}

impl std::fmt::Display for WatchdogState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Main-thread stall watchdog.
///
/// Probing starts as soon as the watchdog is constructed. Every round in
/// which the main context fails to run the probe within the threshold emits
/// `"Main thread was blocked for {threshold:.2}s"` to the log sink, or
/// invokes the fatal hook in strict mode.
///
/// # Teardown
///
/// Dropping the watchdog cancels the probe and waits for its thread to exit.
/// The probe thread finishes the round in progress first, which needs the
/// main context to run the outstanding probe. Do not drop the watchdog on
/// the main context itself while its queue is not being drained: use
/// [`Watchdog::shutdown_draining`] there, or drop the [`MainQueue`] first.
///
/// [`MainQueue`]: crate::queue::MainQueue
///
/// # Example
///
/// ```rust
/// use stallwatch::prelude::*;
/// use std::time::Duration;
///
/// let queue = MainQueue::new();
/// let config = WatchdogConfig::builder().threshold_ms(50).build()?;
/// let watchdog = Watchdog::with_config(config, queue.handle())?;
/// assert_eq!(watchdog.state(), WatchdogState::Running);
///
/// // The monitored thread keeps draining its queue.
/// queue.run_for(Duration::from_millis(120));
///
/// watchdog.shutdown_draining(|| {
///     queue.run_for(Duration::from_millis(5));
/// })?;
/// # Ok::<(), stallwatch::WatchdogError>(())
/// ```
pub struct Watchdog<Q: TaskQueue + Send + 'static = MainQueueHandle> {
    config: WatchdogConfig,
    scheduler: ProbeScheduler<Q>,
    state: WatchdogState,
}

impl<Q: TaskQueue + Send + 'static> Watchdog<Q> {
    /// Start a watchdog with the default configuration (0.4 s, not strict,
    /// stall messages logged through `tracing`).
    ///
    /// # Errors
    ///
    /// Returns an error if the probe thread cannot be spawned.
    pub fn new(queue: Q) -> WatchdogResult<Self> {
        Self::with_config(WatchdogConfig::default(), queue)
    }

    /// Start a watchdog with `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the probe thread
    /// cannot be spawned.
    pub fn with_config(config: WatchdogConfig, queue: Q) -> WatchdogResult<Self> {
        Self::with_options(config, WatchdogOptions::default(), queue)
    }

    /// Start a watchdog that hands stall messages to `logger`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the probe thread
    /// cannot be spawned.
    pub fn with_logger<F>(config: WatchdogConfig, logger: F, queue: Q) -> WatchdogResult<Self>
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        Self::with_options(config, WatchdogOptions::new().logger(logger), queue)
    }

    /// Start a watchdog with explicit collaborators.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the probe thread
    /// cannot be spawned.
    pub fn with_options(
        config: WatchdogConfig,
        options: WatchdogOptions,
        queue: Q,
    ) -> WatchdogResult<Self> {
        config.validate()?;

        let policy = StallPolicy::new(&config, options);
        let scheduler = ProbeScheduler::new(config.threshold, queue, move || policy.react());

        let mut watchdog = Self {
            config,
            scheduler,
            state: WatchdogState::Constructed,
        };
        watchdog.scheduler.start()?;
        watchdog.state = WatchdogState::Running;

        tracing::info!(
            threshold_ms = u64::try_from(config.threshold.as_millis()).unwrap_or(u64::MAX),
            strict_mode = config.strict_mode,
            "main thread watchdog started"
        );
        Ok(watchdog)
    }

    /// The configuration this watchdog runs with.
    #[must_use]
    pub fn config(&self) -> &WatchdogConfig {
        &self.config
    }

    /// The stall threshold.
    #[must_use]
    pub fn threshold(&self) -> Duration {
        self.config.threshold
    }

    /// Check whether stalls abort instead of being logged.
    #[must_use]
    pub fn is_strict(&self) -> bool {
        self.config.strict_mode
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> WatchdogState {
        self.state
    }

    /// Snapshot of probe activity so far.
    #[must_use]
    pub fn stats(&self) -> ProbeStats {
        self.scheduler.stats()
    }

    /// Stop probing, wait for the probe thread to exit and return the final
    /// statistics.
    ///
    /// Blocks until the main context runs the outstanding probe.
    ///
    /// # Errors
    ///
    /// Returns an error if the probe thread panicked.
    pub fn shutdown(mut self) -> WatchdogResult<ProbeStats> {
        self.stop()?;
        Ok(self.stats())
    }

    /// Stop probing while the caller keeps the main context alive.
    ///
    /// `drain` is called repeatedly until the probe thread has exited. Use
    /// this when shutting down from the monitored thread, passing a closure
    /// that runs its queued tasks. Returns the statistics of every round,
    /// including the last one.
    ///
    /// # Errors
    ///
    /// Returns an error if the probe thread panicked.
    pub fn shutdown_draining<F>(mut self, mut drain: F) -> WatchdogResult<ProbeStats>
    where
        F: FnMut(),
    {
        self.scheduler.cancel();
        while !self.scheduler.is_finished() {
            drain();
        }
        self.stop()?;
        Ok(self.stats())
    }

    fn stop(&mut self) -> WatchdogResult<()> {
        if self.state == WatchdogState::Stopped {
            return Ok(());
        }

        self.scheduler.cancel();
        let joined = self.scheduler.join();
        self.state = WatchdogState::Stopped;

        tracing::info!(stats = ?self.scheduler.stats(), "main thread watchdog stopped");
        joined
    }
}

impl<Q: TaskQueue + Send + 'static> Drop for Watchdog<Q> {
    fn drop(&mut self) {
        if let Err(err) = self.stop() {
            tracing::error!(error = %err, "main thread watchdog stopped abnormally");
        }
    }
}

impl<Q: TaskQueue + Send + 'static> std::fmt::Debug for Watchdog<Q> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Watchdog")
            .field("config", &self.config)
            .field("state", &self.state)
            .field("stats", &self.scheduler.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WatchdogError;
    use crate::queue::MainQueue;

    fn drain(queue: &MainQueue) -> impl FnMut() + '_ {
        move || {
            queue.run_for(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_state_transitions() {
        let queue = MainQueue::new();
        let config = WatchdogConfig::builder().threshold_ms(20).build().unwrap();
        let watchdog = Watchdog::with_config(config, queue.handle()).unwrap();

        assert_eq!(watchdog.state(), WatchdogState::Running);
        assert_eq!(watchdog.threshold(), Duration::from_millis(20));
        assert!(!watchdog.is_strict());

        watchdog.shutdown_draining(drain(&queue)).unwrap();
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let queue = MainQueue::new();
        let config = WatchdogConfig {
            threshold: Duration::ZERO,
            strict_mode: false,
        };

        let result = Watchdog::with_config(config, queue.handle());
        assert!(matches!(result, Err(WatchdogError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_default_watchdog() {
        let queue = MainQueue::new();
        let watchdog = Watchdog::new(queue.handle()).unwrap();
        assert_eq!(watchdog.config(), &WatchdogConfig::default());
        watchdog.shutdown_draining(drain(&queue)).unwrap();
    }

    #[test]
    fn test_drop_after_queue_is_gone() {
        let queue = MainQueue::new();
        let config = WatchdogConfig::builder().threshold_ms(10).build().unwrap();
        let watchdog = Watchdog::with_config(config, queue.handle()).unwrap();

        drop(queue);
        drop(watchdog);
    }

    #[test]
    fn test_shutdown_stats_include_final_round() {
        let queue = MainQueue::new();
        let config = WatchdogConfig::builder().threshold_ms(20).build().unwrap();
        let watchdog = Watchdog::with_config(config, queue.handle()).unwrap();

        // Block through the first window so the round in flight at shutdown stalls.
        std::thread::sleep(Duration::from_millis(40));
        let before = watchdog.stats();
        let after = watchdog.shutdown_draining(drain(&queue)).unwrap();

        assert_eq!(before.rounds, 0);
        assert!(after.rounds >= 1);
        assert!(after.stalls >= 1);
    }

    #[test]
    fn test_debug_output() {
        let queue = MainQueue::new();
        let watchdog = Watchdog::new(queue.handle()).unwrap();
        let debug = format!("{watchdog:?}");
        assert!(debug.contains("Watchdog"));
        assert!(debug.contains("Running"));
        watchdog.shutdown_draining(drain(&queue)).unwrap();
    }
}
