//! Reaction to a detected stall.
//!
//! A [`StallPolicy`] carries everything the stall handler needs as explicit
//! fields: the formatted message, the strict-mode flag, the log sink and the
//! fatal hook. It runs on the probe thread, never on the main context.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::config::WatchdogConfig;

/// Receives the formatted stall message.
pub type LogSink = Arc<dyn Fn(&str) + Send + Sync>;

/// Called in strict mode instead of the log sink. The default aborts.
pub type FatalHook = Arc<dyn Fn(&str) + Send + Sync>;

/// Format the stall message for `threshold`.
///
/// The message reports the configured threshold with two decimals, not the
/// measured stall length.
///
/// ```rust
/// use std::time::Duration;
///
/// let message = stallwatch::stall_message(Duration::from_millis(400));
/// assert_eq!(message, "Main thread was blocked for 0.40s");
/// ```
#[must_use]
pub fn stall_message(threshold: Duration) -> String {
    format!("Main thread was blocked for {:.2}s", threshold.as_secs_f64())
}

/// Log `message` and abort the process.
///
/// Behaves the same in debug and release builds.
pub fn abort_process(message: &str) -> ! {
    tracing::error!(message, "strict mode: aborting on main thread stall");
    std::process::abort()
}

/// The fatal hook used when none is supplied.
#[must_use]
pub fn default_fatal_hook() -> FatalHook {
    Arc::new(|message: &str| {
        abort_process(message);
    })
}

/// Optional collaborators for a [`Watchdog`](crate::watchdog::Watchdog).
#[derive(Clone, Default)]
pub struct WatchdogOptions {
    /// Sink for stall messages. `None` logs through `tracing`.
    pub logger: Option<LogSink>,
    /// Strict-mode reaction. `None` uses [`default_fatal_hook`].
    pub fatal_hook: Option<FatalHook>,
}

impl WatchdogOptions {
    /// Create empty options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the log sink.
    #[must_use]
    pub fn logger<F>(mut self, logger: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.logger = Some(Arc::new(logger));
        self
    }

    /// Replace the strict-mode reaction.
    #[must_use]
    pub fn fatal_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.fatal_hook = Some(Arc::new(hook));
        self
    }
}

impl std::fmt::Debug for WatchdogOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchdogOptions")
            .field("logger", &self.logger.is_some())
            .field("fatal_hook", &self.fatal_hook.is_some())
            .finish()
    }
}

/// What to do when the probe reports a stall.
pub struct StallPolicy {
    threshold: Duration,
    strict_mode: bool,
    message: String,
    logger: Option<LogSink>,
    fatal_hook: FatalHook,
    reported: AtomicU64,
}

impl StallPolicy {
    /// Build the policy for `config`.
    #[must_use]
    pub fn new(config: &WatchdogConfig, options: WatchdogOptions) -> Self {
        Self {
            threshold: config.threshold,
            strict_mode: config.strict_mode,
            message: stall_message(config.threshold),
            logger: options.logger,
            fatal_hook: options.fatal_hook.unwrap_or_else(default_fatal_hook),
            reported: AtomicU64::new(0),
        }
    }

    /// The message emitted for every stall.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Number of stalled rounds this policy has reacted to.
    #[must_use]
    pub fn reported(&self) -> u64 {
        self.reported.load(Ordering::Acquire)
    }

    /// React to one stalled round.
    pub fn react(&self) {
        let round = self.reported.fetch_add(1, Ordering::AcqRel).saturating_add(1);
        if self.strict_mode {
            (self.fatal_hook)(&self.message);
            return;
        }

        match &self.logger {
            Some(logger) => logger(&self.message),
            None => tracing::warn!(
                threshold_ms = u64::try_from(self.threshold.as_millis()).unwrap_or(u64::MAX),
                round,
                "{}",
                self.message
            ),
        }
    }
}

impl std::fmt::Debug for StallPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StallPolicy")
            .field("threshold", &self.threshold)
            .field("strict_mode", &self.strict_mode)
            .field("message", &self.message)
            .field("logger", &self.logger.is_some())
            .field("reported", &self.reported())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use tracing_test::traced_test;

    fn capture() -> (Arc<Mutex<Vec<String>>>, impl Fn(&str) + Send + Sync + 'static) {
        let captured = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&captured);
        (captured, move |message: &str| sink.lock().push(message.to_string()))
    }

    #[test]
    fn test_message_format() {
        insta::assert_snapshot!(
            stall_message(Duration::from_millis(400)),
            @"Main thread was blocked for 0.40s"
        );
        insta::assert_snapshot!(
            stall_message(Duration::from_millis(1234)),
            @"Main thread was blocked for 1.23s"
        );
        insta::assert_snapshot!(
            stall_message(Duration::from_secs(2)),
            @"Main thread was blocked for 2.00s"
        );
    }

    #[test]
    fn test_report_goes_to_logger() {
        let (logged, logger) = capture();
        let (fatal, hook) = capture();
        let config = WatchdogConfig::builder().threshold_ms(100).build().unwrap();
        let policy = StallPolicy::new(
            &config,
            WatchdogOptions::new().logger(logger).fatal_hook(hook),
        );

        policy.react();
        policy.react();

        assert_eq!(*logged.lock(), vec!["Main thread was blocked for 0.10s"; 2]);
        assert!(fatal.lock().is_empty());
        assert_eq!(policy.reported(), 2);
    }

    #[test]
    fn test_strict_mode_uses_fatal_hook() {
        let (logged, logger) = capture();
        let (fatal, hook) = capture();
        let config = WatchdogConfig::builder()
            .threshold_ms(250)
            .strict_mode(true)
            .build()
            .unwrap();
        let policy = StallPolicy::new(
            &config,
            WatchdogOptions::new().logger(logger).fatal_hook(hook),
        );

        policy.react();

        assert!(logged.lock().is_empty());
        assert_eq!(*fatal.lock(), vec!["Main thread was blocked for 0.25s"]);
    }

    #[test]
    #[traced_test]
    fn test_default_sink_logs_threshold_and_round() {
        let policy = StallPolicy::new(&WatchdogConfig::default(), WatchdogOptions::new());
        assert_eq!(policy.message(), "Main thread was blocked for 0.40s");

        policy.react();
        policy.react();

        assert!(logs_contain("Main thread was blocked for 0.40s"));
        assert!(logs_contain("threshold_ms=400"));
        assert!(logs_contain("round=1"));
        assert!(logs_contain("round=2"));
    }
}
