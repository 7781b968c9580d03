//! Probe round statistics.
//!
//! The probe thread and the posted probes update [`ProbeCounters`] with
//! atomics only. [`ProbeStats`] is the plain snapshot handed to callers.

use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Snapshot of probe activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProbeStats {
    /// Rounds whose probe was acknowledged by the main context.
    pub rounds: u64,
    /// Rounds in which the probe had not run when the threshold elapsed.
    pub stalls: u64,
    /// Longest observed time between posting a probe and the main context
    /// running it.
    pub worst_latency: Duration,
    /// Time since the most recent stall, if any stall was detected.
    pub since_last_stall: Option<Duration>,
}

impl ProbeStats {
    /// Fraction of completed rounds that stalled, as a percentage.
    ///
    /// Returns 0.0 if no round has completed.
    #[must_use]
    #[expect(
        clippy::cast_precision_loss,
        reason = "round counts stay far below 2^52"
    )]
    pub fn stall_rate(&self) -> f64 {
        if self.rounds == 0 {
            0.0
        } else {
            (self.stalls as f64 / self.rounds as f64) * 100.0
        }
    }
}

/// Shared counters behind [`ProbeStats`].
#[derive(Debug, Default)]
pub(crate) struct ProbeCounters {
    rounds: AtomicU64,
    stalls: AtomicU64,
    worst_latency_ns: AtomicU64,
    last_stall: Mutex<Option<Instant>>,
}

impl ProbeCounters {
    pub(crate) fn record_round(&self) {
        self.rounds.fetch_add(1, Ordering::AcqRel);
    }

    /// Returns the 1-based index of this stall.
    pub(crate) fn record_stall(&self) -> u64 {
        *self.last_stall.lock() = Some(Instant::now());
        self.stalls.fetch_add(1, Ordering::AcqRel).saturating_add(1)
    }

    pub(crate) fn observe_latency(&self, latency: Duration) {
        let nanos = u64::try_from(latency.as_nanos()).unwrap_or(u64::MAX);
        self.worst_latency_ns.fetch_max(nanos, Ordering::AcqRel);
    }

    pub(crate) fn snapshot(&self) -> ProbeStats {
        ProbeStats {
            rounds: self.rounds.load(Ordering::Acquire),
            stalls: self.stalls.load(Ordering::Acquire),
            worst_latency: Duration::from_nanos(self.worst_latency_ns.load(Ordering::Acquire)),
            since_last_stall: self.last_stall.lock().map(|at| at.elapsed()),
        }
    }
}
