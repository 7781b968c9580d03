//! # stallwatch
//!
//! Detects when a designated main context (a UI or event-loop thread) stops
//! responding for longer than a configured threshold, and either logs a
//! diagnostic or aborts the process.
//!
//! ## How it works
//!
//! A background probe thread posts a tiny acknowledgment task onto the main
//! context's queue, sleeps for the threshold, and checks whether the task has
//! run. If it has not, the round is a stall and the [`StallPolicy`] reacts.
//! The probe then waits for the outstanding task before posting another, so
//! a blocked main context never accumulates more than one probe.
//!
//! ## Architecture
//!
//! - [`queue`] - The [`TaskQueue`] seam and the ready-made [`MainQueue`]
//! - [`probe`] - The probe scheduler and its background loop
//! - [`watchdog`] - The controller owning configuration and lifecycle
//! - [`policy`] - Stall message, log sink and strict-mode reaction
//! - [`config`] - Threshold and strict-mode configuration
//! - [`stats`] - Round, stall and latency counters
//! - [`error`] - Watchdog-specific error types
//!
//! ## Example
//!
//! ```rust
//! use stallwatch::prelude::*;
//! use std::sync::Arc;
//! use std::time::Duration;
//! use parking_lot::Mutex;
//!
//! let queue = MainQueue::new();
//! let messages = Arc::new(Mutex::new(Vec::new()));
//! let sink = Arc::clone(&messages);
//!
//! let config = WatchdogConfig::builder().threshold_ms(50).build()?;
//! let watchdog = Watchdog::with_logger(
//!     config,
//!     move |message: &str| sink.lock().push(message.to_string()),
//!     queue.handle(),
//! )?;
//!
//! // Block the "main thread" well past the threshold.
//! std::thread::sleep(Duration::from_millis(150));
//! queue.run_pending();
//!
//! watchdog.shutdown_draining(|| {
//!     queue.run_for(Duration::from_millis(5));
//! })?;
//! assert!(messages.lock().iter().all(|m| m == "Main thread was blocked for 0.05s"));
//! assert!(!messages.lock().is_empty());
//! # Ok::<(), stallwatch::WatchdogError>(())
//! ```

#![deny(
    unsafe_op_in_unsafe_fn,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic_in_result_fn,
    clippy::panic,
    missing_docs,
    missing_debug_implementations
)]
#![warn(clippy::pedantic)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod ack;
pub mod config;
pub mod error;
pub mod policy;
pub mod probe;
pub mod queue;
pub mod stats;
pub mod watchdog;

pub mod prelude;

pub use config::{DEFAULT_THRESHOLD, MAX_THRESHOLD, WatchdogConfig, WatchdogConfigBuilder};
pub use error::{WatchdogError, WatchdogResult};
pub use policy::{FatalHook, LogSink, StallPolicy, WatchdogOptions, stall_message};
pub use probe::{ProbeScheduler, StallHandler};
pub use queue::{MainQueue, MainQueueHandle, Task, TaskQueue};
pub use stats::ProbeStats;
pub use watchdog::{Watchdog, WatchdogState};
