//! Prelude for stallwatch.
//!
//! This module re-exports the most commonly used types for convenient importing.
//!
//! # Example
//!
//! ```rust
//! use stallwatch::prelude::*;
//!
//! let queue = MainQueue::new();
//! let watchdog = Watchdog::new(queue.handle())?;
//! assert_eq!(watchdog.threshold(), DEFAULT_THRESHOLD);
//!
//! drop(queue);
//! watchdog.shutdown()?;
//! # Ok::<(), WatchdogError>(())
//! ```

pub use crate::config::{DEFAULT_THRESHOLD, WatchdogConfig, WatchdogConfigBuilder};
pub use crate::error::{WatchdogError, WatchdogResult};
pub use crate::policy::{WatchdogOptions, stall_message};
pub use crate::probe::ProbeScheduler;
pub use crate::queue::{MainQueue, MainQueueHandle, Task, TaskQueue};
pub use crate::stats::ProbeStats;
pub use crate::watchdog::{Watchdog, WatchdogState};
