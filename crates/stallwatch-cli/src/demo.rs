//! A simulated event loop that blocks itself on a schedule.
//!
//! The process main thread owns a [`MainQueue`] and drains it, except during
//! the scheduled blocks, which the watchdog should report.

use anyhow::Result;
use clap::Args;
use parking_lot::Mutex;
use serde::Serialize;
use stallwatch::{MainQueue, ProbeStats, Watchdog, WatchdogConfig};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// How long the main queue runs between checks for a scheduled block.
const PUMP_SLICE: Duration = Duration::from_millis(5);

/// Arguments for the `demo` command.
#[derive(Args, Debug, Clone)]
pub struct DemoArgs {
    /// Path to a JSON configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub watchdog: crate::config::WatchdogArgs,

    /// Length of each simulated block of the main thread (milliseconds)
    #[arg(long, default_value_t = 600)]
    pub block_ms: u64,

    /// Time between the end of one block and the start of the next (milliseconds)
    #[arg(long, default_value_t = 1500)]
    pub every_ms: u64,

    /// Total run time of the demo loop (milliseconds)
    #[arg(long, default_value_t = 4000)]
    pub duration_ms: u64,
}

impl DemoArgs {
    /// The block schedule described by the flags.
    pub fn plan(&self) -> BlockPlan {
        BlockPlan {
            block: Duration::from_millis(self.block_ms),
            every: Duration::from_millis(self.every_ms),
            duration: Duration::from_millis(self.duration_ms),
        }
    }
}

/// When and for how long the demo blocks its main thread.
#[derive(Debug, Clone, Copy)]
pub struct BlockPlan {
    pub block: Duration,
    pub every: Duration,
    pub duration: Duration,
}

/// Outcome of a demo run.
#[derive(Debug, Serialize)]
pub struct DemoReport {
    pub config: WatchdogConfig,
    pub blocks: u32,
    pub stats: ProbeStats,
    pub messages: Vec<String>,
}

/// Run the demo loop on the calling thread.
pub fn run(config: WatchdogConfig, plan: &BlockPlan) -> Result<DemoReport> {
    let queue = MainQueue::new();
    let messages = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&messages);

    let watchdog = Watchdog::with_logger(
        config,
        move |message: &str| {
            tracing::warn!("{message}");
            sink.lock().push(message.to_string());
        },
        queue.handle(),
    )?;

    let started = Instant::now();
    let mut last_block = started;
    let mut blocks = 0u32;

    while started.elapsed() < plan.duration {
        if last_block.elapsed() >= plan.every {
            tracing::info!(block = ?plan.block, "blocking main thread");
            thread::sleep(plan.block);
            blocks = blocks.saturating_add(1);
            last_block = Instant::now();
        }
        queue.run_for(PUMP_SLICE);
    }

    let stats = watchdog.shutdown_draining(|| {
        queue.run_for(PUMP_SLICE);
    })?;

    let messages = std::mem::take(&mut *messages.lock());
    Ok(DemoReport {
        config,
        blocks,
        stats,
        messages,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[test]
    fn demo_reports_each_block() -> TestResult {
        let config = WatchdogConfig::builder().threshold_ms(50).build()?;
        let plan = BlockPlan {
            block: Duration::from_millis(250),
            every: Duration::from_millis(200),
            duration: Duration::from_millis(900),
        };

        let report = run(config, &plan)?;
        assert!(report.blocks >= 1);
        assert!(report.stats.stalls >= u64::from(report.blocks));
        assert!(!report.messages.is_empty());
        assert!(
            report
                .messages
                .iter()
                .all(|m| m == "Main thread was blocked for 0.05s")
        );
        Ok(())
    }

    #[test]
    fn demo_without_blocks_is_quiet() -> TestResult {
        let config = WatchdogConfig::builder().threshold_ms(50).build()?;
        let plan = BlockPlan {
            block: Duration::from_millis(250),
            every: Duration::from_secs(60),
            duration: Duration::from_millis(300),
        };

        let report = run(config, &plan)?;
        assert_eq!(report.blocks, 0);
        assert_eq!(report.stats.stalls, 0);
        assert!(report.messages.is_empty());
        Ok(())
    }

    #[test]
    fn report_stats_cover_the_last_round() -> TestResult {
        let config = WatchdogConfig::builder().threshold_ms(50).build()?;
        let plan = BlockPlan {
            block: Duration::from_millis(200),
            every: Duration::from_millis(150),
            duration: Duration::from_millis(200),
        };

        // The only block runs right up to the end of the loop.
        let report = run(config, &plan)?;
        assert_eq!(report.blocks, 1);
        assert_eq!(report.stats.stalls, u64::try_from(report.messages.len())?);
        assert!(report.stats.rounds >= report.stats.stalls);
        assert!(report.stats.worst_latency >= Duration::from_millis(150));
        Ok(())
    }
}
