//! Output formatting for CLI responses

use anyhow::{Error, Result};
use colored::Colorize;
use serde_json::json;
use stallwatch::WatchdogConfig;

use crate::demo::DemoReport;

/// Print error in JSON format
pub fn print_error_json(error: &Error) {
    let error_json = json!({
        "success": false,
        "error": {
            "message": error.to_string(),
            "chain": error.chain().skip(1).map(ToString::to_string).collect::<Vec<_>>(),
        }
    });
    match serde_json::to_string_pretty(&error_json) {
        Ok(s) => println!("{s}"),
        Err(e) => eprintln!("Failed to format error as JSON: {e}"),
    }
}

/// Print error in human-readable format
pub fn print_error_human(error: &Error) {
    eprintln!("{} {}", "Error:".red().bold(), error);

    for cause in error.chain().skip(1) {
        eprintln!("  {} {}", "Caused by:".yellow(), cause);
    }
}

/// Print the effective configuration
pub fn print_config(config: &WatchdogConfig, json: bool) -> Result<()> {
    if json {
        let output = json!({
            "success": true,
            "config": config,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("{} configuration is valid", "✓".green());
        println!("  threshold:   {:.2}s", config.threshold.as_secs_f64());
        println!("  strict mode: {}", config.strict_mode);
    }
    Ok(())
}

/// Print the outcome of a demo run
pub fn print_demo_report(report: &DemoReport, json: bool) -> Result<()> {
    if json {
        let output = json!({
            "success": true,
            "report": report,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let stats = &report.stats;
    println!("{}", "Watchdog demo finished".bold());
    println!(
        "  threshold {:.2}s, strict mode {}",
        report.config.threshold.as_secs_f64(),
        report.config.strict_mode
    );
    println!("  blocks induced:   {}", report.blocks);
    println!("  probe rounds:     {}", stats.rounds);
    println!("  stalls detected:  {}", stats.stalls);
    println!("  stall rate:       {:.1}%", stats.stall_rate());
    println!("  worst round trip: {:?}", stats.worst_latency);

    if report.messages.is_empty() {
        println!("  {}", "no stall messages".green());
    } else {
        for message in &report.messages {
            println!("  {} {}", "!".yellow().bold(), message);
        }
    }
    Ok(())
}
