use anyhow::Result;
use colored::Colorize;
use std::time::{Duration, Instant};

/// Run one top-level step, framing it with start and end markers.
///
/// ```text
/// ==> sync postgresql
/// <== sync postgresql done (1.3s)
/// ```
pub fn run_step<T>(name: &str, step: impl FnOnce() -> Result<T>) -> Result<T> {
    println!("{} {}", "==>".blue().bold(), name.bold());
    let started = Instant::now();

    match step() {
        Ok(value) => {
            println!(
                "{} {} done ({})",
                "<==".green().bold(),
                name,
                format_duration(started.elapsed())
            );
            Ok(value)
        }
        Err(e) => {
            eprintln!("{} {} failed: {:#}", "<==".red().bold(), name, e);
            Err(e)
        }
    }
}

/// Format elapsed time as `850ms`, `4.2s` or `2m05s`.
pub fn format_duration(elapsed: Duration) -> String {
    let millis = elapsed.as_millis();
    if millis < 1000 {
        format!("{millis}ms")
    } else if millis < 60_000 {
        format!("{:.1}s", elapsed.as_secs_f64())
    } else {
        let secs = elapsed.as_secs();
        format!("{}m{:02}s", secs / 60, secs % 60)
    }
}
