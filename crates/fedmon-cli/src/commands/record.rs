//! `fedmon record` — sample into the local store.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use fedmon_core::{Monitor, MonitorConfig};

use super::parse_duration_or_exit;

pub fn run(mut config: MonitorConfig, duration: Option<&str>, interval: Option<&str>) {
    let max_duration = duration.map(parse_duration_or_exit);
    if let Some(iv) = interval.map(parse_duration_or_exit) {
        let ms = iv.as_millis();
        if ms == 0 {
            eprintln!("Error: interval must be at least 1ms");
            std::process::exit(1);
        }
        config.sample_interval_ms = u64::try_from(ms).unwrap_or(u64::MAX);
    }

    // Set up Ctrl+C handler
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    }) {
        eprintln!("Error setting Ctrl+C handler: {e}");
        std::process::exit(1);
    }

    println!("Recording");
    println!("  Store:     {}", config.local_db.display());
    println!("  Interval:  {}ms", config.sample_interval_ms);
    println!("  Purge:     {}", config.purge_policy);
    match max_duration {
        Some(d) => println!("  Duration:  {}s", d.as_secs()),
        None => println!("  Duration:  until Ctrl+C"),
    }
    println!();

    let mut monitor = match Monitor::start(config) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("Error starting monitor: {e}");
            std::process::exit(1);
        }
    };

    let start = Instant::now();
    while running.load(Ordering::SeqCst) {
        if max_duration.is_some_and(|max| start.elapsed() >= max) {
            break;
        }
        std::thread::sleep(Duration::from_millis(100));
    }

    let stats = monitor.stop();
    let counts = match monitor.counts() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error reading store: {e}");
            std::process::exit(1);
        }
    };

    println!("Stopped after {:.1}s", start.elapsed().as_secs_f64());
    println!("  Measurements: {}", counts.measurements);
    println!("  Epochs:       {}", counts.epochs);
    println!("  Batches:      {}", counts.batches);
    if let Some(failed) = stats.map(|s| s.failed).filter(|f| *f > 0) {
        eprintln!("Warning: {failed} writes failed");
    }
}
