use anyhow::{Context, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::commands::{CommandReport, load_context};
use crate::essence::watcher;

pub fn run() -> Result<CommandReport> {
    let mut report = CommandReport::new("watch");
    let (paths, cfg) = load_context()?;

    let stop = Arc::new(AtomicBool::new(false));
    let handler_stop = Arc::clone(&stop);
    ctrlc::set_handler(move || handler_stop.store(true, Ordering::SeqCst))
        .context("failed to install interrupt handler")?;

    log::info!(
        "watch started; cooldown_ms={} (Ctrl-C to stop)",
        cfg.watcher.cooldown_ms
    );
    let stats = watcher::run(&paths, &cfg.watcher, cfg.audit.enabled, &stop)?;

    report.detail("watcher stopped");
    report.detail(format!("rebuilds={}", stats.rebuilds));
    report.detail(format!("debounced={}", stats.debounced));
    report.detail(format!("ignored={}", stats.ignored));
    if stats.failures > 0 {
        report.issue(format!("failed rebuilds: {}", stats.failures));
    }
    Ok(report)
}
