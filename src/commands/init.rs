use anyhow::{Context, Result};
use std::fs;

use crate::commands::{CommandReport, load_context};
use crate::essence::audit;
use crate::essence::store::{self, IndexRecord};

pub fn run() -> Result<CommandReport> {
    let mut report = CommandReport::new("init");
    let (paths, cfg) = load_context()?;

    for dir in [&paths.essence_dir, &paths.conversations_dir] {
        if dir.is_dir() {
            report.detail(format!("exists: {}", dir.display()));
            continue;
        }
        fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
        report.detail(format!("created: {}", dir.display()));
    }

    if paths.meta_file.exists() {
        report.detail(format!("exists: {}", paths.meta_file.display()));
    } else {
        store::write_index(&paths.meta_file, &IndexRecord::default_template())
            .with_context(|| format!("failed to write {}", paths.meta_file.display()))?;
        report.detail(format!("created: {}", paths.meta_file.display()));
    }

    audit::record(&paths, cfg.audit.enabled, "init", "ok", "layout ready");
    Ok(report)
}
