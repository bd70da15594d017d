use anyhow::Result;

use crate::commands::{CommandReport, load_context};
use crate::essence::{audit, create, reconcile};

#[derive(Debug, Clone, Default)]
pub struct CreateOptions {
    pub title: String,
}

pub fn run(opts: &CreateOptions) -> Result<CommandReport> {
    let mut report = CommandReport::new("create");
    let (paths, cfg) = load_context()?;

    let created = create::create_entry(&paths, &opts.title)?;
    report.detail(format!("created: {}", created.name.dir_name()));
    report.detail(format!("path={}", created.dir.display()));

    let rebuild = reconcile::rebuild_index(&paths)?;
    report.detail(format!("index updated: {} conversations", rebuild.entries));
    audit::record(
        &paths,
        cfg.audit.enabled,
        "create",
        "ok",
        &created.name.dir_name(),
    );
    Ok(report)
}
