use anyhow::Result;

use crate::commands::{CommandReport, load_context};
use crate::essence::{audit, reconcile};

pub fn run() -> Result<CommandReport> {
    let mut report = CommandReport::new("update-index");
    let (paths, cfg) = load_context()?;

    let outcome = match reconcile::rebuild_index(&paths) {
        Ok(outcome) => outcome,
        Err(err) => {
            audit::record(
                &paths,
                cfg.audit.enabled,
                "rebuild",
                "failed",
                &format!("{err:#}"),
            );
            return Err(err);
        }
    };

    report.detail(format!(
        "updated {} with {} conversations",
        outcome.index_path.display(),
        outcome.entries
    ));
    for name in &outcome.omitted {
        report.detail(format!("omitted unreadable entry: {name}"));
    }
    audit::record(
        &paths,
        cfg.audit.enabled,
        "rebuild",
        "ok",
        &format!(
            "entries={} omitted={}",
            outcome.entries,
            outcome.omitted.len()
        ),
    );
    Ok(report)
}
