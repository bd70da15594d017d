use anyhow::Result;

use crate::commands::{CommandReport, load_context};
use crate::essence::audit;
use crate::essence::reconcile::{CleanupOutcome, cleanup_and_reorder};

#[derive(Debug, Clone, Default)]
pub struct CleanupOptions {
    pub dry_run: bool,
}

fn describe(outcome: &CleanupOutcome, report: &mut CommandReport) {
    let (remove_verb, rename_verb) = if outcome.dry_run {
        ("would remove", "would rename")
    } else {
        ("removed", "renamed")
    };
    for name in &outcome.removed {
        report.detail(format!("{remove_verb}: {name}"));
    }
    for step in &outcome.renames {
        report.detail(format!("{rename_verb}: {} -> {}", step.from, step.to));
    }
    for name in &outcome.skipped {
        report.detail(format!("left misnamed: {name}"));
    }
    if let Some(rebuild) = &outcome.rebuild {
        report.detail(format!(
            "updated {} with {} conversations",
            rebuild.index_path.display(),
            rebuild.entries
        ));
    }
    if !outcome.changed() {
        report.detail("no changes needed; all conversations are valid and in order");
    }
}

pub fn run(opts: &CleanupOptions) -> Result<CommandReport> {
    let mut report = CommandReport::new("cleanup");
    let (paths, cfg) = load_context()?;

    let outcome = match cleanup_and_reorder(&paths, opts.dry_run) {
        Ok(outcome) => outcome,
        Err(err) => {
            audit::record(
                &paths,
                cfg.audit.enabled,
                "cleanup",
                "failed",
                &format!("{err:#}"),
            );
            return Err(err);
        }
    };
    describe(&outcome, &mut report);

    if !opts.dry_run {
        audit::record(
            &paths,
            cfg.audit.enabled,
            "cleanup",
            "ok",
            &format!(
                "removed={} renamed={}",
                outcome.removed.len(),
                outcome.renames.len()
            ),
        );
    }
    Ok(report)
}
