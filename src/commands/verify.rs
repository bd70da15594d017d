use anyhow::Result;

use crate::commands::{CommandReport, load_context};
use crate::essence::verify;

#[derive(Debug, Clone, Default)]
pub struct VerifyOptions {
    pub strict: bool,
}

pub fn run(opts: &VerifyOptions) -> Result<CommandReport> {
    let mut report = CommandReport::new("verify");
    let (paths, _) = load_context()?;

    let outcome = verify::verify_structure(&paths)?;
    report.detail(format!(
        "checked {} directories ({} valid, {} in sequence)",
        outcome.checked_dirs, outcome.valid_dirs, outcome.in_sequence
    ));
    for issue in outcome.issues {
        report.issue(issue);
    }
    if report.ok {
        report.detail("all checks passed");
    } else if opts.strict {
        report.issue("strict verify failed");
    }

    Ok(report)
}
