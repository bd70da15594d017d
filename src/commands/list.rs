use anyhow::{Context, Result};

use crate::commands::{CommandReport, load_context};
use crate::essence::store::{self, format_number};

pub fn run() -> Result<CommandReport> {
    let mut report = CommandReport::new("list");
    let (paths, _) = load_context()?;

    if !paths.meta_file.is_file() {
        report.issue(format!("meta file missing: {}", paths.meta_file.display()));
        return Ok(report);
    }
    let index = store::load_index(&paths.meta_file)
        .with_context(|| format!("failed to load {}", paths.meta_file.display()))?;

    if index.conversations.is_empty() {
        report.detail("no conversations");
    }
    for (number, summary) in &index.conversations {
        report.detail(format!("{}: {}", format_number(*number), summary.slug));
        if let Some(abstract_text) = summary.abstract_text.as_deref().filter(|s| !s.is_empty()) {
            report.detail(format!("    {abstract_text}"));
        }
    }
    Ok(report)
}
