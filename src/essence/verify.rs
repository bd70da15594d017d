use crate::essence::paths::EssencePaths;
use crate::essence::reconcile::{collect_summaries, list_dirs, plan_renumber};
use crate::essence::store::{self, format_number};
use crate::essence::validator::{has_metadata_file, has_numeric_prefix, is_valid_entry_dir};
use anyhow::Result;

#[derive(Debug, Clone, Default)]
pub struct VerifyOutcome {
    pub checked_dirs: usize,
    pub valid_dirs: usize,
    pub in_sequence: usize,
    pub issues: Vec<String>,
}

/// Reports every structural problem without changing anything on disk.
pub fn verify_structure(paths: &EssencePaths) -> Result<VerifyOutcome> {
    let mut out = VerifyOutcome::default();

    if !paths.essence_dir.is_dir() {
        out.issues.push(format!(
            "essence directory missing: {}",
            paths.essence_dir.display()
        ));
    }
    if !paths.conversations_dir.is_dir() {
        out.issues.push(format!(
            "conversations directory missing: {}",
            paths.conversations_dir.display()
        ));
        return Ok(out);
    }
    if !paths.meta_file.is_file() {
        out.issues
            .push(format!("meta file missing: {}", paths.meta_file.display()));
    }

    for (name, path) in list_dirs(&paths.conversations_dir)? {
        out.checked_dirs += 1;
        if is_valid_entry_dir(&path) {
            out.valid_dirs += 1;
        }
        if !has_numeric_prefix(&name) {
            out.issues
                .push(format!("invalid conversation directory name: {name}"));
        }
        if !has_metadata_file(&path) {
            out.issues
                .push(format!("missing conversation file in: {name}"));
        }
    }

    let plan = plan_renumber(&paths.conversations_dir)?;
    out.in_sequence = plan.in_place;
    for number in &plan.duplicate_numbers {
        out.issues.push(format!(
            "duplicate conversation number: {}",
            format_number(*number)
        ));
    }
    for step in &plan.moves {
        out.issues.push(format!(
            "out of sequence: {} (expected {})",
            step.from, step.to
        ));
    }
    for name in &plan.skipped {
        out.issues
            .push(format!("conversation name has no NNN_slug form: {name}"));
    }

    let collected = collect_summaries(&paths.conversations_dir)?;
    for name in &collected.omitted {
        let has_file = has_metadata_file(&paths.conversations_dir.join(name));
        if has_file && !plan.skipped.contains(name) {
            out.issues
                .push(format!("conversation cannot be indexed: {name}"));
        }
    }

    if paths.meta_file.is_file() {
        match store::load_index(&paths.meta_file) {
            Ok(index) => {
                let expected = &collected.conversations;
                for (number, summary) in expected {
                    match index.conversations.get(number) {
                        None => out.issues.push(format!(
                            "index missing conversation {} ({})",
                            format_number(*number),
                            summary.slug
                        )),
                        Some(indexed) if indexed != summary => out.issues.push(format!(
                            "index out of date for conversation {} ({})",
                            format_number(*number),
                            summary.slug
                        )),
                        Some(_) => {}
                    }
                }
                for (number, indexed) in &index.conversations {
                    if !expected.contains_key(number) {
                        out.issues.push(format!(
                            "index lists unknown conversation {} ({})",
                            format_number(*number),
                            indexed.slug
                        ));
                    }
                }
            }
            Err(err) => out.issues.push(format!("meta file unreadable: {err}")),
        }
    }

    Ok(out)
}
