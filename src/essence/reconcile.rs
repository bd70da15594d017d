use crate::error::EssenceError;
use crate::essence::paths::EssencePaths;
use crate::essence::store::{self, ConversationSummary, IndexRecord};
use crate::essence::validator::{EntryName, has_metadata_file, parse_entry_name};
use crate::essence::warn::{self, WarnEvent};
use anyhow::{Context, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

/// Real entry names start with a digit, so nothing else can carry this prefix.
pub const TEMP_PREFIX: &str = ".renumber-";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameStep {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Default)]
pub struct RenumberPlan {
    pub moves: Vec<RenameStep>,
    pub in_place: usize,
    pub skipped: Vec<String>,
    pub duplicate_numbers: Vec<u32>,
}

#[derive(Debug, Clone)]
pub struct RebuildOutcome {
    pub index_path: PathBuf,
    pub entries: usize,
    pub omitted: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CleanupOutcome {
    pub dry_run: bool,
    pub removed: Vec<String>,
    pub renames: Vec<RenameStep>,
    /// Misnamed entries renumber left where they were.
    pub skipped: Vec<String>,
    pub rebuild: Option<RebuildOutcome>,
}

impl CleanupOutcome {
    pub fn changed(&self) -> bool {
        !self.removed.is_empty() || !self.renames.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct CollectedSummaries {
    pub conversations: BTreeMap<u32, ConversationSummary>,
    pub omitted: Vec<String>,
}

pub(crate) fn list_dirs(root: &Path) -> Result<Vec<(String, PathBuf)>> {
    if !root.exists() {
        log::warn!("conversations directory not found: {}", root.display());
        return Ok(Vec::new());
    }
    let entries =
        fs::read_dir(root).with_context(|| format!("failed to read {}", root.display()))?;
    let mut out = Vec::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("failed to read {}", root.display()))?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        out.push((entry.file_name().to_string_lossy().into_owned(), path));
    }
    out.sort();
    Ok(out)
}

fn warn_naming(stage: &str, name: &str, path: &Path, err: &EssenceError) {
    warn::emit(WarnEvent {
        code: "NAMING_FORMAT",
        stage,
        action: "skip-entry",
        entry: name,
        path: &path.display().to_string(),
        reason: "numeric-prefix-missing-or-unparsable",
        err: &err.to_string(),
    });
}

/// Deletes every directory under `conversations_dir` that holds neither a
/// primary nor a legacy metadata file. There is no backup.
pub fn prune_invalid(conversations_dir: &Path, dry_run: bool) -> Result<Vec<String>> {
    let mut removed = Vec::new();
    for (name, path) in list_dirs(conversations_dir)? {
        if has_metadata_file(&path) {
            continue;
        }
        if !dry_run {
            fs::remove_dir_all(&path)
                .with_context(|| format!("failed to remove {}", path.display()))?;
            log::info!("removed invalid conversation directory {name}");
        }
        removed.push(name);
    }
    Ok(removed)
}

pub fn plan_renumber(conversations_dir: &Path) -> Result<RenumberPlan> {
    let mut plan = RenumberPlan::default();
    let mut candidates = Vec::<(EntryName, String)>::new();

    for (name, path) in list_dirs(conversations_dir)? {
        if !has_metadata_file(&path) {
            continue;
        }
        match parse_entry_name(&name) {
            Ok(parsed) => candidates.push((parsed, name)),
            Err(err) => {
                warn_naming("renumber", &name, &path, &err);
                plan.skipped.push(name);
            }
        }
    }

    candidates.sort();

    for pair in candidates.windows(2) {
        let number = pair[0].0.number;
        if number == pair[1].0.number && plan.duplicate_numbers.last() != Some(&number) {
            plan.duplicate_numbers.push(number);
            warn::emit(WarnEvent {
                code: "DUPLICATE_NUMBER",
                stage: "renumber",
                action: "order-by-slug",
                entry: &pair[0].1,
                path: &conversations_dir.display().to_string(),
                reason: "several-entries-share-a-number",
                err: &format!("{} and {}", pair[0].1, pair[1].1),
            });
        }
    }

    for (position, (parsed, name)) in candidates.into_iter().enumerate() {
        let target = EntryName {
            number: position as u32 + 1,
            slug: parsed.slug,
        }
        .dir_name();
        if target == name {
            plan.in_place += 1;
        } else {
            plan.moves.push(RenameStep {
                from: name,
                to: target,
            });
        }
    }

    Ok(plan)
}

fn temp_name(step: &RenameStep) -> String {
    format!("{TEMP_PREFIX}{}", step.to)
}

/// Two-phase rename: every moving entry is parked under a temp name first,
/// so no final rename can land on a path another entry still occupies.
pub fn apply_renumber(conversations_dir: &Path, plan: &RenumberPlan) -> Result<Vec<RenameStep>> {
    if plan.moves.is_empty() {
        return Ok(Vec::new());
    }

    let vacating = plan
        .moves
        .iter()
        .map(|step| step.from.as_str())
        .collect::<BTreeSet<_>>();
    for step in &plan.moves {
        let target = conversations_dir.join(&step.to);
        let temp = conversations_dir.join(temp_name(step));
        let target_blocked = target.exists() && !vacating.contains(step.to.as_str());
        if target_blocked || temp.exists() {
            return Err(EssenceError::RenameCollision {
                from: step.from.clone(),
                to: if target_blocked {
                    step.to.clone()
                } else {
                    temp_name(step)
                },
            }
            .into());
        }
    }

    let mut parked = Vec::<(&RenameStep, PathBuf)>::with_capacity(plan.moves.len());
    for step in &plan.moves {
        let from = conversations_dir.join(&step.from);
        let temp = conversations_dir.join(temp_name(step));
        if let Err(err) = fs::rename(&from, &temp) {
            for (done, done_temp) in parked.iter().rev() {
                if let Err(undo) = fs::rename(done_temp, conversations_dir.join(&done.from)) {
                    log::error!(
                        "failed to restore {} from {}: {undo}",
                        done.from,
                        done_temp.display()
                    );
                }
            }
            return Err(err).with_context(|| {
                format!("failed to move {} to {}", from.display(), temp.display())
            });
        }
        parked.push((step, temp));
    }

    let mut renamed = Vec::with_capacity(parked.len());
    for (step, temp) in parked {
        let target = conversations_dir.join(&step.to);
        fs::rename(&temp, &target).with_context(|| {
            format!("failed to move {} to {}", temp.display(), target.display())
        })?;
        log::info!("renamed conversation {} -> {}", step.from, step.to);
        renamed.push(step.clone());
    }
    Ok(renamed)
}

/// Reads every entry's metadata. Entries that cannot be read are logged and
/// left out; the caller still gets a usable mapping.
pub fn collect_summaries(conversations_dir: &Path) -> Result<CollectedSummaries> {
    let mut out = CollectedSummaries::default();

    for (name, path) in list_dirs(conversations_dir)? {
        let parsed = match parse_entry_name(&name) {
            Ok(parsed) => parsed,
            Err(err) => {
                warn_naming("rebuild-index", &name, &path, &err);
                out.omitted.push(name);
                continue;
            }
        };

        let entry = match store::read_entry_metadata(&path) {
            Ok(entry) => entry,
            Err(EssenceError::NotFound(_)) => {
                log::debug!("skipping {name}: no conversation file");
                continue;
            }
            Err(err) => {
                warn::emit(WarnEvent {
                    code: "ENTRY_READ_FAILED",
                    stage: "rebuild-index",
                    action: "omit-entry",
                    entry: &name,
                    path: &path.display().to_string(),
                    reason: if err.is_recoverable() {
                        "malformed-conversation-file"
                    } else {
                        "unreadable-conversation-file"
                    },
                    err: &err.to_string(),
                });
                out.omitted.push(name);
                continue;
            }
        };

        if out.conversations.contains_key(&parsed.number) {
            warn::emit(WarnEvent {
                code: "DUPLICATE_NUMBER",
                stage: "rebuild-index",
                action: "omit-entry",
                entry: &name,
                path: &path.display().to_string(),
                reason: "number-already-indexed",
                err: "",
            });
            out.omitted.push(name);
            continue;
        }
        out.conversations.insert(
            parsed.number,
            ConversationSummary::from_entry(&parsed.slug, &entry),
        );
    }

    Ok(out)
}

pub fn rebuild_index(paths: &EssencePaths) -> Result<RebuildOutcome> {
    let mut index: IndexRecord = store::load_index(&paths.meta_file)
        .with_context(|| format!("failed to load {}", paths.meta_file.display()))?;
    let collected = collect_summaries(&paths.conversations_dir)?;

    index.conversations = collected.conversations;
    store::write_index(&paths.meta_file, &index)
        .with_context(|| format!("failed to write {}", paths.meta_file.display()))?;
    log::info!(
        "updated {} with {} conversations",
        paths.meta_file.display(),
        index.conversations.len()
    );

    Ok(RebuildOutcome {
        index_path: paths.meta_file.clone(),
        entries: index.conversations.len(),
        omitted: collected.omitted,
    })
}

/// Prune, then renumber; the index is only rewritten when either step
/// changed the tree.
pub fn cleanup_and_reorder(paths: &EssencePaths, dry_run: bool) -> Result<CleanupOutcome> {
    let removed = prune_invalid(&paths.conversations_dir, dry_run)?;
    // Dirs without metadata are ignored by the plan, so a dry run sees the
    // same plan a real run would after pruning.
    let plan = plan_renumber(&paths.conversations_dir)?;
    let renames = if dry_run {
        plan.moves.clone()
    } else {
        apply_renumber(&paths.conversations_dir, &plan)?
    };

    let mut out = CleanupOutcome {
        dry_run,
        removed,
        renames,
        skipped: plan.skipped,
        rebuild: None,
    };
    if !dry_run && out.changed() {
        out.rebuild = Some(rebuild_index(paths)?);
    }
    Ok(out)
}
