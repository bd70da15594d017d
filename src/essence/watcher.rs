use crate::essence::audit;
use crate::essence::config::EssenceWatcherConfig;
use crate::essence::paths::EssencePaths;
use crate::essence::reconcile::{RebuildOutcome, rebuild_index};
use crate::essence::store::PRIMARY_FILE;
use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, RecvTimeoutError, TrySendError, bounded};
use notify::event::{CreateKind, RemoveKind};
use notify::{Event, EventKind, RecursiveMode, Watcher, recommended_watcher};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

#[derive(Debug)]
pub enum WatchSignal {
    Changed(Event),
    Error(String),
}

#[derive(Debug, Clone, Copy)]
pub struct Debouncer {
    cooldown: Duration,
    last_trigger: Option<Instant>,
}

impl Debouncer {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_trigger: None,
        }
    }

    /// Returns true and records `now` when idle or the cooldown has elapsed.
    pub fn try_fire(&mut self, now: Instant) -> bool {
        let ready = match self.last_trigger {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.cooldown,
        };
        if ready {
            self.last_trigger = Some(now);
        }
        ready
    }
}

fn is_entry_file(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    name == PRIMARY_FILE && !path.is_dir()
}

pub fn is_relevant(event: &Event) -> bool {
    if matches!(
        event.kind,
        EventKind::Access(_)
            | EventKind::Create(CreateKind::Folder)
            | EventKind::Remove(RemoveKind::Folder)
    ) {
        return false;
    }
    event.paths.iter().any(|p| is_entry_file(p))
}

#[derive(Debug)]
pub enum TriggerOutcome {
    Ignored,
    Debounced,
    Rebuilt(RebuildOutcome),
    Failed(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatchStats {
    pub ignored: usize,
    pub debounced: usize,
    pub rebuilds: usize,
    pub failures: usize,
}

pub struct ChangeTrigger {
    paths: EssencePaths,
    debouncer: Debouncer,
    audit_enabled: bool,
    stats: WatchStats,
}

impl ChangeTrigger {
    pub fn new(paths: EssencePaths, cooldown: Duration, audit_enabled: bool) -> Self {
        Self {
            paths,
            debouncer: Debouncer::new(cooldown),
            audit_enabled,
            stats: WatchStats::default(),
        }
    }

    pub fn stats(&self) -> WatchStats {
        self.stats
    }

    pub fn handle(&mut self, event: &Event, now: Instant) -> TriggerOutcome {
        if !is_relevant(event) {
            self.stats.ignored += 1;
            return TriggerOutcome::Ignored;
        }
        if !self.debouncer.try_fire(now) {
            self.stats.debounced += 1;
            return TriggerOutcome::Debounced;
        }

        match rebuild_index(&self.paths) {
            Ok(outcome) => {
                self.stats.rebuilds += 1;
                audit::record(
                    &self.paths,
                    self.audit_enabled,
                    "watch",
                    "ok",
                    &format!(
                        "entries={} omitted={}",
                        outcome.entries,
                        outcome.omitted.len()
                    ),
                );
                TriggerOutcome::Rebuilt(outcome)
            }
            Err(err) => {
                self.stats.failures += 1;
                let message = format!("{err:#}");
                log::error!("index rebuild failed: {message}");
                audit::record(&self.paths, self.audit_enabled, "watch", "failed", &message);
                TriggerOutcome::Failed(message)
            }
        }
    }
}

/// Drains `rx` until `stop` is raised or every sender is gone.
pub fn run_loop(
    trigger: &mut ChangeTrigger,
    rx: &Receiver<WatchSignal>,
    stop: &AtomicBool,
    tick: Duration,
) -> WatchStats {
    while !stop.load(Ordering::SeqCst) {
        match rx.recv_timeout(tick) {
            Ok(WatchSignal::Changed(event)) => match trigger.handle(&event, Instant::now()) {
                TriggerOutcome::Rebuilt(outcome) if !outcome.omitted.is_empty() => {
                    log::warn!("rebuild omitted: {}", outcome.omitted.join(", "));
                }
                TriggerOutcome::Failed(message) => {
                    log::debug!("listener continues after failed rebuild: {message}");
                }
                _ => {}
            },
            Ok(WatchSignal::Error(message)) => log::warn!("watch error: {message}"),
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    trigger.stats()
}

/// The notify callback only forwards events; rebuilds run serially on the
/// calling thread until `stop` is raised.
pub fn run(
    paths: &EssencePaths,
    cfg: &EssenceWatcherConfig,
    audit_enabled: bool,
    stop: &AtomicBool,
) -> Result<WatchStats> {
    let root = paths.conversations_dir.clone();
    if !root.is_dir() {
        anyhow::bail!("conversations directory not found: {}", root.display());
    }

    let (tx, rx) = bounded::<WatchSignal>(cfg.channel_capacity);
    let mut watcher = recommended_watcher(move |res: notify::Result<Event>| {
        let signal = match res {
            Ok(event) => WatchSignal::Changed(event),
            Err(err) => WatchSignal::Error(err.to_string()),
        };
        if let Err(TrySendError::Full(_)) = tx.try_send(signal) {
            log::debug!("watch channel full; dropping event");
        }
    })
    .with_context(|| format!("failed to create watcher for {}", root.display()))?;
    watcher
        .watch(&root, RecursiveMode::Recursive)
        .with_context(|| format!("failed to watch {}", root.display()))?;
    log::info!("watching {}", root.display());

    let mut trigger = ChangeTrigger::new(paths.clone(), cfg.cooldown(), audit_enabled);
    let stats = run_loop(&mut trigger, &rx, stop, cfg.tick());

    if let Err(err) = watcher.unwatch(&root) {
        log::debug!("unwatch {} failed: {err}", root.display());
    }
    drop(watcher);
    log::info!("stopped watching {}", root.display());
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, DataChange, ModifyKind};
    use std::fs;
    use std::path::PathBuf;
    use crossbeam_channel::bounded;
    use tempfile::tempdir;

    fn modified(path: PathBuf) -> Event {
        Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Content))).add_path(path)
    }

    #[test]
    fn debouncer_drops_events_inside_the_window() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(Duration::from_secs(1));

        assert!(debouncer.try_fire(start));
        assert!(!debouncer.try_fire(start + Duration::from_millis(300)));
        assert!(!debouncer.try_fire(start + Duration::from_millis(999)));
        assert!(debouncer.try_fire(start + Duration::from_millis(1000)));
        assert!(!debouncer.try_fire(start + Duration::from_millis(1500)));
        assert!(debouncer.try_fire(start + Duration::from_millis(2100)));
    }

    #[test]
    fn only_entry_file_events_are_relevant() {
        let root = PathBuf::from("/tmp/essence/conversations/001_alpha");

        assert!(is_relevant(&modified(root.join(PRIMARY_FILE))));
        assert!(!is_relevant(&modified(root.join("conversation.toml.tmp"))));
        assert!(!is_relevant(&modified(root.join("notes.md"))));
        assert!(!is_relevant(&modified(root.join("conversation.json"))));
        assert!(!is_relevant(
            &Event::new(EventKind::Access(AccessKind::Any)).add_path(root.join(PRIMARY_FILE))
        ));
        assert!(!is_relevant(
            &Event::new(EventKind::Create(CreateKind::Folder)).add_path(root.clone())
        ));
    }

    #[test]
    fn burst_of_events_rebuilds_once() {
        let tmp = tempdir().expect("tempdir");
        let paths = EssencePaths::under(tmp.path().join("__essence__"));
        let entry = paths.conversations_dir.join("001_alpha");
        fs::create_dir_all(&entry).expect("mkdir");
        fs::write(entry.join(PRIMARY_FILE), "title = \"Alpha\"\n").expect("write");

        let (tx, rx) = bounded(16);
        for _ in 0..3 {
            tx.send(WatchSignal::Changed(modified(entry.join(PRIMARY_FILE))))
                .expect("send");
        }
        tx.send(WatchSignal::Changed(modified(entry.join("draft.md"))))
            .expect("send");
        drop(tx);

        let mut trigger = ChangeTrigger::new(paths.clone(), Duration::from_secs(60), false);
        let stop = AtomicBool::new(false);
        let stats = run_loop(&mut trigger, &rx, &stop, Duration::from_millis(10));

        assert_eq!(
            stats,
            WatchStats {
                ignored: 1,
                debounced: 2,
                rebuilds: 1,
                failures: 0,
            }
        );
        let raw = fs::read_to_string(&paths.meta_file).expect("meta written");
        assert!(raw.contains("[conversations.001]"));
    }

    #[test]
    fn failed_rebuild_keeps_the_listener_alive() {
        let tmp = tempdir().expect("tempdir");
        let mut paths = EssencePaths::under(tmp.path().join("__essence__"));
        let entry = paths.conversations_dir.join("001_alpha");
        fs::create_dir_all(&entry).expect("mkdir");
        fs::write(entry.join(PRIMARY_FILE), "title = \"Alpha\"\n").expect("write");
        // A directory where the index should be makes every rebuild fail.
        paths.meta_file = tmp.path().join("meta-as-dir");
        fs::create_dir_all(&paths.meta_file).expect("mkdir");

        let mut trigger = ChangeTrigger::new(paths, Duration::from_millis(1), false);
        let start = Instant::now();
        let first = trigger.handle(&modified(entry.join(PRIMARY_FILE)), start);
        let second = trigger.handle(
            &modified(entry.join(PRIMARY_FILE)),
            start + Duration::from_millis(5),
        );

        assert!(matches!(first, TriggerOutcome::Failed(_)));
        assert!(matches!(second, TriggerOutcome::Failed(_)));
        assert_eq!(trigger.stats().failures, 2);
    }

    #[test]
    fn raised_stop_flag_ends_the_loop() {
        let tmp = tempdir().expect("tempdir");
        let paths = EssencePaths::under(tmp.path().join("__essence__"));
        let (_tx, rx) = bounded::<WatchSignal>(1);
        let stop = AtomicBool::new(true);
        let mut trigger = ChangeTrigger::new(paths, Duration::from_secs(1), false);

        let stats = run_loop(&mut trigger, &rx, &stop, Duration::from_millis(10));
        assert_eq!(stats, WatchStats::default());
    }

    #[test]
    fn notify_watcher_rebuilds_after_an_entry_write() {
        let tmp = tempdir().expect("tempdir");
        let paths = EssencePaths::under(tmp.path().join("__essence__"));
        let entry = paths.conversations_dir.join("001_alpha");
        fs::create_dir_all(&entry).expect("mkdir");
        let cfg = EssenceWatcherConfig {
            cooldown_ms: 1,
            channel_capacity: 64,
            tick_ms: 20,
        };
        let stop = AtomicBool::new(false);

        // Keep writing until the watcher is up and has rebuilt at least once.
        let stats = std::thread::scope(|scope| {
            let handle = scope.spawn(|| run(&paths, &cfg, false, &stop));
            for attempt in 0..100 {
                fs::write(
                    entry.join(PRIMARY_FILE),
                    format!("title = \"Alpha {attempt}\"\n"),
                )
                .expect("write");
                std::thread::sleep(Duration::from_millis(50));
                if paths.meta_file.exists() {
                    break;
                }
            }
            stop.store(true, Ordering::SeqCst);
            handle.join().expect("watcher thread")
        })
        .expect("run");

        assert!(stats.rebuilds >= 1, "{stats:?}");
        let raw = fs::read_to_string(&paths.meta_file).expect("meta written");
        assert!(raw.contains("[conversations.001]\nslug = \"alpha\""));
    }
}
