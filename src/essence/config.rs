use crate::essence::paths::EssencePaths;
use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EssenceWatcherConfig {
    pub cooldown_ms: u64,
    pub channel_capacity: usize,
    pub tick_ms: u64,
}

impl Default for EssenceWatcherConfig {
    fn default() -> Self {
        Self {
            cooldown_ms: 1_000,
            channel_capacity: 256,
            tick_ms: 200,
        }
    }
}

impl EssenceWatcherConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EssenceAuditConfig {
    pub enabled: bool,
}

impl Default for EssenceAuditConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EssenceConfig {
    pub watcher: EssenceWatcherConfig,
    pub audit: EssenceAuditConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialEssenceConfig {
    watcher: Option<EssenceWatcherConfig>,
    audit: Option<EssenceAuditConfig>,
}

fn env_or_u64(var: &str, fallback: u64) -> u64 {
    match env::var(var) {
        Ok(v) => v.trim().parse::<u64>().ok().unwrap_or(fallback),
        Err(_) => fallback,
    }
}

fn env_or_usize(var: &str, fallback: usize) -> usize {
    match env::var(var) {
        Ok(v) => v.trim().parse::<usize>().ok().unwrap_or(fallback),
        Err(_) => fallback,
    }
}

fn env_or_bool(var: &str, fallback: bool) -> bool {
    match env::var(var) {
        Ok(v) => match v.trim() {
            "1" | "true" | "TRUE" | "yes" | "on" => true,
            "0" | "false" | "FALSE" | "no" | "off" => false,
            _ => fallback,
        },
        Err(_) => fallback,
    }
}

fn validate(cfg: &EssenceConfig) -> Result<()> {
    if cfg.watcher.cooldown_ms == 0 {
        return Err(anyhow!("invalid watcher cooldown: must be >= 1 ms"));
    }
    if cfg.watcher.channel_capacity == 0 {
        return Err(anyhow!("invalid watcher channel capacity: must be >= 1"));
    }
    if cfg.watcher.tick_ms == 0 {
        return Err(anyhow!("invalid watcher tick: must be >= 1 ms"));
    }
    Ok(())
}

fn resolve_config_path(paths: &EssencePaths) -> PathBuf {
    if let Ok(custom) = env::var("ESSENCE_CONFIG_PATH") {
        let trimmed = custom.trim();
        if !trimmed.is_empty() {
            return PathBuf::from(trimmed);
        }
    }
    paths.essence_dir.join("essence.toml")
}

fn merge_file_config(base: &mut EssenceConfig, raw: &str, origin: &str) -> Result<()> {
    let parsed: PartialEssenceConfig = toml::from_str(raw)
        .map_err(|err| anyhow!("failed to parse essence config {origin}: {err}"))?;
    if let Some(watcher) = parsed.watcher {
        base.watcher = watcher;
    }
    if let Some(audit) = parsed.audit {
        base.audit = audit;
    }
    Ok(())
}

pub fn load_config(paths: &EssencePaths) -> Result<EssenceConfig> {
    let mut cfg = EssenceConfig::default();
    let path = resolve_config_path(paths);
    if path.exists() {
        let raw = fs::read_to_string(&path)?;
        merge_file_config(&mut cfg, &raw, &path.display().to_string())?;
    }

    cfg.watcher.cooldown_ms = env_or_u64("ESSENCE_COOLDOWN_MS", cfg.watcher.cooldown_ms);
    cfg.watcher.channel_capacity = env_or_usize(
        "ESSENCE_WATCH_CHANNEL_CAPACITY",
        cfg.watcher.channel_capacity,
    );
    cfg.watcher.tick_ms = env_or_u64("ESSENCE_WATCH_TICK_MS", cfg.watcher.tick_ms);
    cfg.audit.enabled = env_or_bool("ESSENCE_AUDIT_ENABLED", cfg.audit.enabled);

    validate(&cfg)?;
    Ok(cfg)
}
