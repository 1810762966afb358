//! TOML configuration for a Quill node.
//!
//! Every section is optional. Without a `[validation]` section no content or
//! rate limits apply; limits are deployment policy, not built-in constants.
//!
//! ```toml
//! [storage]
//! backend = "fjall"
//! data_dir = "/var/lib/quill"
//!
//! [[validation.content_length]]
//! entry_type = "comment"
//! max_chars = 15
//!
//! [[validation.rate_limit]]
//! entry_type = "comment"
//! max_creates = 3
//! window = "1h"
//!
//! [log]
//! level = "debug"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, bail};
use quill_chain::ValidationConfig;
use quill_types::EntryType;
use serde::Deserialize;

use crate::blog;

/// Top-level configuration, parsed from TOML.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct QuillConfig {
    /// Where actions and entries are kept.
    pub storage: StorageSection,
    /// Admission rule tunables.
    pub validation: ValidationSection,
    /// Logging configuration.
    pub log: LogSection,
}

/// Storage backend kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Everything in memory, lost on exit.
    #[default]
    Memory,
    /// Fjall for actions, fan-out files for entries.
    Fjall,
}

/// `[storage]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    pub backend: StorageBackend,
    /// Directory for persistent data. Ignored by the memory backend.
    pub data_dir: PathBuf,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            data_dir: PathBuf::from(".quill"),
        }
    }
}

/// `[validation]` section.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ValidationSection {
    pub content_length: Vec<ContentLengthEntry>,
    pub rate_limit: Vec<RateLimitEntry>,
}

/// One `[[validation.content_length]]` table.
#[derive(Debug, Deserialize)]
pub struct ContentLengthEntry {
    pub entry_type: String,
    /// Content must be strictly shorter than this.
    pub max_chars: usize,
}

/// One `[[validation.rate_limit]]` table.
#[derive(Debug, Deserialize)]
pub struct RateLimitEntry {
    pub entry_type: String,
    pub max_creates: u32,
    /// Trailing window, e.g. `"4s"`, `"1h"`, `"24h"`, `"500ms"`.
    pub window: String,
}

/// `[log]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LogSection {
    /// Log level filter (e.g. `"info"`, `"debug"`, `"warn"`).
    pub level: String,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl QuillConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_toml(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(s: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Build the admission rule tunables, including the blog's link
    /// schemas.
    pub fn validation(&self) -> anyhow::Result<ValidationConfig> {
        let mut config = blog::with_link_schemas(ValidationConfig::default());

        for entry in &self.validation.content_length {
            let entry_type: EntryType = entry.entry_type.parse()?;
            config = config.with_content_limit(entry_type, entry.max_chars);
        }

        for entry in &self.validation.rate_limit {
            let entry_type: EntryType = entry.entry_type.parse()?;
            let window = parse_duration(&entry.window)
                .with_context(|| format!("invalid rate limit window for {entry_type}"))?;
            config = config.with_rate_limit(entry_type, entry.max_creates, window);
        }

        Ok(config)
    }
}

/// Parse a human duration: an integer followed by `ms`, `s`, `m`, `h` or `d`.
fn parse_duration(s: &str) -> anyhow::Result<Duration> {
    let s = s.trim();
    let split = s
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(s.len());
    let (num, unit) = s.split_at(split);
    let Ok(n) = num.parse::<u64>() else {
        bail!("duration {s:?} does not start with a number");
    };

    let duration = match unit.trim() {
        "ms" => Duration::from_millis(n),
        "s" | "" => Duration::from_secs(n),
        "m" => Duration::from_secs(n * 60),
        "h" => Duration::from_secs(n * 3_600),
        "d" => Duration::from_secs(n * 86_400),
        other => bail!("unknown duration unit {other:?} in {s:?}"),
    };
    Ok(duration)
}
