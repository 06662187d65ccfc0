use std::path::PathBuf;
use std::time::Duration;

pub const JOURNAL_FILE: &str = "appointments.journal";

/// How often the compactor checks the journal's append count.
pub const COMPACT_INTERVAL: Duration = Duration::from_secs(60);

/// How often past weeks are swept when rollover is enabled.
pub const ROLLOVER_INTERVAL: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub data_dir: PathBuf,
    pub metrics_port: Option<u16>,
    pub compact_threshold: u64,
    pub rollover: bool,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unparsable values fall back to defaults.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let data_dir = get("SHEARBOOK_DATA_DIR").unwrap_or_else(|| "./data".into());
        let metrics_port = get("SHEARBOOK_METRICS_PORT").and_then(|s| s.parse().ok());
        let compact_threshold = get("SHEARBOOK_COMPACT_THRESHOLD")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1000);
        let rollover = get("SHEARBOOK_ROLLOVER")
            .is_some_and(|s| matches!(s.trim().to_ascii_lowercase().as_str(), "1" | "true"));
        Self {
            data_dir: PathBuf::from(data_dir),
            metrics_port,
            compact_threshold,
            rollover,
        }
    }

    pub fn journal_path(&self) -> PathBuf {
        self.data_dir.join(JOURNAL_FILE)
    }
}
