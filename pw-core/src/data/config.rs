//! Plugin configuration
//!
//! The host hands the core a fully parsed [`PluginConfig`]; the daemon loads
//! it from a JSON file. Field aliases accept the documented PascalCase
//! option names alongside the native snake_case ones.

use std::fs;
use std::path::{Path, PathBuf};

use pw_error::{PciewatchError, Result};
use serde::{Deserialize, Serialize};

use crate::constants::{limits, paths, plugin};

/// Access backend selected by the `Source` option
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Sysfs,
    Proc,
}

/// Top-level plugin configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PluginConfig {
    /// Device access source: "sysfs" (default) or "proc". Any other value
    /// disables device polling entirely.
    #[serde(default = "default_source", alias = "Source")]
    pub source: String,

    /// Override of the backend base directory
    #[serde(default, alias = "AccessDir")]
    pub access_dir: Option<PathBuf>,

    /// Report AER errors even when they are set in the mask register
    #[serde(default, alias = "ReportMasked")]
    pub report_masked: bool,

    /// Re-emit SET events on every poll while a status bit remains set
    #[serde(default, alias = "PersistentNotifications")]
    pub persistent_notifications: bool,

    /// Log file consumed by the message parsers
    #[serde(default = "default_log_file", alias = "LogFile")]
    pub log_file: PathBuf,

    /// Enable the log-parser pass
    #[serde(default, alias = "ReadLog")]
    pub read_log: bool,

    /// Consume the whole existing log on the first poll instead of tailing
    /// from the end
    #[serde(default, alias = "FirstFullRead")]
    pub first_full_read: bool,

    /// Named message parsers; when empty and log reading is enabled, the
    /// default AER parser is installed at init
    #[serde(default, alias = "MsgPattern")]
    pub parsers: Vec<ParserConfig>,
}

/// A named ordered list of match patterns
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParserConfig {
    #[serde(alias = "Name")]
    pub name: String,

    #[serde(alias = "Match")]
    pub patterns: Vec<PatternConfig>,
}

/// A single match pattern of a message parser
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PatternConfig {
    /// Label used for the captured value in parsed messages
    #[serde(alias = "Name")]
    pub name: String,

    /// Regular expression applied to each log line
    #[serde(alias = "Regex")]
    pub regex: String,

    /// Capture group holding the value (0 = whole match)
    #[serde(default = "default_submatch_idx", alias = "SubmatchIdx")]
    pub submatch_idx: usize,

    /// Lines matching this expression are dropped for this pattern slot
    #[serde(default, alias = "Excluderegex")]
    pub excluderegex: Option<String>,

    /// A message is admitted only when every mandatory pattern matched
    #[serde(default, alias = "IsMandatory")]
    pub is_mandatory: bool,
}

fn default_source() -> String {
    "sysfs".to_string()
}

fn default_log_file() -> PathBuf {
    PathBuf::from(paths::DEFAULT_LOG_FILE)
}

fn default_submatch_idx() -> usize {
    limits::DEFAULT_SUBMATCH_IDX
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            source: default_source(),
            access_dir: None,
            report_masked: false,
            persistent_notifications: false,
            log_file: default_log_file(),
            read_log: false,
            first_full_read: false,
            parsers: Vec::new(),
        }
    }
}

impl PluginConfig {
    /// Load a configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|source| PciewatchError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        let config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Backend selected by `Source`, or `None` when device polling is disabled
    pub fn source_kind(&self) -> Option<SourceKind> {
        if self.source.eq_ignore_ascii_case("sysfs") {
            Some(SourceKind::Sysfs)
        } else if self.source.eq_ignore_ascii_case("proc") {
            Some(SourceKind::Proc)
        } else {
            None
        }
    }

    /// Whether the device-polling pass is enabled
    pub fn device_polling_enabled(&self) -> bool {
        self.source_kind().is_some()
    }

    /// Base directory for the selected backend, honoring `AccessDir`
    pub fn effective_access_dir(&self, kind: SourceKind) -> PathBuf {
        match &self.access_dir {
            Some(dir) => dir.clone(),
            None => match kind {
                SourceKind::Sysfs => PathBuf::from(paths::DEFAULT_SYSFS_DIR),
                SourceKind::Proc => PathBuf::from(paths::DEFAULT_PROC_DIR),
            },
        }
    }
}

/// Default patterns for AER errors in syslog
pub fn default_patterns() -> Vec<PatternConfig> {
    let mandatory = |name: &str, regex: &str| PatternConfig {
        name: name.to_string(),
        regex: regex.to_string(),
        submatch_idx: limits::DEFAULT_SUBMATCH_IDX,
        excluderegex: None,
        is_mandatory: true,
    };

    vec![
        mandatory(plugin::LOG_PORT, r"pcieport (.*): AER:"),
        mandatory(plugin::LOG_DEVICE, r" ([0-9a-fA-F:\.]*): PCIe Bus Error"),
        mandatory(plugin::LOG_SEVERITY, r"severity=([^,]*)"),
        PatternConfig {
            name: plugin::LOG_TYPE.to_string(),
            regex: r"type=(.*),".to_string(),
            submatch_idx: limits::DEFAULT_SUBMATCH_IDX,
            excluderegex: None,
            is_mandatory: false,
        },
        mandatory(plugin::LOG_ID, r", id=(.*)"),
    ]
}
