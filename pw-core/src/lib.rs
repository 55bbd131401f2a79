//! Pciewatch Core Library
//!
//! Detects and reports PCI Express hardware errors on Linux hosts.
//!
//! # Features
//!
//! - **Device Polling**: Enumerates PCI devices through sysfs or procfs and
//!   diffs the Device Status register and the AER status registers against
//!   last-seen snapshots
//! - **Capability Walking**: Locates the PCI Express and Advanced Error
//!   Reporting capabilities through the standard capability linked lists
//! - **Log Parsing**: Tails a kernel log file and extracts AER events with
//!   configurable regular-expression patterns
//! - **Notifications**: Every detected error becomes a structured
//!   notification delivered to a host-provided sink
//!
//! # Module Structure
//!
//! - `hw/` - Config-space access backends and the capability walker
//! - `engine/` - The differential status engine and error catalogs
//! - `parser/` - Incremental log tailing and message parsing
//! - `data/` - Device model, configuration, validation
//!
//! # Example
//!
//! ```no_run
//! use pw_core::{Notification, NotificationSink, PcieErrors, PluginConfig};
//!
//! let mut monitor = PcieErrors::init(PluginConfig::default(), "myhost").unwrap();
//! let mut sink: Vec<Notification> = Vec::new();
//! monitor.poll(&mut sink).unwrap();
//! ```

// Grouped modules
pub mod data;
pub mod engine;
pub mod hw;
pub mod parser;

// Standalone modules
pub mod constants;
pub mod plugin;
pub mod report;

// Re-export primary types from data/
pub use data::{
    default_patterns, validate_config, DeviceId, ParserConfig, PatternConfig, PcieDevice,
    PluginConfig, SourceKind,
};

// Re-export hardware access
pub use hw::{
    find_cap_exp, find_ecap_aer, make_backend, AccessBackend, ConfigSpace, OpenDevice, ProcAccess,
    SysfsAccess,
};

// Re-export the status engine
pub use engine::{
    check_aer, check_device_status, ErrorBit, ReportPolicy, AER_CORRECTABLE_ERRORS,
    AER_UNCORRECTABLE_ERRORS, DEVICE_STATUS_ERRORS,
};

// Re-export log parsing
pub use parser::{LogTail, Message, MessageItem, MessageParser};

// Re-export notifications
pub use report::{Notification, NotificationSink, Reporter, Severity};

// Re-export the monitor itself
pub use plugin::PcieErrors;

// Re-export error types
pub use pw_error::{PciewatchError, Result};
