//! Constants and configuration values for Pciewatch
//!
//! Centralizes all magic numbers, register offsets, paths, and defaults.
//! Never use magic numbers in other files - add them here first.

/// Plugin identity and notification vocabulary
pub mod plugin {
    /// Plugin name carried by every notification
    pub const PLUGIN_NAME: &str = "pcie_errors";

    /// Notification type carried by every notification
    pub const NOTIFICATION_TYPE: &str = "pcie_error";

    /// Type instance for correctable errors
    pub const SEV_CORRECTABLE: &str = "correctable";
    /// Type instance for fatal errors
    pub const SEV_FATAL: &str = "fatal";
    /// Type instance for non-fatal errors
    pub const SEV_NON_FATAL: &str = "non_fatal";

    /// Log-message field names used by the default parser and the event shaper
    pub const LOG_PORT: &str = "root port";
    pub const LOG_DEVICE: &str = "device";
    pub const LOG_SEVERITY: &str = "severity";
    pub const LOG_TYPE: &str = "error type";
    pub const LOG_ID: &str = "id";
}

/// System paths
pub mod paths {
    /// Default base directory for the sysfs access backend
    pub const DEFAULT_SYSFS_DIR: &str = "/sys/bus/pci";

    /// Default base directory for the proc access backend
    pub const DEFAULT_PROC_DIR: &str = "/proc/bus/pci";

    /// Default kernel log file for the log parser
    pub const DEFAULT_LOG_FILE: &str = "/var/log/syslog";

    /// Configuration directory for the daemon
    pub const CONFIG_DIR: &str = "/etc/pciewatch";

    /// Daemon configuration file
    pub const CONFIG_FILE: &str = "config.json";
}

/// PCI configuration-space register offsets and bit masks
///
/// Values follow the PCI Express Base Specification; config-space reads are
/// little-endian on all supported hardware.
pub mod regs {
    /// PCI Status register (16 bits)
    pub const PCI_STATUS: u64 = 0x06;
    /// "Capabilities List" bit in the PCI Status register
    pub const PCI_STATUS_CAP_LIST: u16 = 0x10;

    /// Pointer to the first entry of the capability list
    pub const PCI_CAPABILITY_LIST: u64 = 0x34;

    /// Capability ID of the PCI Express capability structure
    pub const PCI_CAP_ID_EXP: u8 = 0x10;

    /// Device Status register, relative to the PCI Express capability
    pub const PCI_EXP_DEVSTA: u64 = 0x0a;
    /// Error bits of the Device Status register
    pub const PCI_EXP_DEVSTA_ERR_MASK: u16 = 0x000f;
    /// Correctable Error Detected
    pub const PCI_EXP_DEVSTA_CED: u16 = 0x0001;
    /// Non-Fatal Error Detected
    pub const PCI_EXP_DEVSTA_NFED: u16 = 0x0002;
    /// Fatal Error Detected
    pub const PCI_EXP_DEVSTA_FED: u16 = 0x0004;
    /// Unsupported Request Detected
    pub const PCI_EXP_DEVSTA_URD: u16 = 0x0008;

    /// Extended capabilities always begin at this offset
    pub const PCIE_ECAP_OFFSET: u64 = 0x100;
    /// Extended capability ID of Advanced Error Reporting
    pub const PCI_EXT_CAP_ID_ERR: u32 = 0x0001;

    /// AER Uncorrectable Error Status register, relative to the AER capability
    pub const PCI_ERR_UNCOR_STATUS: u64 = 0x04;
    /// AER Uncorrectable Error Mask register
    pub const PCI_ERR_UNCOR_MASK: u64 = 0x08;
    /// AER Uncorrectable Error Severity register
    pub const PCI_ERR_UNCOR_SEVER: u64 = 0x0c;
    /// AER Correctable Error Status register
    pub const PCI_ERR_COR_STATUS: u64 = 0x10;
    /// AER Correctable Error Mask register
    pub const PCI_ERR_COR_MASK: u64 = 0x14;

    // Uncorrectable Error Status bits
    pub const PCI_ERR_UNC_DLP: u32 = 0x0000_0010;
    pub const PCI_ERR_UNC_SURPDN: u32 = 0x0000_0020;
    pub const PCI_ERR_UNC_POISON_TLP: u32 = 0x0000_1000;
    pub const PCI_ERR_UNC_FCP: u32 = 0x0000_2000;
    pub const PCI_ERR_UNC_COMP_TIME: u32 = 0x0000_4000;
    pub const PCI_ERR_UNC_COMP_ABORT: u32 = 0x0000_8000;
    pub const PCI_ERR_UNC_UNX_COMP: u32 = 0x0001_0000;
    pub const PCI_ERR_UNC_RX_OVER: u32 = 0x0002_0000;
    pub const PCI_ERR_UNC_MALF_TLP: u32 = 0x0004_0000;
    pub const PCI_ERR_UNC_ECRC: u32 = 0x0008_0000;
    pub const PCI_ERR_UNC_UNSUP: u32 = 0x0010_0000;
    pub const PCI_ERR_UNC_ACSV: u32 = 0x0020_0000;
    pub const PCI_ERR_UNC_INTN: u32 = 0x0040_0000;
    pub const PCI_ERR_UNC_MCBTLP: u32 = 0x0080_0000;
    pub const PCI_ERR_UNC_ATOMEG: u32 = 0x0100_0000;
    pub const PCI_ERR_UNC_TLPPRE: u32 = 0x0200_0000;

    // Correctable Error Status bits
    pub const PCI_ERR_COR_RCVR: u32 = 0x0000_0001;
    pub const PCI_ERR_COR_BAD_TLP: u32 = 0x0000_0040;
    pub const PCI_ERR_COR_BAD_DLLP: u32 = 0x0000_0080;
    pub const PCI_ERR_COR_REP_ROLL: u32 = 0x0000_0100;
    pub const PCI_ERR_COR_REP_TIMER: u32 = 0x0000_1000;
    pub const PCI_ERR_COR_ADV_NFAT: u32 = 0x0000_2000;
    pub const PCI_ERR_COR_INTERNAL: u32 = 0x0000_4000;
    pub const PCI_ERR_COR_LOG_OVER: u32 = 0x0000_8000;
}

/// Hard limits
pub mod limits {
    /// Upper bound on capability-list walk length. A well-formed list is far
    /// shorter; this bounds walks over malformed or cyclic lists.
    pub const MAX_CAP_WALK: usize = 256;

    /// Default submatch index for log patterns (first capture group)
    pub const DEFAULT_SUBMATCH_IDX: usize = 1;
}
