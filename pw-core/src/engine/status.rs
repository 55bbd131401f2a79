//! Differential status engine
//!
//! Compares freshly read status registers against the last-seen snapshots
//! and emits per-bit set/cleared notifications, honoring the mask and
//! persistence policies.
//!
//! # How It Works
//!
//! 1. **Edges**: in default mode a bit produces one SET event on its rising
//!    edge and one CLEARED event on its falling edge.
//! 2. **Persistence**: with persistent notifications enabled, SET events are
//!    re-emitted on every poll while the bit stays high. CLEARED stays
//!    edge-only.
//! 3. **Masking**: AER bits set in the mask register are skipped unless
//!    `ReportMasked` is enabled.
//!
//! Catalog iteration order is fixed and observable; notifications for one
//! device are emitted in catalog order.

use tracing::debug;

use crate::constants::{plugin, regs};
use crate::data::{PcieDevice, PluginConfig};
use crate::hw::OpenDevice;
use crate::report::{Reporter, Severity};

/// One catalog entry: a status bit and its human-readable descriptor
#[derive(Debug, Clone, Copy)]
pub struct ErrorBit {
    pub mask: u32,
    pub desc: &'static str,
}

/// Device Status register errors
pub const DEVICE_STATUS_ERRORS: [ErrorBit; 4] = [
    ErrorBit { mask: regs::PCI_EXP_DEVSTA_CED as u32, desc: "Correctable Error" },
    ErrorBit { mask: regs::PCI_EXP_DEVSTA_NFED as u32, desc: "Non-Fatal Error" },
    ErrorBit { mask: regs::PCI_EXP_DEVSTA_FED as u32, desc: "Fatal Error" },
    ErrorBit { mask: regs::PCI_EXP_DEVSTA_URD as u32, desc: "Unsupported Request" },
];

/// AER Uncorrectable Error Status errors
pub const AER_UNCORRECTABLE_ERRORS: [ErrorBit; 16] = [
    ErrorBit { mask: regs::PCI_ERR_UNC_DLP, desc: "Data Link Protocol" },
    ErrorBit { mask: regs::PCI_ERR_UNC_SURPDN, desc: "Surprise Down" },
    ErrorBit { mask: regs::PCI_ERR_UNC_POISON_TLP, desc: "Poisoned TLP" },
    ErrorBit { mask: regs::PCI_ERR_UNC_FCP, desc: "Flow Control Protocol" },
    ErrorBit { mask: regs::PCI_ERR_UNC_COMP_TIME, desc: "Completion Timeout" },
    ErrorBit { mask: regs::PCI_ERR_UNC_COMP_ABORT, desc: "Completer Abort" },
    ErrorBit { mask: regs::PCI_ERR_UNC_UNX_COMP, desc: "Unexpected Completion" },
    ErrorBit { mask: regs::PCI_ERR_UNC_RX_OVER, desc: "Receiver Overflow" },
    ErrorBit { mask: regs::PCI_ERR_UNC_MALF_TLP, desc: "Malformed TLP" },
    ErrorBit { mask: regs::PCI_ERR_UNC_ECRC, desc: "ECRC Error Status" },
    ErrorBit { mask: regs::PCI_ERR_UNC_UNSUP, desc: "Unsupported Request" },
    ErrorBit { mask: regs::PCI_ERR_UNC_ACSV, desc: "ACS Violation" },
    ErrorBit { mask: regs::PCI_ERR_UNC_INTN, desc: "Internal" },
    ErrorBit { mask: regs::PCI_ERR_UNC_MCBTLP, desc: "MC blocked TLP" },
    ErrorBit { mask: regs::PCI_ERR_UNC_ATOMEG, desc: "Atomic egress blocked" },
    ErrorBit { mask: regs::PCI_ERR_UNC_TLPPRE, desc: "TLP prefix blocked" },
];

/// AER Correctable Error Status errors
pub const AER_CORRECTABLE_ERRORS: [ErrorBit; 8] = [
    ErrorBit { mask: regs::PCI_ERR_COR_RCVR, desc: "Receiver Error Status" },
    ErrorBit { mask: regs::PCI_ERR_COR_BAD_TLP, desc: "Bad TLP Status" },
    ErrorBit { mask: regs::PCI_ERR_COR_BAD_DLLP, desc: "Bad DLLP Status" },
    ErrorBit { mask: regs::PCI_ERR_COR_REP_ROLL, desc: "REPLAY_NUM Rollover" },
    ErrorBit { mask: regs::PCI_ERR_COR_REP_TIMER, desc: "Replay Timer Timeout" },
    ErrorBit { mask: regs::PCI_ERR_COR_ADV_NFAT, desc: "Advisory Non-Fatal" },
    ErrorBit { mask: regs::PCI_ERR_COR_INTERNAL, desc: "Corrected Internal" },
    ErrorBit { mask: regs::PCI_ERR_COR_LOG_OVER, desc: "Header Log Overflow" },
];

/// Reporting policy derived from configuration
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportPolicy {
    /// Re-emit SET events while a bit remains high
    pub persistent: bool,
    /// Report AER errors even when masked
    pub report_masked: bool,
}

impl From<&PluginConfig> for ReportPolicy {
    fn from(config: &PluginConfig) -> Self {
        Self {
            persistent: config.persistent_notifications,
            report_masked: config.report_masked,
        }
    }
}

/// Check the Device Status register and report bit transitions.
///
/// Reads the 16-bit register at `cap_exp + 0x0A` masked to its four error
/// bits, then replaces the snapshot with the value read.
pub fn check_device_status(
    dev: &mut PcieDevice,
    window: &OpenDevice,
    policy: ReportPolicy,
    reporter: &mut Reporter<'_>,
) {
    let Some(cap_exp) = dev.cap_exp else { return };

    let new_status =
        window.read_u16(u64::from(cap_exp) + regs::PCI_EXP_DEVSTA) & regs::PCI_EXP_DEVSTA_ERR_MASK;

    // Nothing new to report
    if !(policy.persistent && new_status != 0) && new_status == dev.device_status {
        return;
    }

    for err in &DEVICE_STATUS_ERRORS {
        let mask = err.mask as u16;
        let type_instance = if mask == regs::PCI_EXP_DEVSTA_FED {
            plugin::SEV_FATAL
        } else if mask == regs::PCI_EXP_DEVSTA_CED {
            plugin::SEV_CORRECTABLE
        } else {
            plugin::SEV_NON_FATAL
        };
        let severity = if mask == regs::PCI_EXP_DEVSTA_FED {
            Severity::Failure
        } else {
            Severity::Warning
        };

        if mask & new_status != 0 {
            // Already reported; notify again only in persistent mode
            if !policy.persistent && mask & dev.device_status != 0 {
                continue;
            }

            debug!(device = %dev.id, error = err.desc, "device status error set");
            reporter.dispatch_for_device(
                dev.id,
                severity,
                type_instance,
                format!("Device Status Error set: {}", err.desc),
            );
        } else if mask & dev.device_status != 0 {
            debug!(device = %dev.id, error = err.desc, "device status error cleared");
            reporter.dispatch_for_device(
                dev.id,
                Severity::Okay,
                type_instance,
                format!("Device Status Error cleared: {}", err.desc),
            );
        }
    }

    dev.device_status = new_status;
}

/// Check both AER status registers and report bit transitions.
///
/// The mask and severity registers are read only when the status register
/// warrants a reporting pass; the snapshots are replaced unconditionally
/// with the values read.
pub fn check_aer(
    dev: &mut PcieDevice,
    window: &OpenDevice,
    policy: ReportPolicy,
    reporter: &mut Reporter<'_>,
) {
    let Some(ecap_aer) = dev.ecap_aer else { return };
    let base = u64::from(ecap_aer);

    let errors = window.read_u32(base + regs::PCI_ERR_UNCOR_STATUS);
    if (policy.persistent && errors != 0) || errors != dev.uncorrectable_errors {
        let masked = window.read_u32(base + regs::PCI_ERR_UNCOR_MASK);
        let severity = window.read_u32(base + regs::PCI_ERR_UNCOR_SEVER);
        dispatch_uncorrectable_errors(dev, errors, masked, severity, policy, reporter);
    }
    dev.uncorrectable_errors = errors;

    let errors = window.read_u32(base + regs::PCI_ERR_COR_STATUS);
    if (policy.persistent && errors != 0) || errors != dev.correctable_errors {
        let masked = window.read_u32(base + regs::PCI_ERR_COR_MASK);
        dispatch_correctable_errors(dev, errors, masked, policy, reporter);
    }
    dev.correctable_errors = errors;
}

/// Report errors found in the AER Uncorrectable Error Status register
fn dispatch_uncorrectable_errors(
    dev: &PcieDevice,
    errors: u32,
    masked: u32,
    severity: u32,
    policy: ReportPolicy,
    reporter: &mut Reporter<'_>,
) {
    for err in &AER_UNCORRECTABLE_ERRORS {
        let type_instance = if severity & err.mask != 0 {
            plugin::SEV_FATAL
        } else {
            plugin::SEV_NON_FATAL
        };

        // Unless specifically requested by config, omit masked errors
        if !policy.report_masked && err.mask & masked != 0 {
            continue;
        }

        if err.mask & errors != 0 {
            if !policy.persistent && err.mask & dev.uncorrectable_errors != 0 {
                continue;
            }

            debug!(device = %dev.id, error = err.desc, kind = type_instance, "uncorrectable error set");
            reporter.dispatch_for_device(
                dev.id,
                if severity & err.mask != 0 {
                    Severity::Failure
                } else {
                    Severity::Warning
                },
                type_instance,
                format!("Uncorrectable({}) Error set: {}", type_instance, err.desc),
            );
        } else if err.mask & dev.uncorrectable_errors != 0 {
            debug!(device = %dev.id, error = err.desc, kind = type_instance, "uncorrectable error cleared");
            reporter.dispatch_for_device(
                dev.id,
                Severity::Okay,
                type_instance,
                format!("Uncorrectable({}) Error cleared: {}", type_instance, err.desc),
            );
        }
    }
}

/// Report errors found in the AER Correctable Error Status register
fn dispatch_correctable_errors(
    dev: &PcieDevice,
    errors: u32,
    masked: u32,
    policy: ReportPolicy,
    reporter: &mut Reporter<'_>,
) {
    for err in &AER_CORRECTABLE_ERRORS {
        // Unless specifically requested by config, omit masked errors
        if !policy.report_masked && err.mask & masked != 0 {
            continue;
        }

        if err.mask & errors != 0 {
            if !policy.persistent && err.mask & dev.correctable_errors != 0 {
                continue;
            }

            debug!(device = %dev.id, error = err.desc, "correctable error set");
            reporter.dispatch_for_device(
                dev.id,
                Severity::Warning,
                plugin::SEV_CORRECTABLE,
                format!("Correctable Error set: {}", err.desc),
            );
        } else if err.mask & dev.correctable_errors != 0 {
            debug!(device = %dev.id, error = err.desc, "correctable error cleared");
            reporter.dispatch_for_device(
                dev.id,
                Severity::Okay,
                plugin::SEV_CORRECTABLE,
                format!("Correctable Error cleared: {}", err.desc),
            );
        }
    }
}
