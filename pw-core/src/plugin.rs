//! Plugin bootstrap and poll entry point
//!
//! Wires the access backend, device list and parser table together. The host
//! calls [`PcieErrors::poll`] on its own cadence; one call performs the
//! device pass and then the log pass and returns. Everything runs on the
//! caller's thread.

use tracing::{debug, error, info, warn};

use pw_error::{PciewatchError, Result};

use crate::constants::plugin;
use crate::data::{default_patterns, validate_config, PcieDevice, PluginConfig};
use crate::engine::{check_aer, check_device_status, ReportPolicy};
use crate::hw::{find_cap_exp, find_ecap_aer, make_backend, AccessBackend, OpenDevice};
use crate::parser::{Message, MessageParser};
use crate::report::{Notification, NotificationSink, Reporter, Severity};

/// The PCIe error monitor.
///
/// Owns the device list, the parser table and the access backend. Created
/// once at init; the device list is pruned during preprocessing and is
/// read-only afterwards.
pub struct PcieErrors {
    config: PluginConfig,
    host: String,
    backend: Option<Box<dyn AccessBackend>>,
    devices: Vec<PcieDevice>,
    parsers: Vec<MessageParser>,
    first_read: bool,
}

impl PcieErrors {
    /// Validate the configuration and set up both data sources.
    ///
    /// Fails when the configuration is invalid, when enumeration fails, or
    /// when device polling is enabled but no PCIe device survives
    /// preprocessing.
    pub fn init(config: PluginConfig, host: impl Into<String>) -> Result<Self> {
        validate_config(&config)?;

        let mut backend = None;
        let mut devices = Vec::new();

        match config.source_kind() {
            Some(kind) => {
                let access_dir = config.effective_access_dir(kind);
                let access = make_backend(kind, access_dir.clone());

                devices = access
                    .enumerate()?
                    .into_iter()
                    .map(PcieDevice::new)
                    .collect();
                info!(count = devices.len(), path = ?access_dir, "Enumerated PCI devices");

                preprocess_devices(access.as_ref(), &mut devices);
                if devices.is_empty() {
                    error!(path = ?access_dir, "No PCIe devices found");
                    return Err(PciewatchError::NoDevices(access_dir));
                }
                info!(count = devices.len(), "PCIe devices under observation");

                backend = Some(access);
            }
            None => warn!(source = %config.source, "Unknown source, device polling disabled"),
        }

        let mut parsers = Vec::new();
        if config.read_log {
            if config.parsers.is_empty() {
                info!("Using default message parser");
                parsers.push(MessageParser::new(
                    "default",
                    &config.log_file,
                    &default_patterns(),
                )?);
            } else {
                for parser in &config.parsers {
                    parsers.push(MessageParser::new(
                        &parser.name,
                        &config.log_file,
                        &parser.patterns,
                    )?);
                }
            }
        }

        let first_read = config.first_full_read;
        Ok(Self {
            config,
            host: host.into(),
            backend,
            devices,
            parsers,
            first_read,
        })
    }

    /// Devices that survived preprocessing
    pub fn devices(&self) -> &[PcieDevice] {
        &self.devices
    }

    /// Run one poll: the device pass followed by the log pass.
    ///
    /// A device open failure fails the whole poll but does not stop the
    /// remaining devices; a failed device pass skips the log pass for this
    /// cycle. Both failures emit a FAILURE notification and are retried on
    /// the next poll.
    pub fn poll(&mut self, sink: &mut dyn NotificationSink) -> Result<()> {
        let mut reporter = Reporter::new(&self.host, sink);
        let policy = ReportPolicy::from(&self.config);

        if let Some(backend) = self.backend.as_deref() {
            poll_devices(backend, &mut self.devices, policy, &mut reporter).map_err(|e| {
                error!("Failed to read devices state");
                e
            })?;
        }

        if !self.config.read_log {
            return Ok(());
        }

        let mut result = Ok(());
        for parser in &mut self.parsers {
            match parser.read(self.first_read) {
                Ok(messages) => {
                    for message in &messages {
                        let n = shape_log_message(message, reporter.host());
                        reporter.dispatch(n);
                    }
                }
                Err(e) => {
                    error!(parser = %parser.name(), error = %e, "Failed to parse messages from log");
                    reporter.dispatch(Notification::new(
                        reporter.host(),
                        Severity::Failure,
                        "Failed to read from log file",
                    ));
                    result = Err(e);
                    break;
                }
            }
        }

        self.first_read = false;
        result
    }
}

/// Filter out devices that are not PCI Express and locate the capability
/// offsets of the survivors. Runs once, at init.
fn preprocess_devices(backend: &dyn AccessBackend, devices: &mut Vec<PcieDevice>) {
    devices.retain_mut(|dev| match backend.open(dev.id) {
        Ok(space) => {
            let window = OpenDevice::new(dev.id, space);

            // Every PCIe device must have the PCI Express capability
            dev.cap_exp = find_cap_exp(&window);
            if dev.cap_exp.is_none() {
                debug!(device = %dev.id, "Not a PCI Express device");
                return false;
            }

            dev.ecap_aer = find_ecap_aer(&window);
            if dev.ecap_aer.is_none() {
                info!(device = %dev.id, "Device is not AER capable");
            }
            true
        }
        Err(e) => {
            error!(device = %dev.id, error = %e, "Failed to open device during preprocessing");
            false
        }
    });
}

/// Poll every device once: open, diff both status sources, close
fn poll_devices(
    backend: &dyn AccessBackend,
    devices: &mut [PcieDevice],
    policy: ReportPolicy,
    reporter: &mut Reporter<'_>,
) -> Result<()> {
    let mut failed = false;

    for dev in devices {
        match backend.open(dev.id) {
            Ok(space) => {
                let window = OpenDevice::new(dev.id, space);
                check_device_status(dev, &window, policy, reporter);
                if dev.ecap_aer.is_some() {
                    check_aer(dev, &window, policy, reporter);
                }
            }
            Err(e) => {
                error!(device = %dev.id, error = %e, "Failed to open device");
                reporter.dispatch_for_device(
                    dev.id,
                    Severity::Failure,
                    "",
                    "Failed to read device status".to_string(),
                );
                failed = true;
            }
        }
    }

    if failed {
        Err(PciewatchError::DevicePoll)
    } else {
        Ok(())
    }
}

/// Translate one parsed log message into a notification.
///
/// The `severity` field selects the type tag (and upgrades the severity to
/// FAILURE for fatal errors), the `device` field becomes the per-instance
/// identifier, and every other non-empty field is attached as an annotation.
fn shape_log_message(message: &Message, host: &str) -> Notification {
    let mut n = Notification::new(host, Severity::Warning, "");

    for item in &message.items {
        if item.value.is_empty() {
            continue;
        }
        debug!(field = %item.name, value = %item.value, "log message item");

        if item.name == plugin::LOG_SEVERITY {
            let value = item.value.to_ascii_lowercase();
            if value.contains("non-fatal") {
                n.type_instance = plugin::SEV_NON_FATAL.to_string();
            } else if value.contains("fatal") {
                n.severity = Severity::Failure;
                n.type_instance = plugin::SEV_FATAL.to_string();
            } else {
                n.type_instance = plugin::SEV_CORRECTABLE.to_string();
            }
        } else if item.name == plugin::LOG_DEVICE {
            n.plugin_instance = item.value.clone();
        } else {
            n.meta.push((item.name.clone(), item.value.clone()));
        }
    }

    n.message = format!("AER {} error reported in log", n.type_instance);
    n
}
