//! Notification model and dispatch
//!
//! Every detected error becomes a structured [`Notification`] delivered to a
//! host-provided [`NotificationSink`]. Dispatch is fire-and-forget: the core
//! never awaits delivery confirmation.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::constants::plugin;
use crate::data::DeviceId;

/// Notification severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Okay,
    Warning,
    Failure,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Severity::Okay => "OKAY",
            Severity::Warning => "WARNING",
            Severity::Failure => "FAILURE",
        };
        f.write_str(s)
    }
}

/// A structured notification as delivered to the sink
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub severity: Severity,
    pub time: DateTime<Utc>,
    pub host: String,
    pub plugin: String,
    pub plugin_instance: String,
    #[serde(rename = "type")]
    pub type_name: String,
    pub type_instance: String,
    pub message: String,
    /// Ordered key/value annotations attached by the event shaper
    pub meta: Vec<(String, String)>,
}

impl Notification {
    /// Build a notification with the plugin identity and current timestamp
    pub fn new(host: &str, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            time: Utc::now(),
            host: host.to_string(),
            plugin: plugin::PLUGIN_NAME.to_string(),
            plugin_instance: String::new(),
            type_name: plugin::NOTIFICATION_TYPE.to_string(),
            type_instance: String::new(),
            message: message.into(),
            meta: Vec::new(),
        }
    }
}

/// Destination for notifications, provided by the host
pub trait NotificationSink {
    fn dispatch(&mut self, notification: Notification);
}

/// Collects notifications into a vector; the sink used by tests
impl NotificationSink for Vec<Notification> {
    fn dispatch(&mut self, notification: Notification) {
        self.push(notification);
    }
}

/// Short-lived dispatch context for one poll: the host name plus the sink
pub struct Reporter<'a> {
    host: &'a str,
    sink: &'a mut dyn NotificationSink,
}

impl<'a> Reporter<'a> {
    pub fn new(host: &'a str, sink: &'a mut dyn NotificationSink) -> Self {
        Self { host, sink }
    }

    pub fn host(&self) -> &str {
        self.host
    }

    pub fn dispatch(&mut self, notification: Notification) {
        self.sink.dispatch(notification);
    }

    /// Dispatch a notification attributed to one device
    pub fn dispatch_for_device(
        &mut self,
        id: DeviceId,
        severity: Severity,
        type_instance: &str,
        message: String,
    ) {
        let mut n = Notification::new(self.host, severity, message);
        n.plugin_instance = id.to_string();
        n.type_instance = type_instance.to_string();
        self.sink.dispatch(n);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notification_identity_fields() {
        let n = Notification::new("host1", Severity::Warning, "boom");
        assert_eq!(n.plugin, "pcie_errors");
        assert_eq!(n.type_name, "pcie_error");
        assert_eq!(n.host, "host1");
        assert_eq!(n.message, "boom");
        assert!(n.plugin_instance.is_empty());
        assert!(n.meta.is_empty());
    }

    #[test]
    fn test_reporter_sets_device_instance() {
        let mut sink: Vec<Notification> = Vec::new();
        let mut reporter = Reporter::new("host1", &mut sink);
        let id = "0000:01:00.0".parse().unwrap();
        reporter.dispatch_for_device(id, Severity::Failure, "fatal", "msg".to_string());

        assert_eq!(sink.len(), 1);
        assert_eq!(sink[0].plugin_instance, "0000:01:00.0");
        assert_eq!(sink[0].type_instance, "fatal");
        assert_eq!(sink[0].severity, Severity::Failure);
    }

    #[test]
    fn test_notification_serializes_type_field() {
        let n = Notification::new("host1", Severity::Okay, "ok");
        let json = serde_json::to_value(&n).unwrap();
        assert_eq!(json["type"], "pcie_error");
        assert_eq!(json["severity"], "okay");
    }
}
