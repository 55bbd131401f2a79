//! Core data types for Pciewatch
//!
//! Defines the device identity and device record used throughout the library.

use std::fmt;
use std::str::FromStr;

use pw_error::PciewatchError;
use serde::{Deserialize, Serialize};

/// Identity of a PCI endpoint: domain, bus, device and function.
///
/// Printed and parsed in the canonical `DDDD:BB:DD.F` form used by sysfs
/// (hex domain, bus and device, decimal function). Two devices are equal
/// iff their tuples are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceId {
    pub domain: u16,
    pub bus: u8,
    pub device: u8,
    pub function: u8,
}

impl DeviceId {
    /// Build an identity from a 16-bit proc "slot": high 8 bits are the bus,
    /// bits 7..3 the device, bits 2..0 the function. The proc listing carries
    /// no domain, so it is forced to 0.
    pub fn from_proc_slot(slot: u16) -> Self {
        Self {
            domain: 0,
            bus: (slot >> 8) as u8,
            device: ((slot >> 3) & 0x1f) as u8,
            function: (slot & 0x07) as u8,
        }
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04x}:{:02x}:{:02x}.{}",
            self.domain, self.bus, self.device, self.function
        )
    }
}

impl FromStr for DeviceId {
    type Err = PciewatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || PciewatchError::InvalidDeviceAddress(s.to_string());

        let (addr, function) = s.rsplit_once('.').ok_or_else(invalid)?;
        let mut parts = addr.split(':');
        let domain = parts.next().ok_or_else(invalid)?;
        let bus = parts.next().ok_or_else(invalid)?;
        let device = parts.next().ok_or_else(invalid)?;
        if parts.next().is_some() {
            return Err(invalid());
        }

        let id = Self {
            domain: u16::from_str_radix(domain, 16).map_err(|_| invalid())?,
            bus: u8::from_str_radix(bus, 16).map_err(|_| invalid())?,
            device: u8::from_str_radix(device, 16).map_err(|_| invalid())?,
            function: function.parse::<u8>().map_err(|_| invalid())?,
        };

        // Device and function numbers are 5 and 3 bits wide on the wire.
        if id.device > 0x1f || id.function > 0x07 {
            return Err(invalid());
        }

        Ok(id)
    }
}

/// A PCIe device under observation.
///
/// `cap_exp` is the offset of the PCI Express capability structure and
/// `ecap_aer` the offset of the Advanced Error Reporting extended capability;
/// `None` means the capability is absent. The three snapshots hold the values
/// of the most recent successful status reads and are mutated only by the
/// status differ.
#[derive(Debug, Clone)]
pub struct PcieDevice {
    pub id: DeviceId,
    pub cap_exp: Option<u16>,
    pub ecap_aer: Option<u16>,
    pub device_status: u16,
    pub uncorrectable_errors: u32,
    pub correctable_errors: u32,
}

impl PcieDevice {
    pub fn new(id: DeviceId) -> Self {
        Self {
            id,
            cap_exp: None,
            ecap_aer: None,
            device_status: 0,
            uncorrectable_errors: 0,
            correctable_errors: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_id_display() {
        let id = DeviceId {
            domain: 0,
            bus: 0x1c,
            device: 0x1f,
            function: 3,
        };
        assert_eq!(id.to_string(), "0000:1c:1f.3");
    }

    #[test]
    fn test_device_id_parse_roundtrip() {
        for s in ["0000:00:00.0", "0000:01:00.0", "0010:ff:1f.7", "abcd:0a:05.2"] {
            let id: DeviceId = s.parse().unwrap();
            assert_eq!(id.to_string(), s);
        }
    }

    #[test]
    fn test_device_id_parse_short_fields() {
        // sysfs always zero-pads, but the parser accepts unpadded hex
        let id: DeviceId = "0:1:2.3".parse().unwrap();
        assert_eq!(
            id,
            DeviceId {
                domain: 0,
                bus: 1,
                device: 2,
                function: 3
            }
        );
    }

    #[test]
    fn test_device_id_parse_rejects_malformed() {
        assert!("".parse::<DeviceId>().is_err());
        assert!("0000:00:00".parse::<DeviceId>().is_err());
        assert!("0000:00.0".parse::<DeviceId>().is_err());
        assert!("0000:00:00:00.0".parse::<DeviceId>().is_err());
        assert!("zzzz:00:00.0".parse::<DeviceId>().is_err());
        // device number wider than 5 bits
        assert!("0000:00:20.0".parse::<DeviceId>().is_err());
        // function number wider than 3 bits
        assert!("0000:00:00.8".parse::<DeviceId>().is_err());
    }

    #[test]
    fn test_from_proc_slot() {
        // bus 0x02, device 0x03, function 1 -> slot 0x0219
        let id = DeviceId::from_proc_slot(0x0219);
        assert_eq!(
            id,
            DeviceId {
                domain: 0,
                bus: 0x02,
                device: 0x03,
                function: 1
            }
        );
    }
}
