//! Config-space access backends
//!
//! Two interchangeable backends enumerate PCI devices and read their
//! configuration space:
//! - **sysfs**: directory entries of `{access_dir}/devices/`, config space at
//!   `{access_dir}/devices/DDDD:BB:DD.F/config`
//! - **proc**: the text listing `{access_dir}/devices`, config space at
//!   `{access_dir}/BB/DD.F`
//!
//! The backend is chosen once at bootstrap. Reads are positional with no
//! seek state; a short read or I/O error is reported as a failure and the
//! caller treats the value as zero.

use std::fs::{File, OpenOptions};
use std::io;
use std::io::{BufRead, BufReader};
use std::os::unix::fs::FileExt;
use std::path::PathBuf;

use pw_error::{PciewatchError, Result};
use tracing::{debug, error, trace};

use crate::data::{DeviceId, SourceKind};

/// Enumeration and config-space access for one device source
pub trait AccessBackend {
    /// List all device identities known to this source
    fn enumerate(&self) -> Result<Vec<DeviceId>>;

    /// Open the config space of one device for the duration of a poll
    fn open(&self, id: DeviceId) -> Result<Box<dyn ConfigSpace>>;
}

/// Positional reads from an open config space
pub trait ConfigSpace {
    /// Read exactly `buf.len()` bytes at `pos`; anything less is an error
    fn read_exact_at(&self, buf: &mut [u8], pos: u64) -> io::Result<()>;
}

impl ConfigSpace for File {
    fn read_exact_at(&self, buf: &mut [u8], pos: u64) -> io::Result<()> {
        FileExt::read_exact_at(self, buf, pos)
    }
}

/// An opened device: identity plus its config-space handle.
///
/// The handle lives for a single poll; dropping it releases the underlying
/// file on every exit path. The read helpers decode little-endian and return
/// zero on any failed or short read.
pub struct OpenDevice {
    id: DeviceId,
    space: Box<dyn ConfigSpace>,
}

impl OpenDevice {
    pub fn new(id: DeviceId, space: Box<dyn ConfigSpace>) -> Self {
        Self { id, space }
    }

    pub fn id(&self) -> DeviceId {
        self.id
    }

    pub fn read_u8(&self, pos: u64) -> u8 {
        let mut buf = [0u8; 1];
        match self.space.read_exact_at(&mut buf, pos) {
            Ok(()) => buf[0],
            Err(e) => {
                debug!(device = %self.id, pos, error = %e, "config space read failed");
                0
            }
        }
    }

    pub fn read_u16(&self, pos: u64) -> u16 {
        let mut buf = [0u8; 2];
        match self.space.read_exact_at(&mut buf, pos) {
            Ok(()) => u16::from_le_bytes(buf),
            Err(e) => {
                debug!(device = %self.id, pos, error = %e, "config space read failed");
                0
            }
        }
    }

    pub fn read_u32(&self, pos: u64) -> u32 {
        let mut buf = [0u8; 4];
        match self.space.read_exact_at(&mut buf, pos) {
            Ok(()) => u32::from_le_bytes(buf),
            Err(e) => {
                debug!(device = %self.id, pos, error = %e, "config space read failed");
                0
            }
        }
    }
}

/// Build the backend selected by configuration
pub fn make_backend(kind: SourceKind, access_dir: PathBuf) -> Box<dyn AccessBackend> {
    match kind {
        SourceKind::Sysfs => Box::new(SysfsAccess::new(access_dir)),
        SourceKind::Proc => Box::new(ProcAccess::new(access_dir)),
    }
}

fn open_config(id: DeviceId, path: PathBuf) -> Result<Box<dyn ConfigSpace>> {
    trace!(device = %id, path = ?path, "Opening config space");
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(&path)
        .map_err(|source| PciewatchError::DeviceOpen {
            device: id.to_string(),
            source,
        })?;
    Ok(Box::new(file))
}

/// Backend reading `/sys/bus/pci`
pub struct SysfsAccess {
    access_dir: PathBuf,
}

impl SysfsAccess {
    pub fn new(access_dir: PathBuf) -> Self {
        Self { access_dir }
    }
}

impl AccessBackend for SysfsAccess {
    fn enumerate(&self) -> Result<Vec<DeviceId>> {
        let dir = self.access_dir.join("devices");
        debug!(path = ?dir, "Scanning sysfs PCI devices");

        let entries = std::fs::read_dir(&dir).map_err(|source| PciewatchError::Enumerate {
            path: dir.clone(),
            source,
        })?;

        let mut devices = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| PciewatchError::Enumerate {
                path: dir.clone(),
                source,
            })?;
            let name = entry.file_name();
            let name = name.to_string_lossy();

            // Omit special non-device entries
            if name.starts_with('.') {
                continue;
            }

            match name.parse::<DeviceId>() {
                Ok(id) => {
                    trace!(device = %id, "Found PCI device");
                    devices.push(id);
                }
                Err(_) => error!(entry = %name, "Failed to parse device entry"),
            }
        }

        Ok(devices)
    }

    fn open(&self, id: DeviceId) -> Result<Box<dyn ConfigSpace>> {
        let path = self
            .access_dir
            .join("devices")
            .join(id.to_string())
            .join("config");
        open_config(id, path)
    }
}

/// Backend reading `/proc/bus/pci`
pub struct ProcAccess {
    access_dir: PathBuf,
}

impl ProcAccess {
    pub fn new(access_dir: PathBuf) -> Self {
        Self { access_dir }
    }
}

impl AccessBackend for ProcAccess {
    fn enumerate(&self) -> Result<Vec<DeviceId>> {
        let path = self.access_dir.join("devices");
        debug!(path = ?path, "Reading proc PCI device list");

        let file = File::open(&path).map_err(|source| PciewatchError::Enumerate {
            path: path.clone(),
            source,
        })?;

        let mut devices = Vec::new();
        for (line_no, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|source| PciewatchError::Enumerate {
                path: path.clone(),
                source,
            })?;

            // The first whitespace-delimited hex token of each line is the
            // slot number; the proc listing has no domain column.
            let slot = line
                .split_whitespace()
                .next()
                .and_then(|token| u16::from_str_radix(token, 16).ok());

            match slot {
                Some(slot) => {
                    let id = DeviceId::from_proc_slot(slot);
                    trace!(device = %id, slot, "Found PCI device");
                    devices.push(id);
                }
                None => error!(line = line_no + 1, path = ?path, "Failed to read device line"),
            }
        }

        Ok(devices)
    }

    fn open(&self, id: DeviceId) -> Result<Box<dyn ConfigSpace>> {
        let path = self.access_dir.join(format!(
            "{:02x}/{:02x}.{}",
            id.bus, id.device, id.function
        ));
        open_config(id, path)
    }
}
