//! Hardware interaction modules
//!
//! Contains config-space access backends and the capability walker.

mod access;
mod caps;

pub use access::{make_backend, AccessBackend, ConfigSpace, OpenDevice, ProcAccess, SysfsAccess};
pub use caps::{find_cap_exp, find_ecap_aer};
