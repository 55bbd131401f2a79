//! Status engine modules
//!
//! Contains the differential status engine and the error catalogs.

mod status;

pub use status::{
    check_aer, check_device_status, ErrorBit, ReportPolicy, AER_CORRECTABLE_ERRORS,
    AER_UNCORRECTABLE_ERRORS, DEVICE_STATUS_ERRORS,
};
