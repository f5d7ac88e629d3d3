//! Driver errors.

use thiserror_no_std::Error;

use crate::registers::{Module, Window};
use crate::timing::TimingError;

/// Errors returned by the driver.
#[derive(Error, Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// The requested bit timing cannot be represented by the controller.
    #[error("bit timing: {0}")]
    Timing(#[from] TimingError),

    /// An interface window stayed busy for longer than the configured
    /// [`BusyTimeout`](crate::BusyTimeout).
    #[error("interface window {window:?} of module {module:?} stayed busy")]
    HardwareUnresponsive { module: Module, window: Window },
}

/// Bus error recorded in the last error code field of the status register.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusError {
    Stuff,
    Form,
    Acknowledgement,
    BitRecessive,
    BitDominant,
    Crc,
}

impl BusError {
    /// Decodes a last error code. Codes 0 (no error) and 7 (unchanged) give `None`.
    pub(crate) fn from_code(lec: u32) -> Option<Self> {
        match lec {
            1 => Some(BusError::Stuff),
            2 => Some(BusError::Form),
            3 => Some(BusError::Acknowledgement),
            4 => Some(BusError::BitRecessive),
            5 => Some(BusError::BitDominant),
            6 => Some(BusError::Crc),
            _ => None,
        }
    }
}
