//! `embedded-can` interop.

use crate::{BusError, Error, ExtendedId, Id, StandardId};

use embedded_can as can;

impl From<can::Id> for Id {
    fn from(id: can::Id) -> Self {
        match id {
            can::Id::Standard(id) => unsafe {
                Id::Standard(StandardId::new_unchecked(id.as_raw()))
            },
            can::Id::Extended(id) => unsafe {
                Id::Extended(ExtendedId::new_unchecked(id.as_raw()))
            },
        }
    }
}

impl From<Id> for can::Id {
    fn from(id: Id) -> Self {
        match id {
            Id::Standard(id) => unsafe {
                can::Id::Standard(can::StandardId::new_unchecked(id.as_raw()))
            },
            Id::Extended(id) => unsafe {
                can::Id::Extended(can::ExtendedId::new_unchecked(id.as_raw()))
            },
        }
    }
}

impl can::Error for BusError {
    fn kind(&self) -> can::ErrorKind {
        match self {
            BusError::Stuff => can::ErrorKind::Stuff,
            BusError::Form => can::ErrorKind::Form,
            BusError::Acknowledgement => can::ErrorKind::Acknowledge,
            BusError::BitRecessive | BusError::BitDominant => can::ErrorKind::Bit,
            BusError::Crc => can::ErrorKind::Crc,
        }
    }
}

impl can::Error for Error {
    fn kind(&self) -> can::ErrorKind {
        can::ErrorKind::Other
    }
}
