
use core::ops::{Deref, DerefMut};

use crate::Id;

/// Payload of a CAN data frame.
///
/// Contains 0 to 8 Bytes of data.
///
/// `Data` implements `From<[u8; N]>` for all `N` up to 8, which provides a convenient lossless
/// conversion to create `Data` from an array.
#[derive(Debug, Copy, Clone)]
pub struct Data {
    pub(crate) len: u8,
    pub(crate) bytes: [u8; 8],
}

impl Data {
    /// Creates a data payload from a raw byte slice.
    ///
    /// Returns `None` if `data` contains more than 8 Bytes (which is the maximum).
    ///
    /// `Data` can also be constructed from fixed-length arrays up to length 8 via `From`/`Into`.
    pub fn new(data: &[u8]) -> Option<Self> {
        if data.len() > 8 {
            return None;
        }

        let mut bytes = [0; 8];
        bytes[..data.len()].copy_from_slice(data);

        Some(Self {
            len: data.len() as u8,
            bytes,
        })
    }

    /// Creates an empty data payload containing 0 bytes.
    #[inline]
    pub const fn empty() -> Self {
        Self {
            len: 0,
            bytes: [0; 8],
        }
    }

    /// Number of payload bytes, which is also the data length code of the frame.
    #[inline]
    pub fn len(&self) -> u8 {
        self.len
    }

    /// Builds a payload from the raw 16-bit data registers DA1, DA2, DB1 and DB2.
    ///
    /// `len` is clamped to 8 (DLC values 9 to 15 still mean 8 bytes).
    pub(crate) fn from_registers(len: u8, words: [u32; 4]) -> Self {
        let mut bytes = [0; 8];
        for (chunk, word) in bytes.chunks_exact_mut(2).zip(words.iter()) {
            chunk.copy_from_slice(&(*word as u16).to_le_bytes());
        }
        Self {
            len: len.min(8),
            bytes,
        }
    }

    /// Returns the register value for 16-bit sub-field `index` (0 = DA1 ... 3 = DB2).
    pub(crate) fn register_word(&self, index: usize) -> u32 {
        let lo = self.bytes[2 * index];
        let hi = self.bytes[2 * index + 1];
        u32::from(u16::from_le_bytes([lo, hi]))
    }
}

impl AsRef<[u8]> for Data {
    #[inline]
    fn as_ref(&self) -> &[u8] {
        &self.bytes[..usize::from(self.len)]
    }
}

impl AsMut<[u8]> for Data {
    #[inline]
    fn as_mut(&mut self) -> &mut [u8] {
        &mut self.bytes[..usize::from(self.len)]
    }
}

impl Deref for Data {
    type Target = [u8];

    #[inline]
    fn deref(&self) -> &[u8] {
        self.as_ref()
    }
}

impl DerefMut for Data {
    #[inline]
    fn deref_mut(&mut self) -> &mut [u8] {
        self.as_mut()
    }
}

impl PartialEq for Data {
    fn eq(&self, other: &Self) -> bool {
        self.as_ref() == other.as_ref()
    }
}

impl Eq for Data {}

#[cfg(feature = "defmt")]
impl defmt::Format for Data {
    fn format(&self, fmt: defmt::Formatter<'_>) {
        self.as_ref().format(fmt)
    }
}

macro_rules! data_from_array {
    ( $($len:literal),+ ) => {
        $(
            impl From<[u8; $len]> for Data {
                #[inline]
                fn from(arr: [u8; $len]) -> Self {
                    let mut bytes = [0; 8];
                    bytes[..$len].copy_from_slice(&arr);
                    Self {
                        len: $len,
                        bytes,
                    }
                }
            }
        )+
    };
}

data_from_array!(0, 1, 2, 3, 4, 5, 6, 7, 8);

/// Kind of frame a message object sends or answers.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameKind {
    /// Data frame carrying the payload.
    Data,
    /// Remote frame requesting data from another node.
    Remote,
}

/// A frame read back from a receive mailbox.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ReceivedFrame {
    /// Identifier the frame was received with.
    pub id: Id,
    /// Received payload, length taken from the DLC.
    pub data: Data,
}

impl ReceivedFrame {
    /// Returns `true` if the frame carries a 29-bit identifier.
    #[inline]
    pub fn is_extended(&self) -> bool {
        matches!(self.id, Id::Extended(_))
    }
}
