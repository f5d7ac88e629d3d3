//! Interrupt types.

use core::ops;

use crate::Mailbox;

/// Interrupt enables in the control register.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[non_exhaustive]
pub enum Interrupt {
    /// Module interrupt line. Required for any interrupt to be raised.
    Module = 1 << 1,
    /// Status changes (TXOK, RXOK, LEC updates).
    Status = 1 << 2,
    /// Error passive and bus-off transitions.
    Error = 1 << 3,
}

bitflags::bitflags! {
    /// A set of controller interrupts.
    pub struct Interrupts: u32 {
        const MODULE = 1 << 1;
        const STATUS = 1 << 2;
        const ERROR = 1 << 3;
    }
}

impl From<Interrupt> for Interrupts {
    fn from(i: Interrupt) -> Self {
        Self::from_bits_truncate(i as u32)
    }
}

/// Adds an interrupts to the interrupt set.
impl ops::BitOrAssign<Interrupt> for Interrupts {
    fn bitor_assign(&mut self, rhs: Interrupt) {
        *self |= Self::from(rhs);
    }
}

/// Highest priority pending interrupt, as reported by the interrupt register.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InterruptSource {
    /// Status interrupt.
    Status,
    /// A mailbox has its interrupt pending.
    Mailbox(Mailbox),
}

impl InterruptSource {
    const STATUS: u32 = 0x8000;

    /// Decodes the interrupt register. Returns `None` when no interrupt is pending.
    pub(crate) fn from_register(value: u32) -> Option<Self> {
        match value & 0xFFFF {
            Self::STATUS => Some(InterruptSource::Status),
            n => Mailbox::new(n as u8)
                .filter(|_| n <= u32::from(Mailbox::COUNT))
                .map(InterruptSource::Mailbox),
        }
    }
}
