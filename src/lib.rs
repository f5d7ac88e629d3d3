//! Driver core for Bosch C_CAN controllers (as found on TM4C123 devices).
//!
//! The controller keeps up to 32 message objects ("mailboxes") in internal RAM that software
//! can only reach through two interface windows per module. This crate computes bit timing
//! register values, runs the window transaction protocol to set up, send, update and read
//! mailboxes, and exposes the controller's configuration, test modes and status.
//!
//! Register access is injected: [`Can`] works on anything implementing
//! [`RegisterAccess`], such as [`pac::Mmio`] for the real peripherals.

#![doc(html_root_url = "https://docs.rs/ccan/0.1.0")]
// Deny a few warnings in doctests, since rustdoc `allow`s many warnings by default
#![doc(test(attr(deny(unused_imports, unused_must_use))))]
#![cfg_attr(not(test), no_std)]

mod fmt;

#[cfg(feature = "embedded-can")]
mod embedded_hal;
mod error;
#[cfg(test)]
mod fake;
mod frame;
mod id;
mod interrupt;
mod message;
pub mod pac;
pub mod registers;
pub mod timing;

pub use crate::error::{BusError, Error};
pub use crate::frame::{Data, FrameKind, ReceivedFrame};
pub use crate::id::{ExtendedId, Id, Identifier, StandardId};
pub use crate::interrupt::{Interrupt, InterruptSource, Interrupts};
pub use crate::message::{Direction, Mailbox, MessageObject, Reception, Transaction};
pub use crate::registers::{Module, RegisterAccess, Status, Window};
pub use crate::timing::{compute_bit_timing, BitTiming, BitTimingRequest, TimingError};

use crate::registers::{Ctl, Register, Tst, STS_LEC};

/// How long to wait for a busy interface window.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusyTimeout {
    /// Poll until the controller releases the window.
    Unbounded,
    /// Give up with [`Error::HardwareUnresponsive`] once this many polls found the window busy.
    Polls(u32),
}

impl Default for BusyTimeout {
    fn default() -> Self {
        BusyTimeout::Unbounded
    }
}

/// Driver configuration.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[non_exhaustive]
pub struct Config {
    /// Bound on waiting for an interface window. Defaults to [`BusyTimeout::Unbounded`].
    pub busy_timeout: BusyTimeout,
}

impl Config {
    /// Sets the bound on waiting for an interface window.
    #[must_use = "returns a new Config without modifying `self`"]
    pub fn with_busy_timeout(mut self, timeout: BusyTimeout) -> Self {
        self.busy_timeout = timeout;
        self
    }
}

/// Test register patterns selectable with [`Can::select_test_mode`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TestMode {
    /// Observe the level of the RX pin.
    Receive,
    /// Drive the sample point onto the TX pin.
    BitTiming,
    /// Drive the TX pin recessive (high).
    PhysicalHigh,
    /// Drive the TX pin dominant (low).
    PhysicalLow,
}

impl TestMode {
    fn pattern(self) -> Tst {
        match self {
            TestMode::Receive => Tst::RX,
            TestMode::BitTiming => Tst::TX_SAMPLE_POINT,
            TestMode::PhysicalHigh => Tst::TX_RECESSIVE,
            TestMode::PhysicalLow => Tst::TX_DOMINANT,
        }
    }
}

/// Configuration proxy to be used with `Can::configure()`.
pub struct CanConfig<'a, R> {
    regs: &'a mut R,
    module: Module,
}

impl<R> CanConfig<'_, R>
where
    R: RegisterAccess,
{
    /// Configures the bit timings.
    ///
    /// Use [`compute_bit_timing`] to obtain `timing`.
    pub fn set_bit_timing(&mut self, timing: &BitTiming) {
        self.regs
            .write(self.module, Register::Bit, timing.bit_register());
        self.regs
            .write(self.module, Register::Brpe, timing.extension_register());
    }

    /// Enables the given interrupts.
    pub fn enable_interrupts(&mut self, interrupts: Interrupts) {
        self.regs
            .modify(self.module, Register::Ctl, |r| r | interrupts.bits());
    }

    /// Disables the given interrupts.
    pub fn disable_interrupts(&mut self, interrupts: Interrupts) {
        self.regs
            .modify(self.module, Register::Ctl, |r| r & !interrupts.bits());
    }

    /// Enables or disables automatic retransmission of frames that lost arbitration or were
    /// disturbed by errors.
    pub fn set_automatic_retransmission(&mut self, enabled: bool) {
        self.regs.modify(self.module, Register::Ctl, |r| {
            if enabled {
                r & !Ctl::DAR.bits()
            } else {
                r | Ctl::DAR.bits()
            }
        });
    }
}

/// Interface to the CAN modules.
pub struct Can<R> {
    regs: R,
    config: Config,
}

impl<R> Can<R>
where
    R: RegisterAccess,
{
    /// Creates a CAN interface with the default [`Config`].
    pub fn new(regs: R) -> Self {
        Self::with_config(regs, Config::default())
    }

    /// Creates a CAN interface.
    pub fn with_config(regs: R, config: Config) -> Self {
        Can { regs, config }
    }

    /// Returns the driver configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Releases the register access.
    pub fn free(self) -> R {
        self.regs
    }

    /// Configure bit timings, interrupt enables and retransmission.
    ///
    /// Actual configuration happens on the `CanConfig` that is passed to the closure. The module
    /// is kept in init mode with configuration changes enabled while the closure runs, which
    /// stops it from taking part in bus activity. It leaves init mode afterwards.
    pub fn configure<F>(&mut self, module: Module, f: F)
    where
        F: FnOnce(&mut CanConfig<'_, R>),
    {
        self.regs
            .modify(module, Register::Ctl, |r| r | (Ctl::INIT | Ctl::CCE).bits());

        let mut config = CanConfig {
            regs: &mut self.regs,
            module,
        };
        f(&mut config);

        self.regs
            .modify(module, Register::Ctl, |r| r & !(Ctl::INIT | Ctl::CCE).bits());
    }

    /// Computes the bit timing for `request`, programs it and enables the module and status
    /// interrupts.
    ///
    /// Nothing is written when the timing cannot be represented.
    pub fn init(&mut self, module: Module, request: &BitTimingRequest) -> Result<BitTiming, Error> {
        let timing = compute_bit_timing(request)?;
        self.configure(module, |config| {
            config.set_bit_timing(&timing);
            config.enable_interrupts(Interrupts::MODULE | Interrupts::STATUS);
        });
        debug!("{} initialized: {}", module, timing);
        Ok(timing)
    }

    fn enter_test_mode(&mut self, module: Module) {
        self.regs
            .modify(module, Register::Ctl, |r| r | Ctl::TEST.bits());
    }

    /// Enters test mode and sets one of the test register patterns.
    ///
    /// The TX control field is replaced; silent and loopback settings are kept.
    pub fn select_test_mode(&mut self, module: Module, mode: TestMode) {
        self.enter_test_mode(module);
        self.regs.modify(module, Register::Tst, |r| {
            r & !(Tst::TX_FIELD | Tst::RX).bits() | mode.pattern().bits()
        });
    }

    /// Enables silent mode: the module receives but never drives the bus.
    pub fn enable_silent_mode(&mut self, module: Module) {
        self.enter_test_mode(module);
        self.regs
            .modify(module, Register::Tst, |r| r | Tst::SILENT.bits());
    }

    /// Enables loopback mode: transmitted frames are fed back to the receiver internally.
    pub fn enable_loopback_mode(&mut self, module: Module) {
        self.enter_test_mode(module);
        self.regs
            .modify(module, Register::Tst, |r| r | Tst::LBACK.bits());
    }

    /// Clears all test settings and leaves test mode.
    pub fn disable_test_mode(&mut self, module: Module) {
        self.regs.write(module, Register::Tst, 0);
        self.regs
            .modify(module, Register::Ctl, |r| r & !Ctl::TEST.bits());
    }

    /// Returns the status flags.
    pub fn status(&self, module: Module) -> Status {
        Status::from_bits_truncate(self.regs.read(module, Register::Sts))
    }

    /// Returns the bus error recorded by the controller, if any.
    pub fn last_error_code(&self, module: Module) -> Option<BusError> {
        BusError::from_code(self.regs.read(module, Register::Sts) & STS_LEC)
    }

    /// Returns the pending interrupt with the highest priority.
    pub fn interrupt_source(&self, module: Module) -> Option<InterruptSource> {
        InterruptSource::from_register(self.regs.read(module, Register::Int))
    }

    /// Mailboxes with a transmission pending, bit `n - 1` for mailbox `n`.
    ///
    /// See [`Mailbox::mask`].
    pub fn pending_transmissions(&self, module: Module) -> u32 {
        self.bitmap(module, Register::TxRequest1, Register::TxRequest2)
    }

    /// Mailboxes holding unread data, bit `n - 1` for mailbox `n`.
    pub fn new_data(&self, module: Module) -> u32 {
        self.bitmap(module, Register::NewData1, Register::NewData2)
    }

    fn bitmap(&self, module: Module, low: Register, high: Register) -> u32 {
        let low = self.regs.read(module, low) & 0xFFFF;
        let high = self.regs.read(module, high) & 0xFFFF;
        high << 16 | low
    }
}
