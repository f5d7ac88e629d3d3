//! Register capability and named bit fields.
//!
//! The driver never touches memory directly. All accesses go through [`RegisterAccess`], which is
//! implemented by [`Mmio`](crate::pac::Mmio) for the real peripheral and by an in-memory fake in
//! the tests. Registers are addressed by `(Module, Register)` and each module has two identical
//! interface windows, selected through [`Register::If`].

use core::ops::RangeInclusive;

/// One of the two CAN controllers on the chip.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Module {
    /// The first controller (`CAN0`).
    A,
    /// The second controller (`CAN1`).
    B,
}

impl Module {
    pub(crate) fn index(self) -> usize {
        match self {
            Module::A => 0,
            Module::B => 1,
        }
    }
}

/// One of the two interface register sets (IF1 and IF2) of a module.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Window {
    /// IF1.
    Primary,
    /// IF2.
    Secondary,
}

impl Window {
    pub(crate) fn index(self) -> usize {
        match self {
            Window::Primary => 0,
            Window::Secondary => 1,
        }
    }
}

/// Registers of one interface window.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IfRegister {
    /// Command request: mailbox number and BUSY flag.
    Crq,
    /// Command mask: transfer direction and selected parts.
    Cmsk,
    /// Mask bits 15:0.
    Msk1,
    /// Mask bits 28:16 (or the 11-bit standard mask) and mask control bits.
    Msk2,
    /// Arbitration bits 15:0.
    Arb1,
    /// Arbitration bits 28:16 (or the 11-bit standard id), XTD, DIR and MSGVAL.
    Arb2,
    /// Message control.
    Mctl,
    /// Data bytes 0 and 1.
    Da1,
    /// Data bytes 2 and 3.
    Da2,
    /// Data bytes 4 and 5.
    Db1,
    /// Data bytes 6 and 7.
    Db2,
}

impl IfRegister {
    /// The four payload registers, in byte order.
    pub const DATA: [IfRegister; 4] = [
        IfRegister::Da1,
        IfRegister::Da2,
        IfRegister::Db1,
        IfRegister::Db2,
    ];

    const fn offset(self) -> usize {
        match self {
            IfRegister::Crq => 0x00,
            IfRegister::Cmsk => 0x04,
            IfRegister::Msk1 => 0x08,
            IfRegister::Msk2 => 0x0C,
            IfRegister::Arb1 => 0x10,
            IfRegister::Arb2 => 0x14,
            IfRegister::Mctl => 0x18,
            IfRegister::Da1 => 0x1C,
            IfRegister::Da2 => 0x20,
            IfRegister::Db1 => 0x24,
            IfRegister::Db2 => 0x28,
        }
    }
}

/// A register of one CAN module.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Register {
    /// Control.
    Ctl,
    /// Status.
    Sts,
    /// Error counters.
    Err,
    /// Bit timing.
    Bit,
    /// Interrupt identifier.
    Int,
    /// Test.
    Tst,
    /// Baud rate prescaler extension.
    Brpe,
    /// A register of an interface window.
    If(Window, IfRegister),
    /// Transmission request bits for mailboxes 1 to 16.
    TxRequest1,
    /// Transmission request bits for mailboxes 17 to 32.
    TxRequest2,
    /// New data bits for mailboxes 1 to 16.
    NewData1,
    /// New data bits for mailboxes 17 to 32.
    NewData2,
}

/// Base offsets of the interface windows, indexed by [`Window`].
const WINDOW_BASE: [usize; 2] = [0x020, 0x080];

impl Register {
    /// Byte offset of the register from the start of the module's register block.
    pub const fn offset(self) -> usize {
        match self {
            Register::Ctl => 0x000,
            Register::Sts => 0x004,
            Register::Err => 0x008,
            Register::Bit => 0x00C,
            Register::Int => 0x010,
            Register::Tst => 0x014,
            Register::Brpe => 0x018,
            Register::If(window, reg) => {
                let base = match window {
                    Window::Primary => WINDOW_BASE[0],
                    Window::Secondary => WINDOW_BASE[1],
                };
                base + reg.offset()
            }
            Register::TxRequest1 => 0x100,
            Register::TxRequest2 => 0x104,
            Register::NewData1 => 0x120,
            Register::NewData2 => 0x124,
        }
    }
}

/// Typed access to the controller registers.
///
/// Only the low 16 bits of each register are meaningful.
pub trait RegisterAccess {
    /// Reads a register.
    fn read(&self, module: Module, reg: Register) -> u32;

    /// Writes a register.
    fn write(&mut self, module: Module, reg: Register, value: u32);

    /// Read-modify-write of a register.
    fn modify<F>(&mut self, module: Module, reg: Register, f: F)
    where
        F: FnOnce(u32) -> u32,
    {
        let value = self.read(module, reg);
        self.write(module, reg, f(value));
    }
}

impl<R: RegisterAccess + ?Sized> RegisterAccess for &mut R {
    #[inline]
    fn read(&self, module: Module, reg: Register) -> u32 {
        (**self).read(module, reg)
    }

    #[inline]
    fn write(&mut self, module: Module, reg: Register, value: u32) {
        (**self).write(module, reg, value)
    }
}

bitflags::bitflags! {
    /// CANCTL bits.
    pub struct Ctl: u32 {
        /// Initialization mode. Bus activity stops while set.
        const INIT = 1 << 0;
        /// Module interrupt enable.
        const IE = 1 << 1;
        /// Status interrupt enable.
        const SIE = 1 << 2;
        /// Error interrupt enable.
        const EIE = 1 << 3;
        /// Disable automatic retransmission.
        const DAR = 1 << 5;
        /// Configuration change enable. BIT and BRPE are writable only with INIT and CCE set.
        const CCE = 1 << 6;
        /// Test mode enable. TST is writable only while set.
        const TEST = 1 << 7;
    }
}

bitflags::bitflags! {
    /// CANTST bits.
    pub struct Tst: u32 {
        /// Basic mode: IF1 and IF2 are used as TX and RX buffers.
        const BASIC = 1 << 2;
        /// Silent mode: the controller does not drive the bus.
        const SILENT = 1 << 3;
        /// Loopback mode: TX is internally fed back to RX.
        const LBACK = 1 << 4;
        /// TX pin driven by the sample point.
        const TX_SAMPLE_POINT = 0b01 << 5;
        /// TX pin driven dominant (low).
        const TX_DOMINANT = 0b10 << 5;
        /// TX pin driven recessive (high).
        const TX_RECESSIVE = 0b11 << 5;
        /// Level of the RX pin.
        const RX = 1 << 7;
    }
}

impl Tst {
    /// The two-bit TX control field.
    pub const TX_FIELD: Tst = Tst::TX_RECESSIVE;
}

bitflags::bitflags! {
    /// CANIFnCMSK bits.
    ///
    /// Selects the transfer direction and the parts of a message object copied between the
    /// interface window and message RAM when the mailbox number is written to CRQ.
    pub struct CommandMask: u32 {
        /// Data bytes 4 to 7.
        const DATA_B = 1 << 0;
        /// Data bytes 0 to 3.
        const DATA_A = 1 << 1;
        /// Write: set TXRQST of the mailbox. Read: clear NEWDAT of the mailbox.
        const NEWDAT_TXRQST = 1 << 2;
        /// Clear the interrupt pending bit of the mailbox.
        const CLRINTPND = 1 << 3;
        /// Message control.
        const CONTROL = 1 << 4;
        /// Arbitration bits.
        const ARB = 1 << 5;
        /// Mask bits.
        const MASK = 1 << 6;
        /// Transfer direction: set for window to mailbox, clear for mailbox to window.
        const WRNRD = 1 << 7;
    }
}

bitflags::bitflags! {
    /// Flag bits of CANIFnARB2. The low 13 bits carry identifier bits.
    pub struct Arb2: u32 {
        /// Transmit direction.
        const DIR = 1 << 13;
        /// 29-bit identifier.
        const XTD = 1 << 14;
        /// Message object is valid.
        const MSGVAL = 1 << 15;
    }
}

bitflags::bitflags! {
    /// Flag bits of CANIFnMCTL. The low 4 bits carry the data length code.
    pub struct Mctl: u32 {
        /// Single mailbox (end of FIFO buffer).
        const EOB = 1 << 7;
        /// Transmission requested.
        const TXRQST = 1 << 8;
        /// Answer matching remote frames automatically.
        const RMTEN = 1 << 9;
        /// Receive interrupt enable.
        const RXIE = 1 << 10;
        /// Transmit interrupt enable.
        const TXIE = 1 << 11;
        /// Use the mask for acceptance filtering.
        const UMASK = 1 << 12;
        /// Interrupt pending.
        const INTPND = 1 << 13;
        /// A message was overwritten before it was read.
        const MSGLST = 1 << 14;
        /// New data since the last read.
        const NEWDAT = 1 << 15;
    }
}

/// Busy flag of CANIFnCRQ. Set by a write of the mailbox number, cleared by the controller.
pub const CRQ_BUSY: u32 = 1 << 15;

/// Mailbox number field of CANIFnCRQ.
pub const CRQ_MNUM: u32 = 0x3F;

/// Identifier bits held by CANIFnARB2 / mask bits held by CANIFnMSK2 (id bits 28:16).
pub const ARB2_ID: u32 = 0x1FFF;

/// Shift of an 11-bit identifier or mask within CANIFnARB2 / CANIFnMSK2.
pub const STANDARD_SHIFT: u32 = 2;

/// Data length code field of CANIFnMCTL.
pub const MCTL_DLC: u32 = 0xF;

/// Last error code field of CANSTS.
pub const STS_LEC: u32 = 0x7;

/// Bit fields of CANBIT.
pub mod bit {
    use super::RangeInclusive;

    /// Baud rate prescaler, bits 5:0.
    pub const BRP_SHIFT: u32 = 0;
    /// Valid register values of the prescaler field.
    pub const BRP: RangeInclusive<i64> = 0..=63;
    /// Synchronization jump width, bits 7:6.
    pub const SJW_SHIFT: u32 = 6;
    /// Valid register values of the jump width field.
    pub const SJW: RangeInclusive<i64> = 0..=3;
    /// Time segment before the sample point, bits 11:8.
    pub const TSEG1_SHIFT: u32 = 8;
    /// Time segment after the sample point, bits 14:12.
    pub const TSEG2_SHIFT: u32 = 12;
    /// Largest value the three-bit TSEG2 field holds.
    pub const TSEG2_MAX: i64 = 7;
}

bitflags::bitflags! {
    /// CANSTS bits. The last error code is read with
    /// [`Can::last_error_code`](crate::Can::last_error_code).
    pub struct Status: u32 {
        /// A message was transmitted successfully.
        const TXOK = 1 << 3;
        /// A message was received successfully.
        const RXOK = 1 << 4;
        /// Error passive state.
        const EPASS = 1 << 5;
        /// An error counter reached the warning limit.
        const EWARN = 1 << 6;
        /// Bus-off state.
        const BOFF = 1 << 7;
    }
}
