//! Message objects and the interface window transaction protocol.
//!
//! Message RAM is never accessed directly. A transfer is staged in one of the two interface
//! windows of a module and then handed to the controller by writing the mailbox number to the
//! window's command request register. The controller sets BUSY while it copies, and the window
//! must not be touched until BUSY clears again.
//!
//! A [`Transaction`] represents exclusive use of one idle window. It borrows the driver mutably,
//! so a second transaction on the same driver cannot start before the first one is committed.


use core::convert::Infallible;

use crate::registers::{
    Arb2, CommandMask, IfRegister, Mctl, Module, Register, RegisterAccess, Window, ARB2_ID,
    CRQ_BUSY, MCTL_DLC, STANDARD_SHIFT,
};
use crate::{
    BusyTimeout, Can, Data, Error, ExtendedId, FrameKind, Id, Identifier, ReceivedFrame,
    StandardId,
};

/// A message object slot in message RAM, numbered 1 to 32.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Mailbox(u8);

impl Mailbox {
    /// Number of message objects per module.
    pub const COUNT: u8 = 32;

    /// Returns `None` unless `number` is in `1..=32`.
    #[inline]
    pub const fn new(number: u8) -> Option<Self> {
        if number >= 1 && number <= Self::COUNT {
            Some(Mailbox(number))
        } else {
            None
        }
    }

    /// Returns the mailbox number.
    #[inline]
    pub fn get(self) -> u8 {
        self.0
    }

    /// The bit of this mailbox in the 32-bit TXRQ/NWDA bitmaps.
    #[inline]
    pub fn mask(self) -> u32 {
        1 << (self.0 - 1)
    }
}

/// Transfer direction of a message object.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    Transmit,
    Receive,
}

/// Everything needed to set up one mailbox.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MessageObject {
    pub module: Module,
    pub window: Window,
    pub identifier: Identifier,
    pub frame_kind: FrameKind,
    /// Payload for transmit objects. For receive objects only the length is used, as the
    /// expected data length code.
    pub data: Data,
    pub mailbox: Mailbox,
}

/// Result of polling a receive mailbox.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Reception {
    /// The frame, if the mailbox held new data.
    pub frame: Option<ReceivedFrame>,
    /// The controller overwrote a frame that was never read.
    pub message_lost: bool,
}

fn window_busy<R: RegisterAccess>(regs: &R, module: Module, window: Window) -> bool {
    regs.read(module, Register::If(window, IfRegister::Crq)) & CRQ_BUSY != 0
}

/// Polls BUSY until it clears or `timeout` polls found it set.
fn wait_idle<R: RegisterAccess>(
    regs: &R,
    module: Module,
    window: Window,
    timeout: BusyTimeout,
) -> Result<(), Error> {
    match timeout {
        BusyTimeout::Unbounded => {
            while window_busy(regs, module, window) {}
            Ok(())
        }
        BusyTimeout::Polls(limit) => {
            let mut polls = 0;
            while window_busy(regs, module, window) {
                if polls == limit {
                    warn!("{} {} busy after {=u32} polls", module, window, limit);
                    return Err(Error::HardwareUnresponsive { module, window });
                }
                polls += 1;
            }
            Ok(())
        }
    }
}

/// Exclusive use of an idle interface window.
///
/// Obtained from [`Can::acquire_window`]. The `program_*` methods stage fields in the window
/// registers and remember which parts of the message object they touched. [`commit`] then copies
/// exactly those parts into a mailbox.
///
/// [`commit`]: Transaction::commit
pub struct Transaction<'a, R: RegisterAccess> {
    regs: &'a mut R,
    module: Module,
    window: Window,
    command: CommandMask,
    timeout: BusyTimeout,
}

impl<'a, R: RegisterAccess> Transaction<'a, R> {
    fn new(regs: &'a mut R, module: Module, window: Window, timeout: BusyTimeout) -> Self {
        Self {
            regs,
            module,
            window,
            command: CommandMask::empty(),
            timeout,
        }
    }

    /// The module this transaction belongs to.
    pub fn module(&self) -> Module {
        self.module
    }

    /// The window held by this transaction.
    pub fn window(&self) -> Window {
        self.window
    }

    fn read(&self, reg: IfRegister) -> u32 {
        self.regs.read(self.module, Register::If(self.window, reg))
    }

    fn write(&mut self, reg: IfRegister, value: u32) {
        self.regs
            .write(self.module, Register::If(self.window, reg), value)
    }

    /// Stages identifier and acceptance mask.
    ///
    /// All four arbitration and mask registers are written, so nothing of an earlier setup with
    /// the other identifier width survives in the window.
    pub fn program_arbitration(
        &mut self,
        identifier: &Identifier,
        direction: Direction,
    ) -> &mut Self {
        let mut flags = Arb2::MSGVAL;
        if direction == Direction::Transmit {
            flags |= Arb2::DIR;
        }

        let (msk1, msk2, arb1, arb2) = match *identifier {
            Identifier::Standard { id, mask } => (
                0,
                u32::from(mask.as_raw()) << STANDARD_SHIFT,
                0,
                u32::from(id.as_raw()) << STANDARD_SHIFT | flags.bits(),
            ),
            Identifier::Extended { id, mask } => {
                let (id, mask) = (id.as_raw(), mask.as_raw());
                (
                    mask & 0xFFFF,
                    mask >> 16 & ARB2_ID,
                    id & 0xFFFF,
                    id >> 16 & ARB2_ID | (flags | Arb2::XTD).bits(),
                )
            }
        };

        self.write(IfRegister::Msk1, msk1);
        self.write(IfRegister::Msk2, msk2);
        self.write(IfRegister::Arb1, arb1);
        self.write(IfRegister::Arb2, arb2);
        self.command |= CommandMask::ARB | CommandMask::MASK;
        self
    }

    /// Stages the message control register of a single (non-FIFO) mailbox.
    pub fn program_control(&mut self, len: u8, kind: FrameKind, direction: Direction) -> &mut Self {
        let mut mctl = Mctl::UMASK | Mctl::EOB;
        match direction {
            Direction::Transmit => {
                mctl |= Mctl::TXIE;
                if kind == FrameKind::Remote {
                    mctl |= Mctl::RMTEN;
                }
            }
            Direction::Receive => mctl |= Mctl::RXIE,
        }

        self.write(IfRegister::Mctl, mctl.bits() | u32::from(len.min(8)) & MCTL_DLC);
        self.command |= CommandMask::CONTROL;
        self
    }

    /// Stages the payload.
    ///
    /// Only the 16-bit data registers covered by the payload length are written. Data A is always
    /// transferred, data B only for payloads longer than 4 bytes, so the mailbox keeps its bytes
    /// beyond that.
    pub fn program_payload(&mut self, data: &Data) -> &mut Self {
        let len = usize::from(data.len());
        for (index, &reg) in IfRegister::DATA.iter().enumerate() {
            if index == 0 || len > 2 * index {
                self.write(reg, data.register_word(index));
            }
        }

        self.command |= CommandMask::DATA_A;
        if len > 4 {
            self.command |= CommandMask::DATA_B;
        }
        self
    }

    /// Hands the staged parts to `mailbox`.
    ///
    /// With `request_transmit` the mailbox is also queued for transmission. This returns as soon
    /// as the command is written; the controller owns the window until BUSY clears, which the
    /// next acquisition of the window waits for.
    pub fn commit(mut self, mailbox: Mailbox, request_transmit: bool) {
        let mut command = CommandMask::WRNRD | self.command;
        if request_transmit {
            command |= CommandMask::NEWDAT_TXRQST;
            if self.command.contains(CommandMask::CONTROL) {
                let mctl = self.read(IfRegister::Mctl);
                self.write(IfRegister::Mctl, mctl | Mctl::TXRQST.bits());
            }
        }

        debug!(
            "commit {} {} mailbox {=u8} cmsk {=u32:#x}",
            self.module,
            self.window,
            mailbox.get(),
            command.bits()
        );
        self.write(IfRegister::Cmsk, command.bits());
        self.write(IfRegister::Crq, u32::from(mailbox.get()));
    }

    /// Runs a command on `mailbox` and waits for it to complete.
    fn execute(&mut self, mailbox: Mailbox, command: CommandMask) -> Result<(), Error> {
        self.write(IfRegister::Cmsk, command.bits());
        self.write(IfRegister::Crq, u32::from(mailbox.get()));
        wait_idle(&*self.regs, self.module, self.window, self.timeout)
    }

    /// Identifier held by the window's arbitration registers.
    fn read_id(&self) -> Id {
        let arb2 = self.read(IfRegister::Arb2);
        let upper = arb2 & ARB2_ID;
        if arb2 & Arb2::XTD.bits() != 0 {
            let lower = self.read(IfRegister::Arb1) & 0xFFFF;
            Id::Extended(unsafe { ExtendedId::new_unchecked(upper << 16 | lower) })
        } else {
            Id::Standard(unsafe { StandardId::new_unchecked((upper >> STANDARD_SHIFT) as u16) })
        }
    }

    fn read_data(&self, len: u8) -> Data {
        let mut words = [0; 4];
        for (word, &reg) in words.iter_mut().zip(IfRegister::DATA.iter()) {
            *word = self.read(reg);
        }
        Data::from_registers(len, words)
    }
}

impl<R: RegisterAccess> Can<R> {
    /// Claims a window if it is idle.
    ///
    /// Returns `WouldBlock` while the controller is still working on the window's last command.
    pub fn try_acquire_window(
        &mut self,
        module: Module,
        window: Window,
    ) -> nb::Result<Transaction<'_, R>, Infallible> {
        if window_busy(&self.regs, module, window) {
            return Err(nb::Error::WouldBlock);
        }
        trace!("acquired {} {}", module, window);
        Ok(Transaction::new(
            &mut self.regs,
            module,
            window,
            self.config.busy_timeout,
        ))
    }

    /// Waits for a window to become idle and claims it.
    ///
    /// Waits for as long as [`Config::busy_timeout`](crate::Config) allows.
    pub fn acquire_window(
        &mut self,
        module: Module,
        window: Window,
    ) -> Result<Transaction<'_, R>, Error> {
        let timeout = self.config.busy_timeout;
        wait_idle(&self.regs, module, window, timeout)?;
        trace!("acquired {} {}", module, window);
        Ok(Transaction::new(&mut self.regs, module, window, timeout))
    }

    /// Sets up a transmit mailbox and queues it for transmission.
    ///
    /// Success means the controller accepted the mailbox, not that the frame made it onto the
    /// bus. A [`FrameKind::Remote`] object additionally answers remote frames matching its
    /// identifier automatically.
    pub fn transmit(&mut self, object: &MessageObject) -> Result<(), Error> {
        let mut tx = self.acquire_window(object.module, object.window)?;
        tx.program_arbitration(&object.identifier, Direction::Transmit)
            .program_control(object.data.len(), object.frame_kind, Direction::Transmit)
            .program_payload(&object.data);
        tx.commit(object.mailbox, true);
        Ok(())
    }

    /// Replaces the payload of an already configured transmit mailbox and queues it again.
    ///
    /// Identifier, mask and control settings of the mailbox are left alone.
    pub fn update(
        &mut self,
        module: Module,
        window: Window,
        mailbox: Mailbox,
        data: &Data,
    ) -> Result<(), Error> {
        let mut tx = self.acquire_window(module, window)?;
        tx.program_payload(data);
        tx.commit(mailbox, true);
        Ok(())
    }

    /// Sets up a receive mailbox and checks it for a frame.
    ///
    /// For a [`FrameKind::Remote`] object the mailbox also sends a remote frame, asking the
    /// owner of the identifier to transmit.
    pub fn receive(&mut self, object: &MessageObject) -> Result<Reception, Error> {
        let mut tx = self.acquire_window(object.module, object.window)?;
        tx.program_arbitration(&object.identifier, Direction::Receive)
            .program_control(object.data.len(), object.frame_kind, Direction::Receive);
        tx.commit(object.mailbox, object.frame_kind == FrameKind::Remote);
        self.poll_mailbox(object.module, object.window, object.mailbox)
    }

    /// Reads a receive mailbox.
    ///
    /// New data is copied out and its NEWDAT flag cleared in one command. A set MSGLST flag is
    /// always cleared and reported through [`Reception::message_lost`], whether or not new data
    /// is present. The MSGLST write-back starts from a fresh copy of the control bits, so a frame
    /// stored after the first read keeps its NEWDAT flag.
    pub fn poll_mailbox(
        &mut self,
        module: Module,
        window: Window,
        mailbox: Mailbox,
    ) -> Result<Reception, Error> {
        let mut tx = self.acquire_window(module, window)?;
        tx.execute(
            mailbox,
            CommandMask::ARB
                | CommandMask::CONTROL
                | CommandMask::DATA_A
                | CommandMask::DATA_B
                | CommandMask::NEWDAT_TXRQST,
        )?;

        let mctl = tx.read(IfRegister::Mctl);
        let flags = Mctl::from_bits_truncate(mctl);

        let frame = if flags.contains(Mctl::NEWDAT) {
            Some(ReceivedFrame {
                id: tx.read_id(),
                data: tx.read_data((mctl & MCTL_DLC) as u8),
            })
        } else {
            None
        };

        let message_lost = flags.contains(Mctl::MSGLST);
        if message_lost {
            warn!("{} mailbox {=u8} lost a message", module, mailbox.get());
            tx.execute(mailbox, CommandMask::CONTROL)?;
            let current = tx.read(IfRegister::Mctl);
            tx.write(IfRegister::Mctl, current & !Mctl::MSGLST.bits());
            tx.execute(mailbox, CommandMask::WRNRD | CommandMask::CONTROL)?;
        }

        Ok(Reception {
            frame,
            message_lost,
        })
    }
}
