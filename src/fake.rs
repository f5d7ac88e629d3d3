//! In-memory controller model for host tests.
//!
//! Models the register file of both modules, the message RAM behind the interface windows, the
//! BUSY flag of each window (cleared after a configurable number of polls), and the CMSK driven
//! copies between a window and a mailbox. Every register write is recorded.

use core::cell::RefCell;

use crate::registers::{
    CommandMask, IfRegister, Mctl, Module, Register, RegisterAccess, Window, ARB2_ID, CRQ_BUSY,
    CRQ_MNUM, MCTL_DLC, STANDARD_SHIFT,
};
use crate::{Data, Id, Mailbox};

const REGISTER_WORDS: usize = Register::NewData2.offset() / 4 + 1;

/// One message object in message RAM.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct RamObject {
    pub msk1: u32,
    pub msk2: u32,
    pub arb1: u32,
    pub arb2: u32,
    pub mctl: u32,
    pub data: [u32; 4],
}

struct Delivery {
    module: Module,
    mailbox: u8,
    id: Id,
    data: Data,
}

struct State {
    registers: [[u32; REGISTER_WORDS]; 2],
    objects: [[RamObject; 32]; 2],
    /// Remaining busy polls per module and window.
    busy: [[u32; 2]; 2],
    latency: u32,
    stalled: bool,
    polls: usize,
    writes: Vec<(Module, Register, u32)>,
    on_commit: Vec<Delivery>,
}

pub struct FakeController {
    state: RefCell<State>,
}

impl FakeController {
    pub fn new() -> Self {
        Self {
            state: RefCell::new(State {
                registers: [[0; REGISTER_WORDS]; 2],
                objects: [[RamObject::default(); 32]; 2],
                busy: [[0; 2]; 2],
                latency: 0,
                stalled: false,
                polls: 0,
                writes: Vec::new(),
                on_commit: Vec::new(),
            }),
        }
    }

    /// Number of polls a window stays busy after a command request.
    pub fn set_latency(&self, polls: u32) {
        self.state.borrow_mut().latency = polls;
    }

    /// Keeps BUSY set on every window forever.
    pub fn stall(&self) {
        self.state.borrow_mut().stalled = true;
    }

    /// Marks a window busy for the next `polls` reads of its CRQ.
    pub fn make_busy(&self, module: Module, window: Window, polls: u32) {
        self.state.borrow_mut().busy[module.index()][window.index()] = polls;
    }

    /// Number of CRQ reads so far.
    pub fn polls(&self) -> usize {
        self.state.borrow().polls
    }

    /// All register writes so far.
    pub fn writes(&self) -> Vec<(Module, Register, u32)> {
        self.state.borrow().writes.clone()
    }

    pub fn clear_writes(&self) {
        self.state.borrow_mut().writes.clear();
    }

    /// Raw register value, without side effects.
    pub fn get(&self, module: Module, reg: Register) -> u32 {
        self.state.borrow().registers[module.index()][reg.offset() / 4]
    }

    /// Presets a register, bypassing the write log.
    pub fn set(&self, module: Module, reg: Register, value: u32) {
        self.state.borrow_mut().registers[module.index()][reg.offset() / 4] = value;
    }

    pub fn object(&self, module: Module, mailbox: u8) -> RamObject {
        self.state.borrow().objects[module.index()][usize::from(mailbox) - 1]
    }

    pub fn set_object(&self, module: Module, mailbox: u8, object: RamObject) {
        self.state.borrow_mut().objects[module.index()][usize::from(mailbox) - 1] = object;
    }

    /// Stores a frame in a mailbox as the controller would on reception.
    ///
    /// A mailbox still holding unread data gets MSGLST set.
    pub fn deliver(&self, module: Module, mailbox: Mailbox, id: Id, data: Data) {
        self.state
            .borrow_mut()
            .store(module, mailbox.get(), id, data);
    }

    /// Delivers a frame right after the next command request to `mailbox` completes.
    pub fn deliver_on_commit(&self, module: Module, mailbox: Mailbox, id: Id, data: Data) {
        self.state.borrow_mut().on_commit.push(Delivery {
            module,
            mailbox: mailbox.get(),
            id,
            data,
        });
    }
}

impl State {
    fn store(&mut self, module: Module, mailbox: u8, id: Id, data: Data) {
        let object = &mut self.objects[module.index()][usize::from(mailbox) - 1];
        match id {
            Id::Standard(id) => {
                object.arb1 = 0;
                object.arb2 = (object.arb2 & !ARB2_ID) | u32::from(id.as_raw()) << STANDARD_SHIFT;
            }
            Id::Extended(id) => {
                object.arb1 = id.as_raw() & 0xFFFF;
                object.arb2 = (object.arb2 & !ARB2_ID) | (id.as_raw() >> 16) & ARB2_ID;
            }
        }
        for (index, word) in object.data.iter_mut().enumerate() {
            *word = data.register_word(index);
        }
        if object.mctl & Mctl::NEWDAT.bits() != 0 {
            object.mctl |= Mctl::MSGLST.bits();
        }
        object.mctl = (object.mctl & !MCTL_DLC) | Mctl::NEWDAT.bits() | u32::from(data.len());
    }

    fn window_register(&mut self, module: Module, window: Window, reg: IfRegister) -> &mut u32 {
        &mut self.registers[module.index()][Register::If(window, reg).offset() / 4]
    }

    /// Executes the command written to CRQ.
    fn request(&mut self, module: Module, window: Window, crq: u32) {
        let mailbox = (crq & CRQ_MNUM) as u8;
        if !(1..=32).contains(&mailbox) {
            return;
        }
        let command = CommandMask::from_bits_truncate(*self.window_register(
            module,
            window,
            IfRegister::Cmsk,
        ));
        let mut object = self.objects[module.index()][usize::from(mailbox) - 1];

        let parts = [
            (CommandMask::MASK, IfRegister::Msk1),
            (CommandMask::MASK, IfRegister::Msk2),
            (CommandMask::ARB, IfRegister::Arb1),
            (CommandMask::ARB, IfRegister::Arb2),
            (CommandMask::CONTROL, IfRegister::Mctl),
            (CommandMask::DATA_A, IfRegister::Da1),
            (CommandMask::DATA_A, IfRegister::Da2),
            (CommandMask::DATA_B, IfRegister::Db1),
            (CommandMask::DATA_B, IfRegister::Db2),
        ];
        for &(part, reg) in parts.iter() {
            if !command.contains(part) {
                continue;
            }
            let field = match reg {
                IfRegister::Msk1 => &mut object.msk1,
                IfRegister::Msk2 => &mut object.msk2,
                IfRegister::Arb1 => &mut object.arb1,
                IfRegister::Arb2 => &mut object.arb2,
                IfRegister::Mctl => &mut object.mctl,
                IfRegister::Da1 => &mut object.data[0],
                IfRegister::Da2 => &mut object.data[1],
                IfRegister::Db1 => &mut object.data[2],
                _ => &mut object.data[3],
            };
            let window_value = self.window_register(module, window, reg);
            if command.contains(CommandMask::WRNRD) {
                *field = *window_value;
            } else {
                *window_value = *field;
            }
        }

        if command.contains(CommandMask::NEWDAT_TXRQST) {
            if command.contains(CommandMask::WRNRD) {
                object.mctl |= Mctl::TXRQST.bits();
            } else {
                object.mctl &= !Mctl::NEWDAT.bits();
            }
        }
        if command.contains(CommandMask::CLRINTPND) {
            object.mctl &= !Mctl::INTPND.bits();
        }
        self.objects[module.index()][usize::from(mailbox) - 1] = object;

        let (ready, pending): (Vec<_>, Vec<_>) = self
            .on_commit
            .drain(..)
            .partition(|d| d.module == module && d.mailbox == mailbox);
        self.on_commit = pending;
        for d in ready {
            self.store(d.module, d.mailbox, d.id, d.data);
        }

        self.busy[module.index()][window.index()] = self.latency;
    }

    /// Mailbox bitmap of objects with `flag` set in MCTL, 16 mailboxes per register.
    fn bitmap(&self, module: Module, flag: Mctl, upper: bool) -> u32 {
        let objects = &self.objects[module.index()];
        let half = if upper { &objects[16..] } else { &objects[..16] };
        half.iter()
            .enumerate()
            .filter(|(_, o)| o.mctl & flag.bits() != 0)
            .fold(0, |bits, (i, _)| bits | 1u32 << i)
    }
}

impl RegisterAccess for &FakeController {
    fn read(&self, module: Module, reg: Register) -> u32 {
        let mut guard = self.state.borrow_mut();
        let state = &mut *guard;
        match reg {
            Register::If(window, IfRegister::Crq) => {
                state.polls += 1;
                let value = state.registers[module.index()][reg.offset() / 4] & CRQ_MNUM;
                let busy = &mut state.busy[module.index()][window.index()];
                if *busy > 0 {
                    *busy -= 1;
                    value | CRQ_BUSY
                } else if state.stalled {
                    value | CRQ_BUSY
                } else {
                    value
                }
            }
            Register::TxRequest1 => state.bitmap(module, Mctl::TXRQST, false),
            Register::TxRequest2 => state.bitmap(module, Mctl::TXRQST, true),
            Register::NewData1 => state.bitmap(module, Mctl::NEWDAT, false),
            Register::NewData2 => state.bitmap(module, Mctl::NEWDAT, true),
            _ => state.registers[module.index()][reg.offset() / 4],
        }
    }

    fn write(&mut self, module: Module, reg: Register, value: u32) {
        let mut state = self.state.borrow_mut();
        state.writes.push((module, reg, value));
        state.registers[module.index()][reg.offset() / 4] = value;
        if let Register::If(window, IfRegister::Crq) = reg {
            state.request(module, window, value);
        }
    }
}
