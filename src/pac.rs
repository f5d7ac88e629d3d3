//! Memory-mapped register block.

use vcell::VolatileCell;

use crate::registers::{IfRegister, Module, Register, RegisterAccess};

/// Register set of one interface window (IF1 or IF2).
#[repr(C)]
pub struct InterfaceBlock {
    pub crq: VolatileCell<u32>,
    pub cmsk: VolatileCell<u32>,
    pub msk1: VolatileCell<u32>,
    pub msk2: VolatileCell<u32>,
    pub arb1: VolatileCell<u32>,
    pub arb2: VolatileCell<u32>,
    pub mctl: VolatileCell<u32>,
    pub da1: VolatileCell<u32>,
    pub da2: VolatileCell<u32>,
    pub db1: VolatileCell<u32>,
    pub db2: VolatileCell<u32>,
    _reserved: [u32; 13],
}

impl InterfaceBlock {
    fn register(&self, reg: IfRegister) -> &VolatileCell<u32> {
        match reg {
            IfRegister::Crq => &self.crq,
            IfRegister::Cmsk => &self.cmsk,
            IfRegister::Msk1 => &self.msk1,
            IfRegister::Msk2 => &self.msk2,
            IfRegister::Arb1 => &self.arb1,
            IfRegister::Arb2 => &self.arb2,
            IfRegister::Mctl => &self.mctl,
            IfRegister::Da1 => &self.da1,
            IfRegister::Da2 => &self.da2,
            IfRegister::Db1 => &self.db1,
            IfRegister::Db2 => &self.db2,
        }
    }
}

/// Register block of one CAN module.
#[repr(C)]
pub struct RegisterBlock {
    pub ctl: VolatileCell<u32>,
    pub sts: VolatileCell<u32>,
    pub err: VolatileCell<u32>,
    pub bit: VolatileCell<u32>,
    pub int: VolatileCell<u32>,
    pub tst: VolatileCell<u32>,
    pub brpe: VolatileCell<u32>,
    _reserved0: u32,
    /// IF1 and IF2, indexed by [`Window`](crate::Window).
    pub interface: [InterfaceBlock; 2],
    _reserved1: [u32; 8],
    pub txrq1: VolatileCell<u32>,
    pub txrq2: VolatileCell<u32>,
    _reserved2: [u32; 6],
    pub nwda1: VolatileCell<u32>,
    pub nwda2: VolatileCell<u32>,
}

impl RegisterBlock {
    fn register(&self, reg: Register) -> &VolatileCell<u32> {
        match reg {
            Register::Ctl => &self.ctl,
            Register::Sts => &self.sts,
            Register::Err => &self.err,
            Register::Bit => &self.bit,
            Register::Int => &self.int,
            Register::Tst => &self.tst,
            Register::Brpe => &self.brpe,
            Register::If(window, reg) => self.interface[window.index()].register(reg),
            Register::TxRequest1 => &self.txrq1,
            Register::TxRequest2 => &self.txrq2,
            Register::NewData1 => &self.nwda1,
            Register::NewData2 => &self.nwda2,
        }
    }
}

/// A CAN module instance.
///
/// This trait is meant to be implemented for a HAL-specific type that represents ownership of
/// the CAN peripheral (and any pins required by it, although that is entirely up to the HAL).
///
/// # Safety
///
/// It is only safe to implement this trait, when:
///
/// * The implementing type has ownership of the peripheral, preventing any other accesses to the
///   register block.
/// * `REGISTERS` is a pointer to that peripheral's register block and can be safely accessed for as
///   long as ownership or a borrow of the implementing type is present.
pub unsafe trait Instance {
    /// Pointer to the instance's register block.
    const REGISTERS: *mut RegisterBlock;
}

/// Base address of `CAN0` on TM4C123 devices.
pub const CAN0_BASE: usize = 0x4004_0000;

/// Base address of `CAN1` on TM4C123 devices.
pub const CAN1_BASE: usize = 0x4004_1000;

/// Volatile register access to the two CAN modules `A` and `B`.
pub struct Mmio<A, B> {
    a: A,
    b: B,
}

impl<A, B> Mmio<A, B>
where
    A: Instance,
    B: Instance,
{
    /// Takes ownership of both module instances.
    pub fn new(a: A, b: B) -> Self {
        Self { a, b }
    }

    /// Releases the module instances.
    pub fn free(self) -> (A, B) {
        (self.a, self.b)
    }

    fn block(&self, module: Module) -> &RegisterBlock {
        let blocks = [A::REGISTERS, B::REGISTERS];
        unsafe { &*blocks[module.index()] }
    }
}

impl<A, B> RegisterAccess for Mmio<A, B>
where
    A: Instance,
    B: Instance,
{
    #[inline]
    fn read(&self, module: Module, reg: Register) -> u32 {
        self.block(module).register(reg).get()
    }

    #[inline]
    fn write(&mut self, module: Module, reg: Register, value: u32) {
        self.block(module).register(reg).set(value)
    }
}
