//! Minimal Uxn-style stack machine
//!
//! Programs are executed straight out of a byte slice: the program counter
//! indexes the image, and there is no separate RAM.  A [`Uxn`] owns a working
//! stack, a return stack and a [`DeviceBus`] which receives `DEO` writes.
//!
//! ```
//! use finch_uxn::{Device, DeviceBus, DeviceType, PortLog, Uxn};
//!
//! let mut bus = DeviceBus::new();
//! bus.bind(DeviceType::Console.index(), PortLog::new());
//! let mut vm = Uxn::new(bus);
//!
//! // LIT 43 LIT 18 DEO
//! vm.run(&[0x80, 0x43, 0x80, 0x18, 0x17]).unwrap();
//! let console = vm.bus().device(DeviceType::Console.index()).unwrap();
//! assert_eq!(console.get(8), [0x43]);
//! ```
#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

extern crate alloc;

mod dev;
mod op;
mod stack;

pub use dev::{
    DEV_COUNT, DEV_SIZE, Device, DeviceBus, DeviceType, PortLog, device_index,
    port,
};
pub use stack::{Stack, Value};

use log::{debug, trace, warn};
use stack::StackView;

const KEEP: u8 = 1 << 7;
const RET: u8 = 1 << 6;
const SHORT: u8 = 1 << 5;

const JCI: u8 = 0x20;
const JMI: u8 = 0x40;
const JSI: u8 = 0x60;
const LIT: u8 = 0x80;

/// Faults which stop execution
#[derive(Copy, Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The instruction byte decodes to an opcode with no handler
    #[error("unknown opcode {0:#04x}")]
    UnknownOpcode(u8),

    /// The instruction needs more operands than the stack holds
    ///
    /// The stacks are left as they were before the instruction.
    #[error("stack underflow")]
    StackUnderflow,

    /// A literal or immediate offset runs past the end of the program
    #[error("immediate operand runs past the end of the program")]
    TruncatedImmediate,
}

/// Decoded instruction byte
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Op {
    /// Base opcode, with mode bits removed
    pub opcode: u8,
    /// Operate on the return stack instead of the working stack
    pub ret: bool,
    /// Operate on shorts instead of bytes
    pub short: bool,
    /// Leave operands on the stack
    pub keep: bool,
}

impl Op {
    /// Splits an instruction byte into its base opcode and mode flags
    ///
    /// `JCI`, `JMI` and `JSI` have no modes.  The `LIT` family keeps its keep
    /// bit in the opcode, so every literal decodes to opcode `0x80`.
    pub const fn decode(byte: u8) -> Self {
        if matches!(byte, JCI | JMI | JSI) {
            return Op {
                opcode: byte,
                ret: false,
                short: false,
                keep: false,
            };
        }
        let opcode = if (byte & !(RET | SHORT)) == LIT {
            LIT
        } else {
            byte & !(KEEP | RET | SHORT)
        };
        Op {
            opcode,
            ret: (byte & RET) != 0,
            short: (byte & SHORT) != 0,
            keep: (byte & KEEP) != 0,
        }
    }

    /// Operand width in bytes
    #[inline]
    pub const fn width(&self) -> usize {
        if self.short { 2 } else { 1 }
    }
}

/// Where execution continues after an instruction
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Flow {
    /// Step past the instruction, plus the given number of bytes
    Next(usize),
    /// Move the program counter to the given position
    Jump(usize),
    /// Stop, leaving the program counter on the current instruction
    Halt,
}

/// Machine state after a call to [`Uxn::step`]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum State {
    /// The program counter is inside the program
    Running,
    /// The machine hit `BRK` or ran off the end of the program
    Stopped,
}

type Handler = fn(&mut Uxn, Op, &[u8], usize) -> Result<Flow, Error>;

/// Opcode handlers, indexed by base opcode
static HANDLERS: [Option<Handler>; 256] = {
    let mut t: [Option<Handler>; 256] = [None; 256];
    t[0x00] = Some(op::brk as Handler);
    t[0x01] = Some(op::inc as Handler);
    t[0x02] = Some(op::pop as Handler);
    t[0x03] = Some(op::nip as Handler);
    t[0x04] = Some(op::swp as Handler);
    t[0x05] = Some(op::rot as Handler);
    t[0x06] = Some(op::dup as Handler);
    t[0x07] = Some(op::ovr as Handler);
    t[0x08] = Some(op::equ as Handler);
    t[0x0c] = Some(op::jmp as Handler);
    t[0x0e] = Some(op::jsr as Handler);
    t[0x0f] = Some(op::sth as Handler);
    t[0x17] = Some(op::deo as Handler);
    t[0x18] = Some(op::add as Handler);
    t[JCI as usize] = Some(op::jci as Handler);
    t[JMI as usize] = Some(op::jmi as Handler);
    t[JSI as usize] = Some(op::jsi as Handler);
    t[LIT as usize] = Some(op::lit as Handler);
    t
};

/// The virtual machine itself
#[derive(Debug, Default)]
pub struct Uxn {
    /// Working stack
    stack: Stack,
    /// Return stack
    ret: Stack,
    /// Index of the next instruction in the program image
    pc: usize,
    /// Targets of the `DEO` opcode
    bus: DeviceBus,
}

impl Uxn {
    /// Builds a new `Uxn` with empty stacks and the program counter at 0
    pub fn new(bus: DeviceBus) -> Self {
        Self {
            stack: Stack::default(),
            ret: Stack::default(),
            pc: 0,
            bus,
        }
    }

    /// Clears both stacks and moves the program counter back to 0
    ///
    /// Bound devices are left in place.
    pub fn reset(&mut self) {
        self.stack.clear();
        self.ret.clear();
        self.pc = 0;
    }

    /// Returns the program counter
    ///
    /// After a fault, this points at the instruction which failed.
    #[inline]
    pub fn pc(&self) -> usize {
        self.pc
    }

    /// Shared borrow of the working stack
    #[inline]
    pub fn stack(&self) -> &Stack {
        &self.stack
    }

    /// Mutable borrow of the working stack
    #[inline]
    pub fn stack_mut(&mut self) -> &mut Stack {
        &mut self.stack
    }

    /// Shared borrow of the return stack
    #[inline]
    pub fn ret(&self) -> &Stack {
        &self.ret
    }

    /// Mutable borrow of the return stack
    #[inline]
    pub fn ret_mut(&mut self) -> &mut Stack {
        &mut self.ret
    }

    /// Shared borrow of the device bus
    #[inline]
    pub fn bus(&self) -> &DeviceBus {
        &self.bus
    }

    /// Mutable borrow of the device bus
    #[inline]
    pub fn bus_mut(&mut self) -> &mut DeviceBus {
        &mut self.bus
    }

    /// Stack selected by the op's return mode
    #[inline]
    fn stack_for(&mut self, op: Op) -> &mut Stack {
        if op.ret { &mut self.ret } else { &mut self.stack }
    }

    #[inline]
    fn stack_view(&mut self, op: Op) -> StackView<'_> {
        StackView::new(self.stack_for(op), op.short)
    }

    /// Runs the program from the current program counter until it stops
    ///
    /// Execution ends at a `BRK` or when the program counter leaves the
    /// program; faults are returned with the machine state left as it was
    /// before the failing instruction.
    pub fn run(&mut self, program: &[u8]) -> Result<(), Error> {
        debug!("running {} byte program from {:#06x}", program.len(), self.pc);
        loop {
            match self.step(program) {
                Ok(State::Running) => (),
                Ok(State::Stopped) => break,
                Err(e) => {
                    warn!("{e} at {:#06x}", self.pc);
                    return Err(e);
                }
            }
        }
        debug!("stopped at {:#06x}", self.pc);
        Ok(())
    }

    /// Executes a single instruction
    pub fn step(&mut self, program: &[u8]) -> Result<State, Error> {
        let pc = self.pc;
        let Some(&byte) = program.get(pc) else {
            return Ok(State::Stopped);
        };
        let op = Op::decode(byte);
        let Some(handler) = HANDLERS[usize::from(op.opcode)] else {
            return Err(Error::UnknownOpcode(byte));
        };
        trace!("{pc:#06x}: {byte:02x} {op:?}");
        self.pc = match handler(self, op, program, pc)? {
            Flow::Next(n) => pc + n + 1,
            Flow::Jump(dst) => dst,
            Flow::Halt => return Ok(State::Stopped),
        };
        Ok(if self.pc < program.len() {
            State::Running
        } else {
            State::Stopped
        })
    }
}
