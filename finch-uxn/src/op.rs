//! Opcode handlers
//!
//! Each handler receives the VM, the decoded [`Op`], the program image and
//! the address of the instruction being executed, and returns a [`Flow`]
//! describing where execution continues.
use log::trace;
use zerocopy::{
    FromBytes,
    byteorder::{BigEndian, U16},
};

use crate::{
    Error, Flow, Op, Uxn,
    stack::{StackView, Value},
};

/// Reads the big-endian short stored right after the instruction at `pc`
#[inline]
fn immediate(program: &[u8], pc: usize) -> Result<u16, Error> {
    let bytes = program.get(pc + 1..).ok_or(Error::TruncatedImmediate)?;
    let (v, _) = U16::<BigEndian>::read_from_prefix(bytes)
        .map_err(|_| Error::TruncatedImmediate)?;
    Ok(v.get())
}

/// Truncates a program position to a 16-bit return address
#[inline]
fn return_addr(pc: usize) -> u16 {
    (pc & 0xFFFF) as u16
}

/// Break
///
/// ```text
/// BRK --
/// ```
///
/// Ends evaluation. The program counter stays on the `BRK` byte.
pub fn brk(_: &mut Uxn, _: Op, _: &[u8], _: usize) -> Result<Flow, Error> {
    Ok(Flow::Halt)
}

/// Jump Conditional Instant
///
/// ```text
/// JCI cond8 --
/// ```
///
/// Pops a byte from the working stack. If it is not zero, behaves like
/// [`jmi`]; otherwise skips the two offset bytes.
pub fn jci(
    vm: &mut Uxn,
    op: Op,
    program: &[u8],
    pc: usize,
) -> Result<Flow, Error> {
    // Peek first, so a truncated offset leaves the condition in place
    let flow = if vm.stack.peek_byte_at(0)? == 0 {
        Flow::Next(2)
    } else {
        jmi(vm, op, program, pc)?
    };
    vm.stack.pop_byte()?;
    Ok(flow)
}

/// Jump Instant
///
/// ```text
/// JMI --
/// ```
///
/// Moves the program counter forward by the short stored after the
/// instruction, measured from the `JMI` byte itself.
pub fn jmi(
    _: &mut Uxn,
    _: Op,
    program: &[u8],
    pc: usize,
) -> Result<Flow, Error> {
    let dt = immediate(program, pc)?;
    Ok(Flow::Jump(pc + usize::from(dt)))
}

/// Jump Stash Return Instant
///
/// ```text
/// JSI -- | ret16
/// ```
///
/// Pushes the address following the instruction and its two offset bytes to
/// the return stack, then jumps like [`jmi`].
pub fn jsi(
    vm: &mut Uxn,
    _: Op,
    program: &[u8],
    pc: usize,
) -> Result<Flow, Error> {
    let dt = immediate(program, pc)?;
    vm.ret.push_short(return_addr(pc + 3));
    Ok(Flow::Jump(pc + usize::from(dt)))
}

/// Literal
///
/// ```text
/// LIT -- a
/// ```
///
/// Pushes the next byte (or short, in short mode) of the program, then skips
/// past it. `LIT` has no keep variant: the keep bit is what selects it.
///
/// ```text
/// LIT 12          ( 12 )
/// LIT2 abcd       ( ab cd )
/// ```
pub fn lit(
    vm: &mut Uxn,
    op: Op,
    program: &[u8],
    pc: usize,
) -> Result<Flow, Error> {
    let v = if op.short {
        Value::Short(immediate(program, pc)?)
    } else {
        let b = program.get(pc + 1).ok_or(Error::TruncatedImmediate)?;
        Value::Byte(*b)
    };
    vm.stack_for(op).push(v);
    Ok(Flow::Next(op.width()))
}

/// Increment
///
/// ```text
/// INC a -- a+1
/// ```
///
/// Increments the byte at the top of the stack. In short mode this is still
/// the top byte only, so no carry reaches the high byte. In keep mode, the
/// top value is copied before being incremented.
///
/// ```text
/// #01 INC         ( 02 )
/// #0001 INC2k     ( 00 01 00 02 )
/// ```
pub fn inc(vm: &mut Uxn, op: Op, _: &[u8], _: usize) -> Result<Flow, Error> {
    let s = vm.stack_for(op);
    if op.keep {
        let top = s.span(op.width(), 1)?;
        s.copy_within(top);
    }
    s.increment_top()?;
    Ok(Flow::Next(0))
}

/// Pop
///
/// ```text
/// POP a --
/// ```
///
/// Removes the value at the top of the stack.
pub fn pop(vm: &mut Uxn, op: Op, _: &[u8], _: usize) -> Result<Flow, Error> {
    let mut s = vm.stack_view(op);
    s.pop()?;
    s.commit();
    Ok(Flow::Next(0))
}

/// Nip
///
/// ```text
/// NIP a b -- b
/// ```
///
/// Removes the second value from the stack.
///
/// ```text
/// #1234 #5678 NIP2k  ( 12 34 56 78 56 78 )
/// ```
pub fn nip(vm: &mut Uxn, op: Op, _: &[u8], _: usize) -> Result<Flow, Error> {
    let mut s = vm.stack_view(op);
    let b = s.pop()?;
    let a = s.pop()?;
    if op.keep {
        s.push(a);
        s.push(b);
    }
    s.push(b);
    Ok(Flow::Next(0))
}

/// Swap
///
/// ```text
/// SWP a b -- b a
/// ```
///
/// Exchanges the first and second values at the top of the stack.
pub fn swp(vm: &mut Uxn, op: Op, _: &[u8], _: usize) -> Result<Flow, Error> {
    let mut s = vm.stack_view(op);
    let b = s.pop()?;
    let a = s.pop()?;
    if op.keep {
        s.push(a);
        s.push(b);
    }
    s.push(b);
    s.push(a);
    Ok(Flow::Next(0))
}

/// Rotate
///
/// ```text
/// ROT a b c -- b c a
/// ```
///
/// Rotates three values at the top of the stack to the left. Keep mode has no
/// effect.
pub fn rot(vm: &mut Uxn, op: Op, _: &[u8], _: usize) -> Result<Flow, Error> {
    let mut s = vm.stack_view(op);
    let c = s.pop()?;
    let b = s.pop()?;
    let a = s.pop()?;
    s.push(b);
    s.push(c);
    s.push(a);
    Ok(Flow::Next(0))
}

/// Duplicate
///
/// ```text
/// DUP a -- a a
/// ```
///
/// Duplicates the value at the top of the stack. In keep mode the top value
/// is left in place and copied twice.
///
/// ```text
/// #12 DUPk    ( 12 12 12 )
/// ```
pub fn dup(vm: &mut Uxn, op: Op, _: &[u8], _: usize) -> Result<Flow, Error> {
    if op.keep {
        let s = vm.stack_for(op);
        let top = s.span(op.width(), 1)?;
        s.copy_within(top.clone());
        s.copy_within(top);
    } else {
        let mut s = vm.stack_view(op);
        let v = s.pop()?;
        s.push(v);
        s.push(v);
    }
    Ok(Flow::Next(0))
}

/// Over
///
/// ```text
/// OVR a b -- a b a
/// ```
///
/// Copies the second value of the stack to the top.
///
/// Keep mode first pushes a copy of the `2w`-byte slice which starts `2w * w`
/// bytes below the top (for operand width `w`). In byte mode that is the two
/// top values; in short mode it is the pair of shorts beneath the two top
/// shorts. If the stack is too shallow for that slice, only the copy of the
/// second value is pushed.
///
/// ```text
/// #1234 OVRk                       ( 12 34 12 34 12 )
/// #1234 #5678 OVR2k                ( 12 34 56 78 12 34 )
/// #1234 #5678 #9abc #def0 OVR2k    ( .. 12 34 56 78 9a bc )
/// ```
pub fn ovr(vm: &mut Uxn, op: Op, _: &[u8], _: usize) -> Result<Flow, Error> {
    let w = op.width();
    let s = vm.stack_for(op);
    let second = s.span(w, 2)?;
    if op.keep {
        if let Ok(layered) = s.span(2 * w, w) {
            s.copy_within(layered);
        }
    }
    s.copy_within(second);
    Ok(Flow::Next(0))
}

/// Equal
///
/// ```text
/// EQU a b -- bool8
/// ```
///
/// Pushes `01` to the stack if the two values at the top of the stack are
/// equal, `00` otherwise. The result is always a single byte.
pub fn equ(vm: &mut Uxn, op: Op, _: &[u8], _: usize) -> Result<Flow, Error> {
    let mut s = vm.stack_view(op);
    let b = s.pop()?;
    let a = s.pop()?;
    s.push_byte(u8::from(u16::from(a) == u16::from(b)));
    Ok(Flow::Next(0))
}

/// Jump
///
/// ```text
/// JMP addr --
/// ```
///
/// In short mode, moves the program counter to the absolute address on top of
/// the stack. Otherwise, pops an unsigned byte and skips that many bytes past
/// the `JMP` instruction.
///
/// ```text
/// #02 JMP #01 #03   ( 03 )
/// ```
pub fn jmp(vm: &mut Uxn, op: Op, _: &[u8], pc: usize) -> Result<Flow, Error> {
    let mut s = vm.stack_view(op);
    let dst = match s.pop()? {
        Value::Short(addr) => usize::from(addr),
        Value::Byte(offset) => pc + usize::from(offset) + 1,
    };
    s.commit();
    Ok(Flow::Jump(dst))
}

/// Jump Stash Return
///
/// ```text
/// JSR offset8 -- | ret16
/// ```
///
/// Pops a byte offset from the working stack, pushes the address of the
/// following byte to the return stack, and skips `offset` bytes past the
/// instruction. Modes have no effect.
pub fn jsr(vm: &mut Uxn, _: Op, _: &[u8], pc: usize) -> Result<Flow, Error> {
    let offset = vm.stack.pop_byte()?;
    vm.ret.push_short(return_addr(pc + 1));
    Ok(Flow::Next(usize::from(offset)))
}

/// Stash
///
/// ```text
/// STH a -- | a
/// ```
///
/// Moves the byte at the top of the working stack to the return stack. Modes
/// have no effect.
pub fn sth(vm: &mut Uxn, _: Op, _: &[u8], _: usize) -> Result<Flow, Error> {
    let v = vm.stack.pop_byte()?;
    vm.ret.push_byte(v);
    Ok(Flow::Next(0))
}

/// Device Output
///
/// ```text
/// DEO val device8 --
/// ```
///
/// Pops a device address and a value from the working stack, then sends the
/// value to the addressed port. Writes to an empty bus slot are dropped.
pub fn deo(vm: &mut Uxn, _: Op, _: &[u8], _: usize) -> Result<Flow, Error> {
    let mut s = StackView::new(&mut vm.stack, false);
    let addr = s.pop_byte()?;
    let value = s.pop_byte()?;
    s.commit();
    if !vm.bus.output(addr, value) {
        trace!("dropping write of {value:#04x} to unbound device {addr:#04x}");
    }
    Ok(Flow::Next(0))
}

/// Add
///
/// ```text
/// ADD a b -- a+b
/// ```
/// Pushes the sum of the two values at the top of the stack, wrapping on
/// overflow.
///
/// ```text
/// #1a #2e ADD       ( 48 )
/// #02 #5d ADDk      ( 02 5d 5f )
/// #0001 #0002 ADD2  ( 00 03 )
/// ```
pub fn add(vm: &mut Uxn, op: Op, _: &[u8], _: usize) -> Result<Flow, Error> {
    let mut s = vm.stack_view(op);
    let b = s.pop()?;
    let a = s.pop()?;
    if op.keep {
        s.push(a);
        s.push(b);
    }
    s.push(b.wrapping_add(a));
    Ok(Flow::Next(0))
}
