use alloc::vec::Vec;
use core::ops::Range;

use crate::Error;

/// Operand popped from (or pushed to) a [`Stack`]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Value {
    /// Single byte, used outside of short mode
    Byte(u8),
    /// 16-bit value, stored on the stack as its high byte then its low byte
    Short(u16),
}

impl Value {
    /// Number of stack bytes occupied by this value
    #[inline]
    pub fn width(&self) -> usize {
        match self {
            Value::Byte(..) => 1,
            Value::Short(..) => 2,
        }
    }

    #[inline]
    pub(crate) fn wrapping_add(self, rhs: Value) -> Self {
        match (self, rhs) {
            (Value::Byte(a), Value::Byte(b)) => Value::Byte(a.wrapping_add(b)),
            (Value::Short(a), b) | (b, Value::Short(a)) => {
                Value::Short(a.wrapping_add(u16::from(b)))
            }
        }
    }
}

impl From<Value> for u16 {
    fn from(v: Value) -> u16 {
        match v {
            Value::Short(v) => v,
            Value::Byte(v) => u16::from(v),
        }
    }
}

/// Unbounded byte stack
///
/// Items are stored bottom-first; the top of the stack is the last byte of
/// [`Stack::as_slice`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Stack {
    data: Vec<u8>,
}

impl Stack {
    /// Builds an empty stack
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of bytes in the stack
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Checks whether the stack is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Borrows the stack contents, bottom first
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Removes every item
    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// Pushes a single byte
    #[inline]
    pub fn push_byte(&mut self, v: u8) {
        self.data.push(v);
    }

    /// Pushes a short as its high byte followed by its low byte
    #[inline]
    pub fn push_short(&mut self, v: u16) {
        let [hi, lo] = v.to_be_bytes();
        self.push_byte(hi);
        self.push_byte(lo);
    }

    /// Pushes a value with the width it carries
    #[inline]
    pub fn push(&mut self, v: Value) {
        match v {
            Value::Short(v) => self.push_short(v),
            Value::Byte(v) => self.push_byte(v),
        }
    }

    /// Pops a single byte
    #[inline]
    pub fn pop_byte(&mut self) -> Result<u8, Error> {
        self.data.pop().ok_or(Error::StackUnderflow)
    }

    /// Pops a short, reading the low byte off the top first
    ///
    /// The stack is left untouched if it holds fewer than two bytes.
    #[inline]
    pub fn pop_short(&mut self) -> Result<u16, Error> {
        let v = self.peek_short_at(0)?;
        self.drop_bytes(2);
        Ok(v)
    }

    /// Pops a [`Value::Short`] in short mode, or a [`Value::Byte`] otherwise
    #[inline]
    pub fn pop(&mut self, short: bool) -> Result<Value, Error> {
        Ok(if short {
            Value::Short(self.pop_short()?)
        } else {
            Value::Byte(self.pop_byte()?)
        })
    }

    /// Peeks at the byte located `offset` bytes below the top
    #[inline]
    pub fn peek_byte_at(&self, offset: usize) -> Result<u8, Error> {
        self.data
            .len()
            .checked_sub(offset + 1)
            .map(|i| self.data[i])
            .ok_or(Error::StackUnderflow)
    }

    /// Peeks at the short whose low byte is located `offset` bytes below the
    /// top
    #[inline]
    pub fn peek_short_at(&self, offset: usize) -> Result<u16, Error> {
        let lo = self.peek_byte_at(offset)?;
        let hi = self.peek_byte_at(offset + 1)?;
        Ok(u16::from_be_bytes([hi, lo]))
    }

    #[inline]
    fn peek_at(&self, offset: usize, short: bool) -> Result<Value, Error> {
        Ok(if short {
            Value::Short(self.peek_short_at(offset)?)
        } else {
            Value::Byte(self.peek_byte_at(offset)?)
        })
    }

    /// Returns the `width`-byte slice starting `width * depth` bytes below
    /// the top, as an index range into [`Stack::as_slice`]
    ///
    /// Depth 1 is the top operand, depth 2 the one beneath it, and so on.
    #[inline]
    pub(crate) fn span(
        &self,
        width: usize,
        depth: usize,
    ) -> Result<Range<usize>, Error> {
        let start = self
            .data
            .len()
            .checked_sub(width * depth)
            .ok_or(Error::StackUnderflow)?;
        Ok(start..start + width)
    }

    /// Pushes a copy of the bytes in `r`, which must come from
    /// [`Stack::span`]
    #[inline]
    pub(crate) fn copy_within(&mut self, r: Range<usize>) {
        self.data.extend_from_within(r);
    }

    /// Increments the top byte in place, wrapping around
    #[inline]
    pub(crate) fn increment_top(&mut self) -> Result<(), Error> {
        let top = self.data.last_mut().ok_or(Error::StackUnderflow)?;
        *top = top.wrapping_add(1);
        Ok(())
    }

    #[inline]
    fn drop_bytes(&mut self, n: usize) {
        self.data.truncate(self.data.len().saturating_sub(n));
    }
}

/// Stack wrapper which defers pops until the first push
///
/// This type expects the user to perform all of their `pop()` calls first,
/// followed by any `push(..)` calls.  Pops only move a virtual offset, so an
/// instruction which underflows halfway through its operands leaves the stack
/// untouched.  Handlers which only pop must finish with
/// [`StackView::commit`].
pub(crate) struct StackView<'a> {
    stack: &'a mut Stack,
    short: bool,

    /// Bytes popped so far but not yet removed
    offset: usize,
}

impl<'a> StackView<'a> {
    pub(crate) fn new(stack: &'a mut Stack, short: bool) -> Self {
        Self {
            stack,
            short,
            offset: 0,
        }
    }

    /// Pops a single value, with a width given by the view's short mode
    #[inline]
    pub(crate) fn pop(&mut self) -> Result<Value, Error> {
        let v = self.stack.peek_at(self.offset, self.short)?;
        self.offset += v.width();
        Ok(v)
    }

    /// Pops a single byte, regardless of short mode
    #[inline]
    pub(crate) fn pop_byte(&mut self) -> Result<u8, Error> {
        let v = self.stack.peek_byte_at(self.offset)?;
        self.offset += 1;
        Ok(v)
    }

    /// Removes every byte popped so far
    #[inline]
    pub(crate) fn commit(&mut self) {
        self.stack.drop_bytes(self.offset);
        self.offset = 0;
    }

    #[inline]
    pub(crate) fn push(&mut self, v: Value) {
        self.commit();
        self.stack.push(v);
    }

    #[inline]
    pub(crate) fn push_byte(&mut self, v: u8) {
        self.commit();
        self.stack.push_byte(v);
    }
}
