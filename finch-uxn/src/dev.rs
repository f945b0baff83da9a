use alloc::{boxed::Box, vec::Vec};
use core::fmt;

/// Number of device slots on a [`DeviceBus`]
pub const DEV_COUNT: usize = 16;

/// Number of ports exposed by each device
pub const DEV_SIZE: usize = 16;

/// Returns the bus slot addressed by a device address (its high nibble)
#[inline]
pub const fn device_index(addr: u8) -> usize {
    (addr >> 4) as usize
}

/// Returns the port addressed by a device address (its low nibble)
#[inline]
pub const fn port(addr: u8) -> u8 {
    addr & 0x0F
}

/// Well-known device pages
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum DeviceType {
    /// Console, with `write` on port 8 and `error` on port 9
    Console = 0x10,
    /// Screen
    Screen = 0x20,
}

impl DeviceType {
    /// Base address of the device page, of the form `0xA0`
    #[inline]
    pub const fn base(self) -> u8 {
        self as u8
    }

    /// Bus slot for this device
    #[inline]
    pub const fn index(self) -> usize {
        device_index(self.base())
    }
}

/// Trait for a device which can be bound to a [`DeviceBus`]
pub trait Device {
    /// Delivers a value written by the `DEO` opcode to the given port
    ///
    /// `port` is always below [`DEV_SIZE`].
    fn output(&mut self, port: u8, value: u8);

    /// Returns every value written to the given port, newest first
    ///
    /// Ports outside the device (`port >= 16`) have an empty log.
    fn get(&self, port: u8) -> &[u8];
}

/// Device which records every write, per port
///
/// # Performance
/// Each write is prepended to its port's log, so it costs time proportional to
/// the number of bytes already logged on that port.
#[derive(Clone, Debug, Default)]
pub struct PortLog {
    ports: [Vec<u8>; DEV_SIZE],
}

impl PortLog {
    /// Builds a device with empty logs
    pub fn new() -> Self {
        Self::default()
    }
}

impl Device for PortLog {
    fn output(&mut self, port: u8, value: u8) {
        self.ports[usize::from(port)].insert(0, value);
    }
    fn get(&self, port: u8) -> &[u8] {
        self.ports.get(usize::from(port)).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Fixed set of device slots, addressed by the high nibble of `DEO` targets
#[derive(Default)]
pub struct DeviceBus {
    slots: [Option<Box<dyn Device>>; DEV_COUNT],
}

impl fmt::Debug for DeviceBus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let bound: [bool; DEV_COUNT] =
            core::array::from_fn(|i| self.slots[i].is_some());
        f.debug_struct("DeviceBus").field("bound", &bound).finish()
    }
}

impl DeviceBus {
    /// Builds a bus with every slot empty
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a device to the given slot, returning the previous device (if
    /// any)
    ///
    /// # Panics
    /// If `index >= 16`
    pub fn bind<D: Device + 'static>(
        &mut self,
        index: usize,
        dev: D,
    ) -> Option<Box<dyn Device>> {
        self.slots[index].replace(Box::new(dev))
    }

    /// Removes the device bound to the given slot
    ///
    /// # Panics
    /// If `index >= 16`
    pub fn unbind(&mut self, index: usize) -> Option<Box<dyn Device>> {
        self.slots[index].take()
    }

    /// Looks up the device bound to a slot, returning `None` if the slot is
    /// empty or out of range
    pub fn device(&self, index: usize) -> Option<&dyn Device> {
        self.slots.get(index)?.as_deref()
    }

    /// Mutable variant of [`DeviceBus::device`]
    pub fn device_mut(
        &mut self,
        index: usize,
    ) -> Option<&mut (dyn Device + 'static)> {
        self.slots.get_mut(index)?.as_deref_mut()
    }

    /// Routes a write to the device and port selected by `addr`
    ///
    /// Returns `false` if no device is bound at that address
    pub fn output(&mut self, addr: u8, value: u8) -> bool {
        match self.device_mut(device_index(addr)) {
            Some(d) => {
                d.output(port(addr), value);
                true
            }
            None => false,
        }
    }
}
