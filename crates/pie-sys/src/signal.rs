//! Guest-side consumer of the host event queue.

use pie_value::Value;

use crate::{Machine, Trap};

/// Pops host signals on behalf of the guest.
pub struct SignalQueue<'a> {
    machine: &'a mut dyn Machine,
}

impl<'a> SignalQueue<'a> {
    pub fn new(machine: &'a mut dyn Machine) -> Self {
        Self { machine }
    }

    /// Next pending signal in guest encoding, if any.
    pub fn pending(&mut self) -> Option<Value> {
        self.machine.pop_signal().map(|signal| signal.to_value())
    }

    /// Next pending signal, or a sleep carrying `timeout` when the queue is
    /// empty.
    ///
    /// # Errors
    ///
    /// Returns [`Trap::Sleep`] when nothing is pending.
    pub fn request(&mut self, timeout: u32) -> Result<Value, Trap> {
        self.pending().ok_or(Trap::Sleep(timeout))
    }
}
