//! The debug-queue peripheral: a write-only FIFO programs push words
//! into, inspectable from the host side at any time.

use crate::error::PeripheralError;
use crate::peripheral::{AccessWidth, Peripheral};

/// A write-only peripheral collecting every word written to it, in
/// order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DebugQueue {
    items: Vec<u32>,
}

impl DebugQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// The words written so far, in write order.
    pub fn items(&self) -> &[u32] {
        &self.items
    }

    /// Empties the queue.
    pub fn reset(&mut self) {
        self.items.clear();
    }
}

impl Peripheral for DebugQueue {
    /// The queue is write-only; reads return 0.
    fn read(&mut self, _offset: u32, _width: AccessWidth) -> Result<u32, PeripheralError> {
        Ok(0)
    }

    /// Only the queue's single address is mapped, so the offset and
    /// width don't matter.
    fn write(&mut self, _offset: u32, _width: AccessWidth, data: u32) -> Result<(), PeripheralError> {
        self.items.push(data);
        Ok(())
    }
}
