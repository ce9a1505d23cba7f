//! Single-producer/single-consumer byte ring buffer
//!
//! One side writes and the other reads; typically interrupt context fills
//! the RX buffer and drains the TX buffer while main context does the
//! opposite. `write` and `read` are lock-free and never allocate, so they
//! are safe from interrupt context.
//!
//! Cursors run over `[0, 2 * capacity)`. The slot index is the cursor
//! modulo `capacity`, which lets a full buffer hold exactly `capacity`
//! bytes and still be told apart from an empty one.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::fmt;

use portable_atomic::{AtomicU8, AtomicUsize, Ordering};

use crate::error::InitError;

/// Fixed-capacity circular byte buffer
pub struct RingBuffer {
    slots: Box<[AtomicU8]>,
    /// Next write position, advanced by the producer only
    head: AtomicUsize,
    /// Next read position, advanced by the consumer only
    tail: AtomicUsize,
}

impl RingBuffer {
    /// Allocate a buffer holding `capacity` bytes
    ///
    /// Allocation failure is reported rather than aborting.
    pub fn new(capacity: usize) -> Result<Self, InitError> {
        if capacity == 0 {
            return Err(InitError::InvalidSize);
        }
        // Cursors must be able to reach 2 * capacity
        if capacity > usize::MAX / 2 {
            return Err(InitError::OutOfMemory);
        }

        let mut slots = Vec::new();
        slots
            .try_reserve_exact(capacity)
            .map_err(|_| InitError::OutOfMemory)?;
        slots.extend((0..capacity).map(|_| AtomicU8::new(0)));

        Ok(Self {
            slots: slots.into_boxed_slice(),
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
        })
    }

    /// Total number of bytes the buffer can hold
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn advance(&self, pos: usize) -> usize {
        let next = pos + 1;
        if next == 2 * self.capacity() {
            0
        } else {
            next
        }
    }

    fn slot(&self, pos: usize) -> &AtomicU8 {
        let cap = self.capacity();
        &self.slots[if pos >= cap { pos - cap } else { pos }]
    }

    fn occupancy(&self, head: usize, tail: usize) -> usize {
        let used = if head >= tail {
            head - tail
        } else {
            head + 2 * self.capacity() - tail
        };
        // Cursors are sampled separately; clamp a torn snapshot
        used.min(self.capacity())
    }

    /// Number of bytes waiting to be read
    pub fn available(&self) -> usize {
        let tail = self.tail.load(Ordering::Acquire);
        let head = self.head.load(Ordering::Acquire);
        self.occupancy(head, tail)
    }

    /// Number of bytes that can be written before the buffer is full
    pub fn free_space(&self) -> usize {
        self.capacity() - self.available()
    }

    /// Check if there is nothing to read
    pub fn is_empty(&self) -> bool {
        self.available() == 0
    }

    /// Check if a write would be refused
    pub fn is_full(&self) -> bool {
        self.available() == self.capacity()
    }

    /// Append a byte
    ///
    /// Returns `false` and drops the byte if the buffer is full.
    pub fn write(&self, byte: u8) -> bool {
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Acquire);
        if self.occupancy(head, tail) == self.capacity() {
            return false;
        }

        self.slot(head).store(byte, Ordering::Relaxed);
        self.head.store(self.advance(head), Ordering::Release);
        true
    }

    /// Take the oldest byte, if any
    pub fn read(&self) -> Option<u8> {
        let tail = self.tail.load(Ordering::Relaxed);
        let head = self.head.load(Ordering::Acquire);
        if head == tail {
            return None;
        }

        let byte = self.slot(tail).load(Ordering::Relaxed);
        self.tail.store(self.advance(tail), Ordering::Release);
        Some(byte)
    }

    /// Look at the oldest byte without consuming it
    pub fn peek(&self) -> Option<u8> {
        let tail = self.tail.load(Ordering::Relaxed);
        let head = self.head.load(Ordering::Acquire);
        if head == tail {
            None
        } else {
            Some(self.slot(tail).load(Ordering::Relaxed))
        }
    }

    /// Append as many bytes as fit
    ///
    /// Returns the number of bytes taken from `data`.
    pub fn write_from(&self, data: &[u8]) -> usize {
        data.iter().take_while(|&&byte| self.write(byte)).count()
    }

    /// Move as many bytes as are available into `buf`
    ///
    /// Returns the number of bytes copied. Never waits for more data.
    pub fn read_into(&self, buf: &mut [u8]) -> usize {
        let mut count = 0;
        for slot in buf.iter_mut() {
            match self.read() {
                Some(byte) => {
                    *slot = byte;
                    count += 1;
                }
                None => break,
            }
        }
        count
    }

    /// Discard all content
    ///
    /// Resets both cursors, so neither producer nor consumer may run
    /// concurrently; callers hold the interrupt mask critical section.
    pub fn clear(&self) {
        self.head.store(0, Ordering::Release);
        self.tail.store(0, Ordering::Release);
    }
}

impl fmt::Debug for RingBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RingBuffer")
            .field("capacity", &self.capacity())
            .field("available", &self.available())
            .finish()
    }
}
