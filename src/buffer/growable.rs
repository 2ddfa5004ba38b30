//! Growable Buffer for Incremental Stream Accumulation
//!
//! Producers append into the spare tail, consumers read the valid region and
//! then discard a processed prefix. The valid region is always
//! `storage[base..base + len]`.
//!
//! - Growth doubles the storage until the request fits (amortized O(1) per byte)
//! - Consuming a prefix only moves `base`, until the consumed prefix is at
//!   least as large as what remains; then the remainder is rebased to offset 0
//! - Storage never shrinks

use log::trace;
use serde::Serialize;
use std::fmt;
use std::io;

/// Storage size used when the caller asks for a zero capacity
pub const DEFAULT_CAPACITY: usize = 32;

/// Contiguous byte buffer with a consumable front and a growable tail
pub struct GrowableBuffer {
    /// Backing storage, zero-initialised, replaced wholesale on growth
    storage: Vec<u8>,
    /// Offset of the first valid byte
    base: usize,
    /// Number of valid bytes
    len: usize,
    /// Times the storage was reallocated
    reallocations: u64,
    /// Times the valid region was rebased by `consume`
    compactions: u64,
}

/// Point-in-time view of a buffer's bookkeeping
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BufferStats {
    pub len: usize,
    pub size: usize,
    pub base: usize,
    pub reallocations: u64,
    pub compactions: u64,
}

impl GrowableBuffer {
    /// Create a buffer with `capacity` zeroed bytes of storage.
    /// A capacity of 0 selects [`DEFAULT_CAPACITY`].
    pub fn new(capacity: usize) -> Self {
        let capacity = if capacity == 0 { DEFAULT_CAPACITY } else { capacity };

        Self {
            storage: vec![0u8; capacity],
            base: 0,
            len: 0,
            reallocations: 0,
            compactions: 0,
        }
    }

    /// Number of valid (unconsumed) bytes
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Total storage size
    pub fn size(&self) -> usize {
        self.storage.len()
    }

    /// Bytes available from the start of the valid region to the end of storage.
    ///
    /// This includes the valid bytes themselves; the free space for appends is
    /// `spare_mut().len()`.
    pub fn capacity(&self) -> usize {
        self.storage.len() - self.base
    }

    /// Logically empty the buffer. Storage is kept.
    pub fn reset(&mut self) {
        self.base = 0;
        self.len = 0;
    }

    /// The valid region
    pub fn bytes(&self) -> &[u8] {
        &self.storage[self.base..self.base + self.len]
    }

    /// Make room for `extra` more bytes after the valid region and return the
    /// resulting storage size.
    ///
    /// The size doubles until `base + len + extra` fits. When that changes the
    /// size, the valid bytes move to offset 0 of the new storage.
    ///
    /// ## Panics
    ///
    /// Panics if the required size overflows `usize`.
    pub fn grow(&mut self, extra: usize) -> usize {
        let current = self.storage.len();
        let required = self
            .base
            .checked_add(self.len)
            .and_then(|n| n.checked_add(extra))
            .expect("capacity overflow");

        let mut target = if current == 0 { DEFAULT_CAPACITY } else { current };
        while target < required {
            target = target.checked_mul(2).expect("capacity overflow");
        }

        if target != current {
            let mut storage = vec![0u8; target];
            storage[..self.len].copy_from_slice(self.bytes());
            trace!(
                "buffer resized {} -> {} bytes, rebased {} valid bytes from offset {}",
                current, target, self.len, self.base
            );
            self.storage = storage;
            self.base = 0;
            self.reallocations += 1;
        }

        target
    }

    /// Discard `n` bytes from the front of the valid region and return the
    /// remaining length. Discarding everything is a `reset`.
    pub fn consume(&mut self, n: usize) -> usize {
        if n >= self.len {
            self.reset();
            return 0;
        }

        self.base += n;
        self.len -= n;

        if self.base >= self.len {
            let start = self.base;
            self.storage.copy_within(start..start + self.len, 0);
            trace!("buffer compacted {} bytes from offset {}", self.len, start);
            self.base = 0;
            self.compactions += 1;
        }

        self.len
    }

    /// Free space after the valid region. Bytes written here become valid
    /// only after [`commit`](Self::commit).
    pub fn spare_mut(&mut self) -> &mut [u8] {
        let end = self.base + self.len;
        &mut self.storage[end..]
    }

    /// Mark `n` bytes of the spare region as valid.
    ///
    /// ## Panics
    ///
    /// Panics if `n` is larger than the spare region.
    pub fn commit(&mut self, n: usize) {
        let spare = self.storage.len() - self.base - self.len;
        assert!(
            n <= spare,
            "tried to commit {} bytes, only {} are spare",
            n,
            spare
        );
        self.len += n;
    }

    /// Reserve `extra` bytes, let `f` write into the spare region and commit
    /// the count it returns.
    ///
    /// ## Panics
    ///
    /// Panics if `f` reports more bytes than the spare region holds.
    pub fn write_with<F>(&mut self, extra: usize, f: F) -> usize
    where
        F: FnOnce(&mut [u8]) -> usize,
    {
        self.grow(extra);
        let written = f(self.spare_mut());
        self.commit(written);
        written
    }

    /// Append a copy of `data`
    pub fn extend_from_slice(&mut self, data: &[u8]) {
        self.write_with(data.len(), |spare| {
            spare[..data.len()].copy_from_slice(data);
            data.len()
        });
    }

    /// Perform a single `read` of up to `extra` bytes from `reader` into the
    /// spare region. Returns the number of bytes committed; 0 means EOF.
    pub fn read_from<R: io::Read>(&mut self, reader: &mut R, extra: usize) -> io::Result<usize> {
        self.grow(extra);
        let spare = self.spare_mut();
        let limit = extra.min(spare.len());
        let read = reader.read(&mut spare[..limit])?;
        self.commit(read);
        Ok(read)
    }

    /// Snapshot of the bookkeeping counters
    pub fn stats(&self) -> BufferStats {
        BufferStats {
            len: self.len,
            size: self.storage.len(),
            base: self.base,
            reallocations: self.reallocations,
            compactions: self.compactions,
        }
    }
}

impl Default for GrowableBuffer {
    fn default() -> Self {
        Self::new(0)
    }
}

impl AsRef<[u8]> for GrowableBuffer {
    fn as_ref(&self) -> &[u8] {
        self.bytes()
    }
}

impl fmt::Debug for GrowableBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GrowableBuffer")
            .field("len", &self.len)
            .field("base", &self.base)
            .field("size", &self.storage.len())
            .finish()
    }
}

/// Appends never short-write; the buffer grows instead.
impl io::Write for GrowableBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
