//! Constant byte buffers attached to operators.
//!
//! A [`Buffer`] is a cheap handle over a contiguous byte range. Owning
//! buffers share their storage through a reference count: cloning a handle
//! never deep-copies, and the storage is released exactly once, when the
//! last handle lets go of it. Non-owning buffers reference `'static` memory
//! that is never released by any handle.

#![forbid(unsafe_code)]

use crate::error::{GraphError, Result};
use bytes::{Bytes, BytesMut};
use std::fmt;

/// Index of a buffer inside a built graph's buffer arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(pub usize);

/// Handle over a contiguous byte range.
#[derive(Clone)]
pub struct Buffer {
    data: Bytes,
    owns: bool,
    released: bool,
}

impl Buffer {
    /// Create an empty owning buffer.
    pub fn new() -> Self {
        Self {
            data: Bytes::new(),
            owns: true,
            released: false,
        }
    }

    /// Create an owning buffer of `size` zero bytes.
    pub fn zeroed(size: usize) -> Self {
        Self::with_value(size, 0)
    }

    /// Create an owning buffer of `size` bytes, each set to `value`.
    pub fn with_value(size: usize, value: u8) -> Self {
        Self::from_vec(vec![value; size])
    }

    /// Take ownership of `data`.
    pub fn from_vec(data: Vec<u8>) -> Self {
        Self {
            data: Bytes::from(data),
            owns: true,
            released: false,
        }
    }

    /// Take ownership of an arbitrary byte owner.
    ///
    /// `owner` is dropped once, when the last handle sharing it is released.
    pub fn from_owner<T>(owner: T) -> Self
    where
        T: AsRef<[u8]> + Send + 'static,
    {
        Self {
            data: Bytes::from_owner(owner),
            owns: true,
            released: false,
        }
    }

    /// Reference memory that outlives every handle. Never released.
    pub fn from_static(data: &'static [u8]) -> Self {
        Self {
            data: Bytes::from_static(data),
            owns: false,
            released: false,
        }
    }

    /// Owning deep copy of the first `size` bytes of `data`.
    pub fn copy_from(data: Option<&[u8]>, size: usize) -> Result<Self> {
        let bytes = check_parts(data, size)?;
        Ok(Self::from_vec(bytes.to_vec()))
    }

    /// Non-owning handle over the first `size` bytes of `data`.
    pub fn borrow_static(data: Option<&'static [u8]>, size: usize) -> Result<Self> {
        let bytes = check_parts(data, size)?;
        Ok(Self::from_static(bytes))
    }

    /// The buffer's bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Byte length.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Whether the buffer holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Whether this handle takes part in releasing its storage.
    pub fn owns(&self) -> bool {
        self.owns
    }

    /// Whether [`release`](Self::release) has been called on this handle.
    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Whether both handles view the same storage.
    pub fn ptr_eq(&self, other: &Buffer) -> bool {
        !self.data.is_empty()
            && self.data.as_ptr() == other.data.as_ptr()
            && self.data.len() == other.data.len()
    }

    /// Drop this handle's claim on its storage and leave it empty.
    ///
    /// Idempotent. Owning storage is freed when the last sharing handle
    /// releases it; borrowed storage is never freed.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.data = Bytes::new();
        self.owns = false;
        self.released = true;
    }

    /// Resize to `len` bytes, zero-filling any growth.
    pub fn resize(&mut self, len: usize) {
        self.modify(|bytes| bytes.resize(len, 0));
    }

    /// Truncate to zero bytes, keeping the handle owning.
    pub fn clear(&mut self) {
        self.data = Bytes::new();
        self.owns = true;
        self.released = false;
    }

    /// Set every byte to `value`.
    pub fn fill(&mut self, value: u8) {
        self.modify(|bytes| bytes.fill(value));
    }

    /// Overwrite bytes starting at `offset`.
    pub fn write_at(&mut self, offset: usize, src: &[u8]) -> Result<()> {
        let end = offset
            .checked_add(src.len())
            .filter(|&end| end <= self.size())
            .ok_or_else(|| {
                GraphError::invalid_argument(format!(
                    "write of {} bytes at offset {} exceeds buffer of {} bytes",
                    src.len(),
                    offset,
                    self.size()
                ))
            })?;
        self.modify(|bytes| bytes[offset..end].copy_from_slice(src));
        Ok(())
    }

    // Copy-on-write: storage shared with other handles or borrowed is copied
    // into a private allocation first.
    fn modify(&mut self, f: impl FnOnce(&mut BytesMut)) {
        let data = std::mem::take(&mut self.data);
        let mut bytes = match data.try_into_mut() {
            Ok(unique) => unique,
            Err(shared) => BytesMut::from(&shared[..]),
        };
        f(&mut bytes);
        self.data = bytes.freeze();
        self.owns = true;
        self.released = false;
    }
}

fn check_parts(data: Option<&[u8]>, size: usize) -> Result<&[u8]> {
    match data {
        None if size == 0 => Ok(&[][..]),
        None => Err(GraphError::invalid_argument(format!(
            "no data given for buffer of {} bytes",
            size
        ))),
        Some(_) if size == 0 => Err(GraphError::invalid_argument(
            "data given for zero-sized buffer",
        )),
        Some(bytes) if bytes.len() < size => Err(GraphError::invalid_argument(format!(
            "buffer size {} exceeds data length {}",
            size,
            bytes.len()
        ))),
        Some(bytes) => Ok(&bytes[..size]),
    }
}

impl Default for Buffer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("size", &self.size())
            .field("owns", &self.owns)
            .field("released", &self.released)
            .finish()
    }
}

impl From<Vec<u8>> for Buffer {
    fn from(data: Vec<u8>) -> Self {
        Self::from_vec(data)
    }
}
