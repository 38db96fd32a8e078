//! # bytebuf — growable byte accumulator with binary file I/O
//!
//! A [`ByteBuffer`] collects bytes one at a time (or in bursts) behind a
//! **write cursor**, hands them back one at a time behind an independent
//! **read cursor**, and can dump or reload the written region against a flat
//! binary file. There is no record format: files are read and written
//! verbatim as a byte sequence.
//!
//! ## Cursor Model
//!
//! ```text
//! storage: [ a b c d e f . . . . . . ]   (capacity)
//!                ^read        ^write
//! ```
//!
//! `0 <= read_offset <= write_offset <= capacity` holds at all times.
//! Appends move the write cursor (growing storage in [`GROW_BLOCK`] steps
//! when full), [`next_byte`](ByteBuffer::next_byte) moves the read cursor,
//! and the two never interfere.
//!
//! ## Example
//!
//! ```rust,no_run
//! use bytebuf::{ByteBuffer, NextByte};
//!
//! let mut buf = ByteBuffer::new().unwrap();
//! buf.append(&[1.0, 2.0, 3.0]).unwrap();
//! buf.save("dump.bin").unwrap();
//!
//! buf.rewind();
//! while let NextByte::Byte { value, end_of_data } = buf.next_byte() {
//!     println!("{value} (last: {end_of_data})");
//! }
//! ```

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::Path;

use thiserror::Error;
use tracing::warn;

/// Number of bytes added on every capacity growth step; also the default
/// initial capacity.
pub const GROW_BLOCK: usize = 65536;

/// Errors that can occur during buffer operations.
#[derive(Debug, Error)]
pub enum BufferError {
    /// Out-of-memory on construction, growth, or load allocation.
    #[error("unable to allocate {requested} bytes for buffer")]
    Alloc {
        /// Total number of bytes the failed allocation asked for.
        requested: usize,
    },

    /// The file could not be opened for the requested mode.
    #[error("unable to open {path}: {source}")]
    Open {
        /// Path as given by the caller.
        path: String,
        /// The underlying open failure.
        #[source]
        source: io::Error,
    },

    /// A read or write failed after the file was already open.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// An append input was outside [0, 255] or not an integer.
    #[error("input {value} at index {index} is not a byte in [0, 255]")]
    InvalidByte {
        /// Position of the offending element in the append call.
        index: usize,
        /// The offending value as given.
        value: f64,
    },
}

/// Result of a single [`ByteBuffer::next_byte`] call.
///
/// The two no-byte situations are deliberately distinct: consuming the final
/// byte raises `end_of_data` **in the same call**, while a call with nothing
/// left to read yields [`Empty`](NextByte::Empty). Downstream consumers rely
/// on "end of data" as a completion signal, so the two must never be
/// conflated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextByte {
    /// The next stored byte. `end_of_data` is true exactly when this byte
    /// was the last one written.
    Byte { value: u8, end_of_data: bool },
    /// Nothing left to read (`read_offset == write_offset`).
    Empty,
}

/// Snapshot of the buffer geometry, as reported by [`ByteBuffer::info`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferInfo {
    /// Allocated storage size in bytes.
    pub buf_length: usize,
    /// Next index to be consumed.
    pub read_offset: usize,
    /// Next index to be appended; end of valid data.
    pub write_offset: usize,
}

/// A growable byte store with independent read and write cursors.
///
/// Storage is owned and never shared between instances. Capacity only grows
/// (by [`GROW_BLOCK`] per step); the sole wholesale replacement is a
/// successful [`load`](ByteBuffer::load).
#[derive(Debug)]
pub struct ByteBuffer {
    /// Backing storage, kept at `len() == capacity`. Bytes at or beyond
    /// `write_offset` are logically absent.
    storage: Vec<u8>,
    read_offset: usize,
    write_offset: usize,
}

/// Allocates a zero-filled vector of exactly `len` bytes, surfacing
/// out-of-memory as [`BufferError::Alloc`] instead of aborting.
fn alloc_zeroed(len: usize) -> Result<Vec<u8>, BufferError> {
    let mut v: Vec<u8> = Vec::new();
    v.try_reserve_exact(len)
        .map_err(|_| BufferError::Alloc { requested: len })?;
    v.resize(len, 0);
    Ok(v)
}

impl ByteBuffer {
    /// Creates a buffer with the default capacity ([`GROW_BLOCK`] bytes).
    pub fn new() -> Result<Self, BufferError> {
        Self::with_capacity(GROW_BLOCK)
    }

    /// Creates a buffer with `capacity` bytes of storage.
    ///
    /// A capacity of zero falls back to the default. Both cursors start at
    /// zero.
    pub fn with_capacity(capacity: usize) -> Result<Self, BufferError> {
        let capacity = if capacity == 0 { GROW_BLOCK } else { capacity };
        Ok(Self {
            storage: alloc_zeroed(capacity)?,
            read_offset: 0,
            write_offset: 0,
        })
    }

    /// Number of bytes written so far (the valid region is `[0, len)`).
    pub fn len(&self) -> usize {
        self.write_offset
    }

    /// True when nothing has been written (or the buffer was cleared).
    pub fn is_empty(&self) -> bool {
        self.write_offset == 0
    }

    /// Allocated storage size in bytes.
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// Next index to be consumed by [`next_byte`](ByteBuffer::next_byte).
    pub fn read_offset(&self) -> usize {
        self.read_offset
    }

    /// True when the read cursor has caught up with the write cursor.
    pub fn is_drained(&self) -> bool {
        self.read_offset == self.write_offset
    }

    /// The written region `storage[0..write_offset)`.
    pub fn written(&self) -> &[u8] {
        &self.storage[..self.write_offset]
    }

    /// Grows storage by one [`GROW_BLOCK`] step.
    fn grow(&mut self) -> Result<(), BufferError> {
        let target = self.storage.len() + GROW_BLOCK;
        self.storage
            .try_reserve_exact(GROW_BLOCK)
            .map_err(|_| BufferError::Alloc { requested: target })?;
        self.storage.resize(target, 0);
        Ok(())
    }

    /// Validates one append input: must be integral and within [0, 255].
    fn validate(index: usize, value: f64) -> Result<u8, BufferError> {
        if value.trunc() != value || !(0.0..=255.0).contains(&value) {
            return Err(BufferError::InvalidByte { index, value });
        }
        Ok(value as u8)
    }

    /// Appends a burst of byte values, growing storage as needed.
    ///
    /// Each value must be an integer in [0, 255]. The first offending
    /// element aborts the rest of the call with
    /// [`BufferError::InvalidByte`]; bytes from earlier elements of the same
    /// call **remain appended**. A growth failure mid-call likewise keeps
    /// everything appended up to that point.
    ///
    /// Returns the number of bytes appended. The read cursor is untouched.
    pub fn append(&mut self, values: &[f64]) -> Result<usize, BufferError> {
        let mut appended = 0;
        for (index, &value) in values.iter().enumerate() {
            let byte = Self::validate(index, value)?;
            if self.write_offset == self.storage.len() {
                self.grow()?;
            }
            self.storage[self.write_offset] = byte;
            self.write_offset += 1;
            appended += 1;
        }
        Ok(appended)
    }

    /// Appends a single byte value; same validation and growth as
    /// [`append`](ByteBuffer::append).
    pub fn push(&mut self, value: f64) -> Result<(), BufferError> {
        self.append(std::slice::from_ref(&value)).map(|_| ())
    }

    /// Resets both cursors to zero, then appends `values`.
    ///
    /// Capacity is retained across the reset, so this replaces the buffer
    /// contents without reallocating.
    pub fn set(&mut self, values: &[f64]) -> Result<usize, BufferError> {
        self.clear();
        self.append(values)
    }

    /// Resets both cursors to zero. Capacity and storage are retained; old
    /// bytes beyond the cursors are logically absent and will be overwritten
    /// by future appends.
    pub fn clear(&mut self) {
        self.write_offset = 0;
        self.read_offset = 0;
    }

    /// Resets the read cursor to zero so previously written data can be
    /// consumed again from the start. The write cursor is unchanged.
    pub fn rewind(&mut self) {
        self.read_offset = 0;
    }

    /// Consumes and yields the next byte, if any.
    ///
    /// See [`NextByte`] for the end-of-data / empty distinction.
    pub fn next_byte(&mut self) -> NextByte {
        if self.read_offset < self.write_offset {
            let value = self.storage[self.read_offset];
            self.read_offset += 1;
            NextByte::Byte {
                value,
                end_of_data: self.read_offset == self.write_offset,
            }
        } else {
            NextByte::Empty
        }
    }

    /// Reports the buffer geometry. Pure query, no mutation.
    pub fn info(&self) -> BufferInfo {
        BufferInfo {
            buf_length: self.storage.len(),
            read_offset: self.read_offset,
            write_offset: self.write_offset,
        }
    }

    /// Replaces the buffer contents with the contents of the file at `path`.
    ///
    /// The file length comes from a single metadata query followed by one
    /// sequential read. On success the storage is sized exactly to the file,
    /// `write_offset` equals the bytes read, and `read_offset` is zero.
    ///
    /// A zero-length file is a no-op that leaves the buffer completely
    /// unchanged. On any failure (open, allocation, read) the previous
    /// buffer is left fully intact: the new storage is filled before the old
    /// one is released.
    ///
    /// Returns the number of bytes read. Reading fewer bytes than the
    /// metadata promised is a non-fatal warning; the buffer keeps what was
    /// actually read.
    pub fn load<P: AsRef<Path>>(&mut self, path: P) -> Result<usize, BufferError> {
        let path = path.as_ref();
        let mut file = File::open(path).map_err(|source| BufferError::Open {
            path: path.display().to_string(),
            source,
        })?;

        let expected = file.metadata()?.len() as usize;
        if expected == 0 {
            return Ok(0);
        }

        // Fill fresh storage first so any failure leaves `self` untouched.
        let mut fresh = alloc_zeroed(expected)?;
        let mut filled = 0;
        while filled < expected {
            match file.read(&mut fresh[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(BufferError::Io(e)),
            }
        }
        if filled != expected {
            warn!(
                expected,
                read = filled,
                path = %path.display(),
                "file length not equal to bytes read"
            );
            fresh.truncate(filled);
        }

        self.storage = fresh;
        self.write_offset = filled;
        self.read_offset = 0;
        Ok(filled)
    }

    /// Writes the written region `[0, write_offset)` to the file at `path`,
    /// truncating any existing file. The file handle is closed on every exit
    /// path.
    ///
    /// Returns the number of bytes written. A short write is reported as a
    /// non-fatal warning, not an error; open failure is
    /// [`BufferError::Open`] with no side effects on the buffer or the file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<usize, BufferError> {
        let path = path.as_ref();
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(|source| BufferError::Open {
                path: path.display().to_string(),
                source,
            })?;

        let mut written = 0;
        while written < self.write_offset {
            match file.write(&self.storage[written..self.write_offset]) {
                Ok(0) => break,
                Ok(n) => written += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(BufferError::Io(e)),
            }
        }
        file.flush()?;
        if written != self.write_offset {
            warn!(
                expected = self.write_offset,
                written,
                path = %path.display(),
                "bytes written not equal to write offset"
            );
        }
        Ok(written)
    }
}
