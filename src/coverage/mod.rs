//! Coverage export pipeline, typically used by a Target.
//!
//! The compiler's coverage runtime keeps one record per instrumented
//! translation unit.  [`Coverage::dump()`] opens a single file on the debug
//! host and, for each record in registry order, lets the runtime serialize
//! it through a [`ChunkSink`]:
//!
//! 1. Filename pass - the record's source filename, in the runtime's
//!    canonical stream encoding
//! 2. Data pass - the record's counters
//!
//! Every chunk is written to the host file as it is emitted, so chunks land
//! in the file in emission order and records in registry order.  The file
//! is then closed, whatever happened before.
//!
//! The dump is best effort:
//! - If the open fails, records are still serialized and written against
//!   the invalid handle, and the invalid handle is still closed
//! - A chunk the host only partially writes is not retried, so the host
//!   file is silently short.  Truncated chunks are counted and logged
//! - A failed close is logged, not reported
//!
//! No memory is allocated on behalf of the runtime.  [`ChunkSink::allocate()`]
//! always declines, and the runtime falls back to unbuffered transfers.
//!
//! The registry is passed in, rather than read from linker symbols, so any
//! runtime can be driven.  See [`gcov`] for the gcov runtime and its
//! linker-provided registry.

// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

#[cfg(feature = "gcov")]
pub mod gcov;

use core::ffi::CStr;
use core::ptr::NonNull;
#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use crate::host::{FileHandle, Host, OpenMode};
use crate::transport::Transport;

/// Receives a record's serialized bytes from a [`CoverageRuntime`].
pub trait ChunkSink {
    /// Filename pass chunk
    fn filename_chunk(&mut self, chunk: &[u8]);

    /// Data pass chunk
    fn data_chunk(&mut self, chunk: &[u8]);

    /// Buffer request from the runtime.  `None` means no buffer is
    /// available.
    fn allocate(&mut self, size: usize) -> Option<NonNull<u8>>;
}

/// A coverage instrumentation runtime.
pub trait CoverageRuntime {
    /// Opaque per-translation-unit record.  Never inspected by this crate.
    type Record;

    /// Zero all counters in all records.
    fn reset(&mut self);

    /// Serialize one record: the filename pass, then the data pass.
    fn serialize(&mut self, record: &Self::Record, sink: &mut dyn ChunkSink);
}

/// Pipeline state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Counters not reset yet
    Uninitialized,
    /// Counters reset and accumulating
    Counting,
    /// Dump in progress
    Exporting,
    /// Dump complete and file closed
    Closed,
}

/// Where and how to write the dump on the host.
#[derive(Debug, Clone, Copy)]
pub struct DumpConfig<'p> {
    /// Output path on the host
    pub path: &'p CStr,
    /// Open mode, `wb` unless overridden
    pub mode: OpenMode,
}

impl<'p> DumpConfig<'p> {
    pub fn new(path: &'p CStr) -> Self {
        Self {
            path,
            mode: OpenMode::WriteBinary,
        }
    }
}

/// Coverage export pipeline over a [`CoverageRuntime`].
pub struct Coverage<R: CoverageRuntime> {
    runtime: R,
    state: State,
}

impl<R: CoverageRuntime> Coverage<R> {
    pub fn new(runtime: R) -> Self {
        Self {
            runtime,
            state: State::Uninitialized,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Reset all coverage counters.  Call before running the code under
    /// test.  Calling again re-zeroes the counters.
    pub fn init(&mut self) {
        self.runtime.reset();
        self.state = State::Counting;
        debug!("Coverage counters reset");
    }

    /// Write every record in `registry` to a single host file.
    ///
    /// Nothing is returned - failures along the way are logged, and the
    /// file is closed regardless.
    pub fn dump<T: Transport>(
        &mut self,
        host: &mut Host<'_, T>,
        config: &DumpConfig<'_>,
        registry: &[&R::Record],
    ) {
        if self.state == State::Uninitialized {
            warn!("Dumping coverage without init, counters were never reset");
        }
        self.state = State::Exporting;

        let handle = host.open(config.path, config.mode);
        if !handle.is_valid() {
            warn!(
                "Failed to open {:?}, writing {} records to invalid handle",
                config.path,
                registry.len()
            );
        }

        let mut sink = HostFileSink::new(host, handle);
        for &record in registry {
            self.runtime.serialize(record, &mut sink);
        }
        let (chunks, truncated) = (sink.chunks, sink.truncated);
        if truncated > 0 {
            // Not retried - the host file is short by the remainders
            warn!("Host truncated {truncated} of {chunks} coverage chunks");
        }

        if !host.close(handle) {
            warn!("Failed to close coverage file handle {}", handle.0);
        }
        self.state = State::Closed;

        debug!(
            "Dumped {} coverage records ({chunks} chunks) to {:?}",
            registry.len(),
            config.path
        );
    }
}

/// [`ChunkSink`] writing both passes straight to a host file handle.
pub struct HostFileSink<'h, 'a, T: Transport> {
    host: &'h mut Host<'a, T>,
    handle: FileHandle,
    chunks: usize,
    truncated: usize,
}

impl<'h, 'a, T: Transport> HostFileSink<'h, 'a, T> {
    pub fn new(host: &'h mut Host<'a, T>, handle: FileHandle) -> Self {
        Self {
            host,
            handle,
            chunks: 0,
            truncated: 0,
        }
    }

    fn write_chunk(&mut self, chunk: &[u8]) {
        self.chunks += 1;
        if self.host.write(self.handle, chunk) != 0 {
            self.truncated += 1;
        }
    }
}

impl<T: Transport> ChunkSink for HostFileSink<'_, '_, T> {
    fn filename_chunk(&mut self, chunk: &[u8]) {
        self.write_chunk(chunk);
    }

    fn data_chunk(&mut self, chunk: &[u8]) {
        self.write_chunk(chunk);
    }

    fn allocate(&mut self, _size: usize) -> Option<NonNull<u8>> {
        None
    }
}
