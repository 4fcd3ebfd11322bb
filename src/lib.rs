//! Arm semihosting I/O and gcov coverage export for microcontroller targets
//! driven by a debug probe.
//!
//! Firmware on a microcontroller typically has no filesystem and no network.
//! When a debugger is attached, semihosting lets the firmware borrow the
//! debug host's console, files, clock and shell: the target executes a
//! reserved breakpoint with a command code and an argument block, the
//! debugger services the request and resumes the target with a reply.
//!
//! This crate uses that channel to get code coverage out of a target.  The
//! compiler's gcov runtime accumulates counters in RAM while the firmware
//! runs, and [`coverage::Coverage::dump()`] streams every record into a
//! single file on the debug host, ready for `gcov-tool merge-stream`.
//!
//! `no_std`.  Requires `alloc` for the host-side service, enabled by the
//! `async` feature.
//!
//! ## Architecture
//!
//! ```text
//! coverage  ->  host  ->  transport  ->  (bkpt 0xAB)  ->  debug host
//!                                                            |
//!                                              service (optional, on the probe)
//! ```
//!
//! - **Transport**: a single blocking call, command in r0 and argument in
//!   r1, reply in r0 (low word) and r1 (high word).  There is no timeout -
//!   without a debugger attached the target stays halted.
//! - **Host**: typed semihosting operations.  Each packs a fixed-layout
//!   argument block of target words, issues the request, and decodes the
//!   reply.  Host-reported failures are returned verbatim (handle `-1`, a
//!   nonzero remainder, `false`), never retried.
//! - **Coverage**: walks a registry of gcov records.  Each record is
//!   serialized in two passes, filename then data, with every chunk written
//!   straight to one host file handle that is opened once and closed once.
//! - **Service**: the debug host's half of the protocol.  A probe which can
//!   read and write target memory (over SWD, say) decodes a trapped request
//!   from the target's RAM, hands it to an application handler and encodes
//!   the reply.
//!
//! ## Modules
//!
//! - [`transport`] - Operation codes, the [`transport::Transport`] trait and
//!   the Cortex-M breakpoint implementation
//! - [`host`] - Typed semihosting operations and host file streams
//! - [`coverage`] - Coverage export pipeline, and the gcov runtime binding
//! - [`service`] - Host-side request decoding and dispatch
//! - [`io`] - Async I/O traits for debug interface access to target memory,
//!   used by the service
//!
//! ## Getting Started
//!
//! **Target**:
//!
//! ```rust,ignore
//! use semihost_cov::coverage::{self, Coverage, DumpConfig};
//! use semihost_cov::host::Host;
//! use semihost_cov::transport::BkptTransport;
//!
//! let mut coverage = Coverage::new(coverage::gcov::GcovRuntime::new());
//! coverage.init();
//!
//! // ... run the code under test ...
//!
//! let mut transport = BkptTransport::new();
//! let mut host = Host::new(&mut transport);
//! let registry = unsafe { coverage::gcov::GcovRuntime::registry() };
//! coverage.dump(&mut host, &DumpConfig::new(c"build/coverage.bin"), registry);
//! ```
//!
//! Then on the host, `gcov-tool merge-stream < build/coverage.bin`.
//!
//! **Host**: implement [`io::Reader`], [`io::Writer`] and
//! [`service::AsyncHostHandler`], then for each semihosting halt, read r0
//! and r1 and call [`service::AsyncSemihostServer::serve()`].  Write the
//! reply back to r0/r1, step over the breakpoint and resume the target.
//!
//! ## Features
//!
//! Default features:
//! - `async` - Enable the host-side service (requires `alloc`).
//!
//! Optional features:
//! - `gcov` - Bind to the compiler's gcov runtime (`-fprofile-arcs
//!   -ftest-coverage` with `-fprofile-info-section`).
//! - `no-semihosting` - Patch out the breakpoint so firmware can run without
//!   a debugger.  Every request then replies 0.
//!
//! Compile with `--no-default-features` for a Target.

// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

#![cfg_attr(not(test), no_std)]

#[cfg(feature = "async")]
extern crate alloc;

pub mod coverage;
pub mod host;
pub mod io;
#[cfg(feature = "async")]
pub mod service;
pub mod transport;

#[cfg(test)]
pub(crate) mod test_support;

/// Semihosting errors.
///
/// Failures reported by the debug host are not errors in this sense - they
/// are returned to the caller as the host reported them.  These are
/// failures detected locally.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Error {
    /// Command code is not a known semihosting operation
    UnknownOperation,
    /// Argument value out of range for the operation
    InvalidArgument,
    /// Argument block address not word aligned
    NotAligned,
    /// Argument block or buffer too small for the operation
    BufferTooSmall,
    /// I/O error, including a transfer which made no progress
    Io,
}

/// Type to represent the result of a semihosting operation
pub type Result<T> = core::result::Result<T, Error>;
