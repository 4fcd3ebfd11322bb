//! Async I/O traits for accessing target memory from the debug host.
//!
//! When the target halts on a semihosting breakpoint, the argument block,
//! the strings and buffers it points to, and any out-parameters all live in
//! target RAM.  The debug host reaches them through these traits.
//!
//! # Possible implementations
//!
//! - For probes: Read/write target RAM via SWD, JTAG, or other debug
//!   interfaces
//! - For simulators and tests: Read/write an in-memory image of the
//!   target's RAM
//!
//! # Address Space
//!
//! The methods use absolute addresses as they appear in the target's
//! memory map, exactly as the target placed them in r1 or in an argument
//! block.  For STM32F1 devices RAM starts at `0x20000000`.

// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

/// Reader trait.
pub trait Reader {
    /// The error type returned by read operations.
    ///
    /// This allows implementations to use their own error types
    /// (e.g., custom errors for SWD faults).
    type Error: core::fmt::Debug;

    /// Read bytes from target memory at the specified absolute address.
    ///
    /// # Arguments
    ///
    /// * `addr` - The absolute address to read from (e.g., `0x20000200`)
    /// * `buf` - Buffer to fill with the read data
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The address is not mapped on the target
    /// - The underlying access fails (SWD fault, communication error, etc.)
    ///
    /// # Performance Notes
    ///
    /// Argument blocks are a few words, but write payloads can be large.
    /// Implementations accessing a target via a debug interface should use
    /// bulk transfers where the interface supports them.
    fn read(
        &mut self,
        addr: u32,
        buf: &mut [u8],
    ) -> impl core::future::Future<Output = Result<(), Self::Error>> + Send;
}

/// Writer trait.
pub trait Writer {
    /// The error type returned by write operations.
    type Error: core::fmt::Debug;

    /// Write bytes to target memory at the specified absolute address.
    ///
    /// # Arguments
    ///
    /// * `addr` - The absolute address to write to (e.g., `0x20000200`)
    /// * `data` - Data to write
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The address is not mapped on the target
    /// - The underlying access fails (SWD fault, communication error, etc.)
    /// - The target memory is read-only
    fn write(
        &mut self,
        addr: u32,
        data: &[u8],
    ) -> impl core::future::Future<Output = Result<(), Self::Error>> + Send;
}
