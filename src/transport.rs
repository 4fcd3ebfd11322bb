//! Trap transport between Target and debug Host.
//!
//! A semihosting request is a breakpoint with a reserved immediate.  The
//! command code is placed in r0, the address of the argument block (or an
//! immediate argument) in r1, and the core halts.  The attached debugger
//! recognises the breakpoint, services the request, writes its reply into
//! r0 (and for some operations r1) and resumes the core.
//!
//! If no debugger is attached the core stays halted.  There is no timeout.
//!
//! [`Transport`] is the only seam the rest of the crate depends on, so
//! everything above it can be exercised on a development machine with a
//! mock transport.

// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

use crate::{Error, Result};

/// Semihosting operation numbers, as defined by Arm.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Open a file on the host
    Open = 0x01,
    /// Close a file on the host
    Close = 0x02,
    /// Write a character to the debug console
    WriteC = 0x03,
    /// Write a null-terminated string to the debug console
    Write0 = 0x04,
    /// Write to a file
    Write = 0x05,
    /// Read from a file
    Read = 0x06,
    /// Read a character from the debug console
    ReadC = 0x07,
    /// Check whether a status code is an error
    IsError = 0x08,
    /// Check whether a handle is an interactive device
    IsTty = 0x09,
    /// Seek to an absolute position in a file
    Seek = 0x0A,
    /// Get the length of a file
    Flen = 0x0C,
    /// Get a temporary file name
    TmpNam = 0x0D,
    /// Delete a file on the host
    Remove = 0x0E,
    /// Rename a file on the host
    Rename = 0x0F,
    /// Centiseconds since execution started
    Clock = 0x10,
    /// Seconds since the Unix epoch
    Time = 0x11,
    /// Run a command in a host shell
    System = 0x12,
    /// Host errno of the last failed request
    Errno = 0x13,
    /// Get the command line the host started the target with
    GetCmdline = 0x15,
    /// Get heap and stack placement
    HeapInfo = 0x16,
    /// Report application exit
    Exit = 0x18,
    /// Target ticks since execution started
    Elapsed = 0x30,
    /// Tick frequency in ticks per second
    TickFreq = 0x31,
}

impl From<Operation> for u32 {
    fn from(op: Operation) -> Self {
        op as u32
    }
}

impl TryFrom<u32> for Operation {
    type Error = Error;

    fn try_from(value: u32) -> Result<Self> {
        let op = match value {
            0x01 => Operation::Open,
            0x02 => Operation::Close,
            0x03 => Operation::WriteC,
            0x04 => Operation::Write0,
            0x05 => Operation::Write,
            0x06 => Operation::Read,
            0x07 => Operation::ReadC,
            0x08 => Operation::IsError,
            0x09 => Operation::IsTty,
            0x0A => Operation::Seek,
            0x0C => Operation::Flen,
            0x0D => Operation::TmpNam,
            0x0E => Operation::Remove,
            0x0F => Operation::Rename,
            0x10 => Operation::Clock,
            0x11 => Operation::Time,
            0x12 => Operation::System,
            0x13 => Operation::Errno,
            0x15 => Operation::GetCmdline,
            0x16 => Operation::HeapInfo,
            0x18 => Operation::Exit,
            0x30 => Operation::Elapsed,
            0x31 => Operation::TickFreq,
            _ => return Err(Error::UnknownOperation),
        };
        Ok(op)
    }
}

/// How an operation uses r1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Argument {
    /// r1 is unused and should be 0
    Ignored,
    /// r1 is the argument itself, or a pointer the host uses directly
    Immediate,
    /// r1 points to an argument block of this many words
    Block(usize),
}

impl Operation {
    /// Argument block layout for this operation.
    pub const fn argument(self) -> Argument {
        match self {
            Operation::ReadC
            | Operation::Clock
            | Operation::Time
            | Operation::Errno
            | Operation::TickFreq => Argument::Ignored,
            Operation::Write0 | Operation::Elapsed | Operation::Exit => Argument::Immediate,
            Operation::WriteC
            | Operation::Close
            | Operation::IsError
            | Operation::IsTty
            | Operation::Flen
            | Operation::HeapInfo => Argument::Block(1),
            Operation::Seek
            | Operation::Remove
            | Operation::System
            | Operation::GetCmdline => Argument::Block(2),
            Operation::Open | Operation::Write | Operation::Read | Operation::TmpNam => {
                Argument::Block(3)
            }
            Operation::Rename => Argument::Block(4),
        }
    }
}

/// Splits a raw 64-bit reply into its (r0, r1) words.
pub const fn split_reply(raw: u64) -> (u32, u32) {
    (raw as u32, (raw >> 32) as u32)
}

/// Joins (r0, r1) into the raw 64-bit reply, r0 being the low word.
pub const fn join_reply(r0: u32, r1: u32) -> u64 {
    ((r1 as u64) << 32) | r0 as u64
}

/// Trait for issuing a request to the debug host.
///
/// Implementations must block until the host has replied.
pub trait Transport {
    /// Issue request `command` with argument `arg` and return the host's
    /// reply, r0 in the low 32 bits and r1 in the high 32 bits.
    ///
    /// `arg` is usually the address of an argument block which must stay
    /// alive (and, for out-parameters, writable) for the duration of the
    /// call.  Some operations take an immediate value instead.
    fn request(&mut self, command: u32, arg: usize) -> u64;
}

/// Transport using the Cortex-M `bkpt 0xAB` semihosting trap.
///
/// With the `no-semihosting` feature the trap is patched out and every
/// request returns 0, so firmware can run without a debugger attached.
#[derive(Clone, Copy)]
pub struct BkptTransport;

impl BkptTransport {
    /// Immediate the debugger recognises as a semihosting request.
    pub const IMMEDIATE: u8 = 0xAB;

    // Must be const so it can live in a static.
    #[allow(clippy::new_without_default)]
    pub const fn new() -> Self {
        Self {}
    }
}

impl Transport for BkptTransport {
    #[allow(unused_variables)]
    #[inline(always)]
    fn request(&mut self, command: u32, arg: usize) -> u64 {
        match () {
            #[cfg(all(target_arch = "arm", not(feature = "no-semihosting")))]
            () => {
                let r0: u32;
                let r1: usize;
                // The host reads the argument block and may write through
                // pointers inside it, so memory is not marked untouched.
                unsafe {
                    core::arch::asm!(
                        "bkpt 0xAB",
                        inout("r0") command => r0,
                        inout("r1") arg => r1,
                        options(nostack),
                    );
                }
                join_reply(r0, r1 as u32)
            }
            #[cfg(all(target_arch = "arm", feature = "no-semihosting"))]
            () => 0,
            #[cfg(not(target_arch = "arm"))]
            () => unimplemented!(),
        }
    }
}
