//! Host-side semihosting service, typically used by a Host.
//!
//! When the target halts on a semihosting breakpoint, the debug host reads
//! r0 (the command) and r1 (the argument), services the request and writes
//! the reply back to r0/r1 before resuming the target.  This module covers
//! everything between reading r0/r1 and writing the reply:
//!
//! - [`Request::from_block()`] decodes an argument block, already read from
//!   target memory as words, into a typed [`Request`]
//! - [`AsyncSemihostServer`] reads the block and any strings or payloads
//!   it points to using [`crate::io::Reader`], hands the request to an
//!   [`AsyncHostHandler`], writes out-parameters back to target memory with
//!   [`crate::io::Writer`], and encodes the reply
//!
//! Halting the target, accessing its core registers and stepping over the
//! breakpoint are left to the probe implementation.

// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

pub mod futures;

pub use futures::{AsyncHostHandler, AsyncSemihostServer, ServerConfig};

use crate::host::{FileHandle, OpenMode};
use crate::transport::{Argument, Operation};
use crate::{Error, Result};

/// Largest argument block, in words
pub const MAX_BLOCK_WORDS: usize = 4;

/// A decoded semihosting request.
///
/// Addresses are target addresses.  Strings and buffers have not been read
/// yet.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Request {
    WriteC { ch: u8 },
    Write0 { string: u32 },
    ReadC,
    GetCmdline { buf: u32, size: u32 },
    System { cmd: u32, len: u32 },
    Open { path: u32, mode: OpenMode, len: u32 },
    Close { handle: FileHandle },
    Write { handle: FileHandle, buf: u32, len: u32 },
    Read { handle: FileHandle, buf: u32, len: u32 },
    Seek { handle: FileHandle, pos: u32 },
    Flen { handle: FileHandle },
    IsTty { handle: FileHandle },
    IsError { status: i32 },
    Errno,
    Remove { path: u32, len: u32 },
    Rename { from: u32, from_len: u32, to: u32, to_len: u32 },
    TmpNam { buf: u32, id: u8, size: u32 },
    Clock,
    Time,
    Elapsed { ticks: u32 },
    TickFreq,
    HeapInfo { record: u32 },
    Exit { reason: u32 },
}

impl Request {
    /// Decode a request.
    ///
    /// Arguments:
    /// - `op` - Operation from r0
    /// - `arg` - Value of r1
    /// - `words` - The argument block at `arg`, if `op` takes one (see
    ///   [`Operation::argument()`]).  Surplus words are ignored.
    pub fn from_block(op: Operation, arg: u32, words: &[u32]) -> Result<Self> {
        if let Argument::Block(len) = op.argument()
            && words.len() < len
        {
            return Err(Error::BufferTooSmall);
        }
        let handle = || FileHandle(words[0] as i32);

        let request = match op {
            Operation::WriteC => Request::WriteC { ch: words[0] as u8 },
            Operation::Write0 => Request::Write0 { string: arg },
            Operation::ReadC => Request::ReadC,
            Operation::GetCmdline => Request::GetCmdline {
                buf: words[0],
                size: words[1],
            },
            Operation::System => Request::System {
                cmd: words[0],
                len: words[1],
            },
            Operation::Open => Request::Open {
                path: words[0],
                mode: OpenMode::try_from(words[1])?,
                len: words[2],
            },
            Operation::Close => Request::Close { handle: handle() },
            Operation::Write => Request::Write {
                handle: handle(),
                buf: words[1],
                len: words[2],
            },
            Operation::Read => Request::Read {
                handle: handle(),
                buf: words[1],
                len: words[2],
            },
            Operation::Seek => Request::Seek {
                handle: handle(),
                pos: words[1],
            },
            Operation::Flen => Request::Flen { handle: handle() },
            Operation::IsTty => Request::IsTty { handle: handle() },
            Operation::IsError => Request::IsError {
                status: words[0] as i32,
            },
            Operation::Errno => Request::Errno,
            Operation::Remove => Request::Remove {
                path: words[0],
                len: words[1],
            },
            Operation::Rename => Request::Rename {
                from: words[0],
                from_len: words[1],
                to: words[2],
                to_len: words[3],
            },
            Operation::TmpNam => Request::TmpNam {
                buf: words[0],
                id: u8::try_from(words[1]).map_err(|_| Error::InvalidArgument)?,
                size: words[2],
            },
            Operation::Clock => Request::Clock,
            Operation::Time => Request::Time,
            Operation::Elapsed => Request::Elapsed { ticks: arg },
            Operation::TickFreq => Request::TickFreq,
            Operation::HeapInfo => Request::HeapInfo { record: words[0] },
            Operation::Exit => Request::Exit { reason: arg },
        };
        Ok(request)
    }

    pub fn operation(&self) -> Operation {
        match self {
            Request::WriteC { .. } => Operation::WriteC,
            Request::Write0 { .. } => Operation::Write0,
            Request::ReadC => Operation::ReadC,
            Request::GetCmdline { .. } => Operation::GetCmdline,
            Request::System { .. } => Operation::System,
            Request::Open { .. } => Operation::Open,
            Request::Close { .. } => Operation::Close,
            Request::Write { .. } => Operation::Write,
            Request::Read { .. } => Operation::Read,
            Request::Seek { .. } => Operation::Seek,
            Request::Flen { .. } => Operation::Flen,
            Request::IsTty { .. } => Operation::IsTty,
            Request::IsError { .. } => Operation::IsError,
            Request::Errno => Operation::Errno,
            Request::Remove { .. } => Operation::Remove,
            Request::Rename { .. } => Operation::Rename,
            Request::TmpNam { .. } => Operation::TmpNam,
            Request::Clock => Operation::Clock,
            Request::Time => Operation::Time,
            Request::Elapsed { .. } => Operation::Elapsed,
            Request::TickFreq => Operation::TickFreq,
            Request::HeapInfo { .. } => Operation::HeapInfo,
            Request::Exit { .. } => Operation::Exit,
        }
    }
}

/// Reply carrying a signed result in r0.
pub fn reply_i32(value: i32) -> u64 {
    value as u32 as u64
}

/// Reply reporting failure, -1 in r0.
pub const REPLY_FAILED: u64 = u32::MAX as u64;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_block() {
        let request = Request::from_block(Operation::Open, 0x2000_0000, &[0x2000_0100, 5, 13]);
        assert_eq!(
            request,
            Ok(Request::Open {
                path: 0x2000_0100,
                mode: OpenMode::WriteBinary,
                len: 13,
            })
        );
    }

    #[test]
    fn short_block_rejected() {
        assert_eq!(
            Request::from_block(Operation::Rename, 0x2000_0000, &[1, 2, 3]),
            Err(Error::BufferTooSmall)
        );
        assert_eq!(
            Request::from_block(Operation::Write, 0x2000_0000, &[]),
            Err(Error::BufferTooSmall)
        );
    }

    #[test]
    fn bad_values_rejected() {
        assert_eq!(
            Request::from_block(Operation::Open, 0, &[0x2000_0100, 12, 1]),
            Err(Error::InvalidArgument)
        );
        assert_eq!(
            Request::from_block(Operation::TmpNam, 0, &[0x2000_0100, 256, 16]),
            Err(Error::InvalidArgument)
        );
    }

    #[test]
    fn handles_are_signed() {
        let request = Request::from_block(Operation::Close, 0, &[0xFFFF_FFFF]).unwrap();
        assert_eq!(request, Request::Close { handle: FileHandle::INVALID });
    }

    #[test]
    fn immediate_arguments_use_r1() {
        assert_eq!(
            Request::from_block(Operation::Elapsed, 0x2000_0040, &[]),
            Ok(Request::Elapsed { ticks: 0x2000_0040 })
        );
        assert_eq!(
            Request::from_block(Operation::Exit, 0x20026, &[]),
            Ok(Request::Exit { reason: 0x20026 })
        );
        assert_eq!(Request::from_block(Operation::Clock, 0, &[]), Ok(Request::Clock));
    }

    #[test]
    fn operation_matches_decoded_op() {
        let request = Request::from_block(Operation::Seek, 0, &[3, 64]).unwrap();
        assert_eq!(request.operation(), Operation::Seek);
        let request = Request::from_block(Operation::TickFreq, 0, &[]).unwrap();
        assert_eq!(request.operation(), Operation::TickFreq);
    }

    #[test]
    fn signed_replies_are_32_bit() {
        assert_eq!(reply_i32(-1), REPLY_FAILED);
        assert_eq!(reply_i32(3), 3);
    }
}
