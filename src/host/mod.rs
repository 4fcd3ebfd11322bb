//! Typed semihosting operations, typically used by a Target.
//!
//! Each operation packs its argument block on the stack, issues a single
//! request through a [`Transport`] and decodes the reply.  Argument blocks
//! are arrays of target words, laid out exactly as the debug host expects
//! them - see [`Operation::argument()`] for the word counts.
//!
//! Failures are reported the way the host reports them:
//! - [`Host::open()`] returns [`FileHandle::INVALID`]
//! - [`Host::read()`] and [`Host::write()`] return the number of bytes
//!   _not_ transferred
//! - [`Host::remove()`] and [`Host::rename()`] return a host-specific status
//!   which must be passed to [`Host::is_error()`] to be interpreted
//!
//! Nothing is retried, and no errno translation is done.  Use
//! [`Host::errno()`] for the reason a request failed.
//!
//! Every operation blocks until the debug host replies.

// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

pub mod stream;

pub use stream::HostStream;

use core::ffi::{CStr, c_void};
#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use crate::transport::{Operation, Transport, split_reply};
use crate::{Error, Result};

/// File handle on the debug host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHandle(pub i32);

impl FileHandle {
    /// Standard input, valid without an open
    pub const STDIN: FileHandle = FileHandle(0);
    /// Standard output, valid without an open
    pub const STDOUT: FileHandle = FileHandle(1);
    /// Standard error, valid without an open
    pub const STDERR: FileHandle = FileHandle(2);
    /// Returned by a failed open
    pub const INVALID: FileHandle = FileHandle(-1);

    pub fn is_valid(&self) -> bool {
        *self != Self::INVALID
    }

    fn word(&self) -> usize {
        signed_word(self.0)
    }
}

/// File access mode passed to [`Host::open()`], as an index into the ISO C
/// `fopen()` mode strings.
#[repr(u32)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// `r`
    Read = 0,
    /// `rb`
    ReadBinary = 1,
    /// `r+`
    ReadUpdate = 2,
    /// `r+b`
    ReadUpdateBinary = 3,
    /// `w`
    Write = 4,
    /// `wb`
    #[default]
    WriteBinary = 5,
    /// `w+`
    WriteUpdate = 6,
    /// `w+b`
    WriteUpdateBinary = 7,
    /// `a`
    Append = 8,
    /// `ab`
    AppendBinary = 9,
    /// `a+`
    AppendUpdate = 10,
    /// `a+b`
    AppendUpdateBinary = 11,
}

impl OpenMode {
    /// `fopen()` mode string for this mode
    pub fn as_str(&self) -> &'static str {
        match self {
            OpenMode::Read => "r",
            OpenMode::ReadBinary => "rb",
            OpenMode::ReadUpdate => "r+",
            OpenMode::ReadUpdateBinary => "r+b",
            OpenMode::Write => "w",
            OpenMode::WriteBinary => "wb",
            OpenMode::WriteUpdate => "w+",
            OpenMode::WriteUpdateBinary => "w+b",
            OpenMode::Append => "a",
            OpenMode::AppendBinary => "ab",
            OpenMode::AppendUpdate => "a+",
            OpenMode::AppendUpdateBinary => "a+b",
        }
    }
}

impl TryFrom<u32> for OpenMode {
    type Error = Error;

    fn try_from(value: u32) -> Result<Self> {
        let mode = match value {
            0 => OpenMode::Read,
            1 => OpenMode::ReadBinary,
            2 => OpenMode::ReadUpdate,
            3 => OpenMode::ReadUpdateBinary,
            4 => OpenMode::Write,
            5 => OpenMode::WriteBinary,
            6 => OpenMode::WriteUpdate,
            7 => OpenMode::WriteUpdateBinary,
            8 => OpenMode::Append,
            9 => OpenMode::AppendBinary,
            10 => OpenMode::AppendUpdate,
            11 => OpenMode::AppendUpdateBinary,
            _ => return Err(Error::InvalidArgument),
        };
        Ok(mode)
    }
}

/// Heap and stack placement, filled in by the debug host.
///
/// Only meaningful if every field is non-null, see [`Self::is_valid()`].
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeapInfo {
    pub heap_base: *mut c_void,
    pub heap_limit: *mut c_void,
    pub stack_base: *mut c_void,
    pub stack_limit: *mut c_void,
}

impl Default for HeapInfo {
    fn default() -> Self {
        Self {
            heap_base: core::ptr::null_mut(),
            heap_limit: core::ptr::null_mut(),
            stack_base: core::ptr::null_mut(),
            stack_limit: core::ptr::null_mut(),
        }
    }
}

impl HeapInfo {
    /// The host may report success without populating the record, so
    /// validity is decided by the fields themselves.
    pub fn is_valid(&self) -> bool {
        !self.heap_base.is_null()
            && !self.heap_limit.is_null()
            && !self.stack_base.is_null()
            && !self.stack_limit.is_null()
    }
}

/// Reason reported to the host by [`Host::exit()`].
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// `ADP_Stopped_RunTimeErrorUnknown`
    RunTimeError = 0x20023,
    /// `ADP_Stopped_ApplicationExit`
    ApplicationExit = 0x20026,
}

/// Reply to the clock and tick frequency requests on error.
const ALL_ONES: u32 = u32::MAX;

/// Semihosting operations over a [`Transport`].
///
/// Borrows the transport for its lifetime, so only one request can be in
/// flight.
pub struct Host<'a, T: Transport> {
    transport: &'a mut T,
}

impl<'a, T: Transport> Host<'a, T> {
    pub fn new(transport: &'a mut T) -> Self {
        Self { transport }
    }

    /// Issue a raw request, for operations this type doesn't wrap (such as
    /// vendor-specific operations).
    pub fn request(&mut self, command: u32, arg: usize) -> u64 {
        trace!("Semihosting request {command:#04X} arg {arg:#010X}");
        let reply = self.transport.request(command, arg);
        trace!("Semihosting reply {command:#04X} = {reply:#018X}");
        reply
    }

    /// Write a character to the debug console.
    pub fn write_c(&mut self, c: u8) {
        self.call(Operation::WriteC, &[c as usize]);
    }

    /// Write a string to the debug console.
    pub fn write0(&mut self, s: &CStr) {
        self.op(Operation::Write0, s.as_ptr() as usize);
    }

    /// Read a character from the debug console.  Blocks until one is typed.
    pub fn read_c(&mut self) -> u8 {
        self.op(Operation::ReadC, 0) as u8
    }

    /// Get the command line the host started the target with, into `buf`.
    ///
    /// Returns the length of the command line, or 0 on failure.
    pub fn get_cmdline(&mut self, buf: &mut [u8]) -> usize {
        let block = [buf.as_mut_ptr() as usize, buf.len()];
        let (status, len) = split_reply(self.call(Operation::GetCmdline, &block));
        if status == 0 { len as usize } else { 0 }
    }

    /// Run `cmd` in a host shell.
    ///
    /// Returns the command's exit code.  Note the command runs on the host,
    /// with the host user's privileges.
    pub fn system(&mut self, cmd: &CStr) -> i32 {
        let block = [cmd.as_ptr() as usize, cmd.count_bytes()];
        self.call(Operation::System, &block) as i32
    }

    /// Open a file on the host.
    ///
    /// Returns [`FileHandle::INVALID`] on failure.
    pub fn open(&mut self, path: &CStr, mode: OpenMode) -> FileHandle {
        let block = [path.as_ptr() as usize, mode as usize, path.count_bytes()];
        let handle = FileHandle(self.call(Operation::Open, &block) as i32);
        debug!("Opened {path:?} mode {} handle {}", mode.as_str(), handle.0);
        handle
    }

    /// Close a handle.  Returns whether the host closed it.
    pub fn close(&mut self, handle: FileHandle) -> bool {
        let closed = self.call(Operation::Close, &[handle.word()]) as u32 == 0;
        debug!("Closed handle {} ok {closed}", handle.0);
        closed
    }

    /// Write `data` to a file.
    ///
    /// Returns the number of bytes not written, 0 on success.
    pub fn write(&mut self, handle: FileHandle, data: &[u8]) -> usize {
        let block = [handle.word(), data.as_ptr() as usize, data.len()];
        self.call(Operation::Write, &block) as u32 as usize
    }

    /// Read from a file into `buf`.
    ///
    /// Returns the number of bytes not read, 0 if `buf` was filled.
    pub fn read(&mut self, handle: FileHandle, buf: &mut [u8]) -> usize {
        let block = [handle.word(), buf.as_mut_ptr() as usize, buf.len()];
        self.call(Operation::Read, &block) as u32 as usize
    }

    /// Seek to absolute byte position `pos`.  Returns whether it succeeded.
    pub fn seek(&mut self, handle: FileHandle, pos: u32) -> bool {
        self.call(Operation::Seek, &[handle.word(), pos as usize]) as u32 == 0
    }

    /// Length of a file in bytes, `None` if the host couldn't determine it.
    pub fn flen(&mut self, handle: FileHandle) -> Option<u32> {
        let len = self.call(Operation::Flen, &[handle.word()]) as i32;
        u32::try_from(len).ok()
    }

    /// Whether the handle is an interactive device.
    pub fn is_tty(&mut self, handle: FileHandle) -> bool {
        self.call(Operation::IsTty, &[handle.word()]) as u32 == 1
    }

    /// Host errno value from the last failed request.
    pub fn errno(&mut self) -> i32 {
        self.op(Operation::Errno, 0) as i32
    }

    /// Delete a file on the host.  Returns a host-specific status, see
    /// [`Self::is_error()`].
    pub fn remove(&mut self, path: &CStr) -> i32 {
        let block = [path.as_ptr() as usize, path.count_bytes()];
        self.call(Operation::Remove, &block) as i32
    }

    /// Rename a file on the host.  Returns a host-specific status, see
    /// [`Self::is_error()`].
    pub fn rename(&mut self, from: &CStr, to: &CStr) -> i32 {
        let block = [
            from.as_ptr() as usize,
            from.count_bytes(),
            to.as_ptr() as usize,
            to.count_bytes(),
        ];
        self.call(Operation::Rename, &block) as i32
    }

    /// Get a temporary file name for target-unique `id` into `buf`.
    pub fn tmpnam(&mut self, buf: &mut [u8], id: u8) -> bool {
        let block = [buf.as_mut_ptr() as usize, id as usize, buf.len()];
        self.call(Operation::TmpNam, &block) as u32 == 0
    }

    /// Whether a host-specific status code indicates an error.
    pub fn is_error(&mut self, status: i32) -> bool {
        self.call(Operation::IsError, &[signed_word(status)]) as u32 != 0
    }

    /// Centiseconds since execution started.
    pub fn clock(&mut self) -> Option<u32> {
        all_ones_is_error(self.op(Operation::Clock, 0) as u32)
    }

    /// Seconds since the Unix epoch, as seen by the host.
    pub fn time(&mut self) -> u32 {
        self.op(Operation::Time, 0) as u32
    }

    /// Target ticks since execution started.  See [`Self::tick_freq()`].
    pub fn elapsed(&mut self) -> Option<u64> {
        let mut ticks = 0u64;
        let status = self.op(Operation::Elapsed, (&raw mut ticks) as usize) as u32;
        if status == 0 { Some(ticks) } else { None }
    }

    /// Ticks per second for [`Self::elapsed()`].
    pub fn tick_freq(&mut self) -> Option<u32> {
        all_ones_is_error(self.op(Operation::TickFreq, 0) as u32)
    }

    /// Heap and stack placement.  `None` unless the host filled in all
    /// four fields.
    pub fn heap_info(&mut self) -> Option<HeapInfo> {
        let mut info = HeapInfo::default();
        self.call(Operation::HeapInfo, &[(&raw mut info) as usize]);
        if info.is_valid() { Some(info) } else { None }
    }

    /// Report to the host that the application has stopped.  Most hosts end
    /// the debug session, so this is not expected to return.
    pub fn exit(&mut self, reason: ExitReason) {
        debug!("Exit {reason:?}");
        self.op(Operation::Exit, reason as usize);
    }

    /// Stream over standard output.
    pub fn stdout(&mut self) -> HostStream<'_, 'a, T> {
        HostStream::new(self, FileHandle::STDOUT)
    }

    /// Stream over standard error.
    pub fn stderr(&mut self) -> HostStream<'_, 'a, T> {
        HostStream::new(self, FileHandle::STDERR)
    }
}

// Internal functions
impl<T: Transport> Host<'_, T> {
    fn op(&mut self, op: Operation, arg: usize) -> u64 {
        self.request(op.into(), arg)
    }

    fn call<const N: usize>(&mut self, op: Operation, block: &[usize; N]) -> u64 {
        self.op(op, block.as_ptr() as usize)
    }
}

// Target words are 32 bits, sign bits must not spill into a wider usize.
fn signed_word(value: i32) -> usize {
    value as u32 as usize
}

fn all_ones_is_error(value: u32) -> Option<u32> {
    if value == ALL_ONES { None } else { Some(value) }
}
