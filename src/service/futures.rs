//! Asynchronous semihosting server - typically used by a Host.

// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

use alloc::boxed::Box;
use alloc::vec;
use alloc::vec::Vec;
use async_trait::async_trait;
#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use crate::host::{FileHandle, OpenMode};
use crate::io::{Reader, Writer};
use crate::service::{MAX_BLOCK_WORDS, REPLY_FAILED, Request, reply_i32};
use crate::transport::{Argument, Operation, join_reply};
use crate::{Error, Result};

/// Services semihosting requests on the host.
///
/// Every method has a default which reports the operation as unsupported,
/// so implementations only provide what they serve.  Paths, commands and
/// payloads are raw bytes as read from the target, without the terminating
/// null.
#[async_trait(?Send)]
pub trait AsyncHostHandler {
    /// Console output, from WRITEC and WRITE0
    async fn write_console(&mut self, _data: &[u8]) {}

    /// Console input.  `None` if there is none.
    async fn read_console(&mut self) -> Option<u8> {
        None
    }

    /// Command line the target was started with
    async fn cmdline(&mut self) -> Option<Vec<u8>> {
        None
    }

    /// Run a command, returning its exit code
    async fn system(&mut self, _cmd: &[u8]) -> i32 {
        -1
    }

    async fn open(&mut self, _path: &[u8], _mode: OpenMode) -> FileHandle {
        FileHandle::INVALID
    }

    /// Returns 0 on success
    async fn close(&mut self, _handle: FileHandle) -> i32 {
        -1
    }

    /// Returns the number of bytes _not_ written
    async fn write(&mut self, _handle: FileHandle, data: &[u8]) -> usize {
        data.len()
    }

    /// Fills `buf` from its start.  Returns the number of bytes _not_ read
    async fn read(&mut self, _handle: FileHandle, buf: &mut [u8]) -> usize {
        buf.len()
    }

    /// Returns 0 on success
    async fn seek(&mut self, _handle: FileHandle, _pos: u32) -> i32 {
        -1
    }

    /// Returns the file length, or -1
    async fn flen(&mut self, _handle: FileHandle) -> i32 {
        -1
    }

    async fn is_tty(&mut self, _handle: FileHandle) -> bool {
        false
    }

    /// Whether `status`, returned by an earlier request, is an error
    async fn is_error(&mut self, status: i32) -> bool {
        status < 0
    }

    /// errno of the last failed request
    async fn errno(&mut self) -> i32 {
        0
    }

    /// Returns a host-specific status
    async fn remove(&mut self, _path: &[u8]) -> i32 {
        -1
    }

    /// Returns a host-specific status
    async fn rename(&mut self, _from: &[u8], _to: &[u8]) -> i32 {
        -1
    }

    /// Temporary file name for target-unique `id`
    async fn tmpnam(&mut self, _id: u8) -> Option<Vec<u8>> {
        None
    }

    /// Centiseconds since execution started
    async fn clock(&mut self) -> Option<u32> {
        None
    }

    /// Seconds since the Unix epoch
    async fn time(&mut self) -> u32 {
        0
    }

    /// Target ticks since execution started
    async fn elapsed(&mut self) -> Option<u64> {
        None
    }

    /// Ticks per second
    async fn tick_freq(&mut self) -> Option<u32> {
        None
    }

    /// Heap base, heap limit, stack base, stack limit
    async fn heap_info(&mut self) -> Option<[u32; 4]> {
        None
    }

    /// Application exit with an `ADP_Stopped_*` reason code
    async fn exit(&mut self, _reason: u32) {}
}

/// Server configuration.
#[derive(Debug, Clone, Copy)]
pub struct ServerConfig {
    /// Largest single buffer the server allocates for a transfer.  Writes
    /// are passed to the handler in slices of this size, reads are cut
    /// short and strings are truncated.
    pub max_transfer: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_transfer: 64 * 1024,
        }
    }
}

/// Async semihosting server.
///
/// Example usage:
///
/// ```rust,ignore
/// use semihost_cov::service::AsyncSemihostServer;
///
/// // Target halted on `bkpt 0xAB`
/// let (r0, r1) = (probe.read_core_reg(0).await?, probe.read_core_reg(1).await?);
/// let mut server = AsyncSemihostServer::new(&mut reader, &mut writer, &mut handler);
/// let reply = server.serve(r0, r1).await?;
/// probe.write_core_reg(0, reply as u32).await?;
/// probe.write_core_reg(1, (reply >> 32) as u32).await?;
/// // Step over the breakpoint and resume...
/// ```
pub struct AsyncSemihostServer<'a, R: Reader, W: Writer, H: AsyncHostHandler> {
    reader: &'a mut R,
    writer: &'a mut W,
    handler: &'a mut H,
    config: ServerConfig,
}

impl<'a, R: Reader, W: Writer, H: AsyncHostHandler> AsyncSemihostServer<'a, R, W, H> {
    /// Create a new server
    ///
    /// Arguments:
    /// - `reader`: Reader object to read from target memory
    /// - `writer`: Writer object to write to target memory
    /// - `handler`: Services the requests
    pub fn new(reader: &'a mut R, writer: &'a mut W, handler: &'a mut H) -> Self {
        Self::with_config(reader, writer, handler, ServerConfig::default())
    }

    pub fn with_config(
        reader: &'a mut R,
        writer: &'a mut W,
        handler: &'a mut H,
        config: ServerConfig,
    ) -> Self {
        Self {
            reader,
            writer,
            handler,
            config,
        }
    }

    /// Decode the request in r0/r1, reading its argument block from target
    /// memory.
    pub async fn decode(&mut self, command: u32, arg: u32) -> Result<Request> {
        let op = Operation::try_from(command)?;
        let mut words = [0u32; MAX_BLOCK_WORDS];
        let len = match op.argument() {
            Argument::Block(len) => {
                if !arg.is_multiple_of(4) {
                    return Err(Error::NotAligned);
                }
                let mut bytes = [0u8; MAX_BLOCK_WORDS * 4];
                self.read_mem(arg, &mut bytes[..len * 4]).await?;
                for (word, chunk) in words.iter_mut().zip(bytes[..len * 4].chunks_exact(4)) {
                    *word = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
                }
                len
            }
            Argument::Immediate | Argument::Ignored => 0,
        };
        Request::from_block(op, arg, &words[..len])
    }

    /// Service the request in r0/r1.
    ///
    /// Returns the reply to place in r0 (low word) and r1 (high word).
    /// Errors are local failures - reading or writing target memory, or a
    /// malformed request - and leave the target's request unanswered.
    /// Requests larger than [`ServerConfig::max_transfer`] are still
    /// answered, as a partial transfer or a failure reply.
    pub async fn serve(&mut self, command: u32, arg: u32) -> Result<u64> {
        let request = self.decode(command, arg).await?;
        trace!("Serving {request:?}");

        let reply = match request {
            Request::WriteC { ch } => {
                self.handler.write_console(&[ch]).await;
                0
            }
            Request::Write0 { string } => {
                let data = self.read_cstr(string).await?;
                self.handler.write_console(&data).await;
                0
            }
            Request::ReadC => match self.handler.read_console().await {
                Some(ch) => ch as u64,
                None => REPLY_FAILED,
            },
            Request::GetCmdline { buf, size } => self.serve_cmdline(arg, buf, size).await?,
            Request::System { cmd, len } => match self.read_string(cmd, len).await? {
                Some(cmd) => reply_i32(self.handler.system(&cmd).await),
                None => REPLY_FAILED,
            },
            Request::Open { path, mode, len } => match self.read_string(path, len).await? {
                Some(path) => {
                    let handle = self.handler.open(&path, mode).await;
                    debug!("Open {} ({}) = {}", path.escape_ascii(), mode.as_str(), handle.0);
                    reply_i32(handle.0)
                }
                None => reply_i32(FileHandle::INVALID.0),
            },
            Request::Close { handle } => reply_i32(self.handler.close(handle).await),
            Request::Write { handle, buf, len } => self.serve_write(handle, buf, len).await?,
            Request::Read { handle, buf, len } => {
                let len = len as usize;
                if len > self.config.max_transfer {
                    warn!(
                        "Read of {len} bytes cut to {} byte limit",
                        self.config.max_transfer
                    );
                }
                let mut data = vec![0u8; len.min(self.config.max_transfer)];
                let remainder = self.handler.read(handle, &mut data).await.min(data.len());
                let read = data.len() - remainder;
                self.write_mem(buf, &data[..read]).await?;
                (len - read) as u64
            }
            Request::Seek { handle, pos } => reply_i32(self.handler.seek(handle, pos).await),
            Request::Flen { handle } => reply_i32(self.handler.flen(handle).await),
            Request::IsTty { handle } => self.handler.is_tty(handle).await as u64,
            Request::IsError { status } => self.handler.is_error(status).await as u64,
            Request::Errno => reply_i32(self.handler.errno().await),
            Request::Remove { path, len } => match self.read_string(path, len).await? {
                Some(path) => reply_i32(self.handler.remove(&path).await),
                None => REPLY_FAILED,
            },
            Request::Rename {
                from,
                from_len,
                to,
                to_len,
            } => {
                let from = self.read_string(from, from_len).await?;
                let to = self.read_string(to, to_len).await?;
                match (from, to) {
                    (Some(from), Some(to)) => reply_i32(self.handler.rename(&from, &to).await),
                    _ => REPLY_FAILED,
                }
            }
            Request::TmpNam { buf, id, size } => match self.handler.tmpnam(id).await {
                Some(name) if name.len() < size as usize => {
                    self.write_cstr(buf, &name).await?;
                    0
                }
                _ => REPLY_FAILED,
            },
            Request::Clock => self.handler.clock().await.map_or(REPLY_FAILED, u64::from),
            Request::Time => self.handler.time().await as u64,
            Request::Elapsed { ticks } => match self.handler.elapsed().await {
                Some(elapsed) => {
                    self.write_mem(ticks, &elapsed.to_le_bytes()).await?;
                    0
                }
                None => REPLY_FAILED,
            },
            Request::TickFreq => self
                .handler
                .tick_freq()
                .await
                .map_or(REPLY_FAILED, u64::from),
            Request::HeapInfo { record } => match self.handler.heap_info().await {
                Some(fields) => {
                    let mut bytes = [0u8; 16];
                    for (chunk, field) in bytes.chunks_exact_mut(4).zip(fields) {
                        chunk.copy_from_slice(&field.to_le_bytes());
                    }
                    self.write_mem(record, &bytes).await?;
                    0
                }
                None => REPLY_FAILED,
            },
            Request::Exit { reason } => {
                debug!("Target exit, reason {reason:#X}");
                self.handler.exit(reason).await;
                0
            }
        };

        trace!("Reply {:?} = {reply:#018X}", request.operation());
        Ok(reply)
    }
}

// Internal functions
impl<R: Reader, W: Writer, H: AsyncHostHandler> AsyncSemihostServer<'_, R, W, H> {
    // The command line goes in the target's buffer, null-terminated.  Its
    // length is returned in r1, and also in the block's size word.
    async fn serve_cmdline(&mut self, block: u32, buf: u32, size: u32) -> Result<u64> {
        let Some(line) = self.handler.cmdline().await else {
            return Ok(REPLY_FAILED);
        };
        if line.len() >= size as usize {
            warn!(
                "Command line ({} bytes) too long for {size} byte target buffer",
                line.len()
            );
            return Ok(REPLY_FAILED);
        }
        self.write_cstr(buf, &line).await?;
        let len = line.len() as u32;
        self.write_mem(block.wrapping_add(4), &len.to_le_bytes())
            .await?;
        Ok(join_reply(0, len))
    }

    // Passed to the handler a slice at a time, stopping at the first slice
    // it doesn't take all of.  The reply is the bytes not written.
    async fn serve_write(&mut self, handle: FileHandle, buf: u32, len: u32) -> Result<u64> {
        let step = u32::try_from(self.config.max_transfer)
            .unwrap_or(u32::MAX)
            .max(1);
        let mut written = 0u32;
        while written < len {
            let slice = (len - written).min(step);
            let data = self.read_bytes(buf.wrapping_add(written), slice).await?;
            let remainder = self.handler.write(handle, &data).await.min(data.len());
            written += slice - remainder as u32;
            if remainder != 0 {
                break;
            }
        }
        Ok((len - written) as u64)
    }

    // `None` if longer than the transfer limit.
    async fn read_string(&mut self, addr: u32, len: u32) -> Result<Option<Vec<u8>>> {
        if len as usize > self.config.max_transfer {
            warn!(
                "String of {len} bytes at {addr:#010X} exceeds {} byte limit",
                self.config.max_transfer
            );
            return Ok(None);
        }
        self.read_bytes(addr, len).await.map(Some)
    }

    async fn read_bytes(&mut self, addr: u32, len: u32) -> Result<Vec<u8>> {
        let mut data = vec![0u8; len as usize];
        if !data.is_empty() {
            self.read_mem(addr, &mut data).await?;
        }
        Ok(data)
    }

    // Reads in small chunks, as the string's length is unknown and reading
    // past the end of RAM would fault.
    async fn read_cstr(&mut self, start: u32) -> Result<Vec<u8>> {
        const CHUNK: u32 = 16;
        let mut data = Vec::new();
        let mut scratch = [0u8; CHUNK as usize];
        loop {
            let addr = start.wrapping_add(data.len() as u32);
            let in_chunk = CHUNK - addr % CHUNK;
            let chunk = &mut scratch[..in_chunk as usize];
            self.read_mem(addr, chunk).await?;
            let nul = chunk.iter().position(|&b| b == 0);
            data.extend_from_slice(&chunk[..nul.unwrap_or(chunk.len())]);
            if data.len() > self.config.max_transfer
                || (nul.is_none() && data.len() == self.config.max_transfer)
            {
                warn!(
                    "String at {start:#010X} truncated to {} byte limit",
                    self.config.max_transfer
                );
                data.truncate(self.config.max_transfer);
                return Ok(data);
            }
            if nul.is_some() {
                return Ok(data);
            }
        }
    }

    async fn write_cstr(&mut self, addr: u32, data: &[u8]) -> Result<()> {
        let mut terminated = Vec::with_capacity(data.len() + 1);
        terminated.extend_from_slice(data);
        terminated.push(0);
        self.write_mem(addr, &terminated).await
    }

    async fn read_mem(&mut self, addr: u32, buf: &mut [u8]) -> Result<()> {
        let len = buf.len();
        self.reader.read(addr, buf).await.map_err(|e| {
            debug!("Target read of {len} bytes at {addr:#010X} failed: {e:?}");
            Error::Io
        })
    }

    async fn write_mem(&mut self, addr: u32, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        self.writer.write(addr, data).await.map_err(|e| {
            debug!("Target write of {} bytes at {addr:#010X} failed: {e:?}", data.len());
            Error::Io
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use futures::executor::block_on;

    use super::*;
    use crate::transport::split_reply;

    const RAM_BASE: u32 = 0x2000_0000;
    const BLOCK: u32 = RAM_BASE;
    const STRINGS: u32 = RAM_BASE + 0x100;
    const BUFFER: u32 = RAM_BASE + 0x200;

    /// In-memory image of the target's RAM, shared by the reader and writer
    #[derive(Clone)]
    struct TargetRam(Arc<Mutex<Vec<u8>>>);

    impl TargetRam {
        fn new() -> Self {
            Self(Arc::new(Mutex::new([0u8; 0x400].to_vec())))
        }

        fn range(addr: u32, len: usize) -> core::result::Result<core::ops::Range<usize>, ()> {
            let start = addr.checked_sub(RAM_BASE).ok_or(())? as usize;
            if start + len > 0x400 {
                return Err(());
            }
            Ok(start..start + len)
        }

        fn put(&self, addr: u32, data: &[u8]) {
            let range = Self::range(addr, data.len()).unwrap();
            self.0.lock().unwrap()[range].copy_from_slice(data);
        }

        fn put_words(&self, addr: u32, words: &[u32]) {
            let bytes: Vec<u8> = words.iter().flat_map(|w| w.to_le_bytes()).collect();
            self.put(addr, &bytes);
        }

        fn get(&self, addr: u32, len: usize) -> Vec<u8> {
            let range = Self::range(addr, len).unwrap();
            self.0.lock().unwrap()[range].to_vec()
        }
    }

    impl Reader for TargetRam {
        type Error = ();

        fn read(
            &mut self,
            addr: u32,
            buf: &mut [u8],
        ) -> impl core::future::Future<Output = core::result::Result<(), ()>> + Send {
            let result = Self::range(addr, buf.len())
                .map(|range| buf.copy_from_slice(&self.0.lock().unwrap()[range]));
            core::future::ready(result)
        }
    }

    impl Writer for TargetRam {
        type Error = ();

        fn write(
            &mut self,
            addr: u32,
            data: &[u8],
        ) -> impl core::future::Future<Output = core::result::Result<(), ()>> + Send {
            let result = Self::range(addr, data.len())
                .map(|range| self.0.lock().unwrap()[range].copy_from_slice(data));
            core::future::ready(result)
        }
    }

    #[derive(Default)]
    struct RecordingHandler {
        console: Vec<u8>,
        opened: Vec<(Vec<u8>, OpenMode)>,
        file: Vec<u8>,
        accept: Option<usize>,
        write_calls: usize,
        cmdline: Option<Vec<u8>>,
    }

    #[async_trait(?Send)]
    impl AsyncHostHandler for RecordingHandler {
        async fn write_console(&mut self, data: &[u8]) {
            self.console.extend_from_slice(data);
        }

        async fn cmdline(&mut self) -> Option<Vec<u8>> {
            self.cmdline.clone()
        }

        async fn open(&mut self, path: &[u8], mode: OpenMode) -> FileHandle {
            self.opened.push((path.to_vec(), mode));
            FileHandle(3)
        }

        async fn close(&mut self, handle: FileHandle) -> i32 {
            if handle == FileHandle(3) { 0 } else { -1 }
        }

        async fn write(&mut self, _handle: FileHandle, data: &[u8]) -> usize {
            self.write_calls += 1;
            let accepted = self.accept.unwrap_or(data.len()).min(data.len());
            self.file.extend_from_slice(&data[..accepted]);
            data.len() - accepted
        }

        async fn read(&mut self, _handle: FileHandle, buf: &mut [u8]) -> usize {
            let len = self.file.len().min(buf.len());
            buf[..len].copy_from_slice(&self.file[..len]);
            buf.len() - len
        }

        async fn elapsed(&mut self) -> Option<u64> {
            Some(0x0000_0001_8000_0000)
        }

        async fn heap_info(&mut self) -> Option<[u32; 4]> {
            Some([0x2000_1000, 0x2000_4000, 0x2000_5000, 0x2000_4800])
        }
    }

    fn serve(ram: &TargetRam, handler: &mut RecordingHandler, op: Operation, arg: u32) -> Result<u64> {
        let (mut reader, mut writer) = (ram.clone(), ram.clone());
        let mut server = AsyncSemihostServer::new(&mut reader, &mut writer, handler);
        block_on(server.serve(op.into(), arg))
    }

    fn serve_limited(
        ram: &TargetRam,
        handler: &mut RecordingHandler,
        op: Operation,
        arg: u32,
        max_transfer: usize,
    ) -> Result<u64> {
        let (mut reader, mut writer) = (ram.clone(), ram.clone());
        let config = ServerConfig { max_transfer };
        let mut server = AsyncSemihostServer::with_config(&mut reader, &mut writer, handler, config);
        block_on(server.serve(op.into(), arg))
    }

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| i as u8).collect()
    }

    #[test]
    fn open_reads_path_from_block() {
        let ram = TargetRam::new();
        ram.put(STRINGS, b"build/coverage.bin\0");
        ram.put_words(BLOCK, &[STRINGS, OpenMode::WriteBinary as u32, 18]);
        let mut handler = RecordingHandler::default();

        let reply = serve(&ram, &mut handler, Operation::Open, BLOCK).unwrap();
        assert_eq!(reply, 3);
        assert_eq!(
            handler.opened,
            [(b"build/coverage.bin".to_vec(), OpenMode::WriteBinary)]
        );
    }

    #[test]
    fn write_reports_remainder() {
        let ram = TargetRam::new();
        ram.put(BUFFER, b"gcda-bytes");
        ram.put_words(BLOCK, &[3, BUFFER, 10]);
        let mut handler = RecordingHandler {
            accept: Some(4),
            ..Default::default()
        };

        let reply = serve(&ram, &mut handler, Operation::Write, BLOCK).unwrap();
        assert_eq!(reply, 6);
        assert_eq!(handler.file, b"gcda");
    }

    #[test]
    fn read_writes_target_buffer() {
        let ram = TargetRam::new();
        ram.put_words(BLOCK, &[3, BUFFER, 8]);
        let mut handler = RecordingHandler {
            file: b"abc".to_vec(),
            ..Default::default()
        };

        let reply = serve(&ram, &mut handler, Operation::Read, BLOCK).unwrap();
        assert_eq!(reply, 5);
        assert_eq!(ram.get(BUFFER, 4), b"abc\0");
    }

    #[test]
    fn close_status_is_32_bit() {
        let ram = TargetRam::new();
        let mut handler = RecordingHandler::default();

        ram.put_words(BLOCK, &[3]);
        assert_eq!(serve(&ram, &mut handler, Operation::Close, BLOCK), Ok(0));
        ram.put_words(BLOCK, &[0xFFFF_FFFF]);
        assert_eq!(
            serve(&ram, &mut handler, Operation::Close, BLOCK),
            Ok(0xFFFF_FFFF)
        );
    }

    #[test]
    fn cmdline_length_in_high_word() {
        let ram = TargetRam::new();
        ram.put_words(BLOCK, &[BUFFER, 64]);
        let mut handler = RecordingHandler {
            cmdline: Some(b"firmware.elf --dump".to_vec()),
            ..Default::default()
        };

        let reply = serve(&ram, &mut handler, Operation::GetCmdline, BLOCK).unwrap();
        assert_eq!(split_reply(reply), (0, 19));
        assert_eq!(ram.get(BUFFER, 20), b"firmware.elf --dump\0");
        assert_eq!(ram.get(BLOCK + 4, 4), 19u32.to_le_bytes());
    }

    #[test]
    fn cmdline_too_long_fails() {
        let ram = TargetRam::new();
        ram.put_words(BLOCK, &[BUFFER, 8]);
        let mut handler = RecordingHandler {
            cmdline: Some(b"firmware.elf".to_vec()),
            ..Default::default()
        };

        let reply = serve(&ram, &mut handler, Operation::GetCmdline, BLOCK).unwrap();
        assert_ne!(split_reply(reply).0, 0);
        assert_eq!(ram.get(BUFFER, 8), [0u8; 8]);
    }

    #[test]
    fn write0_reads_until_null() {
        let ram = TargetRam::new();
        let text = b"a string spanning several sixteen byte chunks\0";
        ram.put(STRINGS + 3, text);
        let mut handler = RecordingHandler::default();

        assert_eq!(serve(&ram, &mut handler, Operation::Write0, STRINGS + 3), Ok(0));
        assert_eq!(handler.console, &text[..text.len() - 1]);
    }

    #[test]
    fn elapsed_and_heap_info_written_back() {
        let ram = TargetRam::new();
        let mut handler = RecordingHandler::default();

        assert_eq!(serve(&ram, &mut handler, Operation::Elapsed, BUFFER), Ok(0));
        assert_eq!(ram.get(BUFFER, 8), 0x0000_0001_8000_0000u64.to_le_bytes());

        ram.put_words(BLOCK, &[BUFFER + 0x10]);
        assert_eq!(serve(&ram, &mut handler, Operation::HeapInfo, BLOCK), Ok(0));
        assert_eq!(ram.get(BUFFER + 0x10, 4), 0x2000_1000u32.to_le_bytes());
        assert_eq!(ram.get(BUFFER + 0x1C, 4), 0x2000_4800u32.to_le_bytes());
    }

    #[test]
    fn unsupported_operations_report_failure() {
        let ram = TargetRam::new();
        let mut handler = RecordingHandler::default();
        assert_eq!(serve(&ram, &mut handler, Operation::Clock, 0), Ok(REPLY_FAILED));
        assert_eq!(serve(&ram, &mut handler, Operation::TickFreq, 0), Ok(REPLY_FAILED));
        assert_eq!(serve(&ram, &mut handler, Operation::ReadC, 0), Ok(REPLY_FAILED));
    }

    #[test]
    fn malformed_requests_rejected() {
        let ram = TargetRam::new();
        let mut handler = RecordingHandler::default();
        let (mut reader, mut writer) = (ram.clone(), ram.clone());
        let mut server = AsyncSemihostServer::new(&mut reader, &mut writer, &mut handler);

        assert_eq!(block_on(server.serve(0x14, BLOCK)), Err(Error::UnknownOperation));
        assert_eq!(
            block_on(server.serve(Operation::Open.into(), BLOCK + 2)),
            Err(Error::NotAligned)
        );
        assert_eq!(
            block_on(server.serve(Operation::Close.into(), 0x1000_0000)),
            Err(Error::Io)
        );
    }

    #[test]
    fn oversized_write_served_in_slices() {
        let ram = TargetRam::new();
        ram.put(BUFFER, &pattern(0x100));
        ram.put_words(BLOCK, &[3, BUFFER, 0x100]);
        let mut handler = RecordingHandler::default();

        let reply = serve_limited(&ram, &mut handler, Operation::Write, BLOCK, 0x80);
        assert_eq!(reply, Ok(0));
        assert_eq!(handler.file, pattern(0x100));
        assert_eq!(handler.write_calls, 2);
    }

    #[test]
    fn oversized_write_reports_remainder() {
        let ram = TargetRam::new();
        ram.put(BUFFER, &pattern(0x100));
        ram.put_words(BLOCK, &[3, BUFFER, 0x100]);
        let mut handler = RecordingHandler {
            accept: Some(0x10),
            ..Default::default()
        };

        let reply = serve_limited(&ram, &mut handler, Operation::Write, BLOCK, 0x80);
        assert_eq!(reply, Ok(0xF0));
        assert_eq!(handler.file, &pattern(0x100)[..0x10]);
        assert_eq!(handler.write_calls, 1);
    }

    #[test]
    fn oversized_read_cut_short() {
        let ram = TargetRam::new();
        ram.put_words(BLOCK, &[3, BUFFER, 0x100]);
        let mut handler = RecordingHandler {
            file: pattern(0x100),
            ..Default::default()
        };

        let reply = serve_limited(&ram, &mut handler, Operation::Read, BLOCK, 0x80);
        assert_eq!(reply, Ok(0x80));
        assert_eq!(ram.get(BUFFER, 0x80), &pattern(0x100)[..0x80]);
        assert_eq!(ram.get(BUFFER + 0x80, 0x80), [0u8; 0x80]);
    }

    #[test]
    fn long_console_string_truncated() {
        let ram = TargetRam::new();
        ram.put(STRINGS, b"coverage dump complete for all records\0");
        let mut handler = RecordingHandler::default();

        let reply = serve_limited(&ram, &mut handler, Operation::Write0, STRINGS, 0x10);
        assert_eq!(reply, Ok(0));
        assert_eq!(handler.console, b"coverage dump co");
    }

    #[test]
    fn long_path_fails_open() {
        let ram = TargetRam::new();
        ram.put(STRINGS, b"build/coverage/firmware.bin\0");
        ram.put_words(BLOCK, &[STRINGS, OpenMode::WriteBinary as u32, 27]);
        let mut handler = RecordingHandler::default();

        let reply = serve_limited(&ram, &mut handler, Operation::Open, BLOCK, 0x10);
        assert_eq!(reply, Ok(REPLY_FAILED));
        assert!(handler.opened.is_empty());
    }
}
