//! Byte stream over a host file handle.

// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use crate::host::{FileHandle, Host};
use crate::transport::Transport;
use crate::{Error, Result};

/// Stream writing to a host file handle.
///
/// Unlike [`Host::write()`], [`Self::write_all()`] keeps writing until all
/// data has been accepted by the host, or the host stops accepting it.
///
/// ```rust,ignore
/// use core::fmt::Write;
///
/// let mut host = Host::new(&mut transport);
/// writeln!(host.stdout(), "{} records dumped", count).ok();
/// ```
pub struct HostStream<'h, 'a, T: Transport> {
    host: &'h mut Host<'a, T>,
    handle: FileHandle,
}

impl<'h, 'a, T: Transport> HostStream<'h, 'a, T> {
    pub fn new(host: &'h mut Host<'a, T>, handle: FileHandle) -> Self {
        Self { host, handle }
    }

    pub fn handle(&self) -> FileHandle {
        self.handle
    }

    /// Write all of `data`.
    ///
    /// Returns [`Error::Io`] if a write transfers nothing.
    pub fn write_all(&mut self, mut data: &[u8]) -> Result<()> {
        while !data.is_empty() {
            let remainder = self.host.write(self.handle, data);
            if remainder >= data.len() {
                warn!(
                    "Handle {} accepted none of {} bytes",
                    self.handle.0,
                    data.len()
                );
                return Err(Error::Io);
            }
            data = &data[data.len() - remainder..];
        }
        Ok(())
    }
}

impl<T: Transport> core::fmt::Write for HostStream<'_, '_, T> {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        self.write_all(s.as_bytes()).map_err(|_| core::fmt::Error)
    }
}
