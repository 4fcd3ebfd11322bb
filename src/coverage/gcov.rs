//! Binding to GCC's gcov runtime.
//!
//! Requires the instrumented C (or Rust, via a C shim) objects to be built
//! with `--coverage -fprofile-info-section`, which makes the compiler
//! place a pointer to every translation unit's `gcov_info` in the
//! `.gcov_info` section.  The linker script must bound that section:
//!
//! ```text
//! .gcov_info :
//! {
//!     PROVIDE(__gcov_info_start = .);
//!     KEEP(*(.gcov_info))
//!     PROVIDE(__gcov_info_end = .);
//! } > FLASH
//! ```
//!
//! The runtime's stream format (a filename record then a gcda record per
//! translation unit) is turned back into `.gcda` files on the host with
//! `gcov-tool merge-stream`.

// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

use core::ffi::{c_char, c_uint, c_void};
use core::marker::{PhantomData, PhantomPinned};

use crate::coverage::{ChunkSink, CoverageRuntime};

/// Opaque `struct gcov_info`, owned by the gcov runtime.
#[repr(C)]
pub struct GcovInfo {
    _data: [u8; 0],
    _marker: PhantomData<(*mut u8, PhantomPinned)>,
}

// Only ever handed back to the runtime, never accessed through this type.
unsafe impl Sync for GcovInfo {}

type DumpFn = unsafe extern "C" fn(data: *const c_void, len: c_uint, arg: *mut c_void);
type FilenameFn = unsafe extern "C" fn(filename: *const c_char, arg: *mut c_void);
type AllocateFn = unsafe extern "C" fn(size: c_uint, arg: *mut c_void) -> *mut c_void;

unsafe extern "C" {
    fn __gcov_reset();

    fn __gcov_info_to_gcda(
        info: *const GcovInfo,
        filename_fn: FilenameFn,
        dump_fn: DumpFn,
        allocate_fn: AllocateFn,
        arg: *mut c_void,
    );

    fn __gcov_filename_to_gcfn(filename: *const c_char, dump_fn: DumpFn, arg: *mut c_void);

    static __gcov_info_start: [*const GcovInfo; 0];
    static __gcov_info_end: [*const GcovInfo; 0];
}

/// The gcov runtime linked into this image.
#[derive(Clone, Copy)]
pub struct GcovRuntime;

impl GcovRuntime {
    #[allow(clippy::new_without_default)]
    pub const fn new() -> Self {
        Self {}
    }

    /// Every `gcov_info` placed in `.gcov_info` by the linker, in link
    /// order.
    ///
    /// # Safety
    ///
    /// `__gcov_info_start` and `__gcov_info_end` must bound an array of
    /// valid `gcov_info` pointers, as laid out by the linker script above.
    pub unsafe fn registry() -> &'static [&'static GcovInfo] {
        unsafe {
            let start = (&raw const __gcov_info_start).cast::<&'static GcovInfo>();
            let end = (&raw const __gcov_info_end).cast::<&'static GcovInfo>();
            let len = end.offset_from(start) as usize;
            core::slice::from_raw_parts(start, len)
        }
    }
}

impl CoverageRuntime for GcovRuntime {
    type Record = GcovInfo;

    fn reset(&mut self) {
        unsafe { __gcov_reset() }
    }

    fn serialize(&mut self, record: &GcovInfo, mut sink: &mut dyn ChunkSink) {
        let arg = (&raw mut sink).cast::<c_void>();
        unsafe {
            __gcov_info_to_gcda(record, filename_cb, data_dump_cb, allocate_cb, arg);
        }
    }
}

// Callbacks.  `arg` is always a `*mut &mut dyn ChunkSink` living on
// `serialize()`'s stack.

unsafe fn sink_from<'s>(arg: *mut c_void) -> &'s mut dyn ChunkSink {
    unsafe { &mut **arg.cast::<&'s mut dyn ChunkSink>() }
}

unsafe fn chunk<'d>(data: *const c_void, len: c_uint) -> &'d [u8] {
    if data.is_null() || len == 0 {
        &[]
    } else {
        unsafe { core::slice::from_raw_parts(data.cast::<u8>(), len as usize) }
    }
}

unsafe extern "C" fn filename_cb(filename: *const c_char, arg: *mut c_void) {
    unsafe { __gcov_filename_to_gcfn(filename, filename_dump_cb, arg) }
}

unsafe extern "C" fn filename_dump_cb(data: *const c_void, len: c_uint, arg: *mut c_void) {
    unsafe { sink_from(arg).filename_chunk(chunk(data, len)) }
}

unsafe extern "C" fn data_dump_cb(data: *const c_void, len: c_uint, arg: *mut c_void) {
    unsafe { sink_from(arg).data_chunk(chunk(data, len)) }
}

unsafe extern "C" fn allocate_cb(size: c_uint, arg: *mut c_void) -> *mut c_void {
    match unsafe { sink_from(arg) }.allocate(size as usize) {
        Some(buf) => buf.as_ptr().cast(),
        None => core::ptr::null_mut(),
    }
}
