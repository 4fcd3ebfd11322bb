//! Mock debug host for unit tests.
//!
//! Records every request, copying the argument block (and, for writes, the
//! payload) out of memory at the time of the trap, the way a debugger would
//! read it.

// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

use crate::transport::{Argument, Operation, Transport};

/// One serviced request.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Call {
    pub op: Operation,
    pub arg: usize,
    pub block: Vec<usize>,
    pub data: Vec<u8>,
}

type Responder = Box<dyn FnMut(&Call) -> u64>;

pub(crate) struct MockHost {
    pub calls: Vec<Call>,
    responder: Responder,
}

impl MockHost {
    /// Host which replies 0 to everything.
    pub fn new() -> Self {
        Self::with_responder(|_| 0)
    }

    pub fn with_responder(responder: impl FnMut(&Call) -> u64 + 'static) -> Self {
        Self {
            calls: Vec::new(),
            responder: Box::new(responder),
        }
    }

    pub fn ops(&self) -> Vec<Operation> {
        self.calls.iter().map(|call| call.op).collect()
    }

    pub fn writes(&self) -> Vec<&Call> {
        self.calls
            .iter()
            .filter(|call| call.op == Operation::Write)
            .collect()
    }
}

impl Transport for MockHost {
    fn request(&mut self, command: u32, arg: usize) -> u64 {
        let op = Operation::try_from(command).expect("mock host only serves known operations");
        let block = match op.argument() {
            Argument::Block(words) => {
                unsafe { core::slice::from_raw_parts(arg as *const usize, words) }.to_vec()
            }
            _ => Vec::new(),
        };
        let data = if op == Operation::Write {
            unsafe { core::slice::from_raw_parts(block[1] as *const u8, block[2]) }.to_vec()
        } else {
            Vec::new()
        };
        let call = Call {
            op,
            arg,
            block,
            data,
        };
        let reply = (self.responder)(&call);
        self.calls.push(call);
        reply
    }
}
