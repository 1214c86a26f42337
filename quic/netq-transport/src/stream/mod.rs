// Copyright netq contributors
// SPDX-License-Identifier: Apache-2.0

//! Stream objects and the per-connection stream set, spec.md §3.3/§4.9.

pub mod manager;
pub mod recv;
pub mod send;

pub use manager::StreamManager;
pub use recv::{RecvError, RecvState, RecvStream};
pub use send::{SendError, SendState, SendStream};

use netq_core::stream::StreamId;

/// One stream's send and receive halves. Uni-directional streams carry only
/// the half implied by their initiator relative to the local role; the
/// manager is responsible for not constructing the absent half.
#[derive(Debug)]
pub struct Stream {
    pub id: StreamId,
    pub send: Option<SendStream>,
    pub recv: Option<RecvStream>,
}

impl Stream {
    pub fn new_bidirectional(id: StreamId, initial_send_window: u64, initial_recv_window: u64) -> Self {
        Self {
            id,
            send: Some(SendStream::new(initial_send_window)),
            recv: Some(RecvStream::new(initial_recv_window)),
        }
    }

    pub fn new_send_only(id: StreamId, initial_send_window: u64) -> Self {
        Self {
            id,
            send: Some(SendStream::new(initial_send_window)),
            recv: None,
        }
    }

    pub fn new_recv_only(id: StreamId, initial_recv_window: u64) -> Self {
        Self {
            id,
            send: None,
            recv: Some(RecvStream::new(initial_recv_window)),
        }
    }

    /// Both halves (or the single applicable half, for a unidirectional
    /// stream) have reached a terminal, acknowledged state.
    pub fn is_closed(&self) -> bool {
        self.send.as_ref().map_or(true, |s| s.is_terminal())
            && self.recv.as_ref().map_or(true, |r| r.is_terminal())
    }
}
