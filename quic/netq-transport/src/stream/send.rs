// Copyright netq contributors
// SPDX-License-Identifier: Apache-2.0

//! Send-half state machine and flow control for one stream, RFC 9000 §3.1.
//!
//! Grounded on spec.md §3.3/§4.9's transition table and on the teacher's
//! `s2n-quic-transport::stream::tests` naming conventions for the shape of
//! the public API; the teacher's actual `StreamImpl` is futures/Waker
//! based (see DESIGN.md) — this crate instead exposes a plain
//! feed-in/drain-out synchronous surface, since no async runtime is part of
//! this exercise's scope.

use alloc::{collections::VecDeque, vec::Vec};
use netq_core::varint::VarInt;

/// RFC 9000 §3.1's send-stream states, collapsed to the subset spec.md
/// names (no distinct "Ready"/"Send" split: both are `Started` here, since
/// this crate doesn't model a stream before it has data queued).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendState {
    Disabled,
    Started,
    Fin,
    FinAcked,
    Reset,
    ResetAcked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendError {
    /// the send half is no longer accepting new data.
    InvalidState,
    /// the write would exceed the peer's advertised `MAX_STREAM_DATA`.
    FlowControlBlocked,
}

/// One contiguous chunk of unacknowledged outgoing data, queued for (re)send.
#[derive(Debug, Clone)]
struct QueuedChunk {
    offset: u64,
    data: Vec<u8>,
}

/// Per-stream send state: queued bytes, the flow-control window the peer
/// has granted, and which byte ranges remain unacknowledged.
#[derive(Debug)]
pub struct SendStream {
    state: SendState,
    /// next byte offset the application has queued but not necessarily sent.
    queued_send_offset: u64,
    /// next byte offset the builder has put on the wire (not necessarily acked).
    next_send_offset: u64,
    /// peer's MAX_STREAM_DATA for this stream.
    max_allowed_send_offset: u64,
    queue: VecDeque<QueuedChunk>,
    /// ranges of `queued_send_offset`-space bytes acknowledged, possibly
    /// non-contiguous ahead of `unacked_offset`.
    acked_ranges: netq_core::range_set::RangeSet<u64>,
    unacked_offset: u64,
    final_size: Option<u64>,
    reset_error_code: Option<VarInt>,
    /// one-shot latch so STREAM_DATA_BLOCKED is sent at most once per limit.
    blocked_signal_sent_at: Option<u64>,
    priority: u8,
}

pub const DEFAULT_PRIORITY: u8 = 128;

impl SendStream {
    pub fn new(initial_max_data: u64) -> Self {
        Self {
            state: SendState::Started,
            queued_send_offset: 0,
            next_send_offset: 0,
            max_allowed_send_offset: initial_max_data,
            queue: VecDeque::new(),
            acked_ranges: netq_core::range_set::RangeSet::new(),
            unacked_offset: 0,
            final_size: None,
            reset_error_code: None,
            blocked_signal_sent_at: None,
            priority: DEFAULT_PRIORITY,
        }
    }

    pub fn state(&self) -> SendState {
        self.state
    }

    pub fn priority(&self) -> u8 {
        self.priority
    }

    pub fn set_priority(&mut self, priority: u8) {
        self.priority = priority;
    }

    /// Queues `data` for transmission. Invariant from spec.md §3.3:
    /// `unacked_offset <= next_send_offset <= queued_send_offset`.
    pub fn write(&mut self, data: &[u8]) -> Result<(), SendError> {
        if self.state != SendState::Started {
            return Err(SendError::InvalidState);
        }
        self.queue.push_back(QueuedChunk {
            offset: self.queued_send_offset,
            data: data.to_vec(),
        });
        self.queued_send_offset += data.len() as u64;
        Ok(())
    }

    /// Bytes the application has queued but the peer's flow-control window
    /// does not yet permit sending.
    pub fn flow_controlled_bytes(&self) -> u64 {
        self.queued_send_offset.saturating_sub(self.max_allowed_send_offset)
    }

    fn send_credit(&self) -> u64 {
        self.max_allowed_send_offset.saturating_sub(self.next_send_offset)
    }

    /// Pulls up to `capacity` bytes of not-yet-sent data off the front of
    /// the queue, respecting the peer's flow-control window, and advances
    /// `next_send_offset`. Returns `(offset, bytes)`; `None` if blocked on
    /// flow control or there's nothing new to send.
    pub fn poll_send(&mut self, capacity: usize) -> Option<(u64, Vec<u8>)> {
        if self.state != SendState::Started {
            return None;
        }
        let pending = self.queued_send_offset.saturating_sub(self.next_send_offset);
        if pending == 0 {
            return None;
        }
        let credit = self.send_credit();
        if credit == 0 {
            return None;
        }
        let to_send = (pending.min(credit) as usize).min(capacity);
        if to_send == 0 {
            return None;
        }

        let offset = self.next_send_offset;
        let mut out = Vec::with_capacity(to_send);
        let mut remaining = to_send;
        let mut relative = 0u64;
        for chunk in &self.queue {
            if remaining == 0 {
                break;
            }
            let chunk_start = chunk.offset;
            let chunk_end = chunk_start + chunk.data.len() as u64;
            if chunk_end <= offset {
                continue;
            }
            let start_in_chunk = offset.saturating_sub(chunk_start) as usize;
            let available = chunk.data.len() - start_in_chunk;
            let take = available.min(remaining);
            out.extend_from_slice(&chunk.data[start_in_chunk..start_in_chunk + take]);
            remaining -= take;
            relative += take as u64;
        }
        debug_assert_eq!(relative as usize, to_send);

        self.next_send_offset += to_send as u64;
        Some((offset, out))
    }

    /// Whether a STREAM_DATA_BLOCKED should be emitted (once per limit):
    /// there's queued data beyond the current window and we haven't
    /// already signaled this exact limit.
    pub fn is_blocked(&self) -> bool {
        self.queued_send_offset > self.max_allowed_send_offset
            && self.blocked_signal_sent_at != Some(self.max_allowed_send_offset)
    }

    pub fn on_blocked_signaled(&mut self) {
        self.blocked_signal_sent_at = Some(self.max_allowed_send_offset);
    }

    /// Peer raised `MAX_STREAM_DATA`.
    pub fn on_max_stream_data(&mut self, new_limit: u64) {
        if new_limit > self.max_allowed_send_offset {
            self.max_allowed_send_offset = new_limit;
        }
    }

    /// Marks `[offset, offset+len)` acknowledged by the peer, advancing
    /// `unacked_offset` through any now-contiguous prefix and dropping
    /// fully-acked chunks from the retransmission queue.
    pub fn on_ack(&mut self, offset: u64, len: u64) {
        if len == 0 {
            return;
        }
        self.acked_ranges.insert_range(offset..=(offset + len - 1));
        // the front range, if it starts at or before unacked_offset, gives the
        // new contiguous coverage (ranges are merged on insert, so a single
        // range's end is the full run, not a jump across a later gap).
        if let Some(front) = self.acked_ranges.iter().next().cloned() {
            if *front.start() <= self.unacked_offset {
                self.unacked_offset = self.unacked_offset.max(*front.end() + 1);
            }
        }
        self.queue.retain(|c| c.offset + c.data.len() as u64 > self.unacked_offset);

        if self.state == SendState::Fin {
            if let Some(final_size) = self.final_size {
                if self.unacked_offset >= final_size {
                    self.state = SendState::FinAcked;
                }
            }
        }
    }

    /// Data declared lost is re-queued for send by resetting
    /// `next_send_offset` back to the lowest unacked byte that was lost.
    pub fn on_loss(&mut self, offset: u64) {
        if offset < self.next_send_offset {
            self.next_send_offset = offset;
        }
    }

    /// Application requested a graceful close: no more writes accepted,
    /// `final_size` fixed at the current queued offset.
    pub fn finish(&mut self) -> Result<(), SendError> {
        if self.state != SendState::Started {
            return Err(SendError::InvalidState);
        }
        self.final_size = Some(self.queued_send_offset);
        self.state = SendState::Fin;
        Ok(())
    }

    pub fn final_size(&self) -> Option<u64> {
        self.final_size
    }

    /// Application abort, or response to a peer STOP_SENDING: stops
    /// accepting writes and arms a RESET_STREAM with `error_code`.
    pub fn reset(&mut self, error_code: VarInt) {
        if matches!(self.state, SendState::FinAcked | SendState::ResetAcked) {
            return;
        }
        self.reset_error_code = Some(error_code);
        self.state = SendState::Reset;
        self.queue.clear();
    }

    pub fn reset_error_code(&self) -> Option<VarInt> {
        self.reset_error_code
    }

    pub fn on_reset_acked(&mut self) {
        if self.state == SendState::Reset {
            self.state = SendState::ResetAcked;
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.state, SendState::FinAcked | SendState::ResetAcked)
    }
}
