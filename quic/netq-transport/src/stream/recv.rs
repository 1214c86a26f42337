// Copyright netq contributors
// SPDX-License-Identifier: Apache-2.0

//! Receive-half state machine and reassembly buffer for one stream, RFC
//! 9000 §3.2 and spec.md §4.4/§4.9.

use alloc::{collections::VecDeque, vec::Vec};
use netq_core::range_set::RangeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecvState {
    Disabled,
    Started,
    Paused,
    Stopped,
    Reset,
    Fin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecvError {
    /// the write would exceed the advertised `MAX_STREAM_DATA` window.
    FlowControlViolation,
    /// data arrived at an offset inconsistent with a FIN already seen at a
    /// lower final size.
    FinalSizeViolation,
}

/// Reassembles a contiguous byte stream from out-of-order `(offset, data)`
/// writes, tracking a flow-control window the application (or connection)
/// grants via `MAX_STREAM_DATA`, and auto-tuning that window per spec.md
/// §4.9 ("once more than half consumed, emit an update").
#[derive(Debug)]
pub struct RecvStream {
    state: RecvState,
    /// highest contiguous offset received so far (the read cursor can
    /// consume up to, but not past, this).
    high_watermark: u64,
    /// offset the application has consumed up to.
    consumed_offset: u64,
    max_allowed_recv_offset: u64,
    initial_window: u64,
    /// out-of-order bytes buffered ahead of `high_watermark`, keyed by
    /// absolute offset of the first byte in each chunk.
    pending: VecDeque<(u64, Vec<u8>)>,
    contiguous: VecDeque<u8>,
    received_ranges: RangeSet<u64>,
    final_size: Option<u64>,
    reset_error_code: Option<netq_core::varint::VarInt>,
    stop_sending_sent: bool,
}

impl RecvStream {
    pub fn new(initial_window: u64) -> Self {
        Self {
            state: RecvState::Started,
            high_watermark: 0,
            consumed_offset: 0,
            max_allowed_recv_offset: initial_window,
            initial_window,
            pending: VecDeque::new(),
            contiguous: VecDeque::new(),
            received_ranges: RangeSet::new(),
            final_size: None,
            reset_error_code: None,
            stop_sending_sent: false,
        }
    }

    pub fn state(&self) -> RecvState {
        self.state
    }

    pub fn max_allowed_recv_offset(&self) -> u64 {
        self.max_allowed_recv_offset
    }

    /// Accepts `data` at absolute stream `offset` (RFC 9000 §19.8). `is_fin`
    /// marks `offset + data.len()` as the stream's final size.
    pub fn on_data(&mut self, offset: u64, data: &[u8], is_fin: bool) -> Result<(), RecvError> {
        if matches!(self.state, RecvState::Reset | RecvState::Stopped) {
            return Ok(());
        }
        let end = offset + data.len() as u64;
        if end > self.max_allowed_recv_offset {
            return Err(RecvError::FlowControlViolation);
        }
        if let Some(final_size) = self.final_size {
            if end > final_size || (is_fin && end != final_size) {
                return Err(RecvError::FinalSizeViolation);
            }
        }
        if is_fin {
            self.final_size = Some(end);
        }

        if !data.is_empty() {
            self.received_ranges.insert_range(offset..=(end - 1));
            self.pending.push_back((offset, data.to_vec()));
            self.drain_contiguous();
        } else if is_fin && end == self.high_watermark {
            self.maybe_finish();
        }

        Ok(())
    }

    fn drain_contiguous(&mut self) {
        loop {
            let next = self
                .pending
                .iter()
                .enumerate()
                .find(|(_, (offset, _))| *offset <= self.high_watermark);
            let Some((idx, _)) = next else { break };
            let (offset, chunk) = self.pending.remove(idx).unwrap();
            let chunk_end = offset + chunk.len() as u64;
            if chunk_end <= self.high_watermark {
                continue;
            }
            let skip = (self.high_watermark - offset) as usize;
            self.contiguous.extend(chunk[skip..].iter().copied());
            self.high_watermark = chunk_end;
        }
        self.maybe_finish();
    }

    fn maybe_finish(&mut self) {
        if self.state == RecvState::Started {
            if let Some(final_size) = self.final_size {
                if self.high_watermark >= final_size && self.contiguous.is_empty() {
                    self.state = RecvState::Fin;
                }
            }
        }
    }

    /// Delivers up to `max_len` contiguous bytes to the application,
    /// advancing `consumed_offset`. A partial consume is permitted.
    pub fn read(&mut self, max_len: usize) -> Vec<u8> {
        let n = max_len.min(self.contiguous.len());
        let out: Vec<u8> = self.contiguous.drain(..n).collect();
        self.consumed_offset += out.len() as u64;
        if self.state == RecvState::Fin && self.contiguous.is_empty() {
            // stays Fin; nothing further to deliver.
        }
        out
    }

    /// Whether the application has consumed more than half the advertised
    /// window, per spec.md §4.9's auto-tune rule; if so, returns the new
    /// window to advertise via `MAX_STREAM_DATA`.
    pub fn window_update(&mut self) -> Option<u64> {
        let consumed_since_window_start =
            self.consumed_offset.saturating_sub(self.max_allowed_recv_offset - self.initial_window);
        if consumed_since_window_start * 2 >= self.initial_window {
            self.max_allowed_recv_offset = self.consumed_offset + self.initial_window;
            Some(self.max_allowed_recv_offset)
        } else {
            None
        }
    }

    pub fn pause(&mut self) {
        if self.state == RecvState::Started {
            self.state = RecvState::Paused;
        }
    }

    pub fn resume(&mut self) {
        if self.state == RecvState::Paused {
            self.state = RecvState::Started;
        }
    }

    /// Application asked to stop receiving; caller sends STOP_SENDING.
    pub fn stop(&mut self, error_code: netq_core::varint::VarInt) -> bool {
        if matches!(self.state, RecvState::Reset | RecvState::Fin) || self.stop_sending_sent {
            return false;
        }
        self.state = RecvState::Stopped;
        self.stop_sending_sent = true;
        self.reset_error_code = Some(error_code);
        true
    }

    pub fn on_reset(&mut self, error_code: netq_core::varint::VarInt, final_size: u64) {
        if matches!(self.state, RecvState::Reset | RecvState::Fin) {
            return;
        }
        self.state = RecvState::Reset;
        self.reset_error_code = Some(error_code);
        self.final_size = Some(final_size);
        self.pending.clear();
        self.contiguous.clear();
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.state, RecvState::Fin | RecvState::Reset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netq_core::varint::VarInt;

    #[test]
    fn out_of_order_writes_reassemble_in_order() {
        let mut s = RecvStream::new(1000);
        s.on_data(5, b"world", false).unwrap();
        s.on_data(0, b"hello", false).unwrap();
        assert_eq!(s.read(100), b"helloworld");
    }

    #[test]
    fn duplicate_overlapping_writes_do_not_duplicate_output() {
        let mut s = RecvStream::new(1000);
        s.on_data(0, b"hello", false).unwrap();
        s.on_data(0, b"hello", false).unwrap();
        assert_eq!(s.read(100), b"hello");
    }

    #[test]
    fn write_past_flow_control_window_is_rejected() {
        let mut s = RecvStream::new(4);
        assert_eq!(s.on_data(0, b"hello", false), Err(RecvError::FlowControlViolation));
    }

    #[test]
    fn fin_after_all_bytes_consumed_reaches_terminal_state() {
        let mut s = RecvStream::new(1000);
        s.on_data(0, b"hi", true).unwrap();
        assert_eq!(s.read(100), b"hi");
        assert_eq!(s.state(), RecvState::Fin);
        assert!(s.is_terminal());
    }

    #[test]
    fn partial_consume_leaves_remaining_bytes_buffered() {
        let mut s = RecvStream::new(1000);
        s.on_data(0, b"hello", false).unwrap();
        assert_eq!(s.read(2), b"he");
        assert_eq!(s.read(100), b"llo");
    }

    #[test]
    fn window_update_fires_after_half_the_window_is_consumed() {
        let mut s = RecvStream::new(10);
        s.on_data(0, &[0u8; 6], false).unwrap();
        s.read(6);
        let update = s.window_update();
        assert_eq!(update, Some(16));
    }

    #[test]
    fn reset_discards_buffered_data_and_is_terminal() {
        let mut s = RecvStream::new(1000);
        s.on_data(0, b"hello", false).unwrap();
        s.on_reset(VarInt::from_u8(1), 5);
        assert_eq!(s.state(), RecvState::Reset);
        assert!(s.is_terminal());
        assert_eq!(s.read(100), Vec::<u8>::new());
    }
}
