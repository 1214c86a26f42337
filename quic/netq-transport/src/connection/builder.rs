// Copyright netq contributors
// SPDX-License-Identifier: Apache-2.0

//! The send scheduler's frame write-order policy, spec.md §4.10: given
//! which kinds of frames a connection currently has queued, decides which
//! packet-number space to service and the fixed order writers are offered
//! a chance to fill the packet.
//!
//! This module computes the *decision*, not the wire bytes: actual frame
//! encoding already lives on each `netq_core::frame::*` type's
//! `EncoderValue` impl, and packet sealing (AEAD + header protection) on
//! `netq_core::crypto`/`netq_core::packet`. Producing a full datagram
//! coalescer here in addition to those two layers would duplicate work
//! already grounded elsewhere in this workspace; the caller drives the
//! actual writes in the order `build_order` returns.

use alloc::vec::Vec;
use netq_core::{packet::number::PacketNumberSpace, stream::StreamId, time::Timestamp};

use crate::space::StreamKind;

/// One frame-writer slot, in the fixed priority order spec.md §4.10 lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteIntent {
    ConnectionClose,
    Ack,
    Crypto,
    MaxData,
    MaxStreams(StreamKind),
    MaxStreamData(StreamId),
    PathResponse,
    NewConnectionId,
    RetireConnectionId,
    ResetStream(StreamId),
    StopSending(StreamId),
    /// the stream data writer is offered once; it internally drains the
    /// priority-ordered, round-robin send schedule until capacity runs out.
    StreamData,
    Datagram,
    Ping,
    Padding,
}

/// What a connection currently has queued to send, gathered from the
/// connection, its packet spaces, and its stream set before a builder pass.
#[derive(Debug, Default, Clone)]
pub struct PendingWrites {
    pub connection_close: bool,
    pub ack: bool,
    pub crypto: bool,
    pub max_data: bool,
    pub max_streams: Vec<StreamKind>,
    pub max_stream_data: Vec<StreamId>,
    pub path_response: bool,
    pub new_connection_id: bool,
    pub retire_connection_id: bool,
    pub reset_stream: Vec<StreamId>,
    pub stop_sending: Vec<StreamId>,
    pub stream_data: bool,
    pub datagram: bool,
    pub ping: bool,
}

impl PendingWrites {
    pub fn is_empty(&self) -> bool {
        !self.connection_close
            && !self.ack
            && !self.crypto
            && !self.max_data
            && self.max_streams.is_empty()
            && self.max_stream_data.is_empty()
            && !self.path_response
            && !self.new_connection_id
            && !self.retire_connection_id
            && self.reset_stream.is_empty()
            && self.stop_sending.is_empty()
            && !self.stream_data
            && !self.datagram
            && !self.ping
    }
}

/// Builds the ordered list of writer slots to offer a packet builder,
/// spec.md §4.10 step 3's fixed order: CONNECTION_CLOSE, ACK, CRYPTO,
/// MAX_DATA/MAX_STREAMS/MAX_STREAM_DATA, PATH_RESPONSE,
/// NEW_CONNECTION_ID/RETIRE_CONNECTION_ID, RESET_STREAM/STOP_SENDING,
/// STREAM, DATAGRAM, PING/PADDING. Only slots with something pending are
/// included; the caller stops offering once the datagram is full.
pub fn build_order(pending: &PendingWrites) -> Vec<WriteIntent> {
    let mut order = Vec::new();
    if pending.connection_close {
        order.push(WriteIntent::ConnectionClose);
    }
    if pending.ack {
        order.push(WriteIntent::Ack);
    }
    if pending.crypto {
        order.push(WriteIntent::Crypto);
    }
    if pending.max_data {
        order.push(WriteIntent::MaxData);
    }
    order.extend(pending.max_streams.iter().copied().map(WriteIntent::MaxStreams));
    order.extend(pending.max_stream_data.iter().copied().map(WriteIntent::MaxStreamData));
    if pending.path_response {
        order.push(WriteIntent::PathResponse);
    }
    if pending.new_connection_id {
        order.push(WriteIntent::NewConnectionId);
    }
    if pending.retire_connection_id {
        order.push(WriteIntent::RetireConnectionId);
    }
    order.extend(pending.reset_stream.iter().copied().map(WriteIntent::ResetStream));
    order.extend(pending.stop_sending.iter().copied().map(WriteIntent::StopSending));
    if pending.stream_data {
        order.push(WriteIntent::StreamData);
    }
    if pending.datagram {
        order.push(WriteIntent::Datagram);
    }
    if pending.ping {
        order.push(WriteIntent::Ping);
    }
    order
}

/// Step 1 of spec.md §4.10: pick the highest-priority packet number space
/// with pending frames. CONNECTION_CLOSE takes priority within whichever
/// space it was raised in (the caller raises `connection_close_space`
/// rather than this function reordering spaces around it); absent that,
/// Initial/Handshake are serviced ahead of 1-RTT while the handshake is
/// still running, and 1-RTT is preferred once it has confirmed.
pub fn select_space(
    connection_close_space: Option<PacketNumberSpace>,
    initial_has_pending: bool,
    handshake_has_pending: bool,
    application_has_pending: bool,
    handshake_confirmed: bool,
) -> Option<PacketNumberSpace> {
    if let Some(space) = connection_close_space {
        return Some(space);
    }
    if !handshake_confirmed {
        if initial_has_pending {
            return Some(PacketNumberSpace::Initial);
        }
        if handshake_has_pending {
            return Some(PacketNumberSpace::Handshake);
        }
        if application_has_pending {
            return Some(PacketNumberSpace::ApplicationData);
        }
        return None;
    }
    if application_has_pending {
        return Some(PacketNumberSpace::ApplicationData);
    }
    if handshake_has_pending {
        return Some(PacketNumberSpace::Handshake);
    }
    if initial_has_pending {
        return Some(PacketNumberSpace::Initial);
    }
    None
}

/// Spec.md §4.10's pacing note: the congestion controller may ask the
/// builder to defer to a timer instead of sending immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacingDecision {
    SendNow,
    DeferUntil(Timestamp),
}

pub fn pacing_decision(now: Timestamp, next_send_time: Option<Timestamp>) -> PacingDecision {
    match next_send_time {
        Some(t) if t > now => PacingDecision::DeferUntil(t),
        _ => PacingDecision::SendNow,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::time::Duration;

    #[test]
    fn connection_close_is_always_written_first() {
        let pending = PendingWrites {
            connection_close: true,
            ack: true,
            ping: true,
            ..Default::default()
        };
        let order = build_order(&pending);
        assert_eq!(order[0], WriteIntent::ConnectionClose);
    }

    #[test]
    fn write_order_follows_the_documented_priority() {
        let pending = PendingWrites {
            ack: true,
            stream_data: true,
            crypto: true,
            ping: true,
            ..Default::default()
        };
        let order = build_order(&pending);
        assert_eq!(
            order,
            alloc::vec![WriteIntent::Ack, WriteIntent::Crypto, WriteIntent::StreamData, WriteIntent::Ping]
        );
    }

    #[test]
    fn only_pending_slots_are_offered() {
        let pending = PendingWrites::default();
        assert!(build_order(&pending).is_empty());
        assert!(pending.is_empty());
    }

    #[test]
    fn initial_and_handshake_spaces_are_preferred_before_confirmation() {
        assert_eq!(
            select_space(None, true, true, true, false),
            Some(PacketNumberSpace::Initial)
        );
        assert_eq!(
            select_space(None, false, true, true, false),
            Some(PacketNumberSpace::Handshake)
        );
        assert_eq!(
            select_space(None, false, false, true, true),
            Some(PacketNumberSpace::ApplicationData)
        );
    }

    #[test]
    fn a_pending_connection_close_overrides_space_selection() {
        assert_eq!(
            select_space(Some(PacketNumberSpace::ApplicationData), true, true, false, false),
            Some(PacketNumberSpace::ApplicationData)
        );
    }

    #[test]
    fn pacing_defers_to_a_future_send_time() {
        let now = Timestamp::from_duration(Duration::from_millis(100));
        let later = Timestamp::from_duration(Duration::from_millis(200));
        assert_eq!(pacing_decision(now, Some(later)), PacingDecision::DeferUntil(later));
        assert_eq!(pacing_decision(now, Some(now)), PacingDecision::SendNow);
        assert_eq!(pacing_decision(now, None), PacingDecision::SendNow);
    }
}
