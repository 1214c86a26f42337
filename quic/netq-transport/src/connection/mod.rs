// Copyright netq contributors
// SPDX-License-Identifier: Apache-2.0

//! The connection state machine, spec.md §3.1/§4.11: IDLE → HANDSHAKE →
//! CONNECTED → CLOSING → DRAINING → CLOSED, plus idle-timeout tracking, key
//! phase bookkeeping, and client Retry handling.
//!
//! Unlike the teacher's `s2n-quic-transport::connection`, whose actual
//! implementation modules are not present in this repo's retrieval pack
//! (only test files survived filtering), this module is grounded directly
//! on spec.md's §3.1/§4.11 prose and on the already-built
//! `netq_core::connection::{Error, Location}` types, generalized the way
//! the teacher generalizes its own connection error/location split.

pub mod builder;
pub mod close;

use close::CloseState;
use netq_core::{
    connection::{ConnectionId, Error as ConnectionError, Location},
    endpoint,
    packet::number::PacketNumberSpace,
    recovery::RttEstimator,
    time::Timestamp,
    transport::TransportError,
};

use crate::{config::Settings, space::PacketSpace, stream::StreamManager};

/// RFC 9001 doesn't mandate an exact packet count before a key update may
/// be initiated, only that it not happen more often than once per RTT-ish
/// interval; msquic's equivalent constant isn't present in this repo's
/// filtered retrieval pack, so this approximates a conservative interval.
const MIN_KEY_UPDATE_INTERVAL_PACKETS: u32 = 1_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Handshake,
    Connected,
    Closing,
    Draining,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseError {
    /// the connection is already in a terminal state.
    AlreadyClosing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryError {
    /// spec.md §4.11: "only one Retry is accepted per connection attempt".
    AlreadyRetried,
    /// Retry is a client-only reaction to a server response.
    NotClient,
}

/// One QUIC connection. Owns the per-space sent-packet stores, the stream
/// set, the negotiated settings, and the state machine spec.md §4.11
/// describes. Key material itself (AEAD/HP keys) is intentionally not
/// stored here — it belongs to whatever crypto adapter instance the caller
/// pairs with each `PacketSpace`, mirroring how `netq-core::path::mtu`
/// already keeps congestion/controller wiring external to this crate (see
/// DESIGN.md).
#[derive(Debug)]
pub struct Connection {
    role: endpoint::Type,
    state: ConnectionState,
    version: u32,
    local_cid: ConnectionId,
    peer_cid: ConnectionId,
    initial: Option<PacketSpace>,
    handshake: Option<PacketSpace>,
    application: PacketSpace,
    rtt: RttEstimator,
    settings: Settings,
    pub streams: StreamManager,
    key_phase: u8,
    packets_sent_in_current_phase: u32,
    peer_acked_in_current_phase: bool,
    local_idle_timeout: core::time::Duration,
    peer_idle_timeout: core::time::Duration,
    time_of_last_ack_eliciting_received: Option<Timestamp>,
    version_negotiation_attempts: u8,
    retry_received: bool,
    close_state: Option<CloseState>,
}

impl Connection {
    pub fn new(role: endpoint::Type, version: u32, local_cid: ConnectionId, peer_cid: ConnectionId, settings: Settings) -> Self {
        let streams = StreamManager::new(
            role,
            settings.stream_recv_window as u64,
            settings.stream_recv_window as u64,
            settings.conn_flow_control_window as u64,
            settings.conn_flow_control_window as u64,
        );
        Self {
            role,
            state: ConnectionState::Idle,
            version,
            local_cid,
            peer_cid,
            initial: Some(PacketSpace::new(PacketNumberSpace::Initial)),
            handshake: Some(PacketSpace::new(PacketNumberSpace::Handshake)),
            application: PacketSpace::new(PacketNumberSpace::ApplicationData),
            rtt: RttEstimator::new(settings.initial_rtt),
            peer_idle_timeout: settings.idle_timeout,
            local_idle_timeout: settings.idle_timeout,
            settings,
            streams,
            key_phase: 0,
            packets_sent_in_current_phase: 0,
            peer_acked_in_current_phase: false,
            time_of_last_ack_eliciting_received: None,
            version_negotiation_attempts: 0,
            retry_received: false,
            close_state: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn role(&self) -> endpoint::Type {
        self.role
    }

    pub fn rtt(&self) -> &RttEstimator {
        &self.rtt
    }

    pub fn rtt_mut(&mut self) -> &mut RttEstimator {
        &mut self.rtt
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn local_cid(&self) -> ConnectionId {
        self.local_cid
    }

    pub fn peer_cid(&self) -> ConnectionId {
        self.peer_cid
    }

    pub fn space(&self, space: PacketNumberSpace) -> Option<&PacketSpace> {
        match space {
            PacketNumberSpace::Initial => self.initial.as_ref(),
            PacketNumberSpace::Handshake => self.handshake.as_ref(),
            PacketNumberSpace::ApplicationData => Some(&self.application),
        }
    }

    pub fn space_mut(&mut self, space: PacketNumberSpace) -> Option<&mut PacketSpace> {
        match space {
            PacketNumberSpace::Initial => self.initial.as_mut(),
            PacketNumberSpace::Handshake => self.handshake.as_mut(),
            PacketNumberSpace::ApplicationData => Some(&mut self.application),
        }
    }

    pub fn bytes_in_flight(&self) -> u32 {
        self.initial.as_ref().map_or(0, PacketSpace::bytes_in_flight)
            + self.handshake.as_ref().map_or(0, PacketSpace::bytes_in_flight)
            + self.application.bytes_in_flight()
    }

    /// Records a connection state transition, tracing it when enabled.
    fn transition_to(&mut self, next: ConnectionState) {
        #[cfg(feature = "tracing")]
        tracing::trace!(from = ?self.state, to = ?next, "connection state transition");
        self.state = next;
    }

    /// Moves IDLE → HANDSHAKE: called immediately on client dial or as soon
    /// as a server accepts the first valid Initial (spec.md §3.1's
    /// lifecycle note — there's no observable time spent in IDLE).
    pub fn start_handshake(&mut self) {
        if self.state == ConnectionState::Idle {
            self.transition_to(ConnectionState::Handshake);
        }
    }

    /// HANDSHAKE → CONNECTED, on TLS handshake confirmation. Drops the
    /// Handshake space's keys for good (spec.md §3.4's invariant: "keys for
    /// a space are discarded when the space is dropped ... never to
    /// return"), returning any bytes that were still in flight there so the
    /// caller can inform its congestion controller.
    pub fn on_handshake_confirmed(&mut self) -> u32 {
        if self.state == ConnectionState::Handshake {
            self.transition_to(ConnectionState::Connected);
        }
        self.discard_handshake_keys()
    }

    pub fn discard_initial_keys(&mut self) -> u32 {
        self.initial.take().map_or(0, |mut s| s.discard())
    }

    pub fn discard_handshake_keys(&mut self) -> u32 {
        self.handshake.take().map_or(0, |mut s| s.discard())
    }

    /// Updates the peer's negotiated idle timeout (from transport
    /// parameters) and records the receipt of an ack-eliciting packet,
    /// which is what keeps the connection alive per spec.md §4.11.
    pub fn on_ack_eliciting_packet_received(&mut self, now: Timestamp) {
        self.time_of_last_ack_eliciting_received = Some(now);
    }

    pub fn on_peer_idle_timeout_negotiated(&mut self, peer_idle_timeout: core::time::Duration) {
        if !peer_idle_timeout.is_zero() {
            self.peer_idle_timeout = peer_idle_timeout;
        }
    }

    /// Computes min(local_idle, peer_idle) × 3 from the last ack-eliciting
    /// packet received (or connection start if none has arrived yet), per
    /// spec.md §4.11. Returns `true` and transitions straight to CLOSED
    /// (silently — no CONNECTION_CLOSE is sent) if it has elapsed.
    pub fn check_idle_timeout(&mut self, now: Timestamp, connection_start: Timestamp) -> bool {
        if matches!(self.state, ConnectionState::Closed) {
            return false;
        }
        let effective = self.local_idle_timeout.min(self.peer_idle_timeout);
        if effective.is_zero() {
            return false;
        }
        let threshold = effective.saturating_mul(3);
        let last_activity = self.time_of_last_ack_eliciting_received.unwrap_or(connection_start);
        if now.saturating_duration_since(last_activity) >= threshold {
            self.transition_to(ConnectionState::Closed);
            self.close_state = None;
            true
        } else {
            false
        }
    }

    /// Begins a locally-initiated close: CONNECTED/HANDSHAKE → CLOSING.
    /// `now` plus the configured disconnect timeout bounds how long CLOSING
    /// retransmits the same CONNECTION_CLOSE frame before giving up.
    pub fn initiate_close(&mut self, now: Timestamp, error: TransportError) -> Result<(), CloseError> {
        if matches!(self.state, ConnectionState::Closing | ConnectionState::Draining | ConnectionState::Closed) {
            return Err(CloseError::AlreadyClosing);
        }
        let deadline = now
            .checked_add(self.settings.disconnect_timeout)
            .unwrap_or(now);
        self.close_state = Some(CloseState::closing(
            ConnectionError::Transport { error, initiator: Location::Local },
            deadline,
        ));
        self.transition_to(ConnectionState::Closing);
        Ok(())
    }

    /// A CONNECTION_CLOSE frame arrived from the peer. If we were already
    /// closing, this just silences further retransmission (→ DRAINING with
    /// the same deadline); otherwise it's the peer unilaterally closing and
    /// we enter DRAINING directly, per spec.md §4.11.
    pub fn on_connection_close_received(&mut self, now: Timestamp, error: ConnectionError) {
        match &mut self.close_state {
            Some(state) => state.on_peer_close_received(),
            None => {
                let deadline = now
                    .checked_add(self.settings.disconnect_timeout)
                    .unwrap_or(now);
                self.close_state = Some(CloseState::draining(error, deadline));
            }
        }
        self.transition_to(ConnectionState::Draining);
    }

    /// Whether CLOSING should retransmit its CONNECTION_CLOSE frame in
    /// response to a just-received packet (spec.md §4.11: "CONNECTION_CLOSE
    /// frames are retransmitted on every received packet in CLOSING").
    pub fn should_retransmit_close(&self) -> bool {
        matches!(self.state, ConnectionState::Closing)
            && self.close_state.as_ref().is_some_and(CloseState::should_retransmit_on_receipt)
    }

    pub fn close_reason(&self) -> Option<&ConnectionError> {
        self.close_state.as_ref().map(|s| &s.reason)
    }

    /// Bounds CLOSING/DRAINING with the disconnect timeout; once it fires
    /// the connection is torn down regardless of further packets.
    pub fn check_disconnect_timeout(&mut self, now: Timestamp) -> bool {
        let expired = self
            .close_state
            .as_ref()
            .is_some_and(|state| state.is_expired(now));
        if expired {
            self.transition_to(ConnectionState::Closed);
        }
        expired
    }

    /// Client-side Retry handling, spec.md §4.11: resets Initial keys using
    /// the server's new source CID as our destination CID, and accepts at
    /// most one Retry per connection attempt.
    pub fn accept_retry(&mut self, new_peer_cid: ConnectionId) -> Result<(), RetryError> {
        if !self.role.is_client() {
            return Err(RetryError::NotClient);
        }
        if self.retry_received {
            return Err(RetryError::AlreadyRetried);
        }
        self.retry_received = true;
        self.peer_cid = new_peer_cid;
        self.initial = Some(PacketSpace::new(PacketNumberSpace::Initial));
        Ok(())
    }

    /// Tracks version-negotiation round-trips (§4.3's supplemented
    /// "don't loop forever" behavior): a second round within one connection
    /// attempt is a protocol violation rather than silently retried again.
    pub fn note_version_negotiation_attempt(&mut self) -> Result<(), TransportError> {
        self.version_negotiation_attempts += 1;
        if self.version_negotiation_attempts > 1 {
            return Err(TransportError::PROTOCOL_VIOLATION.with_reason("version negotiation already attempted once"));
        }
        Ok(())
    }

    pub fn key_phase(&self) -> u8 {
        self.key_phase
    }

    /// Called once per ack-eliciting 1-RTT packet sent under the current
    /// key phase.
    pub fn on_1rtt_packet_sent(&mut self) {
        self.packets_sent_in_current_phase += 1;
    }

    /// Called once the peer has acknowledged data sent under the current
    /// phase, the second precondition spec.md §4.11 requires before a key
    /// update may be initiated.
    pub fn on_peer_ack_in_current_phase(&mut self) {
        self.peer_acked_in_current_phase = true;
    }

    /// Whether this side may initiate a key update: `kMinKeyUpdateInterval`
    /// packets have passed since the last update and the peer has
    /// acknowledged data in the current phase.
    pub fn should_initiate_key_update(&self) -> bool {
        self.packets_sent_in_current_phase >= MIN_KEY_UPDATE_INTERVAL_PACKETS && self.peer_acked_in_current_phase
    }

    /// Flips the local key phase bit and resets the bookkeeping that gates
    /// the next update.
    pub fn initiate_key_update(&mut self) {
        self.key_phase ^= 1;
        self.packets_sent_in_current_phase = 0;
        self.peer_acked_in_current_phase = false;
        #[cfg(feature = "tracing")]
        tracing::debug!(key_phase = self.key_phase, "key update initiated");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::time::Duration;

    fn ts(millis: u64) -> Timestamp {
        Timestamp::from_duration(Duration::from_millis(millis.max(1)))
    }

    fn cid(byte: u8) -> ConnectionId {
        ConnectionId::try_from_bytes(&[byte; 8]).unwrap()
    }

    fn connection() -> Connection {
        Connection::new(endpoint::Type::Client, 1, cid(1), cid(2), Settings::default())
    }

    #[test]
    fn lifecycle_advances_idle_to_connected() {
        let mut c = connection();
        assert_eq!(c.state(), ConnectionState::Idle);
        c.start_handshake();
        assert_eq!(c.state(), ConnectionState::Handshake);
        c.on_handshake_confirmed();
        assert_eq!(c.state(), ConnectionState::Connected);
    }

    #[test]
    fn idle_timeout_fires_after_three_times_the_effective_timeout() {
        let mut c = connection();
        c.start_handshake();
        c.on_handshake_confirmed();
        c.local_idle_timeout = Duration::from_millis(100);
        c.peer_idle_timeout = Duration::from_millis(100);
        c.on_ack_eliciting_packet_received(ts(0));
        assert!(!c.check_idle_timeout(ts(299), ts(0)));
        assert!(c.check_idle_timeout(ts(300), ts(0)));
        assert_eq!(c.state(), ConnectionState::Closed);
    }

    #[test]
    fn locally_initiated_close_enters_closing_then_draining_on_peer_echo() {
        let mut c = connection();
        c.start_handshake();
        c.on_handshake_confirmed();
        c.initiate_close(ts(0), TransportError::INTERNAL_ERROR).unwrap();
        assert_eq!(c.state(), ConnectionState::Closing);
        assert!(c.should_retransmit_close());

        c.on_connection_close_received(ts(10), ConnectionError::Closed { initiator: Location::Remote });
        assert_eq!(c.state(), ConnectionState::Draining);
        assert!(!c.should_retransmit_close());
    }

    #[test]
    fn disconnect_timeout_closes_a_draining_connection() {
        let mut c = connection();
        c.start_handshake();
        c.initiate_close(ts(0), TransportError::INTERNAL_ERROR).unwrap();
        assert!(!c.check_disconnect_timeout(ts(1)));
        let far_future = ts(1).checked_add(Duration::from_secs(3600)).unwrap();
        assert!(c.check_disconnect_timeout(far_future));
        assert_eq!(c.state(), ConnectionState::Closed);
    }

    #[test]
    fn retry_is_only_accepted_once() {
        let mut c = connection();
        assert!(c.accept_retry(cid(3)).is_ok());
        assert_eq!(c.peer_cid(), cid(3));
        assert_eq!(c.accept_retry(cid(4)), Err(RetryError::AlreadyRetried));
    }

    #[test]
    fn a_second_version_negotiation_round_is_rejected() {
        let mut c = connection();
        assert!(c.note_version_negotiation_attempt().is_ok());
        assert!(c.note_version_negotiation_attempt().is_err());
    }

    #[test]
    fn key_update_requires_both_the_packet_count_and_a_peer_ack() {
        let mut c = connection();
        assert!(!c.should_initiate_key_update());
        for _ in 0..MIN_KEY_UPDATE_INTERVAL_PACKETS {
            c.on_1rtt_packet_sent();
        }
        assert!(!c.should_initiate_key_update());
        c.on_peer_ack_in_current_phase();
        assert!(c.should_initiate_key_update());
        let phase_before = c.key_phase();
        c.initiate_key_update();
        assert_ne!(phase_before, c.key_phase());
        assert!(!c.should_initiate_key_update());
    }
}
