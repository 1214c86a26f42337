// Copyright netq contributors
// SPDX-License-Identifier: Apache-2.0

//! Closing/draining bookkeeping, spec.md §4.11: once a connection starts
//! closing it no longer runs ordinary protocol state machines — it just
//! answers every received packet with the same CONNECTION_CLOSE frame until
//! the disconnect timeout fires, or stops answering entirely once the peer's
//! own close has been observed (DRAINING).

use netq_core::{connection::Error as ConnectionError, time::Timestamp};

/// The terminal-shutdown reason and the CONNECTION_CLOSE frame payload to
/// keep retransmitting while CLOSING, built once at the moment a connection
/// starts closing.
#[derive(Debug, Clone)]
pub struct CloseState {
    pub reason: ConnectionError,
    /// when the DRAINING/CLOSING period ends and the connection is torn
    /// down regardless of further packets, per spec.md §4.11's "disconnect
    /// timeout bounds the CLOSING state".
    pub deadline: Timestamp,
    /// DRAINING sends nothing further, even if more packets arrive.
    pub draining: bool,
}

impl CloseState {
    pub fn closing(reason: ConnectionError, deadline: Timestamp) -> Self {
        Self {
            reason,
            deadline,
            draining: false,
        }
    }

    pub fn draining(reason: ConnectionError, deadline: Timestamp) -> Self {
        Self {
            reason,
            deadline,
            draining: true,
        }
    }

    /// Called once per received packet while in CLOSING: returns whether
    /// the CONNECTION_CLOSE frame should be retransmitted in response (RFC
    /// 9000 §10.2.1 rate-limits this in a real send path via the builder's
    /// pacing, not here).
    pub fn should_retransmit_on_receipt(&self) -> bool {
        !self.draining
    }

    pub fn is_expired(&self, now: Timestamp) -> bool {
        now >= self.deadline
    }

    /// The peer's own CONNECTION_CLOSE arrived; stop retransmitting and
    /// enter DRAINING, keeping the original close reason and deadline.
    pub fn on_peer_close_received(&mut self) {
        self.draining = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::time::Duration;
    use netq_core::connection::Location;

    fn ts(millis: u64) -> Timestamp {
        Timestamp::from_duration(Duration::from_millis(millis))
    }

    #[test]
    fn closing_retransmits_until_peer_close_observed() {
        let mut state = CloseState::closing(
            ConnectionError::Closed { initiator: Location::Local },
            ts(1000),
        );
        assert!(state.should_retransmit_on_receipt());
        state.on_peer_close_received();
        assert!(!state.should_retransmit_on_receipt());
    }

    #[test]
    fn expires_once_deadline_passes() {
        let state = CloseState::draining(ConnectionError::StatelessReset, ts(100));
        assert!(!state.is_expired(ts(50)));
        assert!(state.is_expired(ts(100)));
    }
}
