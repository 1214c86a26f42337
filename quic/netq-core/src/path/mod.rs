// Copyright netq contributors
// SPDX-License-Identifier: Apache-2.0

//! A network path: the (local, peer) address pair a connection communicates
//! over, its discovered MTU, and the anti-amplification/validation state
//! RFC 9000 §8.2, §9 requires before a server trusts an unvalidated path.

pub mod mtu;

pub use mtu::Controller as MtuController;

use core::net::SocketAddr;

pub const MINIMUM_MTU: u16 = 1200;
pub const UDP_HEADER_LEN: u16 = 8;
pub const IPV4_MIN_HEADER_LEN: u16 = 20;
pub const IPV6_MIN_HEADER_LEN: u16 = 40;

/// RFC 9000 §8: until a path is validated, a server limits the amount it
/// sends on it to a small multiple of what it has received, to avoid being
/// used as a DoS amplifier.
#[derive(Debug, Clone, Copy)]
pub struct AntiAmplification {
    received_bytes: u64,
    sent_bytes: u64,
    is_validated: bool,
}

/// The limiting factor: an endpoint is permitted to send up to this
/// multiple of what it has received before amplification limits apply.
const AMPLIFICATION_FACTOR: u64 = 3;

impl Default for AntiAmplification {
    fn default() -> Self {
        Self {
            received_bytes: 0,
            sent_bytes: 0,
            is_validated: false,
        }
    }
}

impl AntiAmplification {
    pub fn on_validated(&mut self) {
        self.is_validated = true;
    }

    pub fn is_validated(&self) -> bool {
        self.is_validated
    }

    pub fn on_bytes_received(&mut self, bytes: u64) {
        self.received_bytes = self.received_bytes.saturating_add(bytes);
    }

    pub fn on_bytes_sent(&mut self, bytes: u64) {
        self.sent_bytes = self.sent_bytes.saturating_add(bytes);
    }

    /// How many more bytes may be sent on this path right now.
    pub fn available_amplification_budget(&self) -> u64 {
        if self.is_validated {
            return u64::MAX;
        }
        (self.received_bytes.saturating_mul(AMPLIFICATION_FACTOR)).saturating_sub(self.sent_bytes)
    }

    pub fn can_send(&self, bytes: u64) -> bool {
        self.available_amplification_budget() >= bytes
    }
}

#[derive(Debug, Clone)]
pub struct Path {
    pub local_address: SocketAddr,
    pub peer_address: SocketAddr,
    pub mtu: MtuController,
    pub anti_amplification: AntiAmplification,
    /// set once a PATH_CHALLENGE sent on this path has been answered with
    /// the matching PATH_RESPONSE, RFC 9000 §8.2.
    pub is_peer_validated: bool,
}

impl Path {
    pub fn new(local_address: SocketAddr, peer_address: SocketAddr, max_mtu: u16) -> Self {
        Self {
            local_address,
            peer_address,
            mtu: MtuController::new(max_mtu, peer_address.is_ipv4()),
            anti_amplification: AntiAmplification::default(),
            is_peer_validated: false,
        }
    }

    pub fn on_path_response_valid(&mut self) {
        self.is_peer_validated = true;
        self.anti_amplification.on_validated();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unvalidated_path_limits_send_budget() {
        let mut amp = AntiAmplification::default();
        amp.on_bytes_received(100);
        assert!(amp.can_send(300));
        assert!(!amp.can_send(301));
    }

    #[test]
    fn validated_path_has_unlimited_budget() {
        let mut amp = AntiAmplification::default();
        amp.on_validated();
        assert!(amp.can_send(u64::MAX / 2));
    }
}
