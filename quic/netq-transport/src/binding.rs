// Copyright netq contributors
// SPDX-License-Identifier: Apache-2.0

//! UDP binding and listener, spec.md §4.13: demultiplexing inbound
//! datagrams to a connection by destination CID, admitting new server
//! connections (directly or behind a Retry challenge), and answering
//! unroutable short-header packets with a stateless reset.
//!
//! Grounded directly on spec.md §4.13/§5, since the teacher's own
//! `s2n-quic-transport` has no binding/listener implementation in this
//! repo's retrieval pack (its endpoint/listener wiring lives in
//! `s2n-quic-platform`/`s2n-quic`, neither of which made the filtered
//! pack). The destination-CID parsing this module relies on is
//! `netq_core::packet::parse_one`, already built and tested in a prior
//! session; this module only adds the routing table and the
//! Initial-vs-Retry-vs-drop policy layered on top of it.

use std::sync::RwLock;

use hashbrown::HashMap;
use netq_codec::DecoderBufferMut;
use netq_core::{
    connection::ConnectionId,
    crypto,
    packet::{self, ParseError, ProtectedPacket},
};

pub const STATELESS_RESET_TOKEN_LEN: usize = 16;

/// What a binding decided to do with one inbound datagram, having parsed
/// only its destination CID and, for an unrouted Initial, its token —
/// never its protected payload. The caller (the worker that owns the
/// routed connection, or the listener for a `Initial` disposition) does
/// the rest.
pub enum Disposition<R> {
    /// the destination CID matched a bound connection; hand the datagram
    /// (and any remaining coalesced packets) to it.
    Route(R),
    /// an Initial packet to a CID this binding has never seen. The token,
    /// if any, is handed to a `Listener` to decide admit/retry/reject.
    Initial {
        destination_connection_id: ConnectionId,
        source_connection_id: ConnectionId,
        token: Option<Vec<u8>>,
    },
    /// a short header matched no bound connection: the peer most likely
    /// holds state this binding no longer has (restart, or a stale
    /// connection id), and should be told to stop with a stateless reset
    /// carrying this token.
    StatelessReset([u8; STATELESS_RESET_TOKEN_LEN]),
    /// anything else unrouted (0-RTT/Handshake/Retry/Version Negotiation
    /// to an unknown CID): nothing useful to do but drop it.
    Drop,
}

/// Demultiplexes inbound datagrams to connections by destination CID, and
/// derives stateless reset tokens. `R` is whatever the caller uses to
/// route further work to a connection (typically a handle exposing an
/// [`crate::operation::OperationQueue`]); this module does not require it
/// to be any particular type, only `Clone` so a lookup can hand a caller
/// its own reference to act on.
///
/// spec.md §5: "the only inter-thread shared mutable state is ... the
/// binding's CID hash table (rw lock)" — hence `RwLock` rather than the
/// `Mutex` used for the single-writer-at-a-time operation queue.
pub struct Binding<R> {
    local_cid_len: usize,
    reset_key: Vec<u8>,
    routes: RwLock<HashMap<ConnectionId, R>>,
}

impl<R: Clone> Binding<R> {
    /// `local_cid_len` is the length this binding expects of CIDs it
    /// issues, needed to parse short headers (which carry no length
    /// prefix). `reset_key` is the static secret the stateless-reset PRF
    /// is keyed on; it must stay stable for as long as previously-issued
    /// CIDs should still produce a recognizable reset token.
    pub fn new(local_cid_len: usize, reset_key: Vec<u8>) -> Self {
        Self {
            local_cid_len,
            reset_key,
            routes: RwLock::new(HashMap::new()),
        }
    }

    pub fn register(&self, cid: ConnectionId, route: R) {
        self.routes.write().unwrap().insert(cid, route);
    }

    pub fn unregister(&self, cid: &ConnectionId) {
        self.routes.write().unwrap().remove(cid);
    }

    pub fn route_count(&self) -> usize {
        self.routes.read().unwrap().len()
    }

    /// RFC 9000 §5.8's keyed PRF, evaluated fresh on demand rather than
    /// stored per connection id: any still-registered (or since-forgotten)
    /// CID recomputes to the same token as long as `reset_key` is stable.
    pub fn stateless_reset_token(&self, cid: &ConnectionId) -> [u8; STATELESS_RESET_TOKEN_LEN] {
        crypto::stateless_reset_token(&self.reset_key, cid.as_bytes())
    }

    /// Parses just enough of one datagram's leading packet to route it,
    /// per spec.md §4.13's first sentence, and classifies what should
    /// happen next if nothing is bound to its destination CID.
    pub fn classify(&self, datagram: DecoderBufferMut<'_>) -> Result<Disposition<R>, ParseError> {
        let (packet, _remaining) = packet::parse_one(datagram, self.local_cid_len)?;

        let dcid = ConnectionId::try_from_bytes(packet.destination_connection_id())
            .ok_or(ParseError::InvalidDestinationConnectionId)?;

        if let Some(route) = self.routes.read().unwrap().get(&dcid) {
            return Ok(Disposition::Route(route.clone()));
        }

        match packet {
            ProtectedPacket::Initial(p) => {
                let scid = ConnectionId::try_from_bytes(p.source_connection_id)
                    .ok_or(ParseError::Malformed)?;
                Ok(Disposition::Initial {
                    destination_connection_id: dcid,
                    source_connection_id: scid,
                    token: p.token.filter(|t| !t.is_empty()).map(|t| t.to_vec()),
                })
            }
            ProtectedPacket::Short(_) => Ok(Disposition::StatelessReset(self.stateless_reset_token(&dcid))),
            ProtectedPacket::ZeroRtt(_)
            | ProtectedPacket::Handshake(_)
            | ProtectedPacket::Retry(_)
            | ProtectedPacket::VersionNegotiation(_) => Ok(Disposition::Drop),
        }
    }
}

/// A pending server connection attempt, passed to the application's
/// accept/reject callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewConnectionIndication {
    pub destination_connection_id: ConnectionId,
    pub source_connection_id: ConnectionId,
}

/// The application's answer to a [`NewConnectionIndication`], spec.md
/// §4.13: "invokes the application callback, which returns accept/reject
/// and an application configuration". The configuration itself is the
/// caller's [`crate::config::Settings`]; `Accept` carries nothing further
/// since the listener already has it.
pub enum AcceptDecision {
    Accept,
    Reject,
}

/// What [`Listener::admit`] decided for one unrouted Initial packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmitDecision {
    /// create a new server `Connection` for this attempt.
    Accept {
        destination_connection_id: ConnectionId,
        source_connection_id: ConnectionId,
    },
    /// send a Retry challenging the client to echo a token before a
    /// connection is created (spec.md §4.13: "a valid token (or a
    /// stateless-retry decision)").
    Retry {
        destination_connection_id: ConnectionId,
        source_connection_id: ConnectionId,
    },
    /// the application callback declined the attempt.
    Reject,
}

/// Owns a set of ALPNs and a configuration, and decides what to do with
/// each unrouted Initial a [`Binding`] hands it, spec.md §4.13.
///
/// Validating the *contents* of a retry token (its format is
/// application/deployment-specific — an address-bound opaque blob in most
/// deployments) is out of scope here, same proportionate cut as the
/// Non-goals around the datapath boundary: this module only distinguishes
/// "no token" from "some token", and leaves confirming the token's
/// authenticity to whatever built it (see DESIGN.md).
pub struct Listener {
    alpns: Vec<Vec<u8>>,
    settings: crate::config::Settings,
    retry_required: bool,
    on_new_connection: Box<dyn Fn(&NewConnectionIndication) -> AcceptDecision + Send + Sync>,
}

impl Listener {
    pub fn new(
        alpns: Vec<Vec<u8>>,
        settings: crate::config::Settings,
        on_new_connection: impl Fn(&NewConnectionIndication) -> AcceptDecision + Send + Sync + 'static,
    ) -> Self {
        Self {
            alpns,
            settings,
            retry_required: false,
            on_new_connection: Box::new(on_new_connection),
        }
    }

    pub fn with_retry_required(mut self, retry_required: bool) -> Self {
        self.retry_required = retry_required;
        self
    }

    pub fn alpns(&self) -> &[Vec<u8>] {
        &self.alpns
    }

    pub fn settings(&self) -> &crate::config::Settings {
        &self.settings
    }

    pub fn retry_required(&self) -> bool {
        self.retry_required
    }

    /// The first of this listener's ALPNs that also appears in `offered`,
    /// in the listener's own preference order.
    pub fn select_alpn(&self, offered: &[&[u8]]) -> Option<&[u8]> {
        self.alpns
            .iter()
            .map(Vec::as_slice)
            .find(|alpn| offered.contains(alpn))
    }

    /// Turns one `Disposition::Initial` into an admit decision: a Retry
    /// challenge if required and not yet satisfied, otherwise the
    /// application callback's accept/reject.
    pub fn admit(
        &self,
        destination_connection_id: ConnectionId,
        source_connection_id: ConnectionId,
        token: Option<&[u8]>,
    ) -> AdmitDecision {
        if self.retry_required && token.is_none() {
            return AdmitDecision::Retry {
                destination_connection_id,
                source_connection_id,
            };
        }

        let indication = NewConnectionIndication {
            destination_connection_id,
            source_connection_id,
        };
        match (self.on_new_connection)(&indication) {
            AcceptDecision::Accept => AdmitDecision::Accept {
                destination_connection_id,
                source_connection_id,
            },
            AcceptDecision::Reject => AdmitDecision::Reject,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netq_codec::{Encoder, EncoderBuffer};
    use netq_core::varint::VarInt;

    fn cid(byte: u8, len: usize) -> ConnectionId {
        ConnectionId::try_from_bytes(&alloc::vec![byte; len]).unwrap()
    }

    fn initial_datagram(dcid: &[u8], scid: &[u8], token: &[u8]) -> Vec<u8> {
        let mut buf = vec![0u8; 1500];
        let mut encoder = EncoderBuffer::new(&mut buf);
        encoder.encode(&(0x80u8 | 0x40 | (0b00 << 4))); // long header, fixed bit, Initial
        encoder.encode(&1u32); // version
        encoder.encode(&(dcid.len() as u8));
        encoder.write_slice(dcid);
        encoder.encode(&(scid.len() as u8));
        encoder.write_slice(scid);
        encoder.encode(&VarInt::new(token.len() as u64).unwrap());
        encoder.write_slice(token);
        let payload_len = 32;
        encoder.encode(&VarInt::new(payload_len as u64).unwrap());
        encoder.write_repeated(payload_len, 0x42);
        let len = encoder.len();
        buf.truncate(len);
        buf
    }

    fn short_datagram(dcid: &[u8]) -> Vec<u8> {
        let mut buf = vec![0u8; 64];
        let mut encoder = EncoderBuffer::new(&mut buf);
        encoder.encode(&0x40u8); // short header, fixed bit
        encoder.write_slice(dcid);
        encoder.write_repeated(16, 0x01);
        let len = encoder.len();
        buf.truncate(len);
        buf
    }

    #[test]
    fn routes_to_a_registered_connection_id() {
        let binding: Binding<u32> = Binding::new(8, alloc::vec![1u8; 32]);
        binding.register(cid(0xAA, 8), 7);

        let mut bytes = short_datagram(&[0xAA; 8]);
        let disposition = binding.classify(DecoderBufferMut::new(&mut bytes)).unwrap();
        assert!(matches!(disposition, Disposition::Route(7)));
    }

    #[test]
    fn unrouted_initial_with_no_token_is_classified_for_the_listener() {
        let binding: Binding<u32> = Binding::new(8, alloc::vec![1u8; 32]);
        let mut bytes = initial_datagram(&[0xBB; 8], &[0xCC; 4], &[]);
        let disposition = binding.classify(DecoderBufferMut::new(&mut bytes)).unwrap();
        match disposition {
            Disposition::Initial { destination_connection_id, source_connection_id, token } => {
                assert_eq!(destination_connection_id, cid(0xBB, 8));
                assert_eq!(source_connection_id, cid(0xCC, 4));
                assert!(token.is_none());
            }
            _ => panic!("expected an Initial disposition"),
        }
    }

    #[test]
    fn unrouted_short_header_yields_a_stateless_reset() {
        let binding: Binding<u32> = Binding::new(8, alloc::vec![1u8; 32]);
        let mut bytes = short_datagram(&[0xDD; 8]);
        let disposition = binding.classify(DecoderBufferMut::new(&mut bytes)).unwrap();
        match disposition {
            Disposition::StatelessReset(token) => {
                assert_eq!(token, binding.stateless_reset_token(&cid(0xDD, 8)));
            }
            _ => panic!("expected a stateless reset"),
        }
    }

    #[test]
    fn listener_requires_retry_until_a_token_is_presented() {
        let listener = Listener::new(alloc::vec![b"h3".to_vec()], crate::config::Settings::default(), |_| {
            AcceptDecision::Accept
        })
        .with_retry_required(true);

        let retry = listener.admit(cid(1, 8), cid(2, 4), None);
        assert!(matches!(retry, AdmitDecision::Retry { .. }));

        let accepted = listener.admit(cid(1, 8), cid(2, 4), Some(&[0u8; 16]));
        assert!(matches!(accepted, AdmitDecision::Accept { .. }));
    }

    #[test]
    fn listener_can_reject_without_retry_required() {
        let listener = Listener::new(alloc::vec![b"h3".to_vec()], crate::config::Settings::default(), |_| {
            AcceptDecision::Reject
        });
        let decision = listener.admit(cid(1, 8), cid(2, 4), None);
        assert!(matches!(decision, AdmitDecision::Reject));
    }

    #[test]
    fn select_alpn_prefers_listener_order() {
        let listener = Listener::new(
            alloc::vec![b"h3".to_vec(), b"hq-interop".to_vec()],
            crate::config::Settings::default(),
            |_| AcceptDecision::Accept,
        );
        let offered: Vec<&[u8]> = alloc::vec![b"hq-interop".as_slice(), b"h3".as_slice()];
        assert_eq!(listener.select_alpn(&offered), Some(b"h3".as_slice()));
    }
}
