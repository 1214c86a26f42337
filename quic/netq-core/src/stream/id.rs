// Copyright netq contributors
// SPDX-License-Identifier: Apache-2.0

//! The QUIC stream identifier, RFC 9000 §2.1: a 62-bit integer whose two
//! low bits encode the initiator and directionality.

use super::StreamType;
use crate::{endpoint, varint::VarInt};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StreamId(VarInt);

impl From<StreamId> for VarInt {
    fn from(id: StreamId) -> Self {
        id.0
    }
}

impl From<StreamId> for u64 {
    fn from(id: StreamId) -> Self {
        id.0.as_u64()
    }
}

impl StreamId {
    #[inline]
    pub const fn from_varint(id: VarInt) -> StreamId {
        StreamId(id)
    }

    #[inline]
    pub const fn as_varint(self) -> VarInt {
        self.0
    }

    /// The lowest-numbered stream ID for a given initiator/directionality
    /// pair: 0 (client-bidi), 1 (server-bidi), 2 (client-uni), 3 (server-uni).
    #[inline]
    pub fn initial(initiator: endpoint::Type, stream_type: StreamType) -> StreamId {
        match (stream_type == StreamType::Bidirectional, initiator == endpoint::Type::Client) {
            (true, true) => StreamId(VarInt::from_u32(0)),
            (true, false) => StreamId(VarInt::from_u32(1)),
            (false, true) => StreamId(VarInt::from_u32(2)),
            (false, false) => StreamId(VarInt::from_u32(3)),
        }
    }

    /// The n-th stream ID of this initiator/type, spaced 4 apart from
    /// `initial`. Returns `None` on overflow past [`VarInt::MAX`].
    #[inline]
    pub fn nth(initiator: endpoint::Type, stream_type: StreamType, n: u64) -> Option<StreamId> {
        let initial = Self::initial(initiator, stream_type);
        let id = VarInt::new(n.checked_mul(4)?.checked_add(initial.into())?).ok()?;
        Some(StreamId(id))
    }

    /// The next stream ID of the same initiator/type, 4 higher than `self`.
    #[inline]
    pub fn next_of_type(self) -> Option<StreamId> {
        self.0.checked_add(VarInt::from_u32(4)).map(StreamId::from_varint)
    }

    #[inline]
    pub fn initiator(self) -> endpoint::Type {
        if self.0.as_u64() & 0x01 == 0 {
            endpoint::Type::Client
        } else {
            endpoint::Type::Server
        }
    }

    #[inline]
    pub fn stream_type(self) -> StreamType {
        if self.0.as_u64() & 0x02 == 0 {
            StreamType::Bidirectional
        } else {
            StreamType::Unidirectional
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_stream_ids_round_trip_metadata() {
        for stream_type in [StreamType::Bidirectional, StreamType::Unidirectional] {
            for initiator in [endpoint::Type::Client, endpoint::Type::Server] {
                let id = StreamId::initial(initiator, stream_type);
                assert_eq!(stream_type, id.stream_type());
                assert_eq!(initiator, id.initiator());
            }
        }
    }

    #[test]
    fn next_of_type_overflow_returns_none() {
        let max = VarInt::new((1u64 << 62) - 1).unwrap();
        let near_max = StreamId::from_varint(max - VarInt::from_u32(4));
        assert!(near_max.next_of_type().is_some());

        for increment in 1..5u32 {
            let id = StreamId::from_varint(max - VarInt::from_u32(4) + VarInt::from_u32(increment));
            assert!(id.next_of_type().is_none());
        }
    }

    #[test]
    fn nth_matches_manual_stride() {
        for stream_type in [StreamType::Bidirectional, StreamType::Unidirectional] {
            for initiator in [endpoint::Type::Client, endpoint::Type::Server] {
                let first = StreamId::nth(initiator, stream_type, 0).unwrap();
                assert_eq!(StreamId::initial(initiator, stream_type), first);
                for n in 1..10u64 {
                    let nth = StreamId::nth(initiator, stream_type, n).unwrap();
                    assert_eq!(VarInt::from_u32(n as u32 * 4), nth.as_varint() - first.as_varint());
                }
            }
        }
    }
}
