// Copyright netq contributors
// SPDX-License-Identifier: Apache-2.0

//! The Initial, 0-RTT and Handshake long header forms, which share a common
//! layout: Version, DCID, SCID, (Token for Initial), Length, Packet Number.

use super::{ParseError, FIXED_BIT, LONG_HEADER_BIT, MAX_CONNECTION_ID_LEN};
use netq_codec::{DecoderBufferMut, DecoderBufferMutResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LongPacketKind {
    Initial,
    ZeroRtt,
    Handshake,
}

impl LongPacketKind {
    fn type_bits(self) -> u8 {
        match self {
            Self::Initial => super::LONG_HEADER_TYPE_INITIAL,
            Self::ZeroRtt => super::LONG_HEADER_TYPE_ZERO_RTT,
            Self::Handshake => super::LONG_HEADER_TYPE_HANDSHAKE,
        }
    }
}

/// An Initial/0-RTT/Handshake packet whose payload is still header-protected
/// and AEAD-encrypted.
#[derive(Debug)]
pub struct ProtectedLongPacket<'a> {
    pub kind: LongPacketKind,
    pub version: u32,
    pub destination_connection_id: &'a [u8],
    pub source_connection_id: &'a [u8],
    pub token: Option<&'a [u8]>,
    /// offset, from the start of the packet, of the truncated packet number
    /// field (whose length is not yet known -- header protection must be
    /// removed first to recover it).
    pub packet_number_offset: usize,
    pub payload: &'a mut [u8],
}

impl<'a> ProtectedLongPacket<'a> {
    pub fn decode(
        buffer: DecoderBufferMut<'a>,
        kind: LongPacketKind,
    ) -> DecoderBufferMutResult<'a, Self> {
        let (tag, buffer) = buffer.decode::<u8>()?;
        if tag & LONG_HEADER_BIT == 0 || tag & FIXED_BIT == 0 {
            return Err(netq_codec::DecoderError::InvariantViolation(
                "malformed long header",
            ));
        }
        if (tag >> 4) & 0b11 != kind.type_bits() {
            return Err(netq_codec::DecoderError::InvariantViolation(
                "packet type does not match expected long header kind",
            ));
        }

        let (version, buffer) = buffer.decode::<u32>()?;

        let (dcid_len, buffer) = buffer.decode::<u8>()?;
        if dcid_len as usize > MAX_CONNECTION_ID_LEN {
            return Err(netq_codec::DecoderError::InvariantViolation(
                "destination connection id too long",
            ));
        }
        let (dcid, buffer) = buffer.decode_slice(dcid_len as usize)?;

        let (scid_len, buffer) = buffer.decode::<u8>()?;
        if scid_len as usize > MAX_CONNECTION_ID_LEN {
            return Err(netq_codec::DecoderError::InvariantViolation(
                "source connection id too long",
            ));
        }
        let (scid, buffer) = buffer.decode_slice(scid_len as usize)?;

        let (token, buffer) = if kind == LongPacketKind::Initial {
            let (token, buffer) = buffer.decode_slice_with_len_prefix::<crate::varint::VarInt>()?;
            (Some(token), buffer)
        } else {
            (None, buffer)
        };

        let (length, buffer) = buffer.decode::<crate::varint::VarInt>()?;
        let length: usize = length
            .try_into()
            .map_err(|_| netq_codec::DecoderError::InvariantViolation("length overflow"))?;

        // the packet number is inside `length`, but its size is only known
        // after header protection has been removed, so we hand back the raw
        // payload (packet number + frames) together.
        let packet_number_offset = 0;
        let (payload, remaining) = buffer.decode_slice(length)?;

        let packet = Self {
            kind,
            version,
            destination_connection_id: dcid.into_less_safe_slice(),
            source_connection_id: scid.into_less_safe_slice(),
            token: token.map(|t| t.into_less_safe_slice()),
            packet_number_offset,
            payload: payload.into_less_safe_slice(),
        };

        Ok((packet, remaining))
    }
}

impl From<ParseError> for netq_codec::DecoderError {
    fn from(_: ParseError) -> Self {
        netq_codec::DecoderError::InvariantViolation("packet parse error")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::varint::VarInt;
    use netq_codec::{Encoder, EncoderBuffer};

    fn build_initial(payload_len: usize) -> Vec<u8> {
        let mut buf = vec![0u8; 1500];
        let mut encoder = EncoderBuffer::new(&mut buf);
        encoder.encode(&(LONG_HEADER_BIT | FIXED_BIT | (super::super::LONG_HEADER_TYPE_INITIAL << 4)));
        encoder.encode(&1u32); // version
        encoder.encode(&8u8); // dcid len
        encoder.write_slice(&[0xAAu8; 8]);
        encoder.encode(&4u8); // scid len
        encoder.write_slice(&[0xBBu8; 4]);
        encoder.encode(&VarInt::new(0).unwrap()); // empty token
        encoder.encode(&VarInt::new(payload_len as u64).unwrap());
        encoder.write_repeated(payload_len, 0x42);
        let len = encoder.len();
        buf.truncate(len);
        buf
    }

    #[test]
    fn round_trip_initial_header() {
        let mut bytes = build_initial(32);
        let buffer = DecoderBufferMut::new(&mut bytes);
        let (packet, remaining) =
            ProtectedLongPacket::decode(buffer, LongPacketKind::Initial).unwrap();
        assert_eq!(packet.destination_connection_id, &[0xAA; 8]);
        assert_eq!(packet.source_connection_id, &[0xBB; 4]);
        assert_eq!(packet.payload.len(), 32);
        assert!(remaining.is_empty());
    }
}
