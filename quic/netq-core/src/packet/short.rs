// Copyright netq contributors
// SPDX-License-Identifier: Apache-2.0

//! The 1-RTT short header, RFC 9000 §17.3. Carries no explicit length, so it
//! must be the last packet in a coalesced UDP datagram.

use super::FIXED_BIT;
use crate::packet::number::PacketNumberLen;
use netq_codec::{DecoderBufferMut, DecoderBufferMutResult, DecoderError};

pub const SHORT_HEADER_BIT: u8 = 0x00;
pub const SPIN_BIT: u8 = 0x20;
pub const KEY_PHASE_BIT: u8 = 0x04;

#[derive(Debug)]
pub struct ProtectedShortPacket<'a> {
    pub destination_connection_id: &'a [u8],
    pub spin_bit: bool,
    /// remaining bytes after the destination connection id: the (still
    /// header-protected) first-byte tag byte plus the packet number and
    /// frames payload.
    pub payload: &'a mut [u8],
}

impl<'a> ProtectedShortPacket<'a> {
    pub fn decode(
        buffer: DecoderBufferMut<'a>,
        dcid_len: usize,
    ) -> DecoderBufferMutResult<'a, Self> {
        let tag_byte = buffer.peek_byte(0)?;
        if tag_byte & 0x80 != 0 || tag_byte & FIXED_BIT == 0 {
            return Err(DecoderError::InvariantViolation("malformed short header"));
        }
        let spin_bit = tag_byte & SPIN_BIT != 0;

        let (_tag, buffer) = buffer.decode_slice(1)?;
        let (dcid, buffer) = buffer.decode_slice(dcid_len)?;

        // everything remaining (header-protection mask covers the low bits
        // of the tag byte and the packet number; neither is usable until
        // decrypted) is handed back as one opaque payload slice. The caller
        // re-derives the tag byte's position to apply the HP mask in place.
        let remaining_len = buffer.len();
        let (payload, remaining) = buffer.decode_slice(remaining_len)?;

        Ok((
            Self {
                destination_connection_id: dcid.into_less_safe_slice(),
                spin_bit,
                payload: payload.into_less_safe_slice(),
            },
            remaining,
        ))
    }

    /// Removes header protection from the first byte and packet number,
    /// given the 5-byte mask derived from the AEAD sample (RFC 9001 §5.4.1).
    pub fn remove_header_protection(
        &mut self,
        first_byte: &mut u8,
        mask: &[u8; 5],
    ) -> PacketNumberLen {
        *first_byte ^= mask[0] & 0x1f;
        let pn_len = PacketNumberLen::from_tag(*first_byte & 0b11);
        for (byte, m) in self.payload[..pn_len.bytes()].iter_mut().zip(&mask[1..]) {
            *byte ^= m;
        }
        pn_len
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netq_codec::{Encoder, EncoderBuffer};

    #[test]
    fn decodes_destination_connection_id() {
        let mut buf = [0u8; 64];
        let mut encoder = EncoderBuffer::new(&mut buf);
        encoder.encode(&(FIXED_BIT | SPIN_BIT));
        encoder.write_slice(&[1, 2, 3, 4]);
        encoder.write_repeated(20, 0xEE);
        let len = encoder.len();

        let buffer = DecoderBufferMut::new(&mut buf[..len]);
        let (packet, remaining) = ProtectedShortPacket::decode(buffer, 4).unwrap();
        assert_eq!(packet.destination_connection_id, &[1, 2, 3, 4]);
        assert!(packet.spin_bit);
        assert!(remaining.is_empty());
    }
}
