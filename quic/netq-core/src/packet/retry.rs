// Copyright netq contributors
// SPDX-License-Identifier: Apache-2.0

//! The Retry packet, RFC 9000 §17.2.5. Server-only; carries a token the
//! client must echo back in a fresh Initial, authenticated by a 16-byte
//! integrity tag computed over a pseudo-packet.

use super::{FIXED_BIT, LONG_HEADER_BIT, LONG_HEADER_TYPE_RETRY, MAX_CONNECTION_ID_LEN};
use alloc::vec::Vec;
use netq_codec::{DecoderBufferMut, DecoderBufferMutResult, DecoderError};

pub const INTEGRITY_TAG_LEN: usize = 16;

/// The fixed AES-128-GCM key/nonce used to compute/verify the Retry
/// Integrity Tag for QUIC v1, RFC 9001 §5.8.
pub const RETRY_INTEGRITY_KEY_V1: [u8; 16] =
    hex_literal::hex!("be0c690b9f66575a1d766b54e368c84e");
pub const RETRY_INTEGRITY_NONCE_V1: [u8; 12] = hex_literal::hex!("461599d35d632bf2239825bb");

#[derive(Debug)]
pub struct RetryPacket<'a> {
    pub version: u32,
    pub destination_connection_id: &'a [u8],
    pub source_connection_id: &'a [u8],
    pub token: &'a [u8],
    pub integrity_tag: &'a [u8; INTEGRITY_TAG_LEN],
    /// the bytes covered by the integrity tag computation, i.e. everything
    /// up to (not including) the tag itself.
    pub header: &'a [u8],
}

impl<'a> RetryPacket<'a> {
    pub fn decode(buffer: DecoderBufferMut<'a>) -> DecoderBufferMutResult<'a, Self> {
        let all = buffer.peek().into_less_safe_slice();
        if all.len() < 1 + 4 + 1 + 1 + INTEGRITY_TAG_LEN {
            return Err(DecoderError::InvariantViolation("retry packet too short"));
        }
        let header_len = all.len() - INTEGRITY_TAG_LEN;

        let (tag, buffer) = buffer.decode::<u8>()?;
        if tag & LONG_HEADER_BIT == 0 || tag & FIXED_BIT == 0 {
            return Err(DecoderError::InvariantViolation("malformed retry header"));
        }
        if (tag >> 4) & 0b11 != LONG_HEADER_TYPE_RETRY {
            return Err(DecoderError::InvariantViolation("not a retry packet"));
        }

        let (version, buffer) = buffer.decode::<u32>()?;

        let (dcid_len, buffer) = buffer.decode::<u8>()?;
        if dcid_len as usize > MAX_CONNECTION_ID_LEN {
            return Err(DecoderError::InvariantViolation("dcid too long"));
        }
        let (dcid, buffer) = buffer.decode_slice(dcid_len as usize)?;

        let (scid_len, buffer) = buffer.decode::<u8>()?;
        if scid_len as usize > MAX_CONNECTION_ID_LEN {
            return Err(DecoderError::InvariantViolation("scid too long"));
        }
        let (scid, buffer) = buffer.decode_slice(scid_len as usize)?;

        let token_len = buffer.len() - INTEGRITY_TAG_LEN;
        let (token, buffer) = buffer.decode_slice(token_len)?;
        let (tag_slice, remaining) = buffer.decode_slice(INTEGRITY_TAG_LEN)?;

        let header = &all[..header_len];
        let integrity_tag: &[u8; INTEGRITY_TAG_LEN] =
            tag_slice.into_less_safe_slice().try_into().unwrap();

        Ok((
            Self {
                version,
                destination_connection_id: dcid.into_less_safe_slice(),
                source_connection_id: scid.into_less_safe_slice(),
                token: token.into_less_safe_slice(),
                integrity_tag,
                header,
            },
            remaining,
        ))
    }
}

/// Builds the pseudo-packet over which the integrity tag is computed:
/// ODCID length || ODCID || (Retry header, minus the tag).
pub fn pseudo_packet(original_destination_connection_id: &[u8], retry_header: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + original_destination_connection_id.len() + retry_header.len());
    out.push(original_destination_connection_id.len() as u8);
    out.extend_from_slice(original_destination_connection_id);
    out.extend_from_slice(retry_header);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pseudo_packet_prefixes_odcid() {
        let odcid = [1, 2, 3, 4];
        let header = [9, 9, 9];
        let pkt = pseudo_packet(&odcid, &header);
        assert_eq!(pkt[0], 4);
        assert_eq!(&pkt[1..5], &odcid);
        assert_eq!(&pkt[5..], &header);
    }
}
