// Copyright netq contributors
// SPDX-License-Identifier: Apache-2.0

//! Version Negotiation, RFC 9000 §17.2.1. Identified by a long header with
//! the version field set to 0; the remainder of the packet lists the
//! versions the server supports, in network byte order.

use super::{FIXED_BIT, LONG_HEADER_BIT, MAX_CONNECTION_ID_LEN};
use alloc::vec::Vec;
use netq_codec::{DecoderBufferMut, DecoderBufferMutResult, DecoderError};

#[derive(Debug)]
pub struct VersionNegotiationPacket<'a> {
    pub destination_connection_id: &'a [u8],
    pub source_connection_id: &'a [u8],
    pub supported_versions: &'a [u8],
}

impl<'a> VersionNegotiationPacket<'a> {
    pub fn decode(buffer: DecoderBufferMut<'a>) -> DecoderBufferMutResult<'a, Self> {
        let (tag, buffer) = buffer.decode::<u8>()?;
        if tag & LONG_HEADER_BIT == 0 {
            return Err(DecoderError::InvariantViolation(
                "version negotiation requires the long header bit",
            ));
        }
        let (version, buffer) = buffer.decode::<u32>()?;
        if version != 0 {
            return Err(DecoderError::InvariantViolation(
                "not a version negotiation packet",
            ));
        }

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

        let remaining_len = buffer.len();
        let (versions, remaining) = buffer.decode_slice(remaining_len)?;

        Ok((
            Self {
                destination_connection_id: dcid.into_less_safe_slice(),
                source_connection_id: scid.into_less_safe_slice(),
                supported_versions: versions.into_less_safe_slice(),
            },
            remaining,
        ))
    }

    pub fn iter_versions(&self) -> impl Iterator<Item = u32> + '_ {
        self.supported_versions
            .chunks_exact(4)
            .map(|c| u32::from_be_bytes([c[0], c[1], c[2], c[3]]))
    }
}

/// Builds a server's Version Negotiation response datagram. `destination`
/// and `source` are swapped relative to the triggering packet: the client's
/// source CID becomes the new destination.
pub fn build(destination_connection_id: &[u8], source_connection_id: &[u8], versions: &[u32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(7 + destination_connection_id.len() + source_connection_id.len() + versions.len() * 4);

    out.push(LONG_HEADER_BIT | FIXED_BIT | 0x7f); // unused type bits per RFC 9000 §17.2.1
    out.extend_from_slice(&0u32.to_be_bytes());
    out.push(destination_connection_id.len() as u8);
    out.extend_from_slice(destination_connection_id);
    out.push(source_connection_id.len() as u8);
    out.extend_from_slice(source_connection_id);
    for version in versions {
        out.extend_from_slice(&version.to_be_bytes());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_and_parses_round_trip() {
        let mut datagram = build(&[1, 2, 3, 4], &[5, 6], &[0x0000_0001, 0x1a2a_3a4a]);
        let buffer = DecoderBufferMut::new(&mut datagram);
        let (packet, _) = VersionNegotiationPacket::decode(buffer).unwrap();
        assert_eq!(packet.destination_connection_id, &[1, 2, 3, 4]);
        assert_eq!(packet.source_connection_id, &[5, 6]);
        let versions: Vec<u32> = packet.iter_versions().collect();
        assert_eq!(versions, vec![0x0000_0001, 0x1a2a_3a4a]);
    }
}
