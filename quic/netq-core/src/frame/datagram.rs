// Copyright netq contributors
// SPDX-License-Identifier: Apache-2.0

//! DATAGRAM, RFC 9221 §4. An unreliable, unordered sibling to STREAM data;
//! not subject to flow control or retransmission.

use crate::varint::VarInt;
use netq_codec::{DecoderBufferMut, DecoderBufferMutResult, DecoderError, Encoder, EncoderValue};

pub const TAG_WITHOUT_LENGTH: u8 = 0x30;
pub const TAG_WITH_LENGTH: u8 = 0x31;

#[derive(Debug, PartialEq, Eq)]
pub struct Datagram<'a> {
    pub data: &'a [u8],
}

impl<'a> Datagram<'a> {
    pub fn decode(buffer: DecoderBufferMut<'a>) -> DecoderBufferMutResult<'a, Self> {
        let (tag, buffer) = buffer.decode::<u8>()?;
        let (data, buffer) = if tag == TAG_WITH_LENGTH {
            let (len, buffer) = buffer.decode::<VarInt>()?;
            let len: usize = len
                .try_into()
                .map_err(|_| DecoderError::InvariantViolation("datagram length overflow"))?;
            let (data, buffer) = buffer.decode_slice(len)?;
            (data.into_less_safe_slice(), buffer)
        } else if tag == TAG_WITHOUT_LENGTH {
            let remaining = buffer.len();
            let (data, buffer) = buffer.decode_slice(remaining)?;
            (data.into_less_safe_slice(), buffer)
        } else {
            return Err(DecoderError::InvariantViolation("not a datagram frame tag"));
        };

        Ok((Self { data }, buffer))
    }
}

impl<'a> EncoderValue for Datagram<'a> {
    fn encode<E: Encoder>(&self, buffer: &mut E) {
        buffer.encode(&TAG_WITH_LENGTH);
        buffer.encode(&VarInt::new(self.data.len() as u64).expect("datagram data within varint range"));
        buffer.write_slice(self.data);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netq_codec::EncoderBuffer;

    #[test]
    fn round_trips_with_length() {
        let frame = Datagram { data: b"unreliable" };
        let mut buf = [0u8; 32];
        let mut encoder = EncoderBuffer::new(&mut buf);
        encoder.encode(&frame);
        let len = encoder.len();
        let (decoded, remaining) = Datagram::decode(DecoderBufferMut::new(&mut buf[..len])).unwrap();
        assert_eq!(decoded, frame);
        assert!(remaining.is_empty());
    }
}
