// Copyright netq contributors
// SPDX-License-Identifier: Apache-2.0

//! NEW_CONNECTION_ID and RETIRE_CONNECTION_ID, RFC 9000 §19.15, §19.16.

use crate::varint::VarInt;
use netq_codec::{DecoderBufferMut, DecoderBufferMutResult, DecoderError, Encoder, EncoderValue};

pub const STATELESS_RESET_TOKEN_LEN: usize = 16;

#[derive(Debug, PartialEq, Eq)]
pub struct NewConnectionId<'a> {
    pub sequence_number: VarInt,
    pub retire_prior_to: VarInt,
    pub connection_id: &'a [u8],
    pub stateless_reset_token: &'a [u8; STATELESS_RESET_TOKEN_LEN],
}

impl<'a> NewConnectionId<'a> {
    pub fn decode(buffer: DecoderBufferMut<'a>) -> DecoderBufferMutResult<'a, Self> {
        let (_tag, buffer) = buffer.decode::<u8>()?;
        let (sequence_number, buffer) = buffer.decode::<VarInt>()?;
        let (retire_prior_to, buffer) = buffer.decode::<VarInt>()?;
        if retire_prior_to > sequence_number {
            return Err(DecoderError::InvariantViolation(
                "retire_prior_to must not exceed the sequence number",
            ));
        }
        let (length, buffer) = buffer.decode::<u8>()?;
        if !(1..=20).contains(&length) {
            return Err(DecoderError::InvariantViolation("invalid connection id length"));
        }
        let (connection_id, buffer) = buffer.decode_slice(length as usize)?;
        let (token, buffer) = buffer.decode_slice(STATELESS_RESET_TOKEN_LEN)?;
        let stateless_reset_token: &[u8; STATELESS_RESET_TOKEN_LEN] =
            token.into_less_safe_slice().try_into().unwrap();

        Ok((
            Self {
                sequence_number,
                retire_prior_to,
                connection_id: connection_id.into_less_safe_slice(),
                stateless_reset_token,
            },
            buffer,
        ))
    }
}

impl<'a> EncoderValue for NewConnectionId<'a> {
    fn encode<E: Encoder>(&self, buffer: &mut E) {
        buffer.encode(&0x18u8);
        buffer.encode(&self.sequence_number);
        buffer.encode(&self.retire_prior_to);
        buffer.encode(&(self.connection_id.len() as u8));
        buffer.write_slice(self.connection_id);
        buffer.write_slice(self.stateless_reset_token);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetireConnectionId {
    pub sequence_number: VarInt,
}

impl RetireConnectionId {
    pub fn decode(buffer: DecoderBufferMut) -> DecoderBufferMutResult<Self> {
        let (_tag, buffer) = buffer.decode::<u8>()?;
        let (sequence_number, buffer) = buffer.decode::<VarInt>()?;
        Ok((Self { sequence_number }, buffer))
    }
}

impl EncoderValue for RetireConnectionId {
    fn encode<E: Encoder>(&self, buffer: &mut E) {
        buffer.encode(&0x19u8);
        buffer.encode(&self.sequence_number);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netq_codec::EncoderBuffer;

    #[test]
    fn new_connection_id_round_trips() {
        let frame = NewConnectionId {
            sequence_number: VarInt::from_u32(1),
            retire_prior_to: VarInt::from_u32(0),
            connection_id: &[1, 2, 3, 4],
            stateless_reset_token: &[9u8; STATELESS_RESET_TOKEN_LEN],
        };
        let mut buf = [0u8; 64];
        let mut encoder = EncoderBuffer::new(&mut buf);
        encoder.encode(&frame);
        let len = encoder.len();
        let (decoded, remaining) = NewConnectionId::decode(DecoderBufferMut::new(&mut buf[..len])).unwrap();
        assert_eq!(decoded, frame);
        assert!(remaining.is_empty());
    }

    #[test]
    fn rejects_retire_prior_to_exceeding_sequence() {
        let mut buf = [0u8; 64];
        let mut encoder = EncoderBuffer::new(&mut buf);
        let frame = NewConnectionId {
            sequence_number: VarInt::from_u32(1),
            retire_prior_to: VarInt::from_u32(5),
            connection_id: &[1],
            stateless_reset_token: &[0u8; STATELESS_RESET_TOKEN_LEN],
        };
        encoder.encode(&frame);
        let len = encoder.len();
        assert!(NewConnectionId::decode(DecoderBufferMut::new(&mut buf[..len])).is_err());
    }
}
