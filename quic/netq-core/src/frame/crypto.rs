// Copyright netq contributors
// SPDX-License-Identifier: Apache-2.0

//! CRYPTO, RFC 9000 §19.6, and NEW_TOKEN, RFC 9000 §19.7.

use crate::varint::VarInt;
use netq_codec::{DecoderBufferMut, DecoderBufferMutResult, DecoderError, Encoder, EncoderValue};

#[derive(Debug, PartialEq, Eq)]
pub struct Crypto<'a> {
    pub offset: VarInt,
    pub data: &'a [u8],
}

impl<'a> Crypto<'a> {
    pub fn decode(buffer: DecoderBufferMut<'a>) -> DecoderBufferMutResult<'a, Self> {
        let (_tag, buffer) = buffer.decode::<u8>()?;
        let (offset, buffer) = buffer.decode::<VarInt>()?;
        let (len, buffer) = buffer.decode::<VarInt>()?;
        let len: usize = len
            .try_into()
            .map_err(|_| DecoderError::InvariantViolation("crypto length overflow"))?;
        let (data, buffer) = buffer.decode_slice(len)?;
        Ok((
            Self {
                offset,
                data: data.into_less_safe_slice(),
            },
            buffer,
        ))
    }
}

impl<'a> EncoderValue for Crypto<'a> {
    fn encode<E: Encoder>(&self, buffer: &mut E) {
        buffer.encode(&0x06u8);
        buffer.encode(&self.offset);
        buffer.encode(&VarInt::new(self.data.len() as u64).expect("crypto frame data within varint range"));
        buffer.write_slice(self.data);
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct NewToken<'a> {
    pub token: &'a [u8],
}

impl<'a> NewToken<'a> {
    pub fn decode(buffer: DecoderBufferMut<'a>) -> DecoderBufferMutResult<'a, Self> {
        let (_tag, buffer) = buffer.decode::<u8>()?;
        let (len, buffer) = buffer.decode::<VarInt>()?;
        let len: usize = len
            .try_into()
            .map_err(|_| DecoderError::InvariantViolation("token length overflow"))?;
        if len == 0 {
            return Err(DecoderError::InvariantViolation("empty token is invalid"));
        }
        let (token, buffer) = buffer.decode_slice(len)?;
        Ok((
            Self {
                token: token.into_less_safe_slice(),
            },
            buffer,
        ))
    }
}

impl<'a> EncoderValue for NewToken<'a> {
    fn encode<E: Encoder>(&self, buffer: &mut E) {
        buffer.encode(&0x07u8);
        buffer.encode(&VarInt::new(self.token.len() as u64).expect("token length within varint range"));
        buffer.write_slice(self.token);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netq_codec::EncoderBuffer;

    #[test]
    fn crypto_round_trips() {
        let frame = Crypto {
            offset: VarInt::from_u32(10),
            data: b"client hello",
        };
        let mut buf = [0u8; 32];
        let mut encoder = EncoderBuffer::new(&mut buf);
        encoder.encode(&frame);
        let len = encoder.len();
        let (decoded, remaining) = Crypto::decode(DecoderBufferMut::new(&mut buf[..len])).unwrap();
        assert_eq!(decoded, frame);
        assert!(remaining.is_empty());
    }

    #[test]
    fn new_token_rejects_empty_token() {
        let mut buf = [0x07u8, 0x00];
        let err = NewToken::decode(DecoderBufferMut::new(&mut buf));
        assert!(err.is_err());
    }
}
