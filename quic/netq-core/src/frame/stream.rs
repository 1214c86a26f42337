// Copyright netq contributors
// SPDX-License-Identifier: Apache-2.0

//! STREAM, RESET_STREAM, and STOP_SENDING, RFC 9000 §19.4, §19.5, §19.8.

use crate::varint::VarInt;
use netq_codec::{DecoderBufferMut, DecoderBufferMutResult, DecoderError, Encoder, EncoderValue};

const OFF_BIT: u8 = 0x04;
const LEN_BIT: u8 = 0x02;
const FIN_BIT: u8 = 0x01;

#[derive(Debug, PartialEq, Eq)]
pub struct Stream<'a> {
    pub stream_id: VarInt,
    pub offset: VarInt,
    pub is_fin: bool,
    pub data: &'a [u8],
}

impl<'a> Stream<'a> {
    pub fn decode(buffer: DecoderBufferMut<'a>) -> DecoderBufferMutResult<'a, Self> {
        let (tag, buffer) = buffer.decode::<u8>()?;
        if tag & !0x07 != 0x08 {
            return Err(DecoderError::InvariantViolation("not a stream frame tag"));
        }

        let (stream_id, buffer) = buffer.decode::<VarInt>()?;

        let (offset, buffer) = if tag & OFF_BIT != 0 {
            buffer.decode::<VarInt>()?
        } else {
            (VarInt::ZERO, buffer)
        };

        let (data, buffer) = if tag & LEN_BIT != 0 {
            let (len, buffer) = buffer.decode::<VarInt>()?;
            let len: usize = len
                .try_into()
                .map_err(|_| DecoderError::InvariantViolation("stream length overflow"))?;
            let (data, buffer) = buffer.decode_slice(len)?;
            (data.into_less_safe_slice(), buffer)
        } else {
            let remaining = buffer.len();
            let (data, buffer) = buffer.decode_slice(remaining)?;
            (data.into_less_safe_slice(), buffer)
        };

        Ok((
            Self {
                stream_id,
                offset,
                is_fin: tag & FIN_BIT != 0,
                data,
            },
            buffer,
        ))
    }
}

impl<'a> EncoderValue for Stream<'a> {
    fn encode<E: Encoder>(&self, buffer: &mut E) {
        let mut tag = 0x08u8;
        if self.offset.as_u64() != 0 {
            tag |= OFF_BIT;
        }
        tag |= LEN_BIT;
        if self.is_fin {
            tag |= FIN_BIT;
        }
        buffer.encode(&tag);
        buffer.encode(&self.stream_id);
        if self.offset.as_u64() != 0 {
            buffer.encode(&self.offset);
        }
        buffer.encode(&VarInt::new(self.data.len() as u64).expect("frame data within varint range"));
        buffer.write_slice(self.data);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetStream {
    pub stream_id: VarInt,
    pub application_error_code: VarInt,
    pub final_size: VarInt,
}

impl ResetStream {
    pub fn decode(buffer: DecoderBufferMut) -> DecoderBufferMutResult<Self> {
        let (_tag, buffer) = buffer.decode::<u8>()?;
        let (stream_id, buffer) = buffer.decode::<VarInt>()?;
        let (application_error_code, buffer) = buffer.decode::<VarInt>()?;
        let (final_size, buffer) = buffer.decode::<VarInt>()?;
        Ok((
            Self {
                stream_id,
                application_error_code,
                final_size,
            },
            buffer,
        ))
    }
}

impl EncoderValue for ResetStream {
    fn encode<E: Encoder>(&self, buffer: &mut E) {
        buffer.encode(&0x04u8);
        buffer.encode(&self.stream_id);
        buffer.encode(&self.application_error_code);
        buffer.encode(&self.final_size);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopSending {
    pub stream_id: VarInt,
    pub application_error_code: VarInt,
}

impl StopSending {
    pub fn decode(buffer: DecoderBufferMut) -> DecoderBufferMutResult<Self> {
        let (_tag, buffer) = buffer.decode::<u8>()?;
        let (stream_id, buffer) = buffer.decode::<VarInt>()?;
        let (application_error_code, buffer) = buffer.decode::<VarInt>()?;
        Ok((
            Self {
                stream_id,
                application_error_code,
            },
            buffer,
        ))
    }
}

impl EncoderValue for StopSending {
    fn encode<E: Encoder>(&self, buffer: &mut E) {
        buffer.encode(&0x05u8);
        buffer.encode(&self.stream_id);
        buffer.encode(&self.application_error_code);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netq_codec::EncoderBuffer;

    #[test]
    fn stream_round_trips_with_offset_and_fin() {
        let frame = Stream {
            stream_id: VarInt::from_u32(4),
            offset: VarInt::from_u32(100),
            is_fin: true,
            data: b"hello",
        };
        let mut buf = [0u8; 64];
        let mut encoder = EncoderBuffer::new(&mut buf);
        encoder.encode(&frame);
        let len = encoder.len();

        let (decoded, remaining) = Stream::decode(DecoderBufferMut::new(&mut buf[..len])).unwrap();
        assert_eq!(decoded.stream_id, frame.stream_id);
        assert_eq!(decoded.offset, frame.offset);
        assert!(decoded.is_fin);
        assert_eq!(decoded.data, b"hello");
        assert!(remaining.is_empty());
    }

    #[test]
    fn reset_stream_round_trips() {
        let frame = ResetStream {
            stream_id: VarInt::from_u32(9),
            application_error_code: VarInt::from_u32(1),
            final_size: VarInt::from_u32(500),
        };
        let mut buf = [0u8; 32];
        let mut encoder = EncoderBuffer::new(&mut buf);
        encoder.encode(&frame);
        let len = encoder.len();
        let (decoded, _) = ResetStream::decode(DecoderBufferMut::new(&mut buf[..len])).unwrap();
        assert_eq!(decoded, frame);
    }
}
