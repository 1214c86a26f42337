// Copyright netq contributors
// SPDX-License-Identifier: Apache-2.0

//! CONNECTION_CLOSE, RFC 9000 §19.19. Type 0x1c signals a QUIC-layer error
//! (and carries the frame type that triggered it); type 0x1d signals an
//! application-layer error (no frame type field).

use crate::varint::VarInt;
use netq_codec::{DecoderBufferMut, DecoderBufferMutResult, DecoderError, Encoder, EncoderValue};

#[derive(Debug, PartialEq, Eq)]
pub struct ConnectionClose<'a> {
    pub error_code: VarInt,
    /// present only when this is a QUIC-layer close (tag 0x1c).
    pub frame_type: Option<VarInt>,
    pub reason: &'a [u8],
}

impl<'a> ConnectionClose<'a> {
    pub fn decode(buffer: DecoderBufferMut<'a>) -> DecoderBufferMutResult<'a, Self> {
        let (tag, buffer) = buffer.decode::<u8>()?;
        let (error_code, buffer) = buffer.decode::<VarInt>()?;

        let (frame_type, buffer) = if tag == 0x1c {
            let (frame_type, buffer) = buffer.decode::<VarInt>()?;
            (Some(frame_type), buffer)
        } else {
            (None, buffer)
        };

        let (reason_len, buffer) = buffer.decode::<VarInt>()?;
        let reason_len: usize = reason_len
            .try_into()
            .map_err(|_| DecoderError::InvariantViolation("reason phrase length overflow"))?;
        let (reason, buffer) = buffer.decode_slice(reason_len)?;

        Ok((
            Self {
                error_code,
                frame_type,
                reason: reason.into_less_safe_slice(),
            },
            buffer,
        ))
    }

    pub fn is_application_error(&self) -> bool {
        self.frame_type.is_none()
    }
}

impl<'a> EncoderValue for ConnectionClose<'a> {
    fn encode<E: Encoder>(&self, buffer: &mut E) {
        buffer.encode(&(if self.frame_type.is_some() { 0x1cu8 } else { 0x1du8 }));
        buffer.encode(&self.error_code);
        if let Some(frame_type) = self.frame_type {
            buffer.encode(&frame_type);
        }
        buffer.encode(&VarInt::new(self.reason.len() as u64).expect("reason phrase within varint range"));
        buffer.write_slice(self.reason);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netq_codec::EncoderBuffer;

    #[test]
    fn quic_layer_close_round_trips_with_frame_type() {
        let frame = ConnectionClose {
            error_code: VarInt::from_u32(10),
            frame_type: Some(VarInt::from_u32(0x1a)),
            reason: b"bad path challenge",
        };
        let mut buf = [0u8; 64];
        let mut encoder = EncoderBuffer::new(&mut buf);
        encoder.encode(&frame);
        let len = encoder.len();
        let (decoded, _) = ConnectionClose::decode(DecoderBufferMut::new(&mut buf[..len])).unwrap();
        assert_eq!(decoded, frame);
        assert!(!decoded.is_application_error());
    }

    #[test]
    fn application_close_has_no_frame_type() {
        let frame = ConnectionClose {
            error_code: VarInt::from_u32(0),
            frame_type: None,
            reason: b"",
        };
        let mut buf = [0u8; 16];
        let mut encoder = EncoderBuffer::new(&mut buf);
        encoder.encode(&frame);
        let len = encoder.len();
        let (decoded, _) = ConnectionClose::decode(DecoderBufferMut::new(&mut buf[..len])).unwrap();
        assert!(decoded.is_application_error());
    }
}
