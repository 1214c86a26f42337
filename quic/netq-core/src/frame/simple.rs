// Copyright netq contributors
// SPDX-License-Identifier: Apache-2.0

//! The handful of frames that carry no fields beyond their one-byte tag,
//! RFC 9000 §19.1 (PADDING), §19.2 (PING), §19.21 (HANDSHAKE_DONE).

use netq_codec::{DecoderBufferMut, DecoderBufferMutResult, Encoder, EncoderValue};

macro_rules! tag_only_frame {
    ($name:ident, $tag:expr) => {
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
        pub struct $name;

        impl $name {
            pub fn decode(buffer: DecoderBufferMut) -> DecoderBufferMutResult<Self> {
                let (_tag, buffer) = buffer.decode::<u8>()?;
                Ok((Self, buffer))
            }
        }

        impl EncoderValue for $name {
            fn encode<E: Encoder>(&self, buffer: &mut E) {
                buffer.encode(&($tag as u8));
            }
        }
    };
}

tag_only_frame!(Padding, 0x00);
tag_only_frame!(Ping, 0x01);
tag_only_frame!(HandshakeDone, 0x1e);

#[cfg(test)]
mod tests {
    use super::*;
    use netq_codec::EncoderBuffer;

    #[test]
    fn round_trips() {
        let mut buf = [0u8; 4];
        let mut encoder = EncoderBuffer::new(&mut buf);
        encoder.encode(&Ping);
        let len = encoder.len();
        let (ping, remaining) = Ping::decode(DecoderBufferMut::new(&mut buf[..len])).unwrap();
        assert_eq!(ping, Ping);
        assert!(remaining.is_empty());
    }
}
