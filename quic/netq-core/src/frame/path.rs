// Copyright netq contributors
// SPDX-License-Identifier: Apache-2.0

//! PATH_CHALLENGE and PATH_RESPONSE, RFC 9000 §19.17, §19.18, each carrying
//! an 8-byte value the peer is expected to echo back unmodified.

use netq_codec::{DecoderBufferMut, DecoderBufferMutResult, Encoder, EncoderValue};

pub const DATA_LEN: usize = 8;

macro_rules! opaque_data_frame {
    ($name:ident, $tag:expr) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub struct $name {
            pub data: [u8; DATA_LEN],
        }

        impl $name {
            pub fn decode(buffer: DecoderBufferMut) -> DecoderBufferMutResult<Self> {
                let (_tag, buffer) = buffer.decode::<u8>()?;
                let (slice, buffer) = buffer.decode_slice(DATA_LEN)?;
                let data: [u8; DATA_LEN] = slice.into_less_safe_slice().try_into().unwrap();
                Ok((Self { data }, buffer))
            }
        }

        impl EncoderValue for $name {
            fn encode<E: Encoder>(&self, buffer: &mut E) {
                buffer.encode(&($tag as u8));
                buffer.write_slice(&self.data);
            }
        }
    };
}

opaque_data_frame!(PathChallenge, 0x1a);
opaque_data_frame!(PathResponse, 0x1b);

#[cfg(test)]
mod tests {
    use super::*;
    use netq_codec::EncoderBuffer;

    #[test]
    fn path_challenge_round_trips() {
        let frame = PathChallenge { data: [1; DATA_LEN] };
        let mut buf = [0u8; 16];
        let mut encoder = EncoderBuffer::new(&mut buf);
        encoder.encode(&frame);
        let len = encoder.len();
        let (decoded, _) = PathChallenge::decode(DecoderBufferMut::new(&mut buf[..len])).unwrap();
        assert_eq!(decoded, frame);
    }
}
