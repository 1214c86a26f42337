// Copyright netq contributors
// SPDX-License-Identifier: Apache-2.0

//! The flow-control and blocked-signaling frames, RFC 9000 §19.9-§19.14.

use crate::varint::VarInt;
use netq_codec::{DecoderBufferMut, DecoderBufferMutResult, Encoder, EncoderValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamType {
    Bidirectional,
    Unidirectional,
}

macro_rules! single_varint_frame {
    ($name:ident, $field:ident, $tag:expr) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub struct $name {
            pub $field: VarInt,
        }

        impl $name {
            pub fn decode(buffer: DecoderBufferMut) -> DecoderBufferMutResult<Self> {
                let (_tag, buffer) = buffer.decode::<u8>()?;
                let ($field, buffer) = buffer.decode::<VarInt>()?;
                Ok((Self { $field }, buffer))
            }
        }

        impl EncoderValue for $name {
            fn encode<E: Encoder>(&self, buffer: &mut E) {
                buffer.encode(&($tag as u8));
                buffer.encode(&self.$field);
            }
        }
    };
}

single_varint_frame!(MaxData, maximum_data, 0x10);
single_varint_frame!(DataBlocked, maximum_data, 0x14);

macro_rules! typed_streams_frame {
    ($name:ident, $bidi_tag:expr, $uni_tag:expr) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub struct $name {
            pub stream_type: StreamType,
            pub maximum_streams: VarInt,
        }

        impl $name {
            pub fn decode(buffer: DecoderBufferMut) -> DecoderBufferMutResult<Self> {
                let (tag, buffer) = buffer.decode::<u8>()?;
                let stream_type = if tag == $bidi_tag {
                    StreamType::Bidirectional
                } else {
                    StreamType::Unidirectional
                };
                let (maximum_streams, buffer) = buffer.decode::<VarInt>()?;
                Ok((
                    Self {
                        stream_type,
                        maximum_streams,
                    },
                    buffer,
                ))
            }
        }

        impl EncoderValue for $name {
            fn encode<E: Encoder>(&self, buffer: &mut E) {
                let tag = match self.stream_type {
                    StreamType::Bidirectional => $bidi_tag,
                    StreamType::Unidirectional => $uni_tag,
                };
                buffer.encode(&(tag as u8));
                buffer.encode(&self.maximum_streams);
            }
        }
    };
}

typed_streams_frame!(MaxStreams, 0x12, 0x13);
typed_streams_frame!(StreamsBlocked, 0x16, 0x17);

macro_rules! stream_and_limit_frame {
    ($name:ident, $tag:expr) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub struct $name {
            pub stream_id: VarInt,
            pub maximum_stream_data: VarInt,
        }

        impl $name {
            pub fn decode(buffer: DecoderBufferMut) -> DecoderBufferMutResult<Self> {
                let (_tag, buffer) = buffer.decode::<u8>()?;
                let (stream_id, buffer) = buffer.decode::<VarInt>()?;
                let (maximum_stream_data, buffer) = buffer.decode::<VarInt>()?;
                Ok((
                    Self {
                        stream_id,
                        maximum_stream_data,
                    },
                    buffer,
                ))
            }
        }

        impl EncoderValue for $name {
            fn encode<E: Encoder>(&self, buffer: &mut E) {
                buffer.encode(&($tag as u8));
                buffer.encode(&self.stream_id);
                buffer.encode(&self.maximum_stream_data);
            }
        }
    };
}

stream_and_limit_frame!(MaxStreamData, 0x11);
stream_and_limit_frame!(StreamDataBlocked, 0x15);

#[cfg(test)]
mod tests {
    use super::*;
    use netq_codec::EncoderBuffer;

    #[test]
    fn max_data_round_trips() {
        let frame = MaxData {
            maximum_data: VarInt::from_u32(1_000_000),
        };
        let mut buf = [0u8; 16];
        let mut encoder = EncoderBuffer::new(&mut buf);
        encoder.encode(&frame);
        let len = encoder.len();
        let (decoded, _) = MaxData::decode(DecoderBufferMut::new(&mut buf[..len])).unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn max_streams_preserves_stream_type() {
        let frame = MaxStreams {
            stream_type: StreamType::Unidirectional,
            maximum_streams: VarInt::from_u32(10),
        };
        let mut buf = [0u8; 16];
        let mut encoder = EncoderBuffer::new(&mut buf);
        encoder.encode(&frame);
        let len = encoder.len();
        let (decoded, _) = MaxStreams::decode(DecoderBufferMut::new(&mut buf[..len])).unwrap();
        assert_eq!(decoded.stream_type, StreamType::Unidirectional);
    }
}
