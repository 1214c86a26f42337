// Copyright netq contributors
// SPDX-License-Identifier: Apache-2.0

//! QUIC frame types, RFC 9000 §19. Frames are the payload of decrypted
//! packets; each packet carries one or more frames concatenated back to
//! back, with no overall length prefix — a frame's own tag and fields
//! determine where it ends.

pub mod ack;
pub mod connection_close;
pub mod connection_id;
pub mod crypto;
pub mod datagram;
pub mod flow_control;
pub mod path;
pub mod simple;
pub mod stream;

pub use ack::Ack;
pub use connection_close::ConnectionClose;
pub use connection_id::{NewConnectionId, RetireConnectionId};
pub use crypto::{Crypto, NewToken};
pub use datagram::Datagram;
pub use flow_control::{DataBlocked, MaxData, MaxStreamData, MaxStreams, StreamDataBlocked, StreamsBlocked};
pub use path::{PathChallenge, PathResponse};
pub use simple::{HandshakeDone, Padding, Ping};
pub use stream::{ResetStream, Stream, StopSending};

use netq_codec::{DecoderBufferMut, DecoderBufferMutResult, DecoderError};

pub(crate) type Tag = u8;

/// Whether receiving a frame obligates the receiver to eventually send an
/// acknowledgment, RFC 9000 §13.2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckElicitation {
    NonEliciting,
    Eliciting,
}

impl AckElicitation {
    pub fn is_ack_eliciting(self) -> bool {
        matches!(self, AckElicitation::Eliciting)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum Frame<'a> {
    Padding(Padding),
    Ping(Ping),
    Ack(Ack<'a>),
    ResetStream(ResetStream),
    StopSending(StopSending),
    Crypto(Crypto<'a>),
    NewToken(NewToken<'a>),
    Stream(Stream<'a>),
    MaxData(MaxData),
    MaxStreamData(MaxStreamData),
    MaxStreams(MaxStreams),
    DataBlocked(DataBlocked),
    StreamDataBlocked(StreamDataBlocked),
    StreamsBlocked(StreamsBlocked),
    NewConnectionId(NewConnectionId<'a>),
    RetireConnectionId(RetireConnectionId),
    PathChallenge(PathChallenge),
    PathResponse(PathResponse),
    ConnectionClose(ConnectionClose<'a>),
    HandshakeDone(HandshakeDone),
    Datagram(Datagram<'a>),
}

impl<'a> Frame<'a> {
    pub fn ack_elicitation(&self) -> AckElicitation {
        match self {
            Frame::Padding(_) | Frame::Ack(_) => AckElicitation::NonEliciting,
            _ => AckElicitation::Eliciting,
        }
    }

    /// Whether this frame counts toward congestion-controlled bytes in
    /// flight, RFC 9002 §2 — everything except ACK, PADDING, and
    /// CONNECTION_CLOSE.
    pub fn is_congestion_controlled(&self) -> bool {
        !matches!(self, Frame::Ack(_) | Frame::Padding(_) | Frame::ConnectionClose(_))
    }

    pub fn decode(buffer: DecoderBufferMut<'a>) -> DecoderBufferMutResult<'a, Self> {
        let tag = buffer.peek_byte(0)?;
        match tag {
            0x00 => Padding::decode(buffer).map(|(f, b)| (Frame::Padding(f), b)),
            0x01 => Ping::decode(buffer).map(|(f, b)| (Frame::Ping(f), b)),
            0x02..=0x03 => Ack::decode(buffer).map(|(f, b)| (Frame::Ack(f), b)),
            0x04 => ResetStream::decode(buffer).map(|(f, b)| (Frame::ResetStream(f), b)),
            0x05 => StopSending::decode(buffer).map(|(f, b)| (Frame::StopSending(f), b)),
            0x06 => Crypto::decode(buffer).map(|(f, b)| (Frame::Crypto(f), b)),
            0x07 => NewToken::decode(buffer).map(|(f, b)| (Frame::NewToken(f), b)),
            0x08..=0x0f => Stream::decode(buffer).map(|(f, b)| (Frame::Stream(f), b)),
            0x10 => MaxData::decode(buffer).map(|(f, b)| (Frame::MaxData(f), b)),
            0x11 => MaxStreamData::decode(buffer).map(|(f, b)| (Frame::MaxStreamData(f), b)),
            0x12..=0x13 => MaxStreams::decode(buffer).map(|(f, b)| (Frame::MaxStreams(f), b)),
            0x14 => DataBlocked::decode(buffer).map(|(f, b)| (Frame::DataBlocked(f), b)),
            0x15 => StreamDataBlocked::decode(buffer).map(|(f, b)| (Frame::StreamDataBlocked(f), b)),
            0x16..=0x17 => StreamsBlocked::decode(buffer).map(|(f, b)| (Frame::StreamsBlocked(f), b)),
            0x18 => NewConnectionId::decode(buffer).map(|(f, b)| (Frame::NewConnectionId(f), b)),
            0x19 => RetireConnectionId::decode(buffer).map(|(f, b)| (Frame::RetireConnectionId(f), b)),
            0x1a => PathChallenge::decode(buffer).map(|(f, b)| (Frame::PathChallenge(f), b)),
            0x1b => PathResponse::decode(buffer).map(|(f, b)| (Frame::PathResponse(f), b)),
            0x1c..=0x1d => ConnectionClose::decode(buffer).map(|(f, b)| (Frame::ConnectionClose(f), b)),
            0x1e => HandshakeDone::decode(buffer).map(|(f, b)| (Frame::HandshakeDone(f), b)),
            0x30..=0x31 => Datagram::decode(buffer).map(|(f, b)| (Frame::Datagram(f), b)),
            _ => Err(DecoderError::InvariantViolation("unknown frame type")),
        }
    }
}
