// Copyright netq contributors
// SPDX-License-Identifier: Apache-2.0

//! The terminal reasons a connection stops running, RFC 9000 §10.

use super::Location;
use crate::transport::TransportError;
use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// closed without an error, e.g. by application API call.
    Closed { initiator: Location },
    /// closed with a QUIC-layer or application-layer transport error.
    Transport { error: TransportError, initiator: Location },
    /// torn down by a stateless reset from the peer.
    StatelessReset,
    /// the local idle timer expired with no activity from the peer.
    IdleTimerExpired,
    /// every stream ID of a given type has been exhausted.
    StreamIdExhausted,
    /// the handshake did not complete.
    HandshakeTimedOut,
}

impl Error {
    pub fn from_transport_error(error: TransportError, initiator: Location) -> Self {
        if error.code == TransportError::NO_ERROR.code {
            Self::Closed { initiator }
        } else if error.code == TransportError::APPLICATION_ERROR.code && initiator.is_remote() {
            Self::Closed { initiator }
        } else {
            Self::Transport { error, initiator }
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Closed { initiator } => write!(f, "connection closed by {initiator:?}"),
            Error::Transport { error, initiator } => {
                write!(f, "connection closed by {initiator:?} with transport error: {error}")
            }
            Error::StatelessReset => write!(f, "connection reset by peer's stateless reset"),
            Error::IdleTimerExpired => write!(f, "connection closed due to idle timeout"),
            Error::StreamIdExhausted => write!(f, "stream ID space exhausted"),
            Error::HandshakeTimedOut => write!(f, "handshake did not complete before its timeout"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::varint::VarInt;

    #[test]
    fn no_error_code_maps_to_closed() {
        let err = Error::from_transport_error(TransportError::NO_ERROR, Location::Remote);
        assert!(matches!(err, Error::Closed { initiator: Location::Remote }));
    }

    #[test]
    fn remote_application_error_with_no_code_maps_to_closed() {
        let err = Error::from_transport_error(TransportError::APPLICATION_ERROR, Location::Remote);
        assert!(matches!(err, Error::Closed { .. }));
    }

    #[test]
    fn other_errors_stay_as_transport_errors() {
        let code = TransportError::new(VarInt::from_u32(0x99), "", None);
        let err = Error::from_transport_error(code, Location::Local);
        assert!(matches!(err, Error::Transport { .. }));
    }
}
