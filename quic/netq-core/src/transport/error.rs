// Copyright netq contributors
// SPDX-License-Identifier: Apache-2.0

//! Transport error codes carried in CONNECTION_CLOSE frames, RFC 9000 §20.

use crate::varint::VarInt;
use core::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct TransportError {
    pub code: VarInt,
    pub frame_type: Option<VarInt>,
    pub reason: &'static str,
}

impl TransportError {
    pub const fn new(code: VarInt, reason: &'static str, frame_type: Option<VarInt>) -> Self {
        Self {
            code,
            reason,
            frame_type,
        }
    }

    pub const fn with_frame_type(mut self, frame_type: VarInt) -> Self {
        self.frame_type = Some(frame_type);
        self
    }

    pub const fn with_reason(mut self, reason: &'static str) -> Self {
        self.reason = reason;
        self
    }

    /// Builds a crypto-handshake-layer error, RFC 9000 §20 "CRYPTO_ERROR
    /// (0x1XX)": the low byte carries the TLS alert description.
    pub const fn crypto_error(alert: u8) -> Self {
        Self {
            code: VarInt::new_unchecked(0x100 | alert as u64),
            reason: "",
            frame_type: None,
        }
    }

    /// An error reported by the application via `RESET_STREAM`/`STOP_SENDING`
    /// carries no frame type, distinguishing it from a QUIC-layer error.
    pub const fn application_error(code: VarInt, reason: &'static str) -> Self {
        Self {
            code,
            reason,
            frame_type: None,
        }
    }

    pub fn is_application_error(&self) -> bool {
        self.frame_type.is_none()
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.reason.is_empty() {
            write!(f, "TransportError({})", self.code.as_u64())
        } else {
            f.write_str(self.reason)
        }
    }
}

macro_rules! def_error {
    ($doc:expr, $name:ident, $code:expr) => {
        impl TransportError {
            #[doc = $doc]
            pub const $name: TransportError = TransportError::new(VarInt::from_u32($code), "", None);
        }
    };
}

def_error!(
    "The connection is being closed abruptly in the absence of any error.",
    NO_ERROR,
    0x0
);
def_error!(
    "The endpoint encountered an internal error and cannot continue with the connection.",
    INTERNAL_ERROR,
    0x1
);
def_error!(
    "The server is currently busy and does not accept any new connections.",
    SERVER_BUSY,
    0x2
);
def_error!(
    "An endpoint received more data than it permitted in its advertised data limits.",
    FLOW_CONTROL_ERROR,
    0x3
);
def_error!(
    "An endpoint received a frame for a stream identifier that exceeded its advertised stream limit.",
    STREAM_LIMIT_ERROR,
    0x4
);
def_error!(
    "An endpoint received a frame for a stream that was not in a state that permitted that frame.",
    STREAM_STATE_ERROR,
    0x5
);
def_error!(
    "An endpoint received STREAM data or a RESET_STREAM final size inconsistent with data already received.",
    FINAL_SIZE_ERROR,
    0x6
);
def_error!(
    "An endpoint received a frame that was badly formatted.",
    FRAME_ENCODING_ERROR,
    0x7
);
def_error!(
    "An endpoint received transport parameters that were badly formatted or otherwise in error.",
    TRANSPORT_PARAMETER_ERROR,
    0x8
);
def_error!(
    "The number of connection IDs provided by the peer exceeds the advertised active_connection_id_limit.",
    CONNECTION_ID_LIMIT_ERROR,
    0x9
);
def_error!(
    "An endpoint detected an error with protocol compliance not covered by a more specific error code.",
    PROTOCOL_VIOLATION,
    0xA
);
def_error!(
    "A server received a client Initial that contained an invalid Token field.",
    INVALID_TOKEN,
    0xB
);
def_error!(
    "The application or application protocol caused the connection to be closed.",
    APPLICATION_ERROR,
    0xC
);
def_error!(
    "An endpoint has received more data in CRYPTO frames than it can buffer.",
    CRYPTO_BUFFER_EXCEEDED,
    0xD
);
def_error!(
    "An endpoint detected errors in performing key updates.",
    KEY_UPDATE_ERROR,
    0xE
);
def_error!(
    "An endpoint has reached the confidentiality or integrity limit for the AEAD algorithm.",
    AEAD_LIMIT_REACHED,
    0xF
);
def_error!(
    "An endpoint has determined that the network path is incapable of supporting QUIC.",
    NO_VIABLE_PATH,
    0x10
);

/// Builds a `TransportError` with a given reason string, mirroring
/// `TransportError::NO_ERROR.with_reason("...")` but as a single expression.
#[macro_export]
macro_rules! transport_error {
    ($error:expr) => {
        $crate::transport::error::TransportError::new($error.code, "", $error.frame_type)
    };
    ($error:expr, $reason:expr) => {
        $crate::transport::error::TransportError::new($error.code, $reason, $error.frame_type)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crypto_error_sets_0x1xx_range() {
        let err = TransportError::crypto_error(0x28); // handshake_failure
        assert_eq!(err.code.as_u64(), 0x128);
        assert!(err.frame_type.is_none());
    }

    #[test]
    fn application_error_has_no_frame_type() {
        let err = TransportError::application_error(VarInt::from_u32(7), "bye");
        assert!(err.is_application_error());
    }

    #[test]
    fn display_prefers_reason_over_code() {
        let err = TransportError::PROTOCOL_VIOLATION.with_reason("bad frame order");
        assert_eq!(alloc::format!("{}", err), "bad frame order");
    }
}
