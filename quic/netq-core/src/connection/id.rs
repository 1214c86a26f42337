// Copyright netq contributors
// SPDX-License-Identifier: Apache-2.0

//! The QUIC connection ID, RFC 9000 §5.1: an opaque routing label, up to 20
//! bytes in QUIC v1, independently chosen by each endpoint for its peer to
//! use.

use core::fmt;

pub const MAX_LEN: usize = 20;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId {
    bytes: [u8; MAX_LEN],
    len: u8,
}

impl ConnectionId {
    pub const EMPTY: ConnectionId = ConnectionId {
        bytes: [0; MAX_LEN],
        len: 0,
    };

    /// Builds a connection id from a byte slice, returning `None` if it
    /// exceeds [`MAX_LEN`]. All shorter lengths, including zero, are valid.
    pub fn try_from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() > MAX_LEN {
            return None;
        }
        let mut storage = [0u8; MAX_LEN];
        storage[..bytes.len()].copy_from_slice(bytes);
        Some(Self {
            bytes: storage,
            len: bytes.len() as u8,
        })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl fmt::Debug for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConnectionId({:02x?})", self.as_bytes())
    }
}

/// A sequence-numbered connection ID together with the bookkeeping RFC 9000
/// §5.1.1/§5.1.2 requires: the peer-chosen stateless-reset token for IDs the
/// peer issued to us, and a retire-prior-to watermark for IDs we issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IssuedConnectionId {
    pub id: ConnectionId,
    pub sequence_number: u64,
    pub stateless_reset_token: [u8; 16],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_oversized_ids() {
        let too_long = [0u8; MAX_LEN + 1];
        assert!(ConnectionId::try_from_bytes(&too_long).is_none());
    }

    #[test]
    fn preserves_exact_bytes_and_length() {
        let id = ConnectionId::try_from_bytes(&[1, 2, 3, 4, 5]).unwrap();
        assert_eq!(id.as_bytes(), &[1, 2, 3, 4, 5]);
        assert_eq!(id.len(), 5);
    }

    #[test]
    fn empty_id_is_valid() {
        let id = ConnectionId::try_from_bytes(&[]).unwrap();
        assert!(id.is_empty());
        assert_eq!(id, ConnectionId::EMPTY);
    }
}
