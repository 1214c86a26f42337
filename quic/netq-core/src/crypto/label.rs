// Copyright netq contributors
// SPDX-License-Identifier: Apache-2.0

//! HKDF-Expand-Label labels and the v1 Initial salt, RFC 9001 §5.2, Appendix A.1.

use hex_literal::hex;

//= https://www.rfc-editor.org/rfc/rfc9001#section-5.2
//# initial_salt = 0x38762cf7f55934b34d179ae6a4c80cadccbb7f0a
pub const INITIAL_SALT_V1: [u8; 20] = hex!("38762cf7f55934b34d179ae6a4c80cadccbb7f0a");

/// draft-29 salt, retained for interop fallback.
pub const INITIAL_SALT_DRAFT29: [u8; 20] = hex!("afbfec289993d24c9e9786f19c6111e04390a899");

pub const CLIENT_IN: &[u8] = b"client in";
pub const SERVER_IN: &[u8] = b"server in";
pub const QUIC_KEY: &[u8] = b"quic key";
pub const QUIC_IV: &[u8] = b"quic iv";
pub const QUIC_HP: &[u8] = b"quic hp";
pub const QUIC_KU: &[u8] = b"quic ku";

/// Builds the `HkdfLabel` structure TLS 1.3 §7.1 defines for HKDF-Expand-Label:
/// `u16 length || u8 label_len || "tls13 " || label || u8 0 (empty context)`.
pub fn hkdf_label(out_len: usize, label: &[u8]) -> heapless_label::HkdfLabelBuf {
    const TLS_LABEL: &[u8] = b"tls13 ";
    let mut buf = heapless_label::HkdfLabelBuf::new();
    buf.extend_from_slice(&(out_len as u16).to_be_bytes());
    buf.push((TLS_LABEL.len() + label.len()) as u8);
    buf.extend_from_slice(TLS_LABEL);
    buf.extend_from_slice(label);
    buf.push(0);
    buf
}

/// A tiny fixed-capacity byte buffer, avoiding an allocation for the short
/// (<= ~30 byte) HkdfLabel construction used on every key derivation.
pub mod heapless_label {
    #[derive(Clone)]
    pub struct HkdfLabelBuf {
        buf: [u8; 64],
        len: usize,
    }

    impl HkdfLabelBuf {
        pub fn new() -> Self {
            Self {
                buf: [0; 64],
                len: 0,
            }
        }

        pub fn push(&mut self, byte: u8) {
            self.buf[self.len] = byte;
            self.len += 1;
        }

        pub fn extend_from_slice(&mut self, bytes: &[u8]) {
            self.buf[self.len..self.len + bytes.len()].copy_from_slice(bytes);
            self.len += bytes.len();
        }

        pub fn as_slice(&self) -> &[u8] {
            &self.buf[..self.len]
        }
    }

    impl Default for HkdfLabelBuf {
        fn default() -> Self {
            Self::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_matches_tls13_layout() {
        let label = hkdf_label(32, CLIENT_IN);
        let bytes = label.as_slice();
        assert_eq!(&bytes[0..2], &32u16.to_be_bytes());
        assert_eq!(bytes[2], (6 + CLIENT_IN.len()) as u8);
        assert_eq!(&bytes[3..9], b"tls13 ");
        assert_eq!(&bytes[9..9 + CLIENT_IN.len()], CLIENT_IN);
        assert_eq!(*bytes.last().unwrap(), 0);
    }
}
