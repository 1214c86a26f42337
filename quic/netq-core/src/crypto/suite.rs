// Copyright netq contributors
// SPDX-License-Identifier: Apache-2.0

//! The AEAD suites QUIC v1 negotiates through the TLS handshake, RFC 9001
//! §5.3. Each suite fixes a hash (for its HKDF key schedule), an AEAD
//! algorithm, and a header-protection algorithm.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherSuite {
    Aes128GcmSha256,
    Aes256GcmSha384,
    Chacha20Poly1305Sha256,
}

/// Which hash function backs this suite's HKDF key schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlg {
    Sha256,
    Sha384,
}

impl CipherSuite {
    pub fn hash(self) -> HashAlg {
        match self {
            CipherSuite::Aes128GcmSha256 => HashAlg::Sha256,
            CipherSuite::Aes256GcmSha384 => HashAlg::Sha384,
            CipherSuite::Chacha20Poly1305Sha256 => HashAlg::Sha256,
        }
    }

    pub fn key_len(self) -> usize {
        match self {
            CipherSuite::Aes128GcmSha256 => 16,
            CipherSuite::Aes256GcmSha384 => 32,
            CipherSuite::Chacha20Poly1305Sha256 => 32,
        }
    }

    pub fn hp_key_len(self) -> usize {
        self.key_len()
    }

    /// All of RFC 9001's QUIC v1 suites use a 12-byte IV and a 16-byte tag.
    pub const IV_LEN: usize = 12;
    pub const TAG_LEN: usize = 16;
    /// Header protection samples are always 16 bytes, regardless of suite.
    pub const SAMPLE_LEN: usize = 16;
}

impl HashAlg {
    pub fn len(self) -> usize {
        match self {
            HashAlg::Sha256 => 32,
            HashAlg::Sha384 => 48,
        }
    }
}
