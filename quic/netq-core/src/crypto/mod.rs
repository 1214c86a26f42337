// Copyright netq contributors
// SPDX-License-Identifier: Apache-2.0

//! The cryptographic adapter: key derivation, packet protection, and header
//! protection, RFC 9001. This module has no knowledge of the TLS handshake
//! itself — it assumes a negotiated [`CipherSuite`] and a traffic secret
//! handed down from the handshake, and turns those into usable packet keys.

pub mod keys;
pub mod label;
pub mod suite;

pub use keys::{derive_initial_secrets, derive_packet_keys, stateless_reset_token, update_secret, CryptoError, DirectionalKeys};
pub use suite::{CipherSuite, HashAlg};

use alloc::vec::Vec;

/// The Initial packet number space always uses AES-128-GCM-SHA256 keys
/// derived from a version-specific salt, independent of the suite later
/// negotiated by the handshake, RFC 9001 §5.2.
pub struct InitialKeys {
    pub client: DirectionalKeys,
    pub server: DirectionalKeys,
}

pub fn initial_keys(salt: &[u8], destination_connection_id: &[u8]) -> Result<InitialKeys, CryptoError> {
    let (client_secret, server_secret) = derive_initial_secrets(salt, destination_connection_id);
    Ok(InitialKeys {
        client: derive_packet_keys(CipherSuite::Aes128GcmSha256, &client_secret)?,
        server: derive_packet_keys(CipherSuite::Aes128GcmSha256, &server_secret)?,
    })
}

/// Tracks the current (and, during a key update, previous) 1-RTT secret for
/// one direction, so that packets sent or received during the update's
/// two-RTT transition window can still be processed, RFC 9001 §6.
pub struct KeyPhase {
    suite: CipherSuite,
    secret: Vec<u8>,
    current: DirectionalKeys,
    previous: Option<DirectionalKeys>,
    phase_bit: bool,
}

impl KeyPhase {
    pub fn new(suite: CipherSuite, secret: Vec<u8>) -> Result<Self, CryptoError> {
        let current = derive_packet_keys(suite, &secret)?;
        Ok(Self {
            suite,
            secret,
            current,
            previous: None,
            phase_bit: false,
        })
    }

    pub fn phase_bit(&self) -> bool {
        self.phase_bit
    }

    pub fn keys(&self) -> &DirectionalKeys {
        &self.current
    }

    /// Returns the prior generation's keys, if a key update is still within
    /// its transition window (used to accept packets from before the peer
    /// observed the flip).
    pub fn previous_keys(&self) -> Option<&DirectionalKeys> {
        self.previous.as_ref()
    }

    /// Advances to the next key generation. The caller is responsible for
    /// enforcing the one-update-per-RTT and acked-packet-in-new-phase rules;
    /// this only performs the derivation and bookkeeping.
    pub fn update(&mut self) -> Result<(), CryptoError> {
        let next_secret = update_secret(self.suite.hash(), &self.secret);
        let next = derive_packet_keys(self.suite, &next_secret)?;
        self.secret = next_secret;
        self.previous = Some(core::mem::replace(&mut self.current, next));
        self.phase_bit = !self.phase_bit;
        #[cfg(feature = "tracing")]
        tracing::debug!(phase_bit = self.phase_bit, "key phase advanced");
        Ok(())
    }

    /// Drops the previous generation's keys once the transition window has
    /// elapsed (after a PTO with no need to accept old-phase packets).
    pub fn discard_previous(&mut self) {
        self.previous = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use label::INITIAL_SALT_V1;

    #[test]
    fn initial_keys_derive_for_both_roles() {
        let dcid = [0x83, 0x94, 0xc8, 0xf0, 0x3e, 0x51, 0x57, 0x08];
        let keys = initial_keys(&INITIAL_SALT_V1, &dcid).unwrap();
        assert_eq!(keys.client.iv.len(), CipherSuite::IV_LEN);
        assert_eq!(keys.server.iv.len(), CipherSuite::IV_LEN);
    }

    #[test]
    fn key_phase_update_flips_bit_and_keeps_previous() {
        let secret = alloc::vec![7u8; 32];
        let mut phase = KeyPhase::new(CipherSuite::Aes128GcmSha256, secret).unwrap();
        assert!(!phase.phase_bit());
        phase.update().unwrap();
        assert!(phase.phase_bit());
        assert!(phase.previous_keys().is_some());
        phase.discard_previous();
        assert!(phase.previous_keys().is_none());
    }
}
