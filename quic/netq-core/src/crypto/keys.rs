// Copyright netq contributors
// SPDX-License-Identifier: Apache-2.0

//! HKDF-Expand-Label key derivation and the AEAD/header-protection primitives
//! it feeds, RFC 9001 §5.1, §5.4.

use super::label::{hkdf_label, QUIC_HP, QUIC_IV, QUIC_KEY, QUIC_KU};
use super::suite::{CipherSuite, HashAlg};
use aead::{AeadInPlace, KeyInit as AeadKeyInit};
use aes_gcm::{Aes128Gcm, Aes256Gcm};
use alloc::vec::Vec;
use cipher::{KeyIvInit, StreamCipher, StreamCipherSeek};
use chacha20poly1305::ChaCha20Poly1305;
use hkdf::Hkdf;
use sha2::{Sha256, Sha384};

#[derive(Debug)]
pub enum CryptoError {
    /// the supplied secret was the wrong length for its hash function.
    InvalidSecretLength,
    /// AEAD seal/open failed: either the tag didn't verify, or the plaintext
    /// was too large for the QUIC/AEAD length limits.
    AeadFailure,
}

fn hkdf_expand_label(hash: HashAlg, secret: &[u8], label: &[u8], out: &mut [u8]) -> Result<(), CryptoError> {
    let info = hkdf_label(out.len(), label);
    match hash {
        HashAlg::Sha256 => {
            let hkdf = Hkdf::<Sha256>::from_prk(secret).map_err(|_| CryptoError::InvalidSecretLength)?;
            hkdf.expand(info.as_slice(), out)
                .map_err(|_| CryptoError::InvalidSecretLength)
        }
        HashAlg::Sha384 => {
            let hkdf = Hkdf::<Sha384>::from_prk(secret).map_err(|_| CryptoError::InvalidSecretLength)?;
            hkdf.expand(info.as_slice(), out)
                .map_err(|_| CryptoError::InvalidSecretLength)
        }
    }
}

/// Derives the two Initial traffic secrets from the version-specific salt
/// and the client's chosen (destination) connection id, RFC 9001 §5.2.
///
/// Initial secrets always use SHA-256, independent of the suite the
/// handshake eventually negotiates.
pub fn derive_initial_secrets(salt: &[u8], destination_connection_id: &[u8]) -> (Vec<u8>, Vec<u8>) {
    let initial_secret = Hkdf::<Sha256>::extract(Some(salt), destination_connection_id).0;

    let mut client_secret = alloc::vec![0u8; HashAlg::Sha256.len()];
    hkdf_expand_label(HashAlg::Sha256, &initial_secret, super::label::CLIENT_IN, &mut client_secret)
        .expect("fixed-length secret expansion cannot fail");
    let mut server_secret = alloc::vec![0u8; HashAlg::Sha256.len()];
    hkdf_expand_label(HashAlg::Sha256, &initial_secret, super::label::SERVER_IN, &mut server_secret)
        .expect("fixed-length secret expansion cannot fail");

    (client_secret, server_secret)
}

/// Derives the next generation's traffic secret during a 1-RTT key update,
/// RFC 9001 §6: `next = HKDF-Expand-Label(secret, "quic ku", "", Nh)`.
pub fn update_secret(hash: HashAlg, secret: &[u8]) -> Vec<u8> {
    let mut next = alloc::vec![0u8; hash.len()];
    hkdf_expand_label(hash, secret, QUIC_KU, &mut next).expect("fixed-length secret expansion cannot fail");
    next
}

/// The packet-protection (AEAD) key for one direction and one packet number
/// space, derived from a traffic secret.
pub enum PacketKey {
    Aes128Gcm(Aes128Gcm),
    Aes256Gcm(Aes256Gcm),
    Chacha20Poly1305(ChaCha20Poly1305),
}

/// The header-protection key for one direction, derived from the same
/// traffic secret as its sibling `PacketKey`.
pub enum HeaderProtectionKey {
    Aes128(aes::Aes128),
    Aes256(aes::Aes256),
    Chacha20([u8; 32]),
}

pub struct DirectionalKeys {
    pub packet: PacketKey,
    pub iv: [u8; CipherSuite::IV_LEN],
    pub header_protection: HeaderProtectionKey,
}

/// Derives `{key, iv, hp}` from a traffic secret, RFC 9001 §5.1.
pub fn derive_packet_keys(suite: CipherSuite, secret: &[u8]) -> Result<DirectionalKeys, CryptoError> {
    let hash = suite.hash();

    let mut raw_key = alloc::vec![0u8; suite.key_len()];
    hkdf_expand_label(hash, secret, QUIC_KEY, &mut raw_key)?;

    let mut iv = [0u8; CipherSuite::IV_LEN];
    hkdf_expand_label(hash, secret, QUIC_IV, &mut iv)?;

    let mut raw_hp = alloc::vec![0u8; suite.hp_key_len()];
    hkdf_expand_label(hash, secret, QUIC_HP, &mut raw_hp)?;

    let packet = match suite {
        CipherSuite::Aes128GcmSha256 => PacketKey::Aes128Gcm(Aes128Gcm::new_from_slice(&raw_key).map_err(|_| CryptoError::InvalidSecretLength)?),
        CipherSuite::Aes256GcmSha384 => PacketKey::Aes256Gcm(Aes256Gcm::new_from_slice(&raw_key).map_err(|_| CryptoError::InvalidSecretLength)?),
        CipherSuite::Chacha20Poly1305Sha256 => PacketKey::Chacha20Poly1305(
            ChaCha20Poly1305::new_from_slice(&raw_key).map_err(|_| CryptoError::InvalidSecretLength)?,
        ),
    };

    let header_protection = match suite {
        CipherSuite::Aes128GcmSha256 => {
            HeaderProtectionKey::Aes128(<aes::Aes128 as aes::cipher::KeyInit>::new_from_slice(&raw_hp).map_err(|_| CryptoError::InvalidSecretLength)?)
        }
        CipherSuite::Aes256GcmSha384 => {
            HeaderProtectionKey::Aes256(<aes::Aes256 as aes::cipher::KeyInit>::new_from_slice(&raw_hp).map_err(|_| CryptoError::InvalidSecretLength)?)
        }
        CipherSuite::Chacha20Poly1305Sha256 => {
            let mut key = [0u8; 32];
            key.copy_from_slice(&raw_hp);
            HeaderProtectionKey::Chacha20(key)
        }
    };

    Ok(DirectionalKeys {
        packet,
        iv,
        header_protection,
    })
}

/// Derives the stateless reset token advertised for a connection id, RFC
/// 9000 §5.8: a keyed PRF over the connection id, so a token can be
/// recomputed from the id alone without retaining per-connection state —
/// an endpoint that has lost a connection's state (e.g. after a restart)
/// can still produce the same token its peer will recognize, as long as
/// the static key survives.
///
/// `static_key` is a secret held by the binding, not tied to any one
/// connection; HKDF-Extract folds it into a PRK and HKDF-Expand binds the
/// connection id in as the `info`, RFC 5869's ordinary two-step derivation.
pub fn stateless_reset_token(static_key: &[u8], connection_id: &[u8]) -> [u8; 16] {
    let prk = Hkdf::<Sha256>::extract(None, static_key).0;
    let hkdf = Hkdf::<Sha256>::from_prk(&prk).expect("SHA-256 PRK is always the right length");
    let mut token = [0u8; 16];
    hkdf.expand(connection_id, &mut token)
        .expect("16-byte output is within HKDF-Expand's limit");
    token
}

/// Computes the nonce for a packet: the traffic IV XORed with the packet
/// number, left-padded with zeroes to the IV's length, RFC 9001 §5.3.
fn packet_nonce(iv: &[u8; CipherSuite::IV_LEN], packet_number: u64) -> [u8; CipherSuite::IV_LEN] {
    let mut nonce = *iv;
    let pn_bytes = packet_number.to_be_bytes();
    for (n, p) in nonce.iter_mut().rev().zip(pn_bytes.iter().rev()) {
        *n ^= p;
    }
    nonce
}

impl PacketKey {
    /// Encrypts `payload` in place, appending the AEAD tag, authenticating
    /// `header` as associated data.
    pub fn encrypt_in_place(
        &self,
        iv: &[u8; CipherSuite::IV_LEN],
        packet_number: u64,
        header: &[u8],
        payload: &mut Vec<u8>,
    ) -> Result<(), CryptoError> {
        let nonce = packet_nonce(iv, packet_number);
        let result = match self {
            PacketKey::Aes128Gcm(key) => key.encrypt_in_place(&nonce.into(), header, payload),
            PacketKey::Aes256Gcm(key) => key.encrypt_in_place(&nonce.into(), header, payload),
            PacketKey::Chacha20Poly1305(key) => key.encrypt_in_place(&nonce.into(), header, payload),
        };
        result.map_err(|_| CryptoError::AeadFailure)
    }

    /// Verifies and removes the AEAD tag from `payload`, authenticating
    /// `header` as associated data.
    pub fn decrypt_in_place(
        &self,
        iv: &[u8; CipherSuite::IV_LEN],
        packet_number: u64,
        header: &[u8],
        payload: &mut Vec<u8>,
    ) -> Result<(), CryptoError> {
        let nonce = packet_nonce(iv, packet_number);
        let result = match self {
            PacketKey::Aes128Gcm(key) => key.decrypt_in_place(&nonce.into(), header, payload),
            PacketKey::Aes256Gcm(key) => key.decrypt_in_place(&nonce.into(), header, payload),
            PacketKey::Chacha20Poly1305(key) => key.decrypt_in_place(&nonce.into(), header, payload),
        };
        result.map_err(|_| CryptoError::AeadFailure)
    }
}

impl HeaderProtectionKey {
    /// Derives the 5-byte header protection mask from a ciphertext sample,
    /// RFC 9001 §5.4.3 (AES) / §5.4.4 (ChaCha20).
    pub fn mask(&self, sample: &[u8; CipherSuite::SAMPLE_LEN]) -> [u8; 5] {
        use aes::cipher::BlockEncrypt;

        match self {
            HeaderProtectionKey::Aes128(key) => {
                let mut block = aes::cipher::generic_array::GenericArray::clone_from_slice(sample);
                key.encrypt_block(&mut block);
                let mut mask = [0u8; 5];
                mask.copy_from_slice(&block[..5]);
                mask
            }
            HeaderProtectionKey::Aes256(key) => {
                let mut block = aes::cipher::generic_array::GenericArray::clone_from_slice(sample);
                key.encrypt_block(&mut block);
                let mut mask = [0u8; 5];
                mask.copy_from_slice(&block[..5]);
                mask
            }
            HeaderProtectionKey::Chacha20(key) => {
                // counter = sample[0..4] (LE), nonce = sample[4..16].
                let mut counter_bytes = [0u8; 4];
                counter_bytes.copy_from_slice(&sample[0..4]);
                let nonce = &sample[4..16];

                let mut cipher = chacha20poly1305::chacha20::ChaCha20::new_from_slices(key, nonce).expect("fixed-length key/nonce");
                cipher.seek(u32::from_le_bytes(counter_bytes) as u64 * 64);
                let mut mask = [0u8; 5];
                cipher.apply_keystream(&mut mask);
                mask
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::label::INITIAL_SALT_V1;

    #[test]
    fn derives_distinct_client_and_server_initial_secrets() {
        let dcid = [0x83, 0x94, 0xc8, 0xf0, 0x3e, 0x51, 0x57, 0x08];
        let (client, server) = derive_initial_secrets(&INITIAL_SALT_V1, &dcid);
        assert_eq!(client.len(), 32);
        assert_eq!(server.len(), 32);
        assert_ne!(client, server);
    }

    #[test]
    fn packet_keys_round_trip_aes128() {
        let dcid = [0x83, 0x94, 0xc8, 0xf0, 0x3e, 0x51, 0x57, 0x08];
        let (client_secret, _) = derive_initial_secrets(&INITIAL_SALT_V1, &dcid);
        let keys = derive_packet_keys(CipherSuite::Aes128GcmSha256, &client_secret).unwrap();

        let header = [1, 2, 3, 4];
        let mut payload = alloc::vec![10u8, 20, 30, 40, 50];
        keys.packet.encrypt_in_place(&keys.iv, 1, &header, &mut payload).unwrap();
        assert_ne!(&payload[..5], &[10, 20, 30, 40, 50]);

        keys.packet.decrypt_in_place(&keys.iv, 1, &header, &mut payload).unwrap();
        assert_eq!(payload, alloc::vec![10u8, 20, 30, 40, 50]);
    }

    #[test]
    fn wrong_packet_number_fails_to_decrypt() {
        let dcid = [1, 2, 3, 4, 5, 6, 7, 8];
        let (client_secret, _) = derive_initial_secrets(&INITIAL_SALT_V1, &dcid);
        let keys = derive_packet_keys(CipherSuite::Chacha20Poly1305Sha256, &client_secret).unwrap();

        let header = [9, 9, 9];
        let mut payload = alloc::vec![1u8, 2, 3];
        keys.packet.encrypt_in_place(&keys.iv, 5, &header, &mut payload).unwrap();

        let err = keys.packet.decrypt_in_place(&keys.iv, 6, &header, &mut payload);
        assert!(err.is_err());
    }

    #[test]
    fn header_protection_mask_is_deterministic() {
        let dcid = [1, 2, 3, 4, 5, 6, 7, 8];
        let (client_secret, _) = derive_initial_secrets(&INITIAL_SALT_V1, &dcid);
        let keys = derive_packet_keys(CipherSuite::Aes128GcmSha256, &client_secret).unwrap();

        let sample = [0u8; 16];
        let mask_a = keys.header_protection.mask(&sample);
        let mask_b = keys.header_protection.mask(&sample);
        assert_eq!(mask_a, mask_b);
    }

    #[test]
    fn key_update_changes_the_secret() {
        let dcid = [1, 2, 3, 4];
        let (client_secret, _) = derive_initial_secrets(&INITIAL_SALT_V1, &dcid);
        let updated = update_secret(HashAlg::Sha256, &client_secret);
        assert_ne!(updated, client_secret);
        assert_eq!(updated.len(), client_secret.len());
    }

    #[test]
    fn stateless_reset_token_is_deterministic_per_id_and_key() {
        let key = [7u8; 32];
        let a = stateless_reset_token(&key, &[1, 2, 3, 4]);
        let b = stateless_reset_token(&key, &[1, 2, 3, 4]);
        assert_eq!(a, b);
    }

    #[test]
    fn stateless_reset_token_differs_across_connection_ids() {
        let key = [7u8; 32];
        let a = stateless_reset_token(&key, &[1, 2, 3, 4]);
        let b = stateless_reset_token(&key, &[5, 6, 7, 8]);
        assert_ne!(a, b);
    }

    #[test]
    fn stateless_reset_token_differs_across_keys() {
        let a = stateless_reset_token(&[1u8; 32], &[1, 2, 3, 4]);
        let b = stateless_reset_token(&[2u8; 32], &[1, 2, 3, 4]);
        assert_ne!(a, b);
    }
}
