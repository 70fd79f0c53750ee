//! Passphrase encryption of the container body.
//!
//! The format reuses AES-GCM's data-encryption stream but stores no
//! authentication tag, which reduces to AES-CTR with a 32-bit big-endian
//! counter over `nonce[..12] || counter`, counter starting at 2 (GCM
//! reserves counter 1 for the tag it never writes). Corrupted ciphertext
//! therefore decrypts to garbage instead of failing here.

use aes::{Aes128, Aes192, Aes256};
use cipher::{KeyIvInit, StreamCipher};
use thiserror::Error;

type Ctr32Aes128 = ctr::Ctr32BE<Aes128>;
type Ctr32Aes192 = ctr::Ctr32BE<Aes192>;
type Ctr32Aes256 = ctr::Ctr32BE<Aes256>;

const NONCE_LEN: usize = 12;
const INITIAL_COUNTER: u32 = 2;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum EncryptionError {
    #[error("key-pair encryption is unsupported")]
    KeyPairUnsupported,
    #[error("unknown encryption tag {0:?}")]
    UnknownTag([u8; 4]),
    #[error("invalid key length {0}, expected 16, 24 or 32 bytes")]
    KeyLength(usize),
    #[error("invalid nonce length {0}, expected at least 12 bytes")]
    NonceLength(usize),
}

/// Applies the keystream to `data`. Encryption and decryption are the same
/// operation.
pub fn crypt(key: &[u8], nonce: &[u8], data: &[u8]) -> Result<Vec<u8>, EncryptionError> {
    if nonce.len() < NONCE_LEN {
        return Err(EncryptionError::NonceLength(nonce.len()));
    }

    let mut iv = [0; 16];
    iv[..NONCE_LEN].copy_from_slice(&nonce[..NONCE_LEN]);
    iv[NONCE_LEN..].copy_from_slice(&INITIAL_COUNTER.to_be_bytes());

    let mut out = data.to_vec();
    match key.len() {
        16 => {
            let mut cipher = Ctr32Aes128::new_from_slices(key, &iv)
                .map_err(|_| EncryptionError::KeyLength(key.len()))?;
            cipher.apply_keystream(&mut out);
        }
        24 => {
            let mut cipher = Ctr32Aes192::new_from_slices(key, &iv)
                .map_err(|_| EncryptionError::KeyLength(key.len()))?;
            cipher.apply_keystream(&mut out);
        }
        32 => {
            let mut cipher = Ctr32Aes256::new_from_slices(key, &iv)
                .map_err(|_| EncryptionError::KeyLength(key.len()))?;
            cipher.apply_keystream(&mut out);
        }
        len => return Err(EncryptionError::KeyLength(len)),
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::{crypt, EncryptionError};

    #[test]
    fn round_trip_all_key_sizes() {
        let nonce = [7u8; 12];
        let plaintext = b"the quick brown fox jumps over the lazy dog";

        for key_len in [16, 24, 32] {
            let key: Vec<u8> = (0..key_len as u8).collect();
            let ciphertext = crypt(&key, &nonce, plaintext).unwrap();
            assert_ne!(&ciphertext, plaintext);
            assert_eq!(crypt(&key, &nonce, &ciphertext).unwrap(), plaintext);
        }
    }

    #[test]
    fn long_nonce_uses_first_twelve_bytes() {
        let key = [1u8; 16];
        let long = [9u8; 20];
        let short = &long[..12];

        let a = crypt(&key, &long, b"payload").unwrap();
        let b = crypt(&key, short, b"payload").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn rejects_bad_lengths() {
        assert_eq!(
            crypt(&[0; 15], &[0; 12], b"x").unwrap_err(),
            EncryptionError::KeyLength(15)
        );
        assert_eq!(
            crypt(&[0; 16], &[0; 11], b"x").unwrap_err(),
            EncryptionError::NonceLength(11)
        );
    }

    #[test]
    fn counter_block_matches_gcm_data_stream() {
        // First keystream block of AES-GCM for this key/nonce, i.e. the
        // encryption of nonce || 00000002 under the key.
        use aes::cipher::{BlockEncrypt, KeyInit};

        let key = [0x42u8; 16];
        let nonce = [0x24u8; 12];

        let mut block = [0u8; 16];
        block[..12].copy_from_slice(&nonce);
        block[12..].copy_from_slice(&2u32.to_be_bytes());
        let mut expected = block.into();
        aes::Aes128::new_from_slice(&key)
            .unwrap()
            .encrypt_block(&mut expected);

        let keystream = crypt(&key, &nonce, &[0u8; 16]).unwrap();
        assert_eq!(keystream, expected.to_vec());
    }
}
