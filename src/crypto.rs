//! AES-128-CBC cryptographic envelope with a fixed zero IV. The pre-shared
//! key is selected per connection by the outer frame's `key_id`; an absent
//! key (key_id 0) means the payload travels in the clear.

use aes::Aes128;
use cbc::cipher::{block_padding::NoPadding, BlockDecryptMut, BlockEncryptMut, KeyIvInit};

use crate::result::{VdsError, VdsResult};

pub const KEY_LEN: usize = 16;
const ZERO_IV: [u8; 16] = [0u8; 16];

type Encryptor = cbc::Encryptor<Aes128>;
type Decryptor = cbc::Decryptor<Aes128>;

/// Encrypts `plaintext` (already padded to a multiple of 16 bytes) with
/// AES-128-CBC under `key` and the protocol's zero IV.
pub fn encrypt(key: &[u8; KEY_LEN], plaintext: &[u8]) -> VdsResult<Vec<u8>> {
    if plaintext.len() % 16 != 0 {
        return Err(VdsError::Crypto(
            "plaintext length must be a multiple of 16 bytes".into(),
        ));
    }
    let mut buf = plaintext.to_vec();
    let ct_len = buf.len();
    let ct = Encryptor::new(key.into(), &ZERO_IV.into())
        .encrypt_padded_mut::<NoPadding>(&mut buf, ct_len)
        .map_err(|e| VdsError::Crypto(e.to_string()))?;
    Ok(ct.to_vec())
}

/// Decrypts `ciphertext` with AES-128-CBC under `key` and the protocol's
/// zero IV. `ciphertext` must already be a multiple of 16 bytes.
pub fn decrypt(key: &[u8; KEY_LEN], ciphertext: &[u8]) -> VdsResult<Vec<u8>> {
    if ciphertext.len() % 16 != 0 {
        return Err(VdsError::Crypto(
            "ciphertext length must be a multiple of 16 bytes".into(),
        ));
    }
    let mut buf = ciphertext.to_vec();
    let pt = Decryptor::new(key.into(), &ZERO_IV.into())
        .decrypt_padded_mut::<NoPadding>(&mut buf)
        .map_err(|e| VdsError::Crypto(e.to_string()))?;
    Ok(pt.to_vec())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn round_trips_for_block_aligned_plaintext() {
        let key = [0x42u8; KEY_LEN];
        let plaintext = vec![0xAAu8; 48];
        let ciphertext = encrypt(&key, &plaintext).unwrap();
        assert_eq!(ciphertext.len(), plaintext.len());
        let recovered = decrypt(&key, &ciphertext).unwrap();
        assert_eq!(recovered, plaintext);
    }

    #[test]
    fn different_keys_produce_different_ciphertext() {
        let plaintext = vec![0x11u8; 32];
        let a = encrypt(&[0x01; KEY_LEN], &plaintext).unwrap();
        let b = encrypt(&[0x02; KEY_LEN], &plaintext).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn rejects_unaligned_length() {
        let key = [0u8; KEY_LEN];
        assert!(encrypt(&key, &[0u8; 17]).is_err());
        assert!(decrypt(&key, &[0u8; 17]).is_err());
    }
}
