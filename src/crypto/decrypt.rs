// src/crypto/decrypt.rs
use std::io::Cursor;

use aescrypt_rs::decrypt;

use crate::aliases::{PlainText, RotationKey};
use crate::consts::AESCRYPT_V3_HEADER;
use crate::error::CipherError;

/// Decrypt AES-Crypt v3 ciphertext → plaintext (in-memory)
///
/// Rejection reasons never echo the input bytes.
pub fn decrypt_to_vec(ciphertext: &[u8], key: &RotationKey) -> Result<PlainText, CipherError> {
    if ciphertext.get(..AESCRYPT_V3_HEADER.len()) != Some(AESCRYPT_V3_HEADER.as_slice()) {
        return Err(CipherError::Rejected(
            "not an AES Crypt v3 payload".to_string(),
        ));
    }

    let mut out = Vec::new();
    decrypt(Cursor::new(ciphertext), &mut out, key)
        .map_err(|_| CipherError::Rejected("wrong key or corrupt ciphertext".to_string()))?;
    Ok(PlainText::new(out))
}
