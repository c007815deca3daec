// src/crypto/encrypt.rs
use std::io::Cursor;

use aescrypt_rs::encrypt;

use crate::aliases::{PlainText, RotationKey};
use crate::error::CipherError;

/// Encrypt plaintext → AES-Crypt v3 ciphertext (in-memory)
pub fn encrypt_to_vec(
    plaintext: &PlainText,
    key: &RotationKey,
    kdf_iterations: u32,
) -> Result<Vec<u8>, CipherError> {
    let mut out = Vec::new();
    encrypt(
        Cursor::new(plaintext.expose_secret().as_slice()),
        &mut out,
        key,
        kdf_iterations,
    )
    .map_err(|e| CipherError::Rejected(e.to_string()))?;
    Ok(out)
}
