// src/crypto/mod.rs
//! Cipher capability
//!
//! The engine never calls the primitive directly; it goes through [`Cipher`].
//! Production uses [`DatastoreCipher`], which asks the datastore's
//! `pii_decrypt`/`pii_encrypt` functions. [`AesCryptCipher`] is the in-memory
//! primitive those functions are built on.

pub mod datastore;
pub mod decrypt;
pub mod encrypt;

pub use datastore::{register_cipher_functions, DatastoreCipher};
pub use decrypt::decrypt_to_vec;
pub use encrypt::encrypt_to_vec;

use crate::aliases::{PlainText, RotationKey};
use crate::error::CipherError;

pub trait Cipher {
    fn decrypt(&self, ciphertext: &[u8], key: &RotationKey) -> Result<PlainText, CipherError>;

    fn encrypt(&self, plaintext: &PlainText, key: &RotationKey) -> Result<Vec<u8>, CipherError>;
}

/// AES Crypt v3 with a fixed PBKDF2 iteration count for new ciphertext
#[derive(Debug, Clone, Copy)]
pub struct AesCryptCipher {
    kdf_iterations: u32,
}

impl AesCryptCipher {
    pub fn new(kdf_iterations: u32) -> Self {
        Self { kdf_iterations }
    }
}

impl Cipher for AesCryptCipher {
    fn decrypt(&self, ciphertext: &[u8], key: &RotationKey) -> Result<PlainText, CipherError> {
        decrypt_to_vec(ciphertext, key)
    }

    fn encrypt(&self, plaintext: &PlainText, key: &RotationKey) -> Result<Vec<u8>, CipherError> {
        encrypt_to_vec(plaintext, key, self.kdf_iterations)
    }
}
