// src/crypto/datastore.rs
//! The datastore's native encryption primitive
//!
//! `pii_encrypt(plaintext, key)` and `pii_decrypt(ciphertext, key)` are scalar
//! SQL functions. A crypto failure returns SQL `NULL` instead of raising, so
//! an `Err` coming back from the datastore always means the datastore itself
//! failed.

use rusqlite::functions::FunctionFlags;
use rusqlite::{params, Connection};

use super::{AesCryptCipher, Cipher};
use crate::aliases::{PlainText, RotationKey};
use crate::consts::{SQL_DECRYPT_FN, SQL_ENCRYPT_FN};
use crate::error::CipherError;

/// Install `pii_encrypt` / `pii_decrypt` on a connection
pub fn register_cipher_functions(conn: &Connection, cipher: AesCryptCipher) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        SQL_DECRYPT_FN,
        2,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        move |ctx| {
            let ciphertext: Option<Vec<u8>> = ctx.get(0)?;
            let key: String = ctx.get(1)?;
            let key = RotationKey::new(key);
            Ok(ciphertext.and_then(|ct| {
                cipher
                    .decrypt(&ct, &key)
                    .ok()
                    .map(|pt| pt.expose_secret().clone())
            }))
        },
    )?;

    // Not deterministic: every call draws a fresh IV
    conn.create_scalar_function(SQL_ENCRYPT_FN, 2, FunctionFlags::SQLITE_UTF8, move |ctx| {
        let plaintext: Option<Vec<u8>> = ctx.get(0)?;
        let key: String = ctx.get(1)?;
        let key = RotationKey::new(key);
        Ok(plaintext.and_then(|pt| cipher.encrypt(&PlainText::new(pt), &key).ok()))
    })?;

    Ok(())
}

/// [`Cipher`] that delegates to the datastore, typically on an open batch transaction
pub struct DatastoreCipher<'c> {
    conn: &'c Connection,
}

impl<'c> DatastoreCipher<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }
}

impl Cipher for DatastoreCipher<'_> {
    fn decrypt(&self, ciphertext: &[u8], key: &RotationKey) -> Result<PlainText, CipherError> {
        let plaintext: Option<Vec<u8>> = self.conn.query_row(
            &format!("SELECT {SQL_DECRYPT_FN}(?1, ?2)"),
            params![ciphertext, key.expose_secret()],
            |row| row.get(0),
        )?;
        plaintext
            .map(PlainText::new)
            .ok_or_else(|| CipherError::Rejected("wrong key or corrupt ciphertext".to_string()))
    }

    fn encrypt(&self, plaintext: &PlainText, key: &RotationKey) -> Result<Vec<u8>, CipherError> {
        let ciphertext: Option<Vec<u8>> = self.conn.query_row(
            &format!("SELECT {SQL_ENCRYPT_FN}(?1, ?2)"),
            params![plaintext.expose_secret(), key.expose_secret()],
            |row| row.get(0),
        )?;
        ciphertext.ok_or_else(|| CipherError::Rejected("datastore refused to encrypt".to_string()))
    }
}
