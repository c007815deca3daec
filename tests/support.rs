// tests/support.rs
//! Test datastore: a throwaway SQLite file holding the application's three
//! PII tables, opened through the engine's own `open_datastore`
#![allow(dead_code)]

use pii_key_rotation::aliases::{PlainText, RotationKey};
use pii_key_rotation::config::Config;
use pii_key_rotation::db::open_datastore;
use pii_key_rotation::{AesCryptCipher, Cipher, PiiTable};
use rusqlite::{params, Connection};
use tempfile::TempDir;

pub const OLD_KEY: &str = "old-rotation-key-0123456789abcdef-AAAA";
pub const NEW_KEY: &str = "new-rotation-key-0123456789abcdef-BBBB";
pub const STRANGER_KEY: &str = "some-other-key-never-used-in-rotation-CC";

pub struct TestDatastore {
    pub dir: TempDir,
    pub config: Config,
    pub conn: Connection,
}

impl TestDatastore {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut config = Config::default();
        config.datastore.path = dir.path().join("app.db").to_string_lossy().into_owned();
        config.audit.log_dir = dir.path().join("logs").to_string_lossy().into_owned();
        config.rotation.kdf_iterations = 1;

        let conn = open_datastore(&config).expect("open datastore");
        conn.execute_batch(
            r#"
            CREATE TABLE properties (
                id          INTEGER PRIMARY KEY,
                address     TEXT NOT NULL DEFAULT '',
                owner_name  BLOB,
                owner_email BLOB,
                owner_phone BLOB
            );
            CREATE TABLE contacts (
                id              INTEGER PRIMARY KEY,
                full_name       TEXT NOT NULL DEFAULT '',
                email           BLOB,
                phone           BLOB,
                mailing_address BLOB
            );
            CREATE TABLE deals (
                id           INTEGER PRIMARY KEY,
                title        TEXT NOT NULL DEFAULT '',
                buyer_tax_id BLOB,
                bank_account BLOB
            );
            "#,
        )
        .expect("create application tables");

        Self { dir, config, conn }
    }

    /// `n` contacts with an email encrypted under `key`; ids 1..=n
    pub fn seed_contacts(&self, n: i64, key: &str) {
        for id in 1..=n {
            self.insert_contact(id, Some(&encrypt(&contact_email(id), key)));
        }
    }

    pub fn insert_contact(&self, id: i64, email: Option<&[u8]>) {
        self.conn
            .execute(
                "INSERT INTO contacts (id, full_name, email) VALUES (?1, ?2, ?3)",
                params![id, format!("Contact {id}"), email],
            )
            .expect("insert contact");
    }

    pub fn column(&self, table: &str, id: i64, column: &str) -> Option<Vec<u8>> {
        self.conn
            .query_row(
                &format!("SELECT {column} FROM {table} WHERE id = ?1"),
                [id],
                |row| row.get(0),
            )
            .expect("read column")
    }

    pub fn text_column(&self, table: &str, id: i64, column: &str) -> String {
        self.conn
            .query_row(
                &format!("SELECT {column} FROM {table} WHERE id = ?1"),
                [id],
                |row| row.get(0),
            )
            .expect("read text column")
    }

    pub fn checksum(&self, table: PiiTable) -> String {
        pii_key_rotation::verify::ciphertext_checksum(&self.conn, table.spec()).expect("checksum")
    }
}

pub fn contact_email(id: i64) -> String {
    format!("contact{id}@example.com")
}

pub fn encrypt(plaintext: &str, key: &str) -> Vec<u8> {
    AesCryptCipher::new(1)
        .encrypt(
            &PlainText::new(plaintext.as_bytes().to_vec()),
            &RotationKey::new(key.to_string()),
        )
        .expect("encrypt")
}

/// `None` if `key` cannot open the ciphertext
pub fn decrypt(ciphertext: &[u8], key: &str) -> Option<String> {
    AesCryptCipher::new(1)
        .decrypt(ciphertext, &RotationKey::new(key.to_string()))
        .ok()
        .map(|pt| String::from_utf8(pt.expose_secret().clone()).expect("utf8 plaintext"))
}
