// src/verify.rs
//! Ciphertext checksums used to prove a dry run changed nothing

use blake3::Hasher;
use rusqlite::Connection;

use crate::registry::TableSpec;

/// BLAKE3 over `(id, every registered column)` for all rows, ordered by id.
/// NULL and empty values hash differently.
pub fn ciphertext_checksum(conn: &Connection, spec: &TableSpec) -> rusqlite::Result<String> {
    let sql = format!(
        "SELECT {}, {} FROM {} ORDER BY {} ASC",
        spec.id_field,
        spec.fields.join(", "),
        spec.table,
        spec.id_field
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;

    let mut hasher = Hasher::new();
    while let Some(row) = rows.next()? {
        let id: i64 = row.get(0)?;
        hasher.update(&id.to_le_bytes());
        for i in 0..spec.fields.len() {
            match row.get::<_, Option<Vec<u8>>>(i + 1)? {
                Some(value) => {
                    hasher.update(&[1]);
                    hasher.update(&(value.len() as u64).to_le_bytes());
                    hasher.update(&value);
                }
                None => {
                    hasher.update(&[0]);
                }
            }
        }
    }
    Ok(hasher.finalize().to_hex().to_string())
}
