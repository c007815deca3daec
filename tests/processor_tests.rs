// tests/processor_tests.rs
//! Row pipeline in isolation, with a toy cipher instead of a datastore

use pii_key_rotation::aliases::{PlainText, RotationKey};
use pii_key_rotation::db::BatchWorkItem;
use pii_key_rotation::rotation::process_batch;
use pii_key_rotation::{Cipher, CipherError, PiiTable, RotationError, RotationKeys, RunMode};

const OLD: &str = "toy-old-key-0123456789abcdef-0123456789";
const NEW: &str = "toy-new-key-0123456789abcdef-0123456789";

/// "Ciphertext" is `<key>|<plaintext>`
struct TagCipher;

impl Cipher for TagCipher {
    fn decrypt(&self, ciphertext: &[u8], key: &RotationKey) -> Result<PlainText, CipherError> {
        let prefix = format!("{}|", key.expose_secret());
        ciphertext
            .strip_prefix(prefix.as_bytes())
            .map(|pt| PlainText::new(pt.to_vec()))
            .ok_or_else(|| CipherError::Rejected("wrong key".into()))
    }

    fn encrypt(&self, plaintext: &PlainText, key: &RotationKey) -> Result<Vec<u8>, CipherError> {
        let mut out = format!("{}|", key.expose_secret()).into_bytes();
        out.extend_from_slice(plaintext.expose_secret());
        Ok(out)
    }
}

/// Fails like a dropped connection
struct BrokenCipher;

impl Cipher for BrokenCipher {
    fn decrypt(&self, _: &[u8], _: &RotationKey) -> Result<PlainText, CipherError> {
        Err(CipherError::Datastore(rusqlite::Error::InvalidQuery))
    }

    fn encrypt(&self, _: &PlainText, _: &RotationKey) -> Result<Vec<u8>, CipherError> {
        Err(CipherError::Datastore(rusqlite::Error::InvalidQuery))
    }
}

fn keys() -> RotationKeys {
    RotationKeys::new(OLD.into(), NEW.into()).unwrap()
}

fn sealed(key: &str, value: &str) -> Option<Vec<u8>> {
    Some(format!("{key}|{value}").into_bytes())
}

fn row(id: i64, values: Vec<Option<Vec<u8>>>) -> BatchWorkItem {
    BatchWorkItem { id, values }
}

#[test]
fn rotates_every_present_field() {
    let spec = PiiTable::Properties.spec();
    let rows = vec![row(
        7,
        vec![sealed(OLD, "Ann Owner"), None, sealed(OLD, "555-0101")],
    )];

    let batch = process_batch(&TagCipher, spec, &rows, &keys(), RunMode::Live).unwrap();

    assert_eq!(batch.outcome.processed, 1);
    assert_eq!(batch.outcome.failed, 0);
    assert_eq!(batch.outcome.last_id, Some(7));
    assert_eq!(batch.updates.len(), 1);
    assert_eq!(
        batch.updates[0].columns,
        vec![
            ("owner_name", sealed(NEW, "Ann Owner").unwrap()),
            ("owner_phone", sealed(NEW, "555-0101").unwrap()),
        ]
    );
}

#[test]
fn one_bad_field_fails_the_whole_row() {
    let spec = PiiTable::Properties.spec();
    let rows = vec![
        row(1, vec![sealed(OLD, "ok"), sealed("intruder", "bad"), None]),
        row(2, vec![sealed(OLD, "fine"), None, None]),
    ];

    let batch = process_batch(&TagCipher, spec, &rows, &keys(), RunMode::Live).unwrap();

    assert_eq!(batch.outcome.processed, 1);
    assert_eq!(batch.outcome.failed, 1);
    assert_eq!(batch.outcome.errors.len(), 1);
    assert_eq!(batch.outcome.errors[0].record_id, 1);
    assert!(batch.outcome.errors[0].error.contains("owner_email"));
    // no partial update for row 1
    assert_eq!(batch.updates.len(), 1);
    assert_eq!(batch.updates[0].id, 2);
    assert_eq!(batch.outcome.last_id, Some(2));
}

#[test]
fn errors_never_echo_ciphertext_or_plaintext() {
    let spec = PiiTable::Contacts.spec();
    let rows = vec![row(3, vec![sealed("intruder", "secret@example.com"), None, None])];
    let batch = process_batch(&TagCipher, spec, &rows, &keys(), RunMode::Live).unwrap();
    assert!(!batch.outcome.errors[0].error.contains("secret@example.com"));
}

#[test]
fn rows_without_ciphertext_count_as_processed_noops() {
    let spec = PiiTable::Deals.spec();
    let rows = vec![row(5, vec![Some(Vec::new()), None])];

    let batch = process_batch(&TagCipher, spec, &rows, &keys(), RunMode::Live).unwrap();
    assert_eq!(batch.outcome.processed, 1);
    assert_eq!(batch.outcome.failed, 0);
    assert!(batch.updates.is_empty());
}

#[test]
fn dry_run_stages_the_same_work() {
    let spec = PiiTable::Contacts.spec();
    let rows = vec![row(1, vec![sealed(OLD, "a@example.com"), None, None])];

    let live = process_batch(&TagCipher, spec, &rows, &keys(), RunMode::Live).unwrap();
    let dry = process_batch(&TagCipher, spec, &rows, &keys(), RunMode::DryRun).unwrap();
    assert_eq!(live.outcome, dry.outcome);
    assert_eq!(live.updates, dry.updates);
}

#[test]
fn datastore_failure_aborts_the_batch() {
    let spec = PiiTable::Contacts.spec();
    let rows = vec![row(1, vec![sealed(OLD, "a@example.com"), None, None])];

    let err = process_batch(&BrokenCipher, spec, &rows, &keys(), RunMode::Live).unwrap_err();
    assert!(matches!(
        err,
        RotationError::BatchTransaction { table: "contacts", .. }
    ));
}
