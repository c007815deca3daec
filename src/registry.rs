// src/registry.rs
//! Compiled-in registry of the PII-bearing tables
//!
//! The set is closed on purpose: table and column names never come from
//! runtime input, so every SQL statement the engine builds is made only of
//! the identifiers below.

use std::fmt;
use std::str::FromStr;

use crate::error::RotationError;

/// Physical layout of one registered table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableSpec {
    pub table: &'static str,
    pub id_field: &'static str,
    /// Columns holding ciphertext; the only columns the engine ever writes
    pub fields: &'static [&'static str],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PiiTable {
    Properties,
    Contacts,
    Deals,
}

const PROPERTIES: TableSpec = TableSpec {
    table: "properties",
    id_field: "id",
    fields: &["owner_name", "owner_email", "owner_phone"],
};

const CONTACTS: TableSpec = TableSpec {
    table: "contacts",
    id_field: "id",
    fields: &["email", "phone", "mailing_address"],
};

const DEALS: TableSpec = TableSpec {
    table: "deals",
    id_field: "id",
    fields: &["buyer_tax_id", "bank_account"],
};

impl PiiTable {
    /// Rotation order
    pub const ALL: [PiiTable; 3] = [PiiTable::Properties, PiiTable::Contacts, PiiTable::Deals];

    pub fn spec(self) -> &'static TableSpec {
        match self {
            PiiTable::Properties => &PROPERTIES,
            PiiTable::Contacts => &CONTACTS,
            PiiTable::Deals => &DEALS,
        }
    }

    pub fn name(self) -> &'static str {
        self.spec().table
    }
}

impl fmt::Display for PiiTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PiiTable {
    type Err = RotationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PiiTable::ALL
            .into_iter()
            .find(|t| t.name() == s)
            .ok_or_else(|| RotationError::Configuration(format!("unknown table `{s}`")))
    }
}
