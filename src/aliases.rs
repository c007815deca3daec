// src/aliases.rs
//! Re-exports secure-gate's secret wrappers
//!
//! These are the canonical secret types used throughout the rotation engine.

pub use secure_gate::dynamic_alias;

// Operator-supplied symmetric key (old or new)
dynamic_alias!(RotationKey, String);

// Recovered PII; zeroized as soon as the field has been re-encrypted
dynamic_alias!(PlainText, Vec<u8>);
