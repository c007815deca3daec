// src/config/mod.rs
//! Configuration system for the rotation engine
//!
//! TOML file + env overrides. Keys to rotate are never read from here; they
//! come from the command line only.

pub use app::{load, load_from, parse, Audit, Config, Datastore, Rotation};

mod app;
mod defaults;
