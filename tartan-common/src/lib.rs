//! # Tartan Common Library
//!
//! Shared code for the Tartan recognition services including:
//! - Error types
//! - Configuration loading and root folder resolution
//! - SQLite pool initialization
//! - Feature sets and feature fingerprinting

pub mod config;
#[cfg(feature = "sqlx")]
pub mod db;
pub mod error;
pub mod features;
pub mod fingerprint;

pub use error::{Error, Result};
pub use features::{FeatureKind, FeatureSet, FeatureValue};
pub use fingerprint::{fingerprint, Fingerprint, Fingerprinter, RoundedField, VoicePolicy};
