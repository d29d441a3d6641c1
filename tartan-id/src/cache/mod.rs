//! Feature-fingerprint result cache
//!
//! Durable store of recognition results keyed by the fingerprint of the
//! features they were computed from. Voice and face entries live in separate
//! tables and are never cross-queried.

pub mod schema;
mod store;

pub use store::CacheStore;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tartan_common::{FeatureKind, FeatureSet, Fingerprint};
use thiserror::Error;

/// Cache store errors
///
/// A miss is not an error; lookups return `Ok(None)`.
#[derive(Debug, Error)]
pub enum CacheError {
    /// SQLite I/O, constraint or connection failure
    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),

    /// Filesystem failure while opening the store
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored row could not be decoded
    #[error("Corrupt cache entry: {0}")]
    Corrupt(String),

    #[error("Fingerprint input error: {0}")]
    FingerprintInput(String),

    /// Lock contention outlasted the retry budget
    #[error("Storage busy: {0}")]
    LockTimeout(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<tartan_common::Error> for CacheError {
    fn from(err: tartan_common::Error) -> Self {
        match err {
            tartan_common::Error::Database(e) => CacheError::Storage(e),
            tartan_common::Error::Io(e) => CacheError::Io(e),
            tartan_common::Error::Serialization(e) => CacheError::Corrupt(e.to_string()),
            tartan_common::Error::FingerprintInput(msg) => CacheError::FingerprintInput(msg),
            other => CacheError::Internal(other.to_string()),
        }
    }
}

pub type CacheResult<T> = Result<T, CacheError>;

/// Identification payload stored for a fingerprint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognitionResult {
    /// Identified person, actor or track
    pub name: String,
    pub notable_works: Vec<String>,
    /// 0.0-1.0
    pub confidence: f64,
}

impl RecognitionResult {
    /// Create a result with confidence clamped to 0.0-1.0
    pub fn new(name: impl Into<String>, notable_works: Vec<String>, confidence: f64) -> Self {
        let confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };
        Self {
            name: name.into(),
            notable_works,
            confidence,
        }
    }
}

/// Cached result with its audit trail and access statistics
#[derive(Debug, Clone, Serialize)]
pub struct CacheEntry {
    pub kind: FeatureKind,
    pub fingerprint: Fingerprint,
    #[serde(flatten)]
    pub result: RecognitionResult,
    /// Features the entry was first stored with
    pub features: FeatureSet,
    /// Free-text context supplied with the request (voice only)
    pub context: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
    /// 1 on insert, +1 on every hit or re-insertion
    pub access_count: i64,
}

/// Entry count and summed access counters for one namespace
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceStats {
    pub entries: i64,
    pub total_hits: i64,
}

/// Statistics for both namespaces
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub voice: NamespaceStats,
    pub face: NamespaceStats,
}

impl CacheStats {
    pub fn namespace(&self, kind: FeatureKind) -> NamespaceStats {
        match kind {
            FeatureKind::Voice => self.voice,
            FeatureKind::Face => self.face,
        }
    }
}
