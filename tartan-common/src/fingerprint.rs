//! Feature fingerprinting
//!
//! Derives the cache key for a [`FeatureSet`]. Voice features are reduced to a
//! few rounded fields so near-duplicate clips land on the same key; face
//! features are hashed whole with no tolerance.
//!
//! The reduced mapping is serialized as JSON with sorted keys and hashed with
//! SHA-256, so the key depends only on field values, never on input order.

use crate::features::{FeatureKind, FeatureSet, FeatureValue};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

/// One voice feature kept in the fingerprint, rounded to `decimals` places
///
/// Negative `decimals` rounds to tens, hundreds, etc.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundedField {
    pub key: String,
    pub decimals: i32,
}

impl RoundedField {
    pub fn new(key: impl Into<String>, decimals: i32) -> Self {
        Self {
            key: key.into(),
            decimals,
        }
    }
}

/// Field selection and rounding applied to voice features before hashing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoicePolicy {
    pub fields: Vec<RoundedField>,
}

impl Default for VoicePolicy {
    fn default() -> Self {
        Self {
            fields: vec![
                RoundedField::new("mean_pitch", 1),
                RoundedField::new("pitch_std", 1),
                RoundedField::new("spectral_centroid_mean", 0),
                RoundedField::new("energy", 5),
            ],
        }
    }
}

/// Hex-encoded SHA-256 digest identifying a cache entry
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Fingerprint {
    fn from(hex: String) -> Self {
        Fingerprint(hex)
    }
}

impl AsRef<str> for Fingerprint {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Computes fingerprints under a configured voice policy
#[derive(Debug, Clone, Default)]
pub struct Fingerprinter {
    voice_policy: VoicePolicy,
}

impl Fingerprinter {
    pub fn new(voice_policy: VoicePolicy) -> Self {
        Self { voice_policy }
    }

    pub fn voice_policy(&self) -> &VoicePolicy {
        &self.voice_policy
    }

    /// Fingerprint a feature set of the given kind
    ///
    /// NaN and infinite values are rejected: JSON has no form for them, so they
    /// would neither hash distinctly nor read back from the store.
    pub fn fingerprint(&self, features: &FeatureSet, kind: FeatureKind) -> Result<Fingerprint> {
        ensure_finite(features.iter().filter_map(|(key, value)| match value {
            FeatureValue::Number(n) => Some((key.as_str(), *n)),
            FeatureValue::Text(_) => None,
        }))?;

        let canonical = match kind {
            FeatureKind::Voice => {
                let reduced = self.reduce_voice(features);
                ensure_finite(reduced.iter().map(|(key, value)| (key.as_str(), *value)))?;
                serde_json::to_vec(&reduced)
            }
            FeatureKind::Face => serde_json::to_vec(features),
        }
        .map_err(|e| Error::FingerprintInput(e.to_string()))?;

        let digest = Sha256::digest(&canonical);
        Ok(Fingerprint(format!("{:x}", digest)))
    }

    /// Voice fields selected by the policy, rounded; absent fields count as 0
    pub fn reduce_voice(&self, features: &FeatureSet) -> BTreeMap<String, f64> {
        self.voice_policy
            .fields
            .iter()
            .map(|field| {
                let value = round_to(features.number_or_zero(&field.key), field.decimals);
                (field.key.clone(), value)
            })
            .collect()
    }
}

/// Fingerprint with the default voice policy
pub fn fingerprint(features: &FeatureSet, kind: FeatureKind) -> Result<Fingerprint> {
    Fingerprinter::default().fingerprint(features, kind)
}

fn ensure_finite<'a>(mut values: impl Iterator<Item = (&'a str, f64)>) -> Result<()> {
    match values.find(|(_, value)| !value.is_finite()) {
        Some((key, value)) => Err(Error::FingerprintInput(format!(
            "feature '{}' is not a finite number ({})",
            key, value
        ))),
        None => Ok(()),
    }
}

/// Round to `decimals` places; ties round away from zero (1500.5 -> 1501)
fn round_to(value: f64, decimals: i32) -> f64 {
    let rounded = if decimals >= 0 {
        let factor = 10f64.powi(decimals);
        (value * factor).round() / factor
    } else {
        let factor = 10f64.powi(-decimals);
        (value / factor).round() * factor
    };
    // -0.0 and 0.0 must hash the same
    rounded + 0.0
}
