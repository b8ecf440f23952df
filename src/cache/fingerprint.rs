//! Cache keys for chat requests.

use std::fmt;

use sha2::{Digest, Sha256};

use crate::types::{ChatRequest, Mode};

/// Canonical form of a message for cache keying.
///
/// Trims, case-folds and collapses runs of whitespace. Idempotent:
/// `normalize(normalize(s)) == normalize(s)`.
pub fn normalize(message: &str) -> String {
    message
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Stable hash of (normalized message, patient-context id, mode).
///
/// Hex-encoded SHA-256; identical across processes sharing an external cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn new(message: &str, patient_id: Option<&str>, mode: Mode) -> Self {
        let normalized = normalize(message);
        let mut hasher = Sha256::new();
        // Length-prefix each field so no two inputs share an encoding
        for field in [normalized.as_str(), patient_id.unwrap_or(""), mode.as_str()] {
            hasher.update((field.len() as u64).to_le_bytes());
            hasher.update(field.as_bytes());
        }
        hasher.update([u8::from(patient_id.is_some())]);
        Self(hex::encode(hasher.finalize()))
    }

    pub fn for_request(request: &ChatRequest) -> Self {
        Self::new(&request.message, request.patient_id(), request.mode)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
