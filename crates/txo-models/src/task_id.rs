//! Task identifiers.

use chrono::Utc;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Suffix appended to a base id for each of the four video-derived siblings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    /// Clean text, no timestamps, no diarization.
    Limpa,
    /// Timestamped text.
    Timestamps,
    /// Speaker-attributed text.
    Diarization,
    /// Fully-annotated text (timestamps + diarization).
    Completa,
}

impl Variant {
    pub const ALL: [Variant; 4] = [
        Variant::Limpa,
        Variant::Timestamps,
        Variant::Diarization,
        Variant::Completa,
    ];

    pub fn suffix(self) -> &'static str {
        match self {
            Variant::Limpa => "limpa",
            Variant::Timestamps => "timestamps",
            Variant::Diarization => "diarization",
            Variant::Completa => "completa",
        }
    }

    /// The `{timestamps, diarization}` option pair this variant selects.
    pub fn options(self) -> (bool, bool) {
        match self {
            Variant::Limpa => (false, false),
            Variant::Timestamps => (true, false),
            Variant::Diarization => (false, true),
            Variant::Completa => (true, true),
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.suffix())
    }
}

/// Opaque, globally-unique task identifier.
///
/// Shape: `{YYYYMMDD}_{HHMMSS}_{8 hex chars}` for a standalone task. For
/// video-derived siblings, a variant suffix is appended to a shared base id:
/// `{base_id}_{limpa|timestamps|diarization|completa}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl TaskId {
    /// Generate a fresh base id: `{YYYYMMDD}_{HHMMSS}_{8 hex chars}`.
    pub fn generate() -> Self {
        let now = Utc::now();
        let hex = &Uuid::new_v4().simple().to_string()[..8];
        Self(format!("{}_{}", now.format("%Y%m%d_%H%M%S"), hex))
    }

    /// Derive a sibling id by appending a variant suffix to this base id.
    pub fn with_variant(&self, variant: Variant) -> Self {
        Self(format!("{}_{}", self.0, variant.suffix()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for TaskId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_matches_shape() {
        let id = TaskId::generate();
        let parts: Vec<&str> = id.as_str().split('_').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].len(), 8);
        assert_eq!(parts[1].len(), 6);
        assert_eq!(parts[2].len(), 8);
        assert!(parts[2].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn variant_suffix_roundtrip() {
        let base = TaskId::from("20260101_120000_deadbeef");
        let sibling = base.with_variant(Variant::Completa);
        assert_eq!(sibling.as_str(), "20260101_120000_deadbeef_completa");
    }
}
