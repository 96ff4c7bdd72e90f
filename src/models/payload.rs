use serde::{Deserialize, Serialize};
use validator::Validate;

/// Where a payload came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadSource {
    Camera,
    ManualEntry,
    ImageUpload,
}

/// A payload that carried the tournament entry path marker. Everything after
/// the marker (date, tournament name, query) is passed through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryLink {
    pub url: String,
    pub source: PayloadSource,
}

impl EntryLink {
    /// Returns `None` when `payload` does not contain `marker`.
    pub fn parse(payload: &str, marker: &str, source: PayloadSource) -> Option<Self> {
        let url = payload.trim();
        if marker.is_empty() || !url.contains(marker) {
            return None;
        }
        Some(Self {
            url: url.to_string(),
            source,
        })
    }
}

/// The logged-in player, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerSession {
    pub player_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
}

/// Outcome of resolving a valid entry link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryResolution {
    pub destination: String,
    pub marked_active: bool,
}

/// A URL typed in by hand when the camera cannot be used.
#[derive(Debug, Deserialize, Serialize, Clone, Validate)]
pub struct ManualEntryForm {
    #[validate(url, length(min = 1, max = 2048))]
    pub url: String,
}

impl ManualEntryForm {
    pub fn new(input: &str) -> Self {
        Self {
            url: input.trim().to_string(),
        }
    }
}
