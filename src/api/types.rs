//! Wire types for the card REST API.
//!
//! Everything on the wire is snake_case. This module is the only place where
//! wire names meet the canonical names of [`CardDescriptor`]; the rest of the
//! engine never sees a `CardRecord` field it has to translate.

use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

use crate::card::{CardColors, CardDescriptor, CardId, Rarity};
use crate::mana;

// =============================================================================
// ERROR
// =============================================================================

/// Errors produced by the REST collaborator.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The request never produced a response (connect, timeout, body read).
    #[error("request failed: {0}")]
    Request(String),

    /// The server answered with a non-success status. `message` is the
    /// server's `error` string, shown to the user verbatim.
    #[error("{message}")]
    Response { status: u16, message: String },

    /// A success body could not be deserialized.
    #[error("response parse failed: {0}")]
    Parse(String),

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

impl ApiError {
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Response { status, .. } => Some(*status),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// Whether re-triggering the same action by hand may succeed. The engine
    /// itself never retries.
    #[must_use]
    pub fn retryable(&self) -> bool {
        matches!(self, Self::Request(_) | Self::Response { status: 429 | 500..=599, .. })
    }
}

/// Body shape of every error response.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
}

// =============================================================================
// CARD RECORD
// =============================================================================

fn nullable_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Option::<String>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// A card as the API stores it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<CardId>,
    #[serde(default, deserialize_with = "nullable_string")]
    pub name: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub mana_cost: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub card_type: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub color: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub abilities: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub power_toughness: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub flavor_text: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub rarity: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub artist: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card_bg_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header_bg_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub footer_bg_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_color: Option<String>,
    /// Server-assigned; never sent back.
    #[serde(default, skip_serializing)]
    pub set_name: Option<String>,
    #[serde(default, skip_serializing)]
    pub card_number: Option<i64>,
}

impl CardRecord {
    /// Footer caption for list cards: `Rare (GEN-12)`.
    #[must_use]
    pub fn caption(&self) -> String {
        match (&self.set_name, self.card_number) {
            (Some(set), Some(number)) => format!("{} ({set}-{number})", self.rarity),
            _ => self.rarity.clone(),
        }
    }
}

impl From<&CardDescriptor> for CardRecord {
    fn from(card: &CardDescriptor) -> Self {
        Self {
            id: card.id,
            name: card.name.trim().to_owned(),
            mana_cost: card.mana_cost(),
            card_type: card.card_type.trim().to_owned(),
            color: mana::color_name(&card.mana_symbols).to_owned(),
            abilities: card.abilities.trim().to_owned(),
            power_toughness: card.power_toughness.trim().to_owned(),
            flavor_text: card.flavor_text.trim().to_owned(),
            rarity: card.rarity.as_str().to_owned(),
            artist: card.artist.trim().to_owned(),
            image_url: card.image_ref.clone(),
            frame_color: Some(card.colors.frame.clone()),
            card_bg_color: Some(card.colors.card_background.clone()),
            header_bg_color: Some(card.colors.header_background.clone()),
            footer_bg_color: Some(card.colors.footer_background.clone()),
            text_color: Some(card.colors.text.clone()),
            set_name: None,
            card_number: None,
        }
    }
}

impl From<CardRecord> for CardDescriptor {
    fn from(record: CardRecord) -> Self {
        let rarity = record.rarity.parse::<Rarity>().unwrap_or_else(|e| {
            warn!(id = ?record.id, error = %e, "unrecognized rarity; treating as Common");
            Rarity::Common
        });
        let defaults = CardColors::default();
        Self {
            id: record.id,
            name: record.name,
            card_type: record.card_type,
            abilities: record.abilities,
            flavor_text: record.flavor_text,
            artist: record.artist,
            rarity,
            power_toughness: record.power_toughness,
            mana_symbols: mana::parse_symbols(&record.mana_cost),
            colors: CardColors {
                frame: record.frame_color.unwrap_or(defaults.frame),
                card_background: record.card_bg_color.unwrap_or(defaults.card_background),
                header_background: record.header_bg_color.unwrap_or(defaults.header_background),
                footer_background: record.footer_bg_color.unwrap_or(defaults.footer_background),
                text: record.text_color.unwrap_or(defaults.text),
            },
            image_ref: record.image_url.filter(|url| !url.is_empty()),
            dark_mode: false,
        }
    }
}

// =============================================================================
// ENDPOINT PAYLOADS
// =============================================================================

/// `GET /cards` response.
#[derive(Debug, Deserialize)]
pub struct CardPage {
    #[serde(default)]
    pub cards: Vec<CardRecord>,
}

/// `POST /cards` response. The server echoes the new id.
#[derive(Debug, Deserialize)]
pub struct SavedCard {
    pub id: CardId,
}

/// `POST /upload_image` response.
#[derive(Debug, Deserialize)]
pub struct UploadedImage {
    pub filename: String,
}

/// A local file handed to `POST /upload_image`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// `POST /image_gen/generate-image` body.
#[derive(Debug, Serialize)]
pub struct ImageGenerationRequest<'a> {
    pub prompt: &'a str,
    pub card_id: CardId,
}

/// `POST /image_gen/generate-image` response. `image_urls` is present only
/// when the server resolved the request synchronously.
#[derive(Debug, Clone, Deserialize)]
pub struct ImageSubmission {
    pub request_id: String,
    #[serde(default)]
    pub image_urls: Option<Vec<String>>,
}

/// Status values reported by the status endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProbeStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    #[serde(other)]
    Other,
}

/// `GET /image_gen/request-status/{request_id}` response.
#[derive(Debug, Clone, Deserialize)]
pub struct ImageStatusReport {
    pub status: ProbeStatus,
    #[serde(default)]
    pub image_urls: Option<Vec<String>>,
    #[serde(default)]
    pub error: Option<String>,
}

#[cfg(test)]
#[path = "types_test.rs"]
mod types_test;
