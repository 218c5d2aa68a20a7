//! The card under edit.
//!
//! DESIGN
//! ======
//! `CardDescriptor` is plain owned data. `CardModel` wraps it and is the only
//! path for mutation: every setter bumps a revision counter published on a
//! `tokio::sync::watch` channel so the rendering collaborator knows to
//! re-project. Text setters clamp to the field's character limit the way a
//! `maxlength` input would.
//!
//! The `id` field is set only once the card exists server-side. Nothing
//! outside the crate can assign it; the authoring session does so after a
//! successful create or load.

#[cfg(test)]
#[path = "card_test.rs"]
mod card_test;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::mana;

/// Server-issued card identifier.
pub type CardId = i64;

pub const NAME_LIMIT: usize = 30;
pub const TYPE_LIMIT: usize = 20;
pub const ABILITIES_LIMIT: usize = 150;
pub const FLAVOR_TEXT_LIMIT: usize = 100;
pub const ARTIST_LIMIT: usize = 25;

// =============================================================================
// RARITY
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rarity {
    #[default]
    Common,
    Uncommon,
    Rare,
    #[serde(rename = "Mythic Rare")]
    MythicRare,
}

impl Rarity {
    pub const ALL: [Rarity; 4] = [Self::Common, Self::Uncommon, Self::Rare, Self::MythicRare];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Common => "Common",
            Self::Uncommon => "Uncommon",
            Self::Rare => "Rare",
            Self::MythicRare => "Mythic Rare",
        }
    }

    /// Rare and mythic cards get the pointer tilt decoration.
    #[must_use]
    pub fn is_rare(self) -> bool {
        matches!(self, Self::Rare | Self::MythicRare)
    }
}

impl fmt::Display for Rarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown rarity: {0}")]
pub struct UnknownRarity(pub String);

impl FromStr for Rarity {
    type Err = UnknownRarity;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Self::ALL
            .into_iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| UnknownRarity(trimmed.to_owned()))
    }
}

// =============================================================================
// FIELDS AND VALIDATION
// =============================================================================

/// User-editable fields, named for validation and length reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CardField {
    Name,
    Type,
    Abilities,
    FlavorText,
    Rarity,
    Artist,
    PowerToughness,
    Prompt,
}

impl CardField {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Type => "type",
            Self::Abilities => "abilities",
            Self::FlavorText => "flavor_text",
            Self::Rarity => "rarity",
            Self::Artist => "artist",
            Self::PowerToughness => "power_toughness",
            Self::Prompt => "prompt",
        }
    }

    /// Character limit, for fields that have one.
    #[must_use]
    pub fn limit(self) -> Option<usize> {
        match self {
            Self::Name => Some(NAME_LIMIT),
            Self::Type => Some(TYPE_LIMIT),
            Self::Abilities => Some(ABILITIES_LIMIT),
            Self::FlavorText => Some(FLAVOR_TEXT_LIMIT),
            Self::Artist => Some(ARTIST_LIMIT),
            Self::Rarity | Self::PowerToughness | Self::Prompt => None,
        }
    }
}

impl fmt::Display for CardField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Local, pre-submission failure. Never retried; the user fixes the input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Please fill out all required fields: {}", join_fields(.missing_fields))]
pub struct ValidationError {
    pub missing_fields: Vec<CardField>,
}

fn join_fields(fields: &[CardField]) -> String {
    fields.iter().map(|f| f.as_str()).collect::<Vec<_>>().join(", ")
}

/// `used/limit` counter for a length-limited field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FieldLength {
    pub field: CardField,
    pub used: usize,
    pub limit: usize,
}

impl fmt::Display for FieldLength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.used, self.limit)
    }
}

// =============================================================================
// DESCRIPTOR
// =============================================================================

/// Which of the five color slots to set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSlot {
    Frame,
    CardBackground,
    HeaderBackground,
    FooterBackground,
    Text,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CardColors {
    pub frame: String,
    pub card_background: String,
    pub header_background: String,
    pub footer_background: String,
    pub text: String,
}

impl Default for CardColors {
    fn default() -> Self {
        Self {
            frame: "#c0c0c0".to_owned(),
            card_background: "#ffffff".to_owned(),
            header_background: "#f0f0f0".to_owned(),
            footer_background: "#000000".to_owned(),
            text: "#000000".to_owned(),
        }
    }
}

/// The card entity. Field names here are canonical; wire names live in
/// [`crate::api::types`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CardDescriptor {
    pub id: Option<CardId>,
    pub name: String,
    pub card_type: String,
    pub abilities: String,
    pub flavor_text: String,
    pub artist: String,
    pub rarity: Rarity,
    pub power_toughness: String,
    /// Single-character codes in cast order; duplicates allowed.
    pub mana_symbols: Vec<String>,
    pub colors: CardColors,
    pub image_ref: Option<String>,
    /// UI-only; never sent to the server.
    pub dark_mode: bool,
}

impl CardDescriptor {
    /// Brace-delimited mana cost, e.g. `{W}{U}`.
    #[must_use]
    pub fn mana_cost(&self) -> String {
        mana::format_symbols(&self.mana_symbols)
    }

    /// Check the required fields. Power/toughness and flavor text are optional.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] listing every blank required field.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let required = [
            (CardField::Name, self.name.as_str()),
            (CardField::Type, self.card_type.as_str()),
            (CardField::Abilities, self.abilities.as_str()),
            (CardField::Rarity, self.rarity.as_str()),
            (CardField::Artist, self.artist.as_str()),
        ];
        let missing_fields: Vec<CardField> = required
            .into_iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(field, _)| field)
            .collect();
        if missing_fields.is_empty() { Ok(()) } else { Err(ValidationError { missing_fields }) }
    }

    /// Length counters for every limited field.
    #[must_use]
    pub fn field_lengths(&self) -> Vec<FieldLength> {
        [
            (CardField::Name, &self.name, NAME_LIMIT),
            (CardField::Type, &self.card_type, TYPE_LIMIT),
            (CardField::Abilities, &self.abilities, ABILITIES_LIMIT),
            (CardField::FlavorText, &self.flavor_text, FLAVOR_TEXT_LIMIT),
            (CardField::Artist, &self.artist, ARTIST_LIMIT),
        ]
        .into_iter()
        .map(|(field, value, limit)| FieldLength { field, used: value.chars().count(), limit })
        .collect()
    }
}

fn clamp_chars(value: &str, limit: usize) -> String {
    value.chars().take(limit).collect()
}

// =============================================================================
// MODEL
// =============================================================================

/// Owns the card under edit and publishes a revision after every mutation.
#[derive(Debug)]
pub struct CardModel {
    card: CardDescriptor,
    changes: watch::Sender<u64>,
}

impl Default for CardModel {
    fn default() -> Self {
        Self::new()
    }
}

impl CardModel {
    #[must_use]
    pub fn new() -> Self {
        let (changes, _) = watch::channel(0);
        Self { card: CardDescriptor::default(), changes }
    }

    #[must_use]
    pub fn card(&self) -> &CardDescriptor {
        &self.card
    }

    /// Receiver that observes the revision counter. `changed()` resolves
    /// after the next mutation.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    #[must_use]
    pub fn revision(&self) -> u64 {
        *self.changes.borrow()
    }

    /// See [`CardDescriptor::validate`].
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] listing every blank required field.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.card.validate()
    }

    fn mutate(&mut self, apply: impl FnOnce(&mut CardDescriptor)) {
        apply(&mut self.card);
        self.changes.send_modify(|revision| *revision += 1);
    }

    pub fn set_name(&mut self, value: &str) {
        let value = clamp_chars(value, NAME_LIMIT);
        self.mutate(|card| card.name = value);
    }

    pub fn set_card_type(&mut self, value: &str) {
        let value = clamp_chars(value, TYPE_LIMIT);
        self.mutate(|card| card.card_type = value);
    }

    pub fn set_abilities(&mut self, value: &str) {
        let value = clamp_chars(value, ABILITIES_LIMIT);
        self.mutate(|card| card.abilities = value);
    }

    pub fn set_flavor_text(&mut self, value: &str) {
        let value = clamp_chars(value, FLAVOR_TEXT_LIMIT);
        self.mutate(|card| card.flavor_text = value);
    }

    pub fn set_artist(&mut self, value: &str) {
        let value = clamp_chars(value, ARTIST_LIMIT);
        self.mutate(|card| card.artist = value);
    }

    pub fn set_power_toughness(&mut self, value: &str) {
        let value = value.to_owned();
        self.mutate(|card| card.power_toughness = value);
    }

    pub fn set_rarity(&mut self, rarity: Rarity) {
        self.mutate(|card| card.rarity = rarity);
    }

    pub fn set_color(&mut self, slot: ColorSlot, value: &str) {
        let value = value.to_owned();
        self.mutate(|card| {
            let target = match slot {
                ColorSlot::Frame => &mut card.colors.frame,
                ColorSlot::CardBackground => &mut card.colors.card_background,
                ColorSlot::HeaderBackground => &mut card.colors.header_background,
                ColorSlot::FooterBackground => &mut card.colors.footer_background,
                ColorSlot::Text => &mut card.colors.text,
            };
            *target = value;
        });
    }

    pub fn set_image_ref(&mut self, image_ref: Option<String>) {
        self.mutate(|card| card.image_ref = image_ref.filter(|r| !r.is_empty()));
    }

    pub fn set_dark_mode(&mut self, enabled: bool) {
        self.mutate(|card| card.dark_mode = enabled);
    }

    /// Flip dark mode and return the new value.
    pub fn toggle_dark_mode(&mut self) -> bool {
        let next = !self.card.dark_mode;
        self.set_dark_mode(next);
        next
    }

    /// Symmetric-difference toggle: a present symbol is removed everywhere it
    /// occurs, an absent one is appended once.
    pub fn toggle_mana(&mut self, symbol: &str) {
        self.mutate(|card| {
            if card.mana_symbols.iter().any(|s| s == symbol) {
                card.mana_symbols.retain(|s| s != symbol);
            } else {
                card.mana_symbols.push(symbol.to_owned());
            }
        });
    }

    /// Restore every field to its default. The only way back to a new card.
    pub fn reset(&mut self) {
        self.mutate(|card| *card = CardDescriptor::default());
    }

    /// Adopt the id echoed by a successful create.
    pub(crate) fn assign_id(&mut self, id: CardId) {
        self.mutate(|card| card.id = Some(id));
    }

    /// Replace the whole card with one loaded from the server, keeping the
    /// local dark-mode preference.
    pub(crate) fn load(&mut self, mut descriptor: CardDescriptor) {
        descriptor.dark_mode = self.card.dark_mode;
        self.mutate(|card| *card = descriptor);
    }
}
