//! Projection from a card to a view description.
//!
//! DESIGN
//! ======
//! [`RenderProjection::project`] is a pure function of its input: no clock,
//! no I/O, no interior state. A DOM-binding collaborator diffs two
//! [`CardView`]s and applies the difference. Dark mode is a fixed palette
//! swap for the text box and frame backgrounds; every other color passes
//! through unchanged.

#[cfg(test)]
#[path = "render_test.rs"]
mod render_test;

use serde::Serialize;

use crate::api::CardRecord;
use crate::card::{CardDescriptor, FieldLength};
use crate::mana::{self, ManaGlyph};

pub const TEXT_BACKGROUND_LIGHT: &str = "#f7fafc";
pub const TEXT_BACKGROUND_DARK: &str = "#4a5568";
pub const FRAME_BACKGROUND_DARK: &str = "#2d2d2d";
pub const GRADIENT_TAIL: &str = "#171314";
pub const PLACEHOLDER_IMAGE: &str = "placeholder.png";

pub const UNNAMED: &str = "Unnamed Card";
pub const UNKNOWN_TYPE: &str = "Unknown Type";
pub const NO_ABILITIES: &str = "No abilities";
pub const NO_FLAVOR_TEXT: &str = "No flavor text";

/// Colors applied to the card's regions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewColors {
    pub frame_border: String,
    pub frame_background: String,
    pub card_background: String,
    pub header_background: String,
    pub footer_background: String,
    pub footer_text: String,
    pub text: String,
    pub text_background: String,
}

/// Everything a painter needs to draw one card.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CardView {
    pub name: String,
    pub card_type: String,
    pub abilities: String,
    pub flavor_text: String,
    pub artist: String,
    pub power_toughness: String,
    pub rarity: String,
    /// `Rare (GEN-12)` for list cards that carry set metadata.
    pub caption: Option<String>,
    pub mana: Vec<ManaGlyph>,
    pub dominant_color: &'static str,
    /// CSS background for the card body, seeded by the dominant color.
    pub background: String,
    pub colors: ViewColors,
    pub image_src: String,
    pub has_image: bool,
    pub counters: Vec<FieldLength>,
    /// Whether the pointer tilt decoration applies.
    pub tilt: bool,
    pub dark_mode: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderProjection {
    image_base_path: String,
}

impl RenderProjection {
    #[must_use]
    pub fn new(image_base_path: impl Into<String>) -> Self {
        Self { image_base_path: image_base_path.into() }
    }

    #[must_use]
    pub fn image_base_path(&self) -> &str {
        &self.image_base_path
    }

    /// Project the card under edit.
    #[must_use]
    pub fn project(&self, card: &CardDescriptor) -> CardView {
        let dominant = mana::dominant_color(&card.mana_symbols);
        let colors = &card.colors;
        CardView {
            name: or_sentinel(&card.name, UNNAMED),
            card_type: or_sentinel(&card.card_type, UNKNOWN_TYPE),
            abilities: or_sentinel(&card.abilities, NO_ABILITIES),
            flavor_text: or_sentinel(&card.flavor_text, NO_FLAVOR_TEXT),
            artist: labelled("Artist", &card.artist, "Unknown"),
            power_toughness: labelled("P/T", &card.power_toughness, "N/A"),
            rarity: card.rarity.as_str().to_owned(),
            caption: None,
            mana: mana::glyphs(&card.mana_symbols),
            dominant_color: dominant,
            background: gradient(dominant),
            colors: ViewColors {
                frame_border: colors.frame.clone(),
                frame_background: if card.dark_mode {
                    FRAME_BACKGROUND_DARK.to_owned()
                } else {
                    colors.card_background.clone()
                },
                card_background: colors.card_background.clone(),
                header_background: colors.header_background.clone(),
                footer_background: colors.footer_background.clone(),
                footer_text: colors.text.clone(),
                text: colors.text.clone(),
                text_background: if card.dark_mode { TEXT_BACKGROUND_DARK } else { TEXT_BACKGROUND_LIGHT }
                    .to_owned(),
            },
            image_src: self.image_src(card.image_ref.as_deref()),
            has_image: card.image_ref.is_some(),
            counters: card.field_lengths(),
            tilt: card.rarity.is_rare(),
            dark_mode: card.dark_mode,
        }
    }

    /// Project a card from a list response, adding its set caption.
    #[must_use]
    pub fn project_record(&self, record: &CardRecord) -> CardView {
        let caption = record.caption();
        let mut view = self.project(&CardDescriptor::from(record.clone()));
        view.caption = Some(caption);
        view
    }

    fn image_src(&self, image_ref: Option<&str>) -> String {
        format!("{}{}", self.image_base_path, image_ref.unwrap_or(PLACEHOLDER_IMAGE))
    }
}

fn or_sentinel(value: &str, sentinel: &str) -> String {
    if value.is_empty() { sentinel } else { value }.to_owned()
}

fn labelled(label: &str, value: &str, fallback: &str) -> String {
    let shown = if value.is_empty() { fallback } else { value };
    format!("{label}: {shown}")
}

fn gradient(dominant: &str) -> String {
    format!("linear-gradient(165deg, {dominant} 60%, {GRADIENT_TAIL})")
}
