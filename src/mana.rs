//! Mana-cost parsing and color derivation.
//!
//! A mana cost is written as a run of brace-delimited symbols, e.g.
//! `{W}{U}{2}`. Two independent tables map symbols to colors:
//!
//! - the dominant color table (uppercase keys) seeds the card background
//!   gradient and only knows the five colored mana types;
//! - the glyph table (lowercase keys) paints the individual mana glyphs and
//!   falls back to a neutral glyph for anything it does not know.

#[cfg(test)]
#[path = "mana_test.rs"]
mod mana_test;

use serde::Serialize;

/// Dominant color used when no symbol matches the color table.
pub const NEUTRAL_COLOR: &str = "#A9A9A9";

/// Color name reported for a cost with no colored symbol.
pub const COLORLESS: &str = "Colorless";

/// `(symbol, hex color, color name)` in WUBRG order.
const DOMINANT_COLORS: [(&str, &str, &str); 5] = [
    ("W", "#F8E7B9", "White"),
    ("U", "#0E68AB", "Blue"),
    ("B", "#150B00", "Black"),
    ("R", "#D3202A", "Red"),
    ("G", "#00733E", "Green"),
];

const GLYPH_BACKGROUNDS: [(&str, &str); 5] = [
    ("w", "rgb(248, 231, 185)"),
    ("u", "rgb(14, 104, 171)"),
    ("b", "rgb(21, 11, 0)"),
    ("r", "rgb(211, 32, 42)"),
    ("g", "rgb(0, 115, 62)"),
];

/// Background for glyphs missing from the glyph table (generic and colorless costs).
pub const DEFAULT_GLYPH_BACKGROUND: &str = "rgb(155, 155, 155)";

pub const GLYPH_TEXT_LIGHT: &str = "white";
pub const GLYPH_TEXT_DARK: &str = "black";

/// A single rendered mana symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManaGlyph {
    pub symbol: String,
    pub background: &'static str,
    pub text: &'static str,
}

/// Extract every `{...}` token from `cost` in left-to-right order.
///
/// Unknown tokens are kept verbatim. Empty braces and an unterminated
/// trailing `{` are ignored.
#[must_use]
pub fn parse_symbols(cost: &str) -> Vec<String> {
    let mut symbols = Vec::new();
    let mut rest = cost;
    while let Some(open) = rest.find('{') {
        let after = &rest[open + 1..];
        let Some(close) = after.find('}') else {
            break;
        };
        let token = &after[..close];
        if !token.is_empty() {
            symbols.push(token.to_owned());
        }
        rest = &after[close + 1..];
    }
    symbols
}

/// Join symbol codes back into brace-delimited form.
#[must_use]
pub fn format_symbols<S: AsRef<str>>(symbols: &[S]) -> String {
    symbols.iter().map(|s| format!("{{{}}}", s.as_ref())).collect()
}

/// Color of the first symbol, in cast order, that appears in the color table.
///
/// First match wins: `{U}{W}` is blue even though white also matches.
#[must_use]
pub fn dominant_color<S: AsRef<str>>(symbols: &[S]) -> &'static str {
    first_colored(symbols).map_or(NEUTRAL_COLOR, |(_, hex, _)| hex)
}

/// Name of the dominant color, or [`COLORLESS`].
#[must_use]
pub fn color_name<S: AsRef<str>>(symbols: &[S]) -> &'static str {
    first_colored(symbols).map_or(COLORLESS, |(_, _, name)| name)
}

fn first_colored<S: AsRef<str>>(symbols: &[S]) -> Option<(&'static str, &'static str, &'static str)> {
    symbols.iter().find_map(|symbol| {
        let key = symbol.as_ref().to_uppercase();
        DOMINANT_COLORS.iter().copied().find(|(code, _, _)| *code == key)
    })
}

/// Glyph colors for one symbol.
///
/// White and unknown symbols get light text; every other known symbol gets
/// dark text.
#[must_use]
pub fn glyph(symbol: &str) -> ManaGlyph {
    let key = symbol.to_lowercase();
    let known = GLYPH_BACKGROUNDS.iter().find(|(code, _)| *code == key);
    let background = known.map_or(DEFAULT_GLYPH_BACKGROUND, |(_, bg)| bg);
    let text = match known {
        None | Some(("w", _)) => GLYPH_TEXT_LIGHT,
        Some(_) => GLYPH_TEXT_DARK,
    };
    ManaGlyph { symbol: symbol.to_owned(), background, text }
}

/// Glyphs for a whole symbol sequence, preserving order and duplicates.
#[must_use]
pub fn glyphs<S: AsRef<str>>(symbols: &[S]) -> Vec<ManaGlyph> {
    symbols.iter().map(|s| glyph(s.as_ref())).collect()
}
