//! Pointer-driven 3D tilt for rare cards.
//!
//! The effect never touches the card model. It turns pointer events into a
//! [`TiltFrame`] the painter applies to the card element and its two
//! highlight layers. The only state kept between events is whether CSS
//! transition smoothing is on.

#[cfg(test)]
#[path = "tilt_test.rs"]
mod tilt_test;

use serde::Serialize;

use crate::card::Rarity;

pub const MAX_ROTATION_DEG: f64 = 15.0;
pub const PERSPECTIVE_PX: f64 = 800.0;
pub const HOVER_SCALE: f64 = 1.05;
pub const SHINE_RANGE_PCT: f64 = 100.0;
pub const RAINBOW_RANGE_PCT: f64 = 50.0;

const SMOOTH_TRANSITION: &str = "all 0.5s ease-out";

/// Pointer position in client (CSS pixel) coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// An element's bounding client rect.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Bounds {
    #[must_use]
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self { left, top, width, height }
    }

    #[must_use]
    pub fn center(&self) -> Point {
        Point { x: self.left + self.width / 2.0, y: self.top + self.height / 2.0 }
    }

    /// Pointer offset from the center, normalized so the box edges sit at
    /// ±1. `None` for a degenerate box.
    #[must_use]
    pub fn normalized(&self, pointer: Point) -> Option<(f64, f64)> {
        if self.width <= 0.0 || self.height <= 0.0 {
            return None;
        }
        let center = self.center();
        Some(((pointer.x - center.x) / (self.width / 2.0), (pointer.y - center.y) / (self.height / 2.0)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TiltSettings {
    pub max_rotation: f64,
    pub perspective: f64,
    pub scale: f64,
    pub shine_range: f64,
    pub rainbow_range: f64,
}

impl Default for TiltSettings {
    fn default() -> Self {
        Self {
            max_rotation: MAX_ROTATION_DEG,
            perspective: PERSPECTIVE_PX,
            scale: HOVER_SCALE,
            shine_range: SHINE_RANGE_PCT,
            rainbow_range: RAINBOW_RANGE_PCT,
        }
    }
}

// =============================================================================
// FRAME
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CardTransform {
    pub perspective: f64,
    pub rotate_x: f64,
    pub rotate_y: f64,
    pub scale: f64,
}

impl CardTransform {
    fn neutral(perspective: f64) -> Self {
        Self { perspective, rotate_x: 0.0, rotate_y: 0.0, scale: 1.0 }
    }

    #[must_use]
    pub fn to_css(&self) -> String {
        let s = self.scale;
        format!(
            "perspective({}px) rotateX({}deg) rotateY({}deg) scale3d({s}, {s}, {s})",
            self.perspective, self.rotate_x, self.rotate_y
        )
    }
}

/// Offset (percent of the layer's size) and opacity of one highlight layer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HighlightLayer {
    pub translate_x: f64,
    pub translate_y: f64,
    pub opacity: f64,
}

impl HighlightLayer {
    const HIDDEN: Self = Self { translate_x: 0.0, translate_y: 0.0, opacity: 0.0 };

    /// Moves opposite the pointer by `range` percent at the box edge.
    fn tracking(angle_x: f64, angle_y: f64, range: f64) -> Self {
        Self { translate_x: -angle_x * range, translate_y: -angle_y * range, opacity: 1.0 }
    }

    #[must_use]
    pub fn to_css(&self) -> String {
        format!("translate({}%, {}%)", self.translate_x, self.translate_y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    Smooth,
    None,
}

impl Transition {
    #[must_use]
    pub fn to_css(self) -> &'static str {
        match self {
            Self::Smooth => SMOOTH_TRANSITION,
            Self::None => "none",
        }
    }
}

/// Styles for the card element and both highlight layers after one event.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TiltFrame {
    pub transition: Transition,
    pub card: CardTransform,
    pub shine: HighlightLayer,
    pub rainbow: HighlightLayer,
}

// =============================================================================
// EFFECT
// =============================================================================

#[derive(Debug, Clone)]
pub struct TiltEffect {
    settings: TiltSettings,
    transition: Transition,
}

impl Default for TiltEffect {
    fn default() -> Self {
        Self::new(TiltSettings::default())
    }
}

impl TiltEffect {
    #[must_use]
    pub fn new(settings: TiltSettings) -> Self {
        Self { settings, transition: Transition::Smooth }
    }

    /// The effect decorates only rare and mythic rare cards.
    #[must_use]
    pub fn for_rarity(rarity: Rarity) -> Option<Self> {
        rarity.is_rare().then(Self::default)
    }

    #[must_use]
    pub fn transition(&self) -> Transition {
        self.transition
    }

    /// Pointer entered the card: track the pointer without smoothing.
    pub fn pointer_enter(&mut self) -> Transition {
        self.transition = Transition::None;
        self.transition
    }

    #[must_use]
    pub fn pointer_move(&self, pointer: Point, bounds: Bounds) -> TiltFrame {
        let Some((angle_x, angle_y)) = bounds.normalized(pointer) else {
            return self.rest_frame();
        };
        let s = &self.settings;
        TiltFrame {
            transition: self.transition,
            card: CardTransform {
                perspective: s.perspective,
                rotate_x: angle_y * s.max_rotation,
                rotate_y: -angle_x * s.max_rotation,
                scale: s.scale,
            },
            shine: HighlightLayer::tracking(angle_x, angle_y, s.shine_range),
            rainbow: HighlightLayer::tracking(angle_x, angle_y, s.rainbow_range),
        }
    }

    /// Pointer left: smoothing back on, everything returns to rest.
    pub fn pointer_leave(&mut self) -> TiltFrame {
        self.transition = Transition::Smooth;
        self.rest_frame()
    }

    fn rest_frame(&self) -> TiltFrame {
        TiltFrame {
            transition: self.transition,
            card: CardTransform::neutral(self.settings.perspective),
            shine: HighlightLayer::HIDDEN,
            rainbow: HighlightLayer::HIDDEN,
        }
    }
}
