//! Render settings: defaults shared by every job and per-effect animation settings.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Output settings applied to every render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DefaultSettings {
    /// Video length in seconds
    pub duration: u32,
    /// Frames per second
    pub framerate: u32,
    /// Output height in pixels
    pub height: u32,
    /// Output width in pixels
    pub width: u32,
}

impl DefaultSettings {
    pub const DEFAULT_DURATION: u32 = 10;
    pub const DEFAULT_FRAMERATE: u32 = 60;
    pub const DEFAULT_HEIGHT: u32 = 1080;
    pub const DEFAULT_WIDTH: u32 = 1920;
}

impl Default for DefaultSettings {
    fn default() -> Self {
        Self {
            duration: Self::DEFAULT_DURATION,
            framerate: Self::DEFAULT_FRAMERATE,
            height: Self::DEFAULT_HEIGHT,
            width: Self::DEFAULT_WIDTH,
        }
    }
}

/// Whether a pan effect loops back to its start.
///
/// The renderer takes `--loop ""` for looping and `--loop --no-loop` otherwise,
/// so this is kept as its own variant rather than a plain bool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum LoopMode {
    Loop,
    NoLoop,
}

impl LoopMode {
    pub fn from_truthy(truthy: bool) -> Self {
        if truthy {
            LoopMode::Loop
        } else {
            LoopMode::NoLoop
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LoopMode::Loop => "loop",
            LoopMode::NoLoop => "no-loop",
        }
    }
}

/// Orbiting camera motion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CircleSettings {
    pub intensity: f64,
    pub reverse: bool,
    pub cumulative: bool,
    pub smooth: bool,
    pub steady: f64,
    pub isometric: f64,
}

/// Linear pan, used by both the horizontal and vertical effects.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PanSettings {
    pub intensity: f64,
    pub reverse: bool,
    pub cumulative: bool,
    pub smooth: bool,
    #[serde(rename = "loop")]
    pub loop_mode: LoopMode,
    pub steady: f64,
    pub isometric: f64,
}

/// Dolly zoom.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ZoomSettings {
    pub intensity: f64,
    pub reverse: bool,
    pub cumulative: bool,
    pub smooth: bool,
}

/// Animation kinds, in the order the renderer receives them.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum EffectKind {
    Circle,
    Horizontal,
    Vertical,
    Zoom,
}

impl EffectKind {
    pub const ALL: [EffectKind; 4] = [
        EffectKind::Circle,
        EffectKind::Horizontal,
        EffectKind::Vertical,
        EffectKind::Zoom,
    ];

    /// Subcommand name, also the prefix of this effect's form fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            EffectKind::Circle => "circle",
            EffectKind::Horizontal => "horizontal",
            EffectKind::Vertical => "vertical",
            EffectKind::Zoom => "zoom",
        }
    }
}

impl fmt::Display for EffectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single enabled effect together with its settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EffectSettings {
    Circle(CircleSettings),
    Horizontal(PanSettings),
    Vertical(PanSettings),
    Zoom(ZoomSettings),
}

impl EffectSettings {
    pub fn kind(&self) -> EffectKind {
        match self {
            EffectSettings::Circle(_) => EffectKind::Circle,
            EffectSettings::Horizontal(_) => EffectKind::Horizontal,
            EffectSettings::Vertical(_) => EffectKind::Vertical,
            EffectSettings::Zoom(_) => EffectKind::Zoom,
        }
    }
}

/// Per-effect settings. `None` means the effect is disabled.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct AnimationSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub circle: Option<CircleSettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub horizontal: Option<PanSettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vertical: Option<PanSettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zoom: Option<ZoomSettings>,
}

impl AnimationSettings {
    /// Enabled effects in renderer order: circle, horizontal, vertical, zoom.
    pub fn enabled(&self) -> impl Iterator<Item = EffectSettings> {
        [
            self.circle.map(EffectSettings::Circle),
            self.horizontal.map(EffectSettings::Horizontal),
            self.vertical.map(EffectSettings::Vertical),
            self.zoom.map(EffectSettings::Zoom),
        ]
        .into_iter()
        .flatten()
    }

    pub fn is_enabled(&self, kind: EffectKind) -> bool {
        match kind {
            EffectKind::Circle => self.circle.is_some(),
            EffectKind::Horizontal => self.horizontal.is_some(),
            EffectKind::Vertical => self.vertical.is_some(),
            EffectKind::Zoom => self.zoom.is_some(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zoom() -> ZoomSettings {
        ZoomSettings {
            intensity: 1.0,
            reverse: false,
            cumulative: false,
            smooth: true,
        }
    }

    fn pan(loop_mode: LoopMode) -> PanSettings {
        PanSettings {
            intensity: 1.0,
            reverse: false,
            cumulative: false,
            smooth: true,
            loop_mode,
            steady: 0.3,
            isometric: 0.6,
        }
    }

    #[test]
    fn test_defaults() {
        let defaults = DefaultSettings::default();
        assert_eq!(defaults.duration, 10);
        assert_eq!(defaults.framerate, 60);
        assert_eq!(defaults.height, 1080);
        assert_eq!(defaults.width, 1920);
    }

    #[test]
    fn test_enabled_yields_fixed_order() {
        let animations = AnimationSettings {
            circle: None,
            horizontal: None,
            vertical: Some(pan(LoopMode::Loop)),
            zoom: Some(zoom()),
        };

        let kinds: Vec<EffectKind> = animations.enabled().map(|e| e.kind()).collect();
        assert_eq!(kinds, vec![EffectKind::Vertical, EffectKind::Zoom]);
        assert!(animations.is_enabled(EffectKind::Zoom));
        assert!(!animations.is_enabled(EffectKind::Circle));
    }

    #[test]
    fn test_nothing_enabled_by_default() {
        assert_eq!(AnimationSettings::default().enabled().count(), 0);
    }

    #[test]
    fn test_loop_mode_serializes_as_loop_key() {
        let json = serde_json::to_value(pan(LoopMode::NoLoop)).unwrap();
        assert_eq!(json["loop"], "no_loop");
        assert_eq!(LoopMode::from_truthy(true), LoopMode::Loop);
        assert_eq!(LoopMode::NoLoop.as_str(), "no-loop");
    }
}
