//! depthflow argument synthesis.
//!
//! The argument vector has four parts, always in this order:
//! 1. input header: `input -i <image>`
//! 2. one block per enabled effect: circle, horizontal, vertical, zoom
//! 3. main block: `main --time <s> --fps <n> --height <px> --width <px>`
//! 4. output: `-o <path>`

use std::path::{Path, PathBuf};

use parallax_models::{
    CircleSettings, DefaultSettings, EffectSettings, JobSpec, LoopMode, PanSettings, ZoomSettings,
};

/// Program invoked when no override is configured.
pub const DEFAULT_PROGRAM: &str = "depthflow";

/// Encoding of a boolean-like setting into the token that follows its flag name.
///
/// Every such flag is emitted as two tokens: `--<name>` and the encoded value.
/// A set flag encodes to an empty token; anything else encodes to `--<text>`
/// (`--False` for a plain bool, `--no-loop` for [`LoopMode::NoLoop`]).
pub trait FlagValue {
    fn flag_value(&self) -> String;
}

impl FlagValue for bool {
    fn flag_value(&self) -> String {
        if *self {
            String::new()
        } else {
            "--False".to_string()
        }
    }
}

impl FlagValue for LoopMode {
    fn flag_value(&self) -> String {
        match self {
            LoopMode::Loop => String::new(),
            LoopMode::NoLoop => format!("--{}", self.as_str()),
        }
    }
}

/// Builder for depthflow invocations.
#[derive(Debug, Clone)]
pub struct DepthflowCommand {
    /// Input image path
    input: PathBuf,
    /// Output video path
    output: PathBuf,
    /// Enabled effects in renderer order
    effects: Vec<EffectSettings>,
    /// Shared output settings
    defaults: DefaultSettings,
}

impl DepthflowCommand {
    /// Create a command for a job spec writing to `output`.
    pub fn from_spec(spec: &JobSpec, output: impl AsRef<Path>) -> Self {
        Self {
            input: spec.image_path.clone(),
            output: output.as_ref().to_path_buf(),
            effects: spec.animations.enabled().collect(),
            defaults: spec.defaults,
        }
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Build the argument vector. Fresh on every call.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = Args::default();

        args.push("input");
        args.push("-i");
        args.push(self.input.to_string_lossy());

        for effect in &self.effects {
            match effect {
                EffectSettings::Circle(settings) => args.circle(settings),
                EffectSettings::Horizontal(settings) => args.pan("horizontal", settings),
                EffectSettings::Vertical(settings) => args.pan("vertical", settings),
                EffectSettings::Zoom(settings) => args.zoom(settings),
            }
        }

        args.push("main");
        args.option("--time", self.defaults.duration);
        args.option("--fps", self.defaults.framerate);
        args.option("--height", self.defaults.height);
        args.option("--width", self.defaults.width);

        args.push("-o");
        args.push(self.output.to_string_lossy());

        args.0
    }

    /// Shell-style rendering for logs.
    pub fn display(&self, program: &str) -> String {
        let args: Vec<String> = self
            .build_args()
            .into_iter()
            .map(|arg| if arg.is_empty() { "\"\"".to_string() } else { arg })
            .collect();
        format!("{} {}", program, args.join(" "))
    }
}

#[derive(Default)]
struct Args(Vec<String>);

impl Args {
    fn push(&mut self, token: impl Into<String>) {
        self.0.push(token.into());
    }

    fn option(&mut self, name: &str, value: impl ToString) {
        self.push(name);
        self.push(value.to_string());
    }

    fn flag(&mut self, name: &str, value: &impl FlagValue) {
        self.push(name);
        self.push(value.flag_value());
    }

    fn circle(&mut self, s: &CircleSettings) {
        self.push("circle");
        self.option("--intensity", s.intensity);
        self.flag("--reverse", &s.reverse);
        self.flag("--cumulative", &s.cumulative);
        self.flag("--smooth", &s.smooth);
        self.option("--steady", s.steady);
        self.option("--isometric", s.isometric);
    }

    fn pan(&mut self, name: &str, s: &PanSettings) {
        self.push(name);
        self.option("--intensity", s.intensity);
        self.flag("--reverse", &s.reverse);
        self.flag("--cumulative", &s.cumulative);
        self.flag("--smooth", &s.smooth);
        self.flag("--loop", &s.loop_mode);
        self.option("--steady", s.steady);
        self.option("--isometric", s.isometric);
    }

    fn zoom(&mut self, s: &ZoomSettings) {
        self.push("zoom");
        self.option("--intensity", s.intensity);
        self.flag("--reverse", &s.reverse);
        self.flag("--cumulative", &s.cumulative);
        self.flag("--smooth", &s.smooth);
    }
}
