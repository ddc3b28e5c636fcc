//! Normalization of raw form submissions into the typed settings model.
//!
//! Form fields arrive as loosely typed strings. Everything downstream of
//! [`normalize`] works on [`DefaultSettings`] and [`AnimationSettings`] only.

use std::collections::HashMap;
use std::path::PathBuf;

use thiserror::Error;

use crate::job::JobSpec;
use crate::settings::{
    AnimationSettings, CircleSettings, DefaultSettings, EffectKind, LoopMode, PanSettings,
    ZoomSettings,
};

pub type SubmissionResult<T> = Result<T, SubmissionError>;

/// Reasons a submission is rejected before any job is created.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmissionError {
    #[error("No image provided")]
    MissingImage,

    #[error("No image selected")]
    EmptyFileName,

    #[error("Invalid file format: {0}")]
    InvalidContentType(String),

    #[error("Uploaded image is empty")]
    EmptyImage,

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for field {field}: {value:?}")]
    InvalidField { field: String, value: String },
}

impl SubmissionError {
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField(field.into())
    }

    pub fn invalid_field(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Name of the offending form field, if the error is about one.
    pub fn field(&self) -> Option<&str> {
        match self {
            SubmissionError::MissingField(field) => Some(field),
            SubmissionError::InvalidField { field, .. } => Some(field),
            _ => None,
        }
    }
}

/// Uploaded image as received from the client.
#[derive(Debug, Clone, Default)]
pub struct RawImage {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Raw request: optional image plus string form fields.
#[derive(Debug, Clone, Default)]
pub struct RawSubmission {
    pub image: Option<RawImage>,
    pub fields: HashMap<String, String>,
}

impl RawSubmission {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_image(mut self, image: RawImage) -> Self {
        self.image = Some(image);
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }
}

/// Validated submission, ready to become a [`JobSpec`] once the image is stored.
#[derive(Debug, Clone)]
pub struct NormalizedSubmission<'a> {
    pub image: &'a RawImage,
    pub defaults: DefaultSettings,
    pub animations: AnimationSettings,
}

impl NormalizedSubmission<'_> {
    pub fn into_job_spec(self, image_path: impl Into<PathBuf>) -> JobSpec {
        JobSpec::new(image_path, self.defaults, self.animations)
    }
}

/// Validate the image and build the settings model from raw form fields.
///
/// The image is checked first; settings are not looked at for a request
/// without a usable image.
pub fn normalize(raw: &RawSubmission) -> SubmissionResult<NormalizedSubmission<'_>> {
    let image = validate_image(raw.image.as_ref())?;
    let form = Form::new(&raw.fields);

    let defaults = DefaultSettings {
        duration: form.dimension("duration", DefaultSettings::DEFAULT_DURATION)?,
        framerate: form.dimension("framerate", DefaultSettings::DEFAULT_FRAMERATE)?,
        height: form.dimension("height", DefaultSettings::DEFAULT_HEIGHT)?,
        width: form.dimension("width", DefaultSettings::DEFAULT_WIDTH)?,
    };

    let animations = AnimationSettings {
        circle: form.effect(EffectKind::Circle, circle)?,
        horizontal: form.effect(EffectKind::Horizontal, pan)?,
        vertical: form.effect(EffectKind::Vertical, pan)?,
        zoom: form.effect(EffectKind::Zoom, zoom)?,
    };

    Ok(NormalizedSubmission {
        image,
        defaults,
        animations,
    })
}

fn validate_image(image: Option<&RawImage>) -> SubmissionResult<&RawImage> {
    let image = image.ok_or(SubmissionError::MissingImage)?;

    if image.file_name.trim().is_empty() {
        return Err(SubmissionError::EmptyFileName);
    }

    let content_type = image.content_type.as_deref().unwrap_or_default();
    if !content_type.starts_with("image/") {
        return Err(SubmissionError::InvalidContentType(content_type.to_string()));
    }

    if image.bytes.is_empty() {
        return Err(SubmissionError::EmptyImage);
    }

    Ok(image)
}

fn circle(fields: &EffectFields<'_>) -> SubmissionResult<CircleSettings> {
    Ok(CircleSettings {
        intensity: fields.number("Intensity")?,
        reverse: fields.flag("Reverse")?,
        cumulative: fields.flag("Cumulative")?,
        smooth: fields.flag("Smooth")?,
        steady: fields.number("Steady")?,
        isometric: fields.number("Isometric")?,
    })
}

fn pan(fields: &EffectFields<'_>) -> SubmissionResult<PanSettings> {
    Ok(PanSettings {
        intensity: fields.number("Intensity")?,
        reverse: fields.flag("Reverse")?,
        cumulative: fields.flag("Cumulative")?,
        smooth: fields.flag("Smooth")?,
        loop_mode: fields.loop_mode("Loop")?,
        steady: fields.number("Steady")?,
        isometric: fields.number("Isometric")?,
    })
}

fn zoom(fields: &EffectFields<'_>) -> SubmissionResult<ZoomSettings> {
    Ok(ZoomSettings {
        intensity: fields.number("Intensity")?,
        reverse: fields.flag("Reverse")?,
        cumulative: fields.flag("Cumulative")?,
        smooth: fields.flag("Smooth")?,
    })
}

/// Parse a checkbox-style value. `None` for unrecognised tokens.
fn parse_truthy(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "on" | "yes" => Some(true),
        "false" | "0" | "off" | "no" | "" => Some(false),
        _ => None,
    }
}

struct Form<'a> {
    fields: &'a HashMap<String, String>,
}

impl<'a> Form<'a> {
    fn new(fields: &'a HashMap<String, String>) -> Self {
        Self { fields }
    }

    fn get(&self, name: &str) -> Option<&'a str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Positive integer with a fallback for absent or blank fields.
    fn dimension(&self, name: &str, default: u32) -> SubmissionResult<u32> {
        match self.get(name).map(str::trim) {
            None | Some("") => Ok(default),
            Some(value) => value
                .parse::<u32>()
                .ok()
                .filter(|v| *v > 0)
                .ok_or_else(|| SubmissionError::invalid_field(name, value)),
        }
    }

    /// Build an effect's settings if `<kind>Enabled` is truthy. A disabled
    /// effect never reads its other fields.
    fn effect<T>(
        &self,
        kind: EffectKind,
        build: impl FnOnce(&EffectFields<'a>) -> SubmissionResult<T>,
    ) -> SubmissionResult<Option<T>> {
        let enabled_field = format!("{}Enabled", kind.as_str());
        let enabled = match self.get(&enabled_field) {
            None => false,
            Some(value) => parse_truthy(value)
                .ok_or_else(|| SubmissionError::invalid_field(&enabled_field, value))?,
        };

        if !enabled {
            return Ok(None);
        }

        let fields = EffectFields {
            form: self.fields,
            prefix: kind.as_str(),
        };
        build(&fields).map(Some)
    }
}

/// Required fields of one enabled effect, named `<kind><Field>`.
struct EffectFields<'a> {
    form: &'a HashMap<String, String>,
    prefix: &'static str,
}

impl<'a> EffectFields<'a> {
    fn required(&self, suffix: &str) -> SubmissionResult<(String, &'a str)> {
        let name = format!("{}{}", self.prefix, suffix);
        match self.form.get(&name) {
            Some(value) => Ok((name, value.as_str())),
            None => Err(SubmissionError::MissingField(name)),
        }
    }

    fn number(&self, suffix: &str) -> SubmissionResult<f64> {
        let (name, value) = self.required(suffix)?;
        value
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| SubmissionError::invalid_field(name, value))
    }

    fn flag(&self, suffix: &str) -> SubmissionResult<bool> {
        let (name, value) = self.required(suffix)?;
        parse_truthy(value).ok_or_else(|| SubmissionError::invalid_field(name, value))
    }

    /// Truthy means loop; anything else, including an unrecognised token, means no loop.
    fn loop_mode(&self, suffix: &str) -> SubmissionResult<LoopMode> {
        let (_, value) = self.required(suffix)?;
        Ok(LoopMode::from_truthy(parse_truthy(value).unwrap_or(false)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image() -> RawImage {
        RawImage {
            file_name: "photo.jpg".to_string(),
            content_type: Some("image/jpeg".to_string()),
            bytes: vec![0xff, 0xd8, 0xff],
        }
    }

    fn with_pan(raw: RawSubmission, kind: &str, loop_value: &str) -> RawSubmission {
        raw.with_field(format!("{kind}Enabled"), "true")
            .with_field(format!("{kind}Intensity"), "1.5")
            .with_field(format!("{kind}Reverse"), "false")
            .with_field(format!("{kind}Cumulative"), "false")
            .with_field(format!("{kind}Smooth"), "true")
            .with_field(format!("{kind}Loop"), loop_value)
            .with_field(format!("{kind}Steady"), "0.3")
            .with_field(format!("{kind}Isometric"), "0.6")
    }

    #[test]
    fn test_defaults_apply_when_fields_absent() {
        let raw = RawSubmission::new().with_image(image());
        let normalized = normalize(&raw).unwrap();

        assert_eq!(normalized.defaults, DefaultSettings::default());
        assert_eq!(normalized.animations, AnimationSettings::default());
    }

    #[test]
    fn test_present_defaults_are_used() {
        let raw = RawSubmission::new()
            .with_image(image())
            .with_field("duration", "5")
            .with_field("framerate", "30")
            .with_field("height", "720")
            .with_field("width", "")
            .with_field("unrelated", "ignored");
        let defaults = normalize(&raw).unwrap().defaults;

        assert_eq!(defaults.duration, 5);
        assert_eq!(defaults.framerate, 30);
        assert_eq!(defaults.height, 720);
        assert_eq!(defaults.width, 1920);
    }

    #[test]
    fn test_non_positive_dimension_is_rejected() {
        let raw = RawSubmission::new()
            .with_image(image())
            .with_field("framerate", "0");
        let err = normalize(&raw).unwrap_err();
        assert_eq!(err.field(), Some("framerate"));

        let raw = RawSubmission::new()
            .with_image(image())
            .with_field("height", "tall");
        assert_eq!(normalize(&raw).unwrap_err().field(), Some("height"));
    }

    #[test]
    fn test_image_checks() {
        assert_eq!(
            normalize(&RawSubmission::new()).unwrap_err(),
            SubmissionError::MissingImage
        );

        let unnamed = RawImage {
            file_name: String::new(),
            ..image()
        };
        assert_eq!(
            normalize(&RawSubmission::new().with_image(unnamed)).unwrap_err(),
            SubmissionError::EmptyFileName
        );

        let text = RawImage {
            content_type: Some("text/plain".to_string()),
            ..image()
        };
        let err = normalize(&RawSubmission::new().with_image(text)).unwrap_err();
        assert_eq!(err.to_string(), "Invalid file format: text/plain");

        let untyped = RawImage {
            content_type: None,
            ..image()
        };
        assert!(matches!(
            normalize(&RawSubmission::new().with_image(untyped)),
            Err(SubmissionError::InvalidContentType(_))
        ));

        let empty = RawImage {
            bytes: Vec::new(),
            ..image()
        };
        assert_eq!(
            normalize(&RawSubmission::new().with_image(empty)).unwrap_err(),
            SubmissionError::EmptyImage
        );
    }

    #[test]
    fn test_image_checked_before_settings() {
        // Broken settings must not mask the missing image.
        let raw = RawSubmission::new()
            .with_field("duration", "-1")
            .with_field("zoomEnabled", "true");
        assert_eq!(normalize(&raw).unwrap_err(), SubmissionError::MissingImage);
    }

    #[test]
    fn test_disabled_effect_reads_nothing() {
        let raw = RawSubmission::new()
            .with_image(image())
            .with_field("circleEnabled", "false")
            .with_field("circleIntensity", "not a number")
            .with_field("zoomEnabled", "");
        let animations = normalize(&raw).unwrap().animations;

        assert!(animations.circle.is_none());
        assert!(animations.zoom.is_none());
    }

    #[test]
    fn test_enabled_effect_missing_field_is_named() {
        let raw = RawSubmission::new()
            .with_image(image())
            .with_field("zoomEnabled", "true")
            .with_field("zoomIntensity", "2")
            .with_field("zoomReverse", "false")
            .with_field("zoomCumulative", "true");

        let err = normalize(&raw).unwrap_err();
        assert_eq!(err, SubmissionError::missing_field("zoomSmooth"));
        assert_eq!(err.to_string(), "Missing required field: zoomSmooth");
    }

    #[test]
    fn test_zoom_settings() {
        let raw = RawSubmission::new()
            .with_image(image())
            .with_field("zoomEnabled", "on")
            .with_field("zoomIntensity", "2")
            .with_field("zoomReverse", "false")
            .with_field("zoomCumulative", "true")
            .with_field("zoomSmooth", "0");
        let zoom = normalize(&raw).unwrap().animations.zoom.unwrap();

        assert_eq!(
            zoom,
            ZoomSettings {
                intensity: 2.0,
                reverse: false,
                cumulative: true,
                smooth: false,
            }
        );
    }

    #[test]
    fn test_loop_derivation() {
        let raw = with_pan(RawSubmission::new().with_image(image()), "horizontal", "true");
        let raw = with_pan(raw, "vertical", "");
        let animations = normalize(&raw).unwrap().animations;

        assert_eq!(animations.horizontal.unwrap().loop_mode, LoopMode::Loop);
        assert_eq!(animations.vertical.unwrap().loop_mode, LoopMode::NoLoop);
    }

    #[test]
    fn test_loop_is_required_when_enabled() {
        let mut raw = with_pan(RawSubmission::new().with_image(image()), "vertical", "1");
        raw.fields.remove("verticalLoop");

        assert_eq!(
            normalize(&raw).unwrap_err(),
            SubmissionError::missing_field("verticalLoop")
        );
    }

    #[test]
    fn test_unrecognised_flag_is_rejected() {
        let raw = with_pan(RawSubmission::new().with_image(image()), "horizontal", "1")
            .with_field("horizontalSmooth", "maybe");

        let err = normalize(&raw).unwrap_err();
        assert_eq!(err.field(), Some("horizontalSmooth"));
    }

    #[test]
    fn test_unrecognised_enabled_token_is_rejected() {
        let raw = RawSubmission::new()
            .with_image(image())
            .with_field("circleEnabled", "checked");

        let err = normalize(&raw).unwrap_err();
        assert_eq!(err, SubmissionError::invalid_field("circleEnabled", "checked"));
        assert_eq!(err.field(), Some("circleEnabled"));
    }

    #[test]
    fn test_enabled_accepts_checkbox_tokens() {
        for token in ["on", "1", "TRUE", " yes "] {
            let raw = RawSubmission::new()
                .with_image(image())
                .with_field("zoomEnabled", token)
                .with_field("zoomIntensity", "1")
                .with_field("zoomReverse", "")
                .with_field("zoomCumulative", "off")
                .with_field("zoomSmooth", "on");
            let normalized = normalize(&raw).unwrap();
            assert!(normalized.animations.zoom.is_some(), "token {token:?}");
        }

        let raw = RawSubmission::new()
            .with_image(image())
            .with_field("zoomEnabled", "off");
        assert!(normalize(&raw).unwrap().animations.zoom.is_none());
    }

    #[test]
    fn test_into_job_spec() {
        let raw = RawSubmission::new().with_image(image());
        let spec = normalize(&raw).unwrap().into_job_spec("temp/temp_1.jpg");

        assert_eq!(spec.image_path, PathBuf::from("temp/temp_1.jpg"));
        assert_eq!(spec.defaults, DefaultSettings::default());
    }
}
