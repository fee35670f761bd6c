//! Single-image recognition, producing a JSON-friendly result record.

use std::time::Instant;

use image::{DynamicImage, GenericImageView as _, imageops::FilterType};
use schemars::JsonSchema;

use crate::{
    engines::{EngineCache, EngineKind, OcrImageInput},
    prelude::*,
};

/// Language used when the caller doesn't name one.
pub const DEFAULT_LANGUAGE: &str = "english";

/// Images whose shorter side is below this many pixels get upscaled when
/// [`RecognizeOptions::upscale_if_needed`] is set.
const UPSCALE_MIN_SIDE: u32 = 300;

/// What to recognize, and how.
#[derive(Clone, Debug)]
pub struct RecognizeOptions {
    /// The image to recognize.
    pub image_path: PathBuf,

    /// The language of the text in the image.
    pub language: String,

    /// Convert the image to grayscale before recognition.
    pub preprocess: bool,

    /// Double the size of small images before recognition.
    pub upscale_if_needed: bool,

    /// Accepted for compatibility with older callers. Our output only carries
    /// text, so this has no effect.
    pub char_level: String,
}

impl RecognizeOptions {
    /// Options for recognizing `image_path` with all defaults.
    pub fn new(image_path: impl Into<PathBuf>) -> Self {
        Self {
            image_path: image_path.into(),
            language: DEFAULT_LANGUAGE.to_owned(),
            preprocess: false,
            upscale_if_needed: false,
            char_level: "True".to_owned(),
        }
    }
}

/// The result of recognizing one image, as printed on standard output.
#[derive(Clone, Debug, JsonSchema, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RecognizeOutput {
    /// Recognition ran. `text` may be empty if the image contained none.
    Success {
        /// The recognized text.
        text: String,
        /// Wall-clock time spent, always a finite number.
        processing_time_seconds: f64,
    },
    /// Something went wrong.
    Error {
        /// A human-readable description of the problem.
        message: String,
    },
}

impl RecognizeOutput {
    /// Build an error record.
    pub fn error(message: impl Into<String>) -> Self {
        RecognizeOutput::Error {
            message: message.into(),
        }
    }

    /// Serialize as a single line of JSON.
    pub fn to_json_line(&self) -> Result<String> {
        serde_json::to_string(self).context("failed to serialize recognition output")
    }
}

/// Replace NaN and infinities with `default`, so the value can be written as
/// JSON.
pub fn sanitize_float(value: f64, default: f64) -> f64 {
    if value.is_finite() { value } else { default }
}

/// Like [`sanitize_float`], but for arbitrary JSON values. Numeric strings
/// are parsed; anything else that isn't a number becomes `default`.
pub fn sanitize_float_value(value: &Value, default: f64) -> f64 {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    };
    parsed.map_or(default, |v| sanitize_float(v, default))
}

/// Recognize the text in one image.
///
/// This never fails. Any problem is reported as a
/// [`RecognizeOutput::Error`] record, and the full error chain is logged.
#[instrument(level = "debug", skip(cache), fields(path = %options.image_path.display()))]
pub async fn process_image(
    cache: &EngineCache,
    kind: EngineKind,
    options: &RecognizeOptions,
) -> RecognizeOutput {
    if !options.image_path.exists() {
        return RecognizeOutput::error(format!(
            "Image file not found: {}",
            options.image_path.display()
        ));
    }

    let start_time = Instant::now();
    match process_image_inner(cache, kind, options).await {
        Ok(text) => RecognizeOutput::Success {
            text,
            processing_time_seconds: sanitize_float(
                start_time.elapsed().as_secs_f64(),
                0.0,
            ),
        },
        Err(err) => {
            error!("OCR failed: {:?}", err);
            RecognizeOutput::error(format!("{:#}", err))
        }
    }
}

/// Perform actual work for `process_image`.
async fn process_image_inner(
    cache: &EngineCache,
    kind: EngineKind,
    options: &RecognizeOptions,
) -> Result<String> {
    if !options.char_level.eq_ignore_ascii_case("true") {
        debug!(char_level = %options.char_level, "ignoring char_level");
    }

    // Decoding is CPU-bound, so keep it off the async executor.
    let path = options.image_path.clone();
    let preprocess = options.preprocess;
    let upscale_if_needed = options.upscale_if_needed;
    let image = tokio::task::spawn_blocking(move || -> Result<DynamicImage> {
        let image = image::open(&path)
            .with_context(|| format!("cannot open image {}", path.display()))?;
        Ok(prepare_image(image, preprocess, upscale_if_needed))
    })
    .await
    .context("image decoding task panicked")??;

    let engine = cache.get_or_init(kind, &options.language).await?;
    let output = engine.recognize(OcrImageInput { image }).await?;
    Ok(output.text.unwrap_or_default())
}

/// Apply the optional grayscale and upscaling steps.
fn prepare_image(
    mut image: DynamicImage,
    preprocess: bool,
    upscale_if_needed: bool,
) -> DynamicImage {
    if preprocess {
        image = image.grayscale();
    }
    if upscale_if_needed {
        let (width, height) = image.dimensions();
        if width.min(height) < UPSCALE_MIN_SIDE {
            debug!(width, height, "upscaling small image");
            image = image.resize_exact(width * 2, height * 2, FilterType::CatmullRom);
        }
    }
    image
}
