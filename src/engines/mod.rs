//! OCR engine interface.

use std::{fmt, sync::Arc};

use clap::ValueEnum;
use image::DynamicImage;

use crate::prelude::*;

pub mod cache;
pub mod echo;
pub mod tesseract;

pub use self::cache::EngineCache;

/// Input to an OCR engine: one decoded image.
pub struct OcrImageInput {
    /// The image to recognize.
    pub image: DynamicImage,
}

/// Output of an OCR engine.
#[derive(Debug, Default)]
pub struct OcrImageOutput {
    /// The recognized text, if the engine found any.
    pub text: Option<String>,
}

/// Interface to an OCR engine handle.
///
/// Handles are expensive to build, so callers should get them through an
/// [`EngineCache`].
#[async_trait]
pub trait OcrEngine: Send + Sync + 'static {
    /// Recognize the text in a single image.
    async fn recognize(&self, input: OcrImageInput) -> Result<OcrImageOutput>;
}

/// The OCR engines we know how to drive.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[clap(rename_all = "snake_case")]
pub enum EngineKind {
    /// The `tesseract` command-line tool.
    #[default]
    Tesseract,

    /// Reports image dimensions instead of text. Used for testing.
    Echo,
}

impl EngineKind {
    /// Short name, used in log messages and the ready flag file.
    pub fn name(self) -> &'static str {
        match self {
            EngineKind::Tesseract => "tesseract",
            EngineKind::Echo => "echo",
        }
    }

    /// Construct a new engine handle for `language`.
    pub async fn create_engine(self, language: &str) -> Result<Arc<dyn OcrEngine>> {
        match self {
            EngineKind::Tesseract => Ok(Arc::new(
                tesseract::TesseractOcrEngine::new(language).await?,
            )),
            EngineKind::Echo => Ok(Arc::new(echo::EchoOcrEngine::new(language))),
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
