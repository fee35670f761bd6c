//! Echo engine for testing.
//!
//! This engine never looks at pixels. It reports the image size and the
//! language it was built for as `[echo WIDTHxHEIGHT LANGUAGE]`.

use image::GenericImageView as _;

use crate::prelude::*;

use super::{OcrEngine, OcrImageInput, OcrImageOutput};

/// Echo engine for testing.
#[derive(Debug)]
pub struct EchoOcrEngine {
    language: String,
}

impl EchoOcrEngine {
    /// Create a new echo engine.
    pub fn new(language: &str) -> Self {
        Self {
            language: language.to_owned(),
        }
    }
}

#[async_trait]
impl OcrEngine for EchoOcrEngine {
    async fn recognize(&self, input: OcrImageInput) -> Result<OcrImageOutput> {
        let (width, height) = input.image.dimensions();
        Ok(OcrImageOutput {
            text: Some(format!("[echo {width}x{height} {}]", self.language)),
        })
    }
}

#[cfg(test)]
mod tests {
    use image::{DynamicImage, RgbImage};

    use super::*;

    #[tokio::test]
    async fn reports_dimensions_and_language() {
        let engine = EchoOcrEngine::new("japanese");
        let image = DynamicImage::ImageRgb8(RgbImage::new(12, 7));
        let output = engine.recognize(OcrImageInput { image }).await.unwrap();
        assert_eq!(output.text.as_deref(), Some("[echo 12x7 japanese]"));
    }
}
