//! Tesseract OCR engine.

use image::{DynamicImage, ImageFormat};
use tokio::process::Command;

use crate::{
    command::{check_for_command_failure, run_captured},
    prelude::*,
};

use super::{OcrEngine, OcrImageInput, OcrImageOutput};

/// Map a human-readable language name to a Tesseract language code.
///
/// Names we don't recognize are passed through unchanged, so callers can also
/// ask for codes like `deu+eng` directly.
pub fn tesseract_language(language: &str) -> String {
    let code = match language.trim().to_ascii_lowercase().as_str() {
        "" | "english" | "en" => "eng",
        "japanese" | "ja" => "jpn",
        "chinese" | "ch_sim" | "zh" | "zh-cn" => "chi_sim",
        "traditional chinese" | "ch_tra" | "zh-tw" => "chi_tra",
        "korean" | "ko" => "kor",
        "french" | "fr" => "fra",
        "german" | "de" => "deu",
        "spanish" | "es" => "spa",
        "italian" | "it" => "ita",
        "portuguese" | "pt" => "por",
        "russian" | "ru" => "rus",
        "vietnamese" | "vi" => "vie",
        "thai" | "th" => "tha",
        "arabic" | "ar" => "ara",
        _ => return language.trim().to_owned(),
    };
    code.to_owned()
}

/// Convert images PNG can't hold (32-bit float samples) to 8-bit RGBA.
fn png_compatible(image: DynamicImage) -> DynamicImage {
    match image {
        DynamicImage::ImageRgb32F(_) | DynamicImage::ImageRgba32F(_) => {
            DynamicImage::ImageRgba8(image.to_rgba8())
        }
        other => other,
    }
}

/// OCR engine wrapping the `tesseract` CLI tool.
#[derive(Debug)]
pub struct TesseractOcrEngine {
    /// Tesseract's language code, for `-l`.
    language_code: String,
}

impl TesseractOcrEngine {
    /// Create a new `tesseract` engine, checking that the tool is installed.
    #[instrument(level = "debug")]
    pub async fn new(language: &str) -> Result<Self> {
        let mut command = Command::new("tesseract");
        command.arg("--version");
        let output = run_captured("tesseract", command).await.context(
            "tesseract is not installed. Install it with your system package \
             manager (for example `apt install tesseract-ocr`)",
        )?;
        check_for_command_failure("tesseract", &output, None)?;
        let language_code = tesseract_language(language);
        debug!(%language_code, "tesseract is available");
        Ok(Self { language_code })
    }
}

#[async_trait]
impl OcrEngine for TesseractOcrEngine {
    #[instrument(level = "debug", skip_all, fields(lang = %self.language_code))]
    async fn recognize(&self, input: OcrImageInput) -> Result<OcrImageOutput> {
        // Write our input to a temporary file. Tesseract reads many formats,
        // but PNG is the one it never complains about.
        let tmpdir = tempfile::TempDir::with_prefix("tesseract")?;
        let input_path = tmpdir.path().join("input.png");
        png_compatible(input.image)
            .save_with_format(&input_path, ImageFormat::Png)
            .context("cannot write tesseract input file")?;

        let mut command = Command::new("tesseract");
        command
            .arg(&input_path)
            .arg("stdout")
            .arg("-l")
            .arg(&self.language_code);
        let output = run_captured("tesseract", command).await?;
        check_for_command_failure("tesseract", &output, None)?;

        let text = String::from_utf8(output.stdout)
            .context("tesseract produced invalid UTF-8")?
            .trim()
            .to_owned();
        Ok(OcrImageOutput {
            text: if text.is_empty() { None } else { Some(text) },
        })
    }
}

#[cfg(test)]
mod tests {
    use image::{ColorType, Rgb32FImage, RgbImage};

    use super::*;

    #[test]
    fn float_images_are_saved_as_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("float.png");
        let image = DynamicImage::ImageRgb32F(Rgb32FImage::new(4, 3));

        let converted = png_compatible(image);
        assert_eq!(converted.color(), ColorType::Rgba8);
        converted.save_with_format(&path, ImageFormat::Png).unwrap();
        assert_eq!(image::image_dimensions(&path).unwrap(), (4, 3));
    }

    #[test]
    fn integer_images_are_left_alone() {
        let image = DynamicImage::ImageRgb8(RgbImage::new(2, 2));
        assert_eq!(png_compatible(image).color(), ColorType::Rgb8);
    }

    #[test]
    fn maps_language_names() {
        assert_eq!(tesseract_language("english"), "eng");
        assert_eq!(tesseract_language("Japanese"), "jpn");
        assert_eq!(tesseract_language("ch_sim"), "chi_sim");
        assert_eq!(tesseract_language(""), "eng");
    }

    #[test]
    fn passes_unknown_codes_through() {
        assert_eq!(tesseract_language("deu+eng"), "deu+eng");
        assert_eq!(tesseract_language(" klingon "), "klingon");
    }

    #[tokio::test]
    #[ignore = "Needs tesseract installed"]
    async fn blank_image_has_no_text() {
        let engine = TesseractOcrEngine::new("english").await.unwrap();
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(
            64,
            64,
            image::Rgb([255, 255, 255]),
        ));
        let output = engine.recognize(OcrImageInput { image }).await.unwrap();
        assert!(output.text.is_none());
    }
}
