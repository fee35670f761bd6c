//! The `recognize` subcommand.

use std::process::ExitCode;

use clap::Args;

use crate::{
    engines::{EngineCache, EngineKind},
    io::write_line,
    prelude::*,
    recognize::{DEFAULT_LANGUAGE, RecognizeOptions, RecognizeOutput, process_image},
};

/// Printed when required arguments are missing.
pub const USAGE: &str =
    "Usage: ocr-bridge recognize <image_path> <language> [preprocess] [upscale] [char_level]";

/// Options for the `recognize` subcommand.
///
/// The positional arguments are all optional as far as `clap` is concerned,
/// because callers expect missing arguments to be reported as JSON.
#[derive(Debug, Args)]
pub struct RecognizeOpts {
    /// The image to recognize.
    #[clap(value_name = "IMAGE_PATH")]
    pub image_path: Option<PathBuf>,

    /// The language of the text, such as `english` or `japanese`.
    #[clap(value_name = "LANGUAGE")]
    pub language: Option<String>,

    /// Convert the image to grayscale first (`true` or `false`).
    #[clap(value_name = "PREPROCESS")]
    pub preprocess: Option<String>,

    /// Upscale small images first (`true` or `false`).
    #[clap(value_name = "UPSCALE")]
    pub upscale: Option<String>,

    /// Accepted for compatibility. Has no effect.
    #[clap(value_name = "CHAR_LEVEL")]
    pub char_level: Option<String>,

    /// Anything after `CHAR_LEVEL` is ignored.
    #[clap(hide = true)]
    pub extra_args: Vec<String>,

    /// The OCR engine to use.
    #[clap(long, value_enum, env = "OCR_BRIDGE_ENGINE", default_value_t = EngineKind::default())]
    pub engine: EngineKind,

    /// Write the JSON result to this file instead of standard output.
    #[clap(short = 'o', long = "out")]
    pub output_path: Option<PathBuf>,
}

impl RecognizeOpts {
    /// Convert our arguments to [`RecognizeOptions`], or `None` if required
    /// arguments are missing.
    fn to_recognize_options(&self) -> Option<RecognizeOptions> {
        let (Some(image_path), Some(language)) = (&self.image_path, &self.language)
        else {
            return None;
        };
        let mut options = RecognizeOptions::new(image_path);
        options.language = language.clone();
        options.preprocess = parse_flag(self.preprocess.as_deref());
        options.upscale_if_needed = parse_flag(self.upscale.as_deref());
        if let Some(char_level) = &self.char_level {
            options.char_level = char_level.clone();
        }
        Some(options)
    }
}

/// A flag is set only if it says `true`, in any case.
fn parse_flag(value: Option<&str>) -> bool {
    value.is_some_and(|v| v.eq_ignore_ascii_case("true"))
}

/// The `recognize` subcommand.
///
/// Recognition errors are reported in the JSON output, not the exit status.
/// Only a usage error exits with a failure status.
#[instrument(level = "debug", skip_all)]
pub async fn cmd_recognize(opts: &RecognizeOpts) -> Result<ExitCode> {
    if !opts.extra_args.is_empty() {
        debug!(extra_args = ?opts.extra_args, "ignoring extra arguments");
    }
    let Some(options) = opts.to_recognize_options() else {
        let output = RecognizeOutput::error(USAGE);
        write_line(opts.output_path.as_deref(), &output.to_json_line()?).await?;
        return Ok(ExitCode::FAILURE);
    };

    // Warm up with the default language, so the ready flag appears as soon as
    // possible. If this fails, we'll try again (and report why) below.
    let cache = EngineCache::global();
    if let Err(err) = cache.get_or_init(opts.engine, DEFAULT_LANGUAGE).await {
        warn!(
            "{} not available during initialization - will initialize when needed: {:#}",
            opts.engine, err
        );
    }

    let output = process_image(cache, opts.engine, &options).await;
    if let RecognizeOutput::Success { text, .. } = &output {
        if text.is_empty() {
            info!("No text detected in image");
        } else {
            info!("Recognized text ({} chars)", text.chars().count());
        }
    }
    write_line(opts.output_path.as_deref(), &output.to_json_line()?).await?;
    Ok(ExitCode::SUCCESS)
}
