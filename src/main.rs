use std::{process::ExitCode, str::FromStr};

use clap::{Parser, Subcommand};
use ocr_bridge::{cmd, prelude::*, ui::Ui};
use tracing_subscriber::{
    EnvFilter, Layer as _, filter::Directive, layer::SubscriberExt,
    util::SubscriberInitExt as _,
};

/// Recognize text in images with a local OCR engine.
#[derive(Debug, Parser)]
#[clap(
    version,
    author,
    after_help = r#"
Environment Variables:
  - OCR_BRIDGE_ENGINE (optional): The engine used by `recognize`.
  - OCR_BRIDGE_PYTHON (optional): The interpreter used by `setup`.
  - RUST_LOG (optional): Log filter, such as `debug`. Logs go to stderr.

  These variables may be set in a standard `.env` file.
"#
)]
struct Opts {
    #[clap(subcommand)]
    subcmd: Cmd,
}

/// The subcommands we support.
#[derive(Debug, Subcommand)]
enum Cmd {
    /// Recognize the text in one image and print it as JSON.
    Recognize(cmd::recognize::RecognizeOpts),
    /// Install the packages and models for an alternate OCR backend.
    Setup(cmd::setup::SetupOpts),
    /// Print schemas for our input and output formats.
    Schema(cmd::schema::SchemaOpts),
}

/// Our entry point, which can return an error. [`anyhow::Result`] will
/// automatically print a nice error message with optional backtrace.
#[tokio::main]
async fn main() -> Result<ExitCode> {
    let ui = Ui::init();

    // Initialize tracing.
    let directive =
        Directive::from_str("info").expect("built-in directive should be valid");
    let env_filter = EnvFilter::builder()
        .with_default_directive(directive)
        .from_env_lossy();

    let subscriber = tracing_subscriber::fmt::layer()
        .with_writer(ui.get_stderr_writer())
        .with_filter(env_filter);
    tracing_subscriber::registry().with(subscriber).init();

    // Call our real `main` function now that logging is set up.
    real_main(ui).await
}

/// Our real entry point.
#[instrument(level = "debug", name = "main", skip_all)]
async fn real_main(ui: Ui) -> Result<ExitCode> {
    // Load environment variables from a `.env` file, if it exists.
    dotenvy::dotenv().ok();

    // Parse command-line arguments.
    let opts = Opts::parse();
    debug!("Parsed options: {:?}", opts);

    // Run the appropriate subcommand.
    match &opts.subcmd {
        Cmd::Recognize(recognize_opts) => {
            ui.hide_progress_bars();
            cmd::recognize::cmd_recognize(recognize_opts).await
        }
        Cmd::Setup(setup_opts) => cmd::setup::cmd_setup(&ui, setup_opts).await,
        Cmd::Schema(schema_opts) => {
            cmd::schema::cmd_schema(schema_opts).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}
