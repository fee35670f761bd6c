//! Run a local OCR engine on one image and report the text as JSON, and set
//! up the Python environments used by alternate OCR backends.
//!
//! The command-line tool lives in `main.rs`. Everything it does is available
//! here too, so other programs can call [`recognize::process_image`] with
//! their own [`engines::EngineCache`].

pub mod cmd;
pub mod command;
pub mod engines;
pub mod io;
pub mod prelude;
pub mod recognize;
pub mod setup;
pub mod ui;
