//! The `setup` subcommand.

use std::process::ExitCode;

use clap::Args;

use crate::{
    io::read_json_or_toml,
    prelude::*,
    setup::{Backend, PackageList, PipPythonEnv, SetupOptions, run_setup},
    ui::Ui,
};

/// The interpreter we run when none is specified.
#[cfg(windows)]
const DEFAULT_PYTHON: &str = "python";
#[cfg(not(windows))]
const DEFAULT_PYTHON: &str = "python3";

/// Options for the `setup` subcommand.
#[derive(Debug, Args)]
pub struct SetupOpts {
    /// The OCR backend to install.
    #[clap(value_enum, value_name = "BACKEND")]
    pub backend: Backend,

    /// The Python interpreter to install packages into.
    #[clap(long, env = "OCR_BRIDGE_PYTHON", default_value = DEFAULT_PYTHON)]
    pub python: PathBuf,

    /// Don't trigger model downloads after installing packages.
    #[clap(long)]
    pub skip_models: bool,

    /// A JSON or TOML file listing the packages to install, replacing the
    /// backend's default list.
    #[clap(long, value_name = "FILE")]
    pub packages: Option<PathBuf>,
}

/// The `setup` subcommand.
#[instrument(level = "debug", skip_all)]
pub async fn cmd_setup(ui: &Ui, opts: &SetupOpts) -> Result<ExitCode> {
    let packages = match &opts.packages {
        Some(path) => Some(read_json_or_toml::<PackageList>(path).await?.packages),
        None => None,
    };
    let setup_opts = SetupOptions {
        backend: opts.backend,
        packages,
        download_models: !opts.skip_models,
    };

    let env = PipPythonEnv::new(&opts.python);
    if run_setup(ui, &env, &setup_opts).await {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}
