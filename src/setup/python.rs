//! The Python environment our alternate OCR backends are installed into.

use std::{fmt, str::FromStr};

use tokio::process::Command;

use crate::{
    command::{PYTHON_TRACEBACK_REGEX, check_for_command_failure, run_captured},
    prelude::*,
};

/// Oldest Python the backends support.
pub const MIN_PYTHON_VERSION: PythonVersion = PythonVersion {
    major: 3,
    minor: 8,
    patch: 0,
};

/// A Python version number.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct PythonVersion {
    /// The major version, such as `3`.
    pub major: u32,
    /// The minor version, such as `11` in `3.11.4`.
    pub minor: u32,
    /// The patch level. Zero if the version string didn't include one.
    pub patch: u32,
}

impl PythonVersion {
    /// Is this version new enough for our backends?
    pub fn is_supported(&self) -> bool {
        *self >= MIN_PYTHON_VERSION
    }
}

impl FromStr for PythonVersion {
    type Err = anyhow::Error;

    /// Parse `3.11.4`, `3.12`, or `3.13.0rc1`.
    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.trim().split('.').map(|part| {
            let digits = part
                .chars()
                .take_while(|c| c.is_ascii_digit())
                .collect::<String>();
            digits.parse::<u32>()
        });
        let mut next = |required: bool| -> Result<u32> {
            match parts.next() {
                Some(Ok(n)) => Ok(n),
                None if !required => Ok(0),
                _ => Err(anyhow!("invalid Python version: {:?}", s)),
            }
        };
        let major = next(true)?;
        let minor = next(true)?;
        let patch = next(false)?;
        Ok(Self {
            major,
            minor,
            patch,
        })
    }
}

impl fmt::Display for PythonVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// The package manager seam: everything setup needs from a Python install.
#[async_trait]
pub trait PythonEnv: Send + Sync {
    /// The interpreter's version.
    async fn version(&self) -> Result<PythonVersion>;

    /// Can `module` be imported? An import failure is `Ok(false)`; failing to
    /// run the interpreter at all is an error.
    async fn can_import(&self, module: &str) -> Result<bool>;

    /// Install `package` with the package manager.
    async fn install(&self, package: &str) -> Result<()>;

    /// Run a snippet of Python code, failing if it raises.
    async fn run_snippet(&self, code: &str) -> Result<()>;
}

/// A real interpreter, installing packages with `pip`.
#[derive(Clone, Debug)]
pub struct PipPythonEnv {
    python: PathBuf,
}

impl PipPythonEnv {
    /// Use the interpreter at `python` (or found on `PATH` under that name).
    pub fn new(python: impl Into<PathBuf>) -> Self {
        Self {
            python: python.into(),
        }
    }

    fn command(&self) -> Command {
        Command::new(&self.python)
    }
}

#[async_trait]
impl PythonEnv for PipPythonEnv {
    #[instrument(level = "debug", skip(self))]
    async fn version(&self) -> Result<PythonVersion> {
        let mut command = self.command();
        command
            .arg("-c")
            .arg("import sys; print('.'.join(map(str, sys.version_info[:3])))");
        let output = run_captured("python", command).await?;
        check_for_command_failure("python", &output, None)?;
        String::from_utf8_lossy(&output.stdout).parse()
    }

    #[instrument(level = "debug", skip(self))]
    async fn can_import(&self, module: &str) -> Result<bool> {
        let mut command = self.command();
        command
            .arg("-c")
            .arg("import importlib, sys; importlib.import_module(sys.argv[1])")
            .arg(module);
        let output = run_captured("python", command).await?;
        Ok(output.status.success())
    }

    #[instrument(level = "debug", skip(self))]
    async fn install(&self, package: &str) -> Result<()> {
        let mut command = self.command();
        command.args(["-m", "pip", "install"]).arg(package);
        let output = run_captured("pip", command).await?;
        check_for_command_failure("pip", &output, None)
    }

    #[instrument(level = "debug", skip_all)]
    async fn run_snippet(&self, code: &str) -> Result<()> {
        let mut command = self.command();
        command.arg("-c").arg(code);
        let output = run_captured("python", command).await?;
        check_for_command_failure("python", &output, Some(&PYTHON_TRACEBACK_REGEX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_versions() {
        let v: PythonVersion = "3.11.4\n".parse().unwrap();
        assert_eq!(v.to_string(), "3.11.4");
        let v: PythonVersion = "3.13.0rc1".parse().unwrap();
        assert_eq!((v.major, v.minor, v.patch), (3, 13, 0));
        let v: PythonVersion = "3.9".parse().unwrap();
        assert_eq!(v.patch, 0);
        assert!("python".parse::<PythonVersion>().is_err());
        assert!("3".parse::<PythonVersion>().is_err());
    }

    #[test]
    fn minimum_version_is_three_eight() {
        assert!("3.8.0".parse::<PythonVersion>().unwrap().is_supported());
        assert!("3.12.1".parse::<PythonVersion>().unwrap().is_supported());
        assert!(!"3.7.17".parse::<PythonVersion>().unwrap().is_supported());
        assert!(!"2.7.18".parse::<PythonVersion>().unwrap().is_supported());
    }

    #[tokio::test]
    #[ignore = "Needs python3 installed"]
    async fn real_interpreter_imports_stdlib() {
        let env = PipPythonEnv::new("python3");
        assert!(env.version().await.unwrap().is_supported());
        assert!(env.can_import("json").await.unwrap());
        assert!(!env.can_import("surely_not_a_real_module").await.unwrap());
        assert!(env.run_snippet("raise SystemExit(3)").await.is_err());
    }
}
