//! Installing the alternate OCR backends (EasyOCR and PaddleOCR).
//!
//! These backends live in Python, so "installing" means checking whether
//! each package can be imported and running `pip` for any that can't. We
//! keep going after a failed install so that one run reports every problem.

use clap::ValueEnum;
use schemars::JsonSchema;

use crate::{
    prelude::*,
    ui::{ProgressConfig, Ui},
};

pub use self::python::{PipPythonEnv, PythonEnv, PythonVersion};

pub mod python;

/// A package to install, and the module we import to see if it's present.
#[derive(Clone, Debug, Deserialize, JsonSchema, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct Package {
    /// The name passed to the package manager.
    pub name: String,

    /// The module to import. Defaults to `name`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub import_name: Option<String>,
}

impl Package {
    /// Create a package whose import name differs from its package name.
    pub fn new(name: &str, import_name: &str) -> Self {
        Self {
            name: name.to_owned(),
            import_name: Some(import_name.to_owned()),
        }
    }

    /// The module we actually try to import.
    ///
    /// `PIL` only becomes usable once `PIL.Image` imports, and `torchvision`
    /// is checked through `torch`. Everything else, `torchaudio` included,
    /// is imported under its own name.
    pub fn probe_module(&self) -> &str {
        let import_name = self.import_name.as_deref().unwrap_or(&self.name);
        match import_name {
            "PIL" => "PIL.Image",
            "torch" | "torchvision" => "torch",
            other => other,
        }
    }
}

/// A list of packages, as read from a `--packages` file.
#[derive(Clone, Debug, Deserialize, JsonSchema, Serialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct PackageList {
    /// Packages to check, in order.
    pub packages: Vec<Package>,
}

/// The alternate OCR backends we can set up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// EasyOCR, built on PyTorch.
    #[clap(name = "easyocr")]
    EasyOcr,

    /// PaddleOCR, built on PaddlePaddle.
    #[clap(name = "paddleocr")]
    PaddleOcr,
}

impl Backend {
    /// Human-readable name.
    pub fn display_name(self) -> &'static str {
        match self {
            Backend::EasyOcr => "EasyOCR",
            Backend::PaddleOcr => "PaddleOCR",
        }
    }

    /// The module we import to check the backend works.
    pub fn module(self) -> &'static str {
        match self {
            Backend::EasyOcr => "easyocr",
            Backend::PaddleOcr => "paddleocr",
        }
    }

    /// The packages this backend needs.
    pub fn default_packages(self) -> Vec<Package> {
        let pairs: &[(&str, &str)] = match self {
            Backend::EasyOcr => &[
                ("torch", "torch"),
                ("torchvision", "torchvision"),
                ("torchaudio", "torchaudio"),
                ("pillow", "PIL"),
                ("numpy", "numpy"),
                ("scipy", "scipy"),
                ("tqdm", "tqdm"),
                ("pyyaml", "yaml"),
                ("requests", "requests"),
                ("easyocr", "easyocr"),
                ("opencv-python", "cv2"),
                ("matplotlib", "matplotlib"),
            ],
            Backend::PaddleOcr => &[
                ("paddlepaddle-gpu", "paddle"),
                ("paddleocr", "paddleocr"),
                ("opencv-python", "cv2"),
                ("numpy", "numpy"),
                ("pillow", "PIL"),
                ("matplotlib", "matplotlib"),
                ("scipy", "scipy"),
                ("tqdm", "tqdm"),
                ("pyyaml", "yaml"),
                ("requests", "requests"),
            ],
        };
        pairs
            .iter()
            .map(|(name, import_name)| Package::new(name, import_name))
            .collect()
    }
}

/// Options for [`run_setup`].
#[derive(Clone, Debug)]
pub struct SetupOptions {
    /// The backend to set up.
    pub backend: Backend,

    /// Replace the backend's default package list.
    pub packages: Option<Vec<Package>>,

    /// Trigger model downloads after a successful setup.
    pub download_models: bool,
}

/// Check that the interpreter is new enough.
#[instrument(level = "debug", skip_all)]
pub async fn check_python_version(ui: &Ui, env: &dyn PythonEnv) -> bool {
    match env.version().await {
        Ok(version) if version.is_supported() => {
            ui.status("✅", format!("Python {}", version));
            true
        }
        Ok(version) => {
            ui.status(
                "❌",
                format!("Python {}+ is required, found {}", python::MIN_PYTHON_VERSION, version),
            );
            false
        }
        Err(err) => {
            error!("Could not determine Python version: {:?}", err);
            ui.status("❌", format!("Could not run Python: {:#}", err));
            false
        }
    }
}

/// Make sure `package` is importable, installing it if it isn't.
#[instrument(level = "debug", skip(ui, env, package), fields(package = %package.name))]
pub async fn check_and_install_package(
    ui: &Ui,
    env: &dyn PythonEnv,
    package: &Package,
) -> bool {
    match env.can_import(package.probe_module()).await {
        Ok(true) => {
            ui.status("✅", format!("{} is already installed", package.name));
            return true;
        }
        Ok(false) => {}
        Err(err) => {
            // We'll let the installer have a go anyway, and report its error.
            warn!("Could not probe {}: {:?}", package.name, err);
        }
    }

    ui.status("📦", format!("Installing {}...", package.name));
    match env.install(&package.name).await {
        Ok(()) => {
            ui.status("✅", format!("{} installed successfully", package.name));
            true
        }
        Err(err) => {
            error!("Failed to install {}: {:?}", package.name, err);
            ui.status("❌", format!("Failed to install {}: {:#}", package.name, err));
            false
        }
    }
}

/// Install everything `backend` needs, then check that it imports.
#[instrument(level = "debug", skip(ui, env, packages))]
pub async fn setup_backend(
    ui: &Ui,
    env: &dyn PythonEnv,
    backend: Backend,
    packages: &[Package],
) -> bool {
    let name = backend.display_name();
    ui.status("🚀", format!("Setting up {} environment...", name));
    ui.status("📋", "Installing required packages...");

    let pb = ui.new_progress_bar(
        &ProgressConfig {
            emoji: "📦",
            msg: "Checking packages",
            done_msg: "Checked packages",
        },
        packages.len() as u64,
    );
    let mut success = true;
    for package in packages {
        if !check_and_install_package(ui, env, package).await {
            success = false;
        }
        pb.inc(1);
    }
    pb.finish_using_style();

    if !success {
        ui.status("❌", format!("{} setup failed!", name));
        return false;
    }

    ui.status("✅", format!("{} setup completed successfully!", name));
    ui.status("🔍", format!("Testing {} import...", name));
    match env.can_import(backend.module()).await {
        Ok(true) => {
            ui.status("✅", format!("{} imported successfully!", name));
            true
        }
        Ok(false) => {
            ui.status("❌", format!("{} import failed", name));
            false
        }
        Err(err) => {
            ui.status("❌", format!("{} import failed: {:#}", name, err));
            false
        }
    }
}

/// Trigger model downloads for every backend that is installed.
///
/// EasyOCR fetches its models when a `Reader` is constructed. PaddleOCR
/// fetches them on first use, so we only check that it imports.
#[instrument(level = "debug", skip_all)]
pub async fn download_models(ui: &Ui, env: &dyn PythonEnv) {
    ui.status("📥", "Downloading OCR models...");

    if env.can_import("easyocr").await.unwrap_or(false) {
        ui.status("⏬", "Downloading EasyOCR models...");
        match env
            .run_snippet("import easyocr; easyocr.Reader(['ja', 'en'])")
            .await
        {
            Ok(()) => ui.status("✅", "EasyOCR models downloaded successfully!"),
            Err(err) => {
                error!("EasyOCR model download failed: {:?}", err);
                ui.status("❌", format!("EasyOCR model download failed: {:#}", err));
            }
        }
    } else {
        ui.status("⚠️", "EasyOCR not available, skipping model download");
    }

    if env.can_import("paddleocr").await.unwrap_or(false) {
        ui.status("⏬", "Downloading PaddleOCR models...");
        ui.status("✅", "PaddleOCR models ready!");
    } else {
        ui.status("⚠️", "PaddleOCR not available, skipping model download");
    }
}

/// Set up a backend from scratch. Returns `true` on success.
#[instrument(level = "debug", skip(ui, env))]
pub async fn run_setup(ui: &Ui, env: &dyn PythonEnv, opts: &SetupOptions) -> bool {
    ui.status("🔧", "OCR Environment Setup");
    ui.status("  ", "=".repeat(50));

    if !check_python_version(ui, env).await {
        return false;
    }

    ui.status("➡️", format!("Setting up {}...", opts.backend.module()));
    let packages = opts
        .packages
        .clone()
        .unwrap_or_else(|| opts.backend.default_packages());
    let success = setup_backend(ui, env, opts.backend, &packages).await;

    if success {
        if opts.download_models {
            download_models(ui, env).await;
        }
        ui.status("🎉", "Setup completed! You can now run the OCR server.");
    } else {
        ui.status("❌", "Setup failed! Please check the errors above.");
    }
    success
}

#[cfg(test)]
mod tests {
    use std::{
        collections::{HashMap, HashSet},
        sync::Mutex,
    };

    use super::*;

    /// An in-memory Python environment.
    struct FakePythonEnv {
        version: &'static str,
        importable: Mutex<HashSet<String>>,
        /// What each package makes importable when installed. Packages not
        /// listed here fail to install.
        provides: HashMap<String, String>,
        installs: Mutex<Vec<String>>,
        snippets: Mutex<Vec<String>>,
    }

    impl FakePythonEnv {
        fn new(version: &'static str) -> Self {
            Self {
                version,
                importable: Mutex::new(HashSet::new()),
                provides: HashMap::new(),
                installs: Mutex::new(vec![]),
                snippets: Mutex::new(vec![]),
            }
        }

        fn with_module(self, module: &str) -> Self {
            self.importable.lock().unwrap().insert(module.to_owned());
            self
        }

        fn with_installable(mut self, package: &str, module: &str) -> Self {
            self.provides.insert(package.to_owned(), module.to_owned());
            self
        }

        fn installs(&self) -> Vec<String> {
            self.installs.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PythonEnv for FakePythonEnv {
        async fn version(&self) -> Result<PythonVersion> {
            self.version.parse()
        }

        async fn can_import(&self, module: &str) -> Result<bool> {
            Ok(self.importable.lock().unwrap().contains(module))
        }

        async fn install(&self, package: &str) -> Result<()> {
            self.installs.lock().unwrap().push(package.to_owned());
            let module = self
                .provides
                .get(package)
                .ok_or_else(|| anyhow!("no matching distribution for {}", package))?;
            self.importable.lock().unwrap().insert(module.clone());
            Ok(())
        }

        async fn run_snippet(&self, code: &str) -> Result<()> {
            self.snippets.lock().unwrap().push(code.to_owned());
            Ok(())
        }
    }

    #[test]
    fn probe_module_normalizes_special_cases() {
        assert_eq!(Package::new("pillow", "PIL").probe_module(), "PIL.Image");
        assert_eq!(Package::new("torchvision", "torchvision").probe_module(), "torch");
        assert_eq!(
            Package::new("torchaudio", "torchaudio").probe_module(),
            "torchaudio"
        );
        assert_eq!(Package::new("opencv-python", "cv2").probe_module(), "cv2");
        let bare = Package {
            name: "numpy".to_owned(),
            import_name: None,
        };
        assert_eq!(bare.probe_module(), "numpy");
    }

    #[test]
    fn default_package_lists_include_backend_module() {
        for backend in [Backend::EasyOcr, Backend::PaddleOcr] {
            let packages = backend.default_packages();
            assert!(
                packages.iter().any(|p| p.probe_module() == backend.module()),
                "{backend:?}"
            );
        }
        assert_eq!(Backend::EasyOcr.default_packages().len(), 12);
        assert_eq!(Backend::PaddleOcr.default_packages().len(), 10);
    }

    #[tokio::test]
    async fn installed_package_is_not_reinstalled() {
        let ui = Ui::init_for_tests();
        let env = FakePythonEnv::new("3.11.2").with_module("PIL.Image");
        assert!(check_and_install_package(&ui, &env, &Package::new("pillow", "PIL")).await);
        assert!(env.installs().is_empty());
    }

    #[tokio::test]
    async fn missing_package_is_installed() {
        let ui = Ui::init_for_tests();
        let env = FakePythonEnv::new("3.11.2").with_installable("pyyaml", "yaml");
        assert!(check_and_install_package(&ui, &env, &Package::new("pyyaml", "yaml")).await);
        assert_eq!(env.installs(), ["pyyaml"]);
        assert!(env.can_import("yaml").await.unwrap());
    }

    #[tokio::test]
    async fn torchaudio_is_installed_even_when_torch_imports() {
        let ui = Ui::init_for_tests();
        let env = FakePythonEnv::new("3.11.2")
            .with_module("torch")
            .with_installable("torchaudio", "torchaudio");
        let package = Package::new("torchaudio", "torchaudio");
        assert!(check_and_install_package(&ui, &env, &package).await);
        assert_eq!(env.installs(), ["torchaudio"]);
    }

    #[tokio::test]
    async fn failed_install_does_not_stop_the_loop() {
        let ui = Ui::init_for_tests();
        let env = FakePythonEnv::new("3.11.2")
            .with_installable("numpy", "numpy")
            .with_installable("paddleocr", "paddleocr");
        let packages = vec![
            Package::new("paddlepaddle-gpu", "paddle"),
            Package::new("numpy", "numpy"),
            Package::new("paddleocr", "paddleocr"),
        ];
        assert!(!setup_backend(&ui, &env, Backend::PaddleOcr, &packages).await);
        assert_eq!(env.installs(), ["paddlepaddle-gpu", "numpy", "paddleocr"]);
    }

    #[tokio::test]
    async fn old_python_stops_setup() {
        let ui = Ui::init_for_tests();
        let env = FakePythonEnv::new("3.7.9").with_installable("easyocr", "easyocr");
        let opts = SetupOptions {
            backend: Backend::EasyOcr,
            packages: Some(vec![Package::new("easyocr", "easyocr")]),
            download_models: true,
        };
        assert!(!run_setup(&ui, &env, &opts).await);
        assert!(env.installs().is_empty());
    }

    #[tokio::test]
    async fn successful_setup_downloads_models() {
        let ui = Ui::init_for_tests();
        let env = FakePythonEnv::new("3.10.12")
            .with_module("torch")
            .with_installable("easyocr", "easyocr");
        let opts = SetupOptions {
            backend: Backend::EasyOcr,
            packages: Some(vec![
                Package::new("torchvision", "torchvision"),
                Package::new("easyocr", "easyocr"),
            ]),
            download_models: true,
        };
        assert!(run_setup(&ui, &env, &opts).await);
        assert_eq!(env.installs(), ["easyocr"]);
        let snippets = env.snippets.lock().unwrap().clone();
        assert_eq!(snippets.len(), 1);
        assert!(snippets[0].contains("easyocr.Reader(['ja', 'en'])"));
    }

    #[tokio::test]
    async fn model_downloads_can_be_skipped() {
        let ui = Ui::init_for_tests();
        let env = FakePythonEnv::new("3.12.0").with_module("paddleocr");
        let opts = SetupOptions {
            backend: Backend::PaddleOcr,
            packages: Some(vec![Package::new("paddleocr", "paddleocr")]),
            download_models: false,
        };
        assert!(run_setup(&ui, &env, &opts).await);
        assert!(env.snippets.lock().unwrap().is_empty());
    }

    #[test]
    fn package_list_parses_from_toml() {
        let list: PackageList = toml::from_str(
            r#"
                [[packages]]
                name = "pillow"
                import_name = "PIL"

                [[packages]]
                name = "numpy"
            "#,
        )
        .unwrap();
        assert_eq!(list.packages.len(), 2);
        assert_eq!(list.packages[0].probe_module(), "PIL.Image");
        assert_eq!(list.packages[1].import_name, None);
    }
}
