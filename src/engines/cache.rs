//! A process-wide cache holding one OCR engine handle.
//!
//! Engines are slow to start, so we build one and reuse it until someone asks
//! for a different language (or a different engine).

use std::{
    env,
    sync::{Arc, LazyLock},
    time::Instant,
};

use tokio::sync::Mutex;

use crate::prelude::*;

use super::{EngineKind, OcrEngine};

/// Contents of the ready flag file.
const READY_FLAG_CONTENTS: &str = "READY";

/// The cache used by the command-line tool.
static GLOBAL_ENGINE_CACHE: LazyLock<EngineCache> =
    LazyLock::new(|| EngineCache::new(env::temp_dir()));

/// The engine currently held by an [`EngineCache`].
struct CachedEngine {
    kind: EngineKind,
    language: String,
    engine: Arc<dyn OcrEngine>,
}

/// Holds at most one engine handle, rebuilding it when the language changes.
pub struct EngineCache {
    /// Where we write ready flags.
    flag_dir: PathBuf,

    /// The current engine, if any. This is an async mutex because engine
    /// construction awaits, and we don't want two callers building engines
    /// at once.
    current: Mutex<Option<CachedEngine>>,
}

impl EngineCache {
    /// Create an empty cache which writes ready flags into `flag_dir`.
    pub fn new(flag_dir: impl Into<PathBuf>) -> Self {
        Self {
            flag_dir: flag_dir.into(),
            current: Mutex::new(None),
        }
    }

    /// The process-wide cache, writing ready flags to the temp directory.
    pub fn global() -> &'static EngineCache {
        &GLOBAL_ENGINE_CACHE
    }

    /// Path of the flag file written after `kind` finishes initializing.
    pub fn ready_flag_path(&self, kind: EngineKind) -> PathBuf {
        self.flag_dir.join(format!("{}_ready.txt", kind.name()))
    }

    /// The language of the cached engine, if there is one.
    pub async fn current_language(&self) -> Option<String> {
        self.current
            .lock()
            .await
            .as_ref()
            .map(|cached| cached.language.clone())
    }

    /// Return the cached engine, building a new one if the cache is empty or
    /// holds an engine for a different kind or language.
    ///
    /// If construction fails, the previous engine (if any) is kept.
    pub async fn get_or_init(
        &self,
        kind: EngineKind,
        language: &str,
    ) -> Result<Arc<dyn OcrEngine>> {
        self.get_or_init_with(kind, language, || kind.create_engine(language))
            .await
    }

    /// Like [`EngineCache::get_or_init`], but builds new engines with
    /// `create`.
    #[instrument(level = "debug", skip(self, create))]
    async fn get_or_init_with<F, Fut>(
        &self,
        kind: EngineKind,
        language: &str,
        create: F,
    ) -> Result<Arc<dyn OcrEngine>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Arc<dyn OcrEngine>>>,
    {
        let mut current = self.current.lock().await;
        if let Some(cached) = current.as_ref() {
            if cached.kind == kind && cached.language == language {
                info!("Using existing {} engine", kind);
                return Ok(cached.engine.clone());
            }
        }

        info!("Initializing {} engine...", kind);
        let start_time = Instant::now();
        let engine = create()
            .await
            .with_context(|| format!("could not initialize {} engine", kind))?;
        info!(
            "{} initialization completed in {:.2} seconds",
            kind,
            start_time.elapsed().as_secs_f64()
        );
        *current = Some(CachedEngine {
            kind,
            language: language.to_owned(),
            engine: engine.clone(),
        });

        let flag_path = self.ready_flag_path(kind);
        tokio::fs::write(&flag_path, READY_FLAG_CONTENTS)
            .await
            .with_context(|| format!("cannot write ready flag {}", flag_path.display()))?;
        info!("Ready flag created!");

        Ok(engine)
    }
}
