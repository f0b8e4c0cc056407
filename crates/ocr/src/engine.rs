use std::sync::{Arc, OnceLock};

use crate::recognizer::{OcrBackend, OcrError};

type BackendFactory = Box<dyn Fn() -> Result<Arc<dyn OcrBackend>, OcrError> + Send + Sync>;

/// Shared handle to the OCR capability.
///
/// The backend is built on first use and reused for the life of the handle.
/// Concurrent first callers race on a `OnceLock`: exactly one runs the
/// factory, the rest block until it returns. A failed build is remembered as
/// "no OCR" and never retried.
pub struct OcrEngine {
    factory: Option<BackendFactory>,
    backend: OnceLock<Option<Arc<dyn OcrBackend>>>,
}

impl OcrEngine {
    /// No OCR capability at all; every parse falls back to synthetic data.
    pub fn unavailable() -> Self {
        Self { factory: None, backend: OnceLock::new() }
    }

    /// Build the backend lazily with `factory`.
    pub fn lazy<F, B>(factory: F) -> Self
    where
        F: Fn() -> Result<B, OcrError> + Send + Sync + 'static,
        B: OcrBackend + 'static,
    {
        let factory: BackendFactory =
            Box::new(move || factory().map(|b| Arc::new(b) as Arc<dyn OcrBackend>));
        Self { factory: Some(factory), backend: OnceLock::new() }
    }

    /// Wrap an already constructed backend.
    pub fn ready(backend: impl OcrBackend + 'static) -> Self {
        let cell = OnceLock::new();
        let _ = cell.set(Some(Arc::new(backend) as Arc<dyn OcrBackend>));
        Self { factory: None, backend: cell }
    }

    /// The backend, initializing it if this is the first call.
    pub fn backend(&self) -> Option<&Arc<dyn OcrBackend>> {
        self.backend
            .get_or_init(|| {
                let factory = self.factory.as_ref()?;
                match factory() {
                    Ok(backend) => {
                        tracing::info!("OCR engine initialized");
                        Some(backend)
                    }
                    Err(e) => {
                        tracing::warn!("OCR engine unavailable: {e}");
                        None
                    }
                }
            })
            .as_ref()
    }

    pub fn is_available(&self) -> bool {
        self.backend().is_some()
    }
}

impl std::fmt::Debug for OcrEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match self.backend.get() {
            None => "uninitialized",
            Some(None) => "unavailable",
            Some(Some(_)) => "ready",
        };
        f.debug_struct("OcrEngine").field("state", &state).finish()
    }
}
