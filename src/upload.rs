//! Blob upload boundary for image notes.
//!
//! DESIGN
//! ======
//! Image notes store only a public URL. The bytes go through an
//! `ImageUploader` first; the room creates the note once the URL comes back.
//! Progress is reported as a fraction in `[0.0, 1.0]` through an optional
//! callback. `InMemoryUploader` is the in-process reference implementation.

#[cfg(test)]
#[path = "upload_test.rs"]
mod upload_test;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::SyncError;

/// Progress callback, called with the uploaded fraction.
pub type ProgressFn = Arc<dyn Fn(f64) + Send + Sync>;

/// A file picked by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFile {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl ImageFile {
    #[must_use]
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self { name: name.into(), mime_type: mime_type.into(), bytes }
    }

    /// Reject anything that is not a non-empty `image/*` file.
    ///
    /// # Errors
    ///
    /// `Validation` describing the problem.
    pub fn validate(&self) -> Result<(), SyncError> {
        if !self.mime_type.starts_with("image/") {
            return Err(SyncError::Validation(format!("{} is not an image ({})", self.name, self.mime_type)));
        }
        if self.bytes.is_empty() {
            return Err(SyncError::Validation(format!("{} is empty", self.name)));
        }
        Ok(())
    }
}

#[async_trait]
pub trait ImageUploader: Send + Sync {
    /// Upload `file` under `container_id` and return its public URL.
    async fn upload_image(
        &self,
        container_id: &str,
        file: &ImageFile,
        on_progress: Option<ProgressFn>,
    ) -> Result<String, SyncError>;
}

// =============================================================================
// IN-MEMORY UPLOADER
// =============================================================================

const PROGRESS_STEPS: u32 = 4;

#[derive(Default)]
struct UploaderInner {
    blobs: HashMap<String, Vec<u8>>,
    failures: usize,
}

/// Keeps uploaded bytes in memory and hands out `memory://` URLs.
#[derive(Clone, Default)]
pub struct InMemoryUploader {
    inner: Arc<Mutex<UploaderInner>>,
}

impl InMemoryUploader {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, UploaderInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make the next `times` uploads fail with a network error.
    pub fn fail_next(&self, times: usize) {
        self.lock().failures += times;
    }

    /// Bytes stored under a URL returned by `upload_image`.
    #[must_use]
    pub fn blob(&self, url: &str) -> Option<Vec<u8>> {
        self.lock().blobs.get(url).cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().blobs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().blobs.is_empty()
    }
}

#[async_trait]
impl ImageUploader for InMemoryUploader {
    async fn upload_image(
        &self,
        container_id: &str,
        file: &ImageFile,
        on_progress: Option<ProgressFn>,
    ) -> Result<String, SyncError> {
        file.validate()?;
        {
            let mut inner = self.lock();
            if inner.failures > 0 {
                inner.failures -= 1;
                return Err(SyncError::network("upload image", "injected failure"));
            }
        }
        if let Some(progress) = &on_progress {
            for step in 1..=PROGRESS_STEPS {
                progress(f64::from(step) / f64::from(PROGRESS_STEPS));
                tokio::task::yield_now().await;
            }
        }
        let url = format!("memory://{container_id}/{}-{}", Uuid::new_v4(), file.name);
        self.lock().blobs.insert(url.clone(), file.bytes.clone());
        Ok(url)
    }
}
