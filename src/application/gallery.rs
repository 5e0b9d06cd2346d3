//! In-memory file list and playback handle registry
//!
//! Nothing here outlives the process.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;
use uuid::Uuid;

use crate::domain::capture::{Blob, CapturedFile, PlaybackHandle};

const URL_PREFIX: &str = "blob:capture-deck/";

/// Issues playback handles for payloads and resolves them until revoked
#[derive(Debug, Default)]
pub struct ObjectUrls {
    entries: Mutex<HashMap<String, Blob>>,
}

impl ObjectUrls {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `blob` and return a fresh handle for it
    pub fn create(&self, blob: &Blob) -> PlaybackHandle {
        let url = format!("{}{}", URL_PREFIX, Uuid::new_v4());
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(url.clone(), blob.clone());
        PlaybackHandle::new(url)
    }

    pub fn resolve(&self, handle: &PlaybackHandle) -> Option<Blob> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(handle.as_str())
            .cloned()
    }

    /// Release the handle. Returns `false` if it was unknown or already
    /// revoked.
    pub fn revoke(&self, handle: &PlaybackHandle) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(handle.as_str())
            .is_some()
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Captured files of the current session, newest first
pub struct Gallery {
    files: Vec<CapturedFile>,
    urls: Arc<ObjectUrls>,
}

impl Gallery {
    pub fn new(urls: Arc<ObjectUrls>) -> Self {
        Self {
            files: Vec::new(),
            urls,
        }
    }

    pub fn add(&mut self, file: CapturedFile) {
        debug!(name = file.name(), kind = %file.kind(), "Added to gallery");
        self.files.insert(0, file);
    }

    pub fn files(&self) -> &[CapturedFile] {
        &self.files
    }

    pub fn get(&self, id: Uuid) -> Option<&CapturedFile> {
        self.files.iter().find(|f| f.id() == id)
    }

    /// Remove a file and release its playback handle
    pub fn remove(&mut self, id: Uuid) -> Option<CapturedFile> {
        let index = self.files.iter().position(|f| f.id() == id)?;
        let file = self.files.remove(index);
        self.urls.revoke(file.handle());
        Some(file)
    }

    pub fn clear(&mut self) {
        for file in self.files.drain(..) {
            self.urls.revoke(file.handle());
        }
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}
