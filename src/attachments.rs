//! Process-local object URLs for attachments.
//!
//! An attachment's URL points at a file only while the registry that minted
//! it holds the entry. Callers release URLs once nothing displays them;
//! anything not released lives as long as the registry.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::model::{Attachment, AttachmentKind};

const URL_PREFIX: &str = "blob:jobdesk/";

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "bmp", "svg"];

#[derive(Debug, Default)]
pub struct AttachmentRegistry {
  objects: Mutex<HashMap<String, PathBuf>>,
}

impl AttachmentRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Mint an object URL for a local file.
  ///
  /// Images get the same URL as their preview.
  pub fn register(&self, path: &Path) -> Result<Attachment> {
    if !path.is_file() {
      return Err(StoreError::Validation(format!(
        "Attachment is not a file: {}",
        path.display()
      )));
    }

    let name = path
      .file_name()
      .map(|n| n.to_string_lossy().into_owned())
      .unwrap_or_else(|| path.display().to_string());
    let kind = if is_image(path) {
      AttachmentKind::Image
    } else {
      AttachmentKind::File
    };

    let url = format!("{}{}", URL_PREFIX, Uuid::new_v4());
    self.objects.lock()?.insert(url.clone(), path.to_path_buf());
    debug!(%url, name, "Registered attachment");

    Ok(Attachment {
      kind,
      preview: (kind == AttachmentKind::Image).then(|| url.clone()),
      url,
      name,
    })
  }

  /// File behind a live URL.
  pub fn resolve(&self, url: &str) -> Option<PathBuf> {
    self.objects.lock().ok()?.get(url).cloned()
  }

  /// Drop a URL. Returns false if it was unknown or already released.
  pub fn release(&self, url: &str) -> bool {
    let released = self
      .objects
      .lock()
      .map(|mut objects| objects.remove(url).is_some())
      .unwrap_or(false);
    if released {
      debug!(url, "Released attachment");
    }
    released
  }

  /// Number of URLs not yet released.
  pub fn live(&self) -> usize {
    self.objects.lock().map(|o| o.len()).unwrap_or(0)
  }
}

fn is_image(path: &Path) -> bool {
  path
    .extension()
    .and_then(|e| e.to_str())
    .map(|e| IMAGE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
    .unwrap_or(false)
}
