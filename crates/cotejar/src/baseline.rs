//! Filesystem store for baseline captures.
//!
//! A baseline is the reference capture later comparisons are measured
//! against: the PNG itself plus the window geometry it was taken at,
//! persisted as a JSON sidecar. Records are immutable once stored;
//! re-recording a key replaces the record wholesale.

use crate::geometry::{GeometryTarget, WindowState};
use crate::payload;
use crate::result::{CotejarError, CotejarResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A stored capture: image plus the geometry to reproduce before
/// comparing against it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureRecord {
    /// PNG-encoded screenshot
    pub image: Vec<u8>,
    /// Window width at capture time
    pub width: u32,
    /// Window height at capture time
    pub height: u32,
    /// Window state at capture time
    pub state: WindowState,
}

impl CaptureRecord {
    /// The geometry target that reproduces this record's window
    #[must_use]
    pub const fn target(&self) -> GeometryTarget {
        GeometryTarget {
            width: Some(self.width),
            height: Some(self.height),
            state: self.state,
        }
    }
}

/// Geometry sidecar persisted next to the baseline PNG
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RecordMeta {
    width: u32,
    height: u32,
    state: WindowState,
}

/// Baseline store rooted at a directory
#[derive(Debug, Clone)]
pub struct BaselineStore {
    root: PathBuf,
}

impl BaselineStore {
    /// Create a store rooted at the given directory (created lazily)
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Store root directory
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Persist a record under a key.
    ///
    /// # Errors
    ///
    /// Returns I/O or JSON errors from writing the PNG and sidecar.
    pub fn save(&self, key: &str, record: &CaptureRecord) -> CotejarResult<()> {
        std::fs::create_dir_all(&self.root)?;
        let safe = sanitize_key(key);
        std::fs::write(self.png_path(&safe), &record.image)?;

        let meta = RecordMeta {
            width: record.width,
            height: record.height,
            state: record.state,
        };
        std::fs::write(self.meta_path(&safe), serde_json::to_vec_pretty(&meta)?)?;

        tracing::info!(key = %safe, width = record.width, height = record.height, "baseline stored");
        Ok(())
    }

    /// Load the record stored under a key.
    ///
    /// A PNG without a sidecar (a legacy image-only entry) loads with
    /// its geometry read from the image itself and state defaulting to
    /// normal.
    ///
    /// # Errors
    ///
    /// Returns `BaselineMissing` when no record exists for the key.
    pub fn load(&self, key: &str) -> CotejarResult<CaptureRecord> {
        let safe = sanitize_key(key);
        let png_path = self.png_path(&safe);
        if !png_path.exists() {
            return Err(CotejarError::BaselineMissing {
                name: key.to_string(),
            });
        }

        let image = std::fs::read(&png_path)?;
        let meta_path = self.meta_path(&safe);

        if meta_path.exists() {
            let meta: RecordMeta = serde_json::from_slice(&std::fs::read(&meta_path)?)?;
            Ok(CaptureRecord {
                image,
                width: meta.width,
                height: meta.height,
                state: meta.state,
            })
        } else {
            let decoded = payload::decode_bytes(&image)?;
            Ok(CaptureRecord {
                width: decoded.width(),
                height: decoded.height(),
                state: WindowState::Normal,
                image,
            })
        }
    }

    /// Whether a record exists for the key
    #[must_use]
    pub fn exists(&self, key: &str) -> bool {
        self.png_path(&sanitize_key(key)).exists()
    }

    /// All stored keys, sorted
    ///
    /// # Errors
    ///
    /// Returns I/O errors from reading the store directory.
    pub fn keys(&self) -> CotejarResult<Vec<String>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let mut keys = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "png") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    keys.push(stem.to_string());
                }
            }
        }
        keys.sort();
        Ok(keys)
    }

    /// Delete the record stored under a key (no-op when absent)
    ///
    /// # Errors
    ///
    /// Returns I/O errors from removing the files.
    pub fn remove(&self, key: &str) -> CotejarResult<()> {
        let safe = sanitize_key(key);
        for path in [self.png_path(&safe), self.meta_path(&safe)] {
            if path.exists() {
                std::fs::remove_file(path)?;
            }
        }
        Ok(())
    }

    /// Delete every stored record
    ///
    /// # Errors
    ///
    /// Returns I/O errors from removing the store directory.
    pub fn clear(&self) -> CotejarResult<()> {
        if self.root.exists() {
            std::fs::remove_dir_all(&self.root)?;
        }
        Ok(())
    }

    fn png_path(&self, safe: &str) -> PathBuf {
        self.root.join(format!("{safe}.png"))
    }

    fn meta_path(&self, safe: &str) -> PathBuf {
        self.root.join(format!("{safe}.json"))
    }
}

/// Flatten a key (typically a URL) into a filesystem-safe name
#[must_use]
pub fn sanitize_key(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect()
}
