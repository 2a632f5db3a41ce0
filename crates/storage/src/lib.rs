//! Storage layer: the local asset store.
//!
//! Public paths (`/uploads/1700000000000-ab12cd34ef56.png`) map onto files
//! under a single root directory. New files are written to a hidden temp
//! name and renamed into place, so listings never see a partial file under
//! its final name.

use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;

pub mod models;

pub use models::StoredFile;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid path: {0}")]
    InvalidPath(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub trait AssetStore: Send + Sync {
    /// File names directly under `dir`, lexically ordered. A missing
    /// directory lists as empty.
    fn list(&self, dir: &str) -> Result<Vec<String>, StorageError>;
    fn exists(&self, public_path: &str) -> bool;
    fn read_bytes(&self, public_path: &str) -> Result<Vec<u8>, StorageError>;
    fn remove(&self, public_path: &str) -> Result<(), StorageError>;
    /// Store `bytes` under a generated name inside `dir`.
    fn put(&self, dir: &str, original_name: &str, bytes: &[u8])
        -> Result<StoredFile, StorageError>;
    /// Like `put`, but the stored name keeps the original file stem
    /// (`heart_love-<hash>.png`).
    fn put_named(&self, dir: &str, original_name: &str, bytes: &[u8])
        -> Result<StoredFile, StorageError>;
}

#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Map a public or relative path onto the filesystem, refusing anything
    /// that would leave the root.
    pub fn resolve(&self, public_path: &str) -> Result<PathBuf, StorageError> {
        let mut out = self.root.clone();
        for part in public_path.split('/') {
            if part.is_empty() || part == "." {
                continue;
            }
            let mut comps = Path::new(part).components();
            match (comps.next(), comps.next()) {
                (Some(Component::Normal(seg)), None) if !part.contains('\\') => out.push(seg),
                _ => return Err(StorageError::InvalidPath(public_path.to_string())),
            }
        }
        Ok(out)
    }

    pub fn public_path(dir: &str, name: &str) -> String {
        let dir = dir.trim_matches('/');
        if dir.is_empty() {
            format!("/{}", name)
        } else {
            format!("/{}/{}", dir, name)
        }
    }

    fn write_as(
        &self,
        dir: &str,
        name: String,
        bytes: &[u8],
    ) -> Result<StoredFile, StorageError> {
        let target_dir = self.resolve(dir)?;
        fs::create_dir_all(&target_dir)?;

        let tmp = target_dir.join(format!(".{}.tmp", name));
        let dest = target_dir.join(&name);

        if let Err(e) = write_fully(&tmp, bytes) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        if let Err(e) = fs::rename(&tmp, &dest) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }

        debug!(path = %dest.display(), size = bytes.len(), "stored asset");
        Ok(StoredFile {
            public_path: Self::public_path(dir, &name),
            name,
            size: bytes.len() as u64,
        })
    }
}

/// Regular, non-hidden file names directly under `path`, sorted. Walk errors
/// (unreadable directory, vanished root) are returned, never skipped.
fn read_names(path: &Path) -> Result<Vec<String>, StorageError> {
    let mut names = Vec::new();
    for entry in WalkDir::new(path)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(std::io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            if !name.starts_with('.') {
                names.push(name.to_string());
            }
        }
    }
    Ok(names)
}

impl AssetStore for LocalStore {
    fn list(&self, dir: &str) -> Result<Vec<String>, StorageError> {
        let path = self.resolve(dir)?;
        if !path.is_dir() {
            debug!(dir = %path.display(), "asset directory missing, listing empty");
            return Ok(Vec::new());
        }
        read_names(&path)
    }

    fn exists(&self, public_path: &str) -> bool {
        self.resolve(public_path)
            .map(|p| p.is_file())
            .unwrap_or(false)
    }

    fn read_bytes(&self, public_path: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.resolve(public_path)?;
        if !path.is_file() {
            return Err(StorageError::NotFound(public_path.to_string()));
        }
        Ok(fs::read(path)?)
    }

    fn remove(&self, public_path: &str) -> Result<(), StorageError> {
        let path = self.resolve(public_path)?;
        if !path.is_file() {
            return Err(StorageError::NotFound(public_path.to_string()));
        }
        fs::remove_file(&path)?;
        debug!(path = %path.display(), "removed asset");
        Ok(())
    }

    fn put(
        &self,
        dir: &str,
        original_name: &str,
        bytes: &[u8],
    ) -> Result<StoredFile, StorageError> {
        self.write_as(dir, generated_name(original_name, bytes), bytes)
    }

    fn put_named(
        &self,
        dir: &str,
        original_name: &str,
        bytes: &[u8],
    ) -> Result<StoredFile, StorageError> {
        self.write_as(dir, stem_name(original_name, bytes), bytes)
    }
}

fn write_fully(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

const MAX_STEM_CHARS: usize = 64;

/// `<unix-millis>-<12 hex of blake3>.<ext>`; extension taken from the
/// original name, lower-cased, `png` when missing or odd.
pub fn generated_name(original_name: &str, bytes: &[u8]) -> String {
    format!(
        "{}-{}.{}",
        chrono::Utc::now().timestamp_millis(),
        short_hash(bytes),
        extension_of(original_name)
    )
}

/// `<sanitized stem>-<12 hex of blake3>.<ext>`. Anything other than letters,
/// digits, `_` and `-` in the stem becomes `_`; an empty stem becomes
/// `asset`. Same name and content map to the same file.
pub fn stem_name(original_name: &str, bytes: &[u8]) -> String {
    let stem: String = Path::new(original_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .take(MAX_STEM_CHARS)
        .collect();
    let stem = stem.trim_matches(|c: char| c == '_' || c == '-');
    let stem = if stem.is_empty() { "asset" } else { stem };
    format!("{}-{}.{}", stem, short_hash(bytes), extension_of(original_name))
}

fn short_hash(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().as_str()[..12].to_string()
}

fn extension_of(original_name: &str) -> String {
    Path::new(original_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .filter(|e| !e.is_empty() && e.len() <= 8 && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or_else(|| "png".to_string())
}
