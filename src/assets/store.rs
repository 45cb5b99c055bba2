//! Filesystem access for the asset directory
//!
//! All IO goes through `tokio::fs`, so a slow or missing directory only
//! delays the request that touches it.

use std::fs::Metadata;
use std::io::{self, SeekFrom};
use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::error::CdnError;
use crate::http::ByteRange;
use crate::logger;

/// Read-only view of one flat directory
#[derive(Debug, Clone)]
pub struct AssetStore {
    root: PathBuf,
}

/// A file that passed the existence gate
#[derive(Debug)]
pub struct AssetFile {
    pub name: String,
    pub path: PathBuf,
    pub metadata: Metadata,
}

/// A directory entry that survived enumeration filtering
#[derive(Debug, Clone)]
pub struct AssetEntry {
    pub name: String,
    path: PathBuf,
}

impl AssetStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the root directory (and parents) if it does not exist yet
    pub async fn ensure_root(&self) -> io::Result<bool> {
        if fs::try_exists(&self.root).await? {
            return Ok(false);
        }
        fs::create_dir_all(&self.root).await?;
        Ok(true)
    }

    /// Existence gate: resolve an already validated name to a servable file
    ///
    /// Anything that is not a regular file inside the root (absent,
    /// directory, symlink escaping the root, or an IO failure while checking)
    /// is reported as `NotFound` for that name. Hidden files are never served.
    pub async fn check_exists(&self, name: &str) -> Result<AssetFile, CdnError> {
        if is_hidden(name) {
            return Err(CdnError::not_found(name));
        }

        let path = self.root.join(name);

        let metadata = match fs::metadata(&path).await {
            Ok(m) => m,
            Err(e) => {
                if e.kind() != io::ErrorKind::NotFound {
                    logger::log_warning(&format!(
                        "Existence check failed for '{}': {e}",
                        path.display()
                    ));
                }
                return Err(CdnError::not_found(name));
            }
        };

        if !metadata.is_file() {
            return Err(CdnError::not_found(name));
        }

        if !self.contains(&path).await {
            logger::log_warning(&format!(
                "Path traversal attempt blocked: {name} -> outside {}",
                self.root.display()
            ));
            return Err(CdnError::not_found(name));
        }

        Ok(AssetFile {
            name: name.to_string(),
            path,
            metadata,
        })
    }

    /// Enumerate regular files directly under the root whose name passes `keep`
    ///
    /// Order is whatever the filesystem yields. Failing to open or walk the
    /// directory is `DirectoryUnreadable`; a single bad entry is skipped.
    pub async fn entries(&self, keep: impl Fn(&str) -> bool) -> Result<Vec<AssetEntry>, CdnError> {
        let mut dir = fs::read_dir(&self.root)
            .await
            .map_err(CdnError::DirectoryUnreadable)?;

        let mut entries = Vec::new();
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(CdnError::DirectoryUnreadable)?
        {
            let Ok(name) = entry.file_name().into_string() else {
                logger::log_debug(&format!(
                    "Skipping non UTF-8 entry {:?}",
                    entry.file_name()
                ));
                continue;
            };
            if is_hidden(&name) || !keep(&name) {
                continue;
            }

            let file_type = match entry.file_type().await {
                Ok(t) => t,
                Err(e) => {
                    logger::log_debug(&format!("Skipping '{name}': {e}"));
                    continue;
                }
            };

            let path = entry.path();
            let servable = if file_type.is_file() {
                true
            } else if file_type.is_symlink() {
                let is_file = fs::metadata(&path).await.is_ok_and(|m| m.is_file());
                is_file && self.contains(&path).await
            } else {
                false
            };

            if servable {
                entries.push(AssetEntry { name, path });
            }
        }

        Ok(entries)
    }

    /// Current byte size of a listed entry; `None` if it vanished meanwhile
    pub async fn size_of(&self, entry: &AssetEntry) -> Option<u64> {
        fs::metadata(&entry.path).await.ok().map(|m| m.len())
    }

    /// Read a file that passed the existence gate, whole or just `range`
    pub async fn read(&self, file: &AssetFile, range: Option<ByteRange>) -> io::Result<Vec<u8>> {
        let Some(range) = range else {
            return fs::read(&file.path).await;
        };

        let mut handle = fs::File::open(&file.path).await?;
        handle.seek(SeekFrom::Start(range.start)).await?;
        let mut buf = Vec::with_capacity(usize::try_from(range.len()).unwrap_or(0));
        handle.take(range.len()).read_to_end(&mut buf).await?;
        Ok(buf)
    }

    /// Whether `path`, fully resolved, still lies under the resolved root
    async fn contains(&self, path: &Path) -> bool {
        let (Ok(root), Ok(resolved)) =
            tokio::join!(fs::canonicalize(&self.root), fs::canonicalize(path))
        else {
            return false;
        };
        resolved.starts_with(root)
    }
}

/// Dotfiles (`.env`, `.htpasswd`, `.git`) stay private
fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}
