//! Save captures into a directory

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::application::ports::{ExportError, FileExporter};
use crate::domain::capture::CapturedFile;

/// Suffixes tried before giving up on a name
const MAX_SUFFIX: u32 = 999;

/// Writes each capture under its display name, adding ` (1)`, ` (2)`, ...
/// when the name is taken
pub struct FsExporter {
    dir: PathBuf,
}

impl FsExporter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// `name.ext` for n = 0, `name (n).ext` otherwise
pub fn numbered_name(name: &str, n: u32) -> String {
    if n == 0 {
        return name.to_string();
    }
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{} ({}).{}", stem, n, ext),
        _ => format!("{} ({})", name, n),
    }
}

#[async_trait]
impl FileExporter for FsExporter {
    async fn export(&self, file: &CapturedFile) -> Result<PathBuf, ExportError> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| ExportError::CreateDir {
                path: self.dir.clone(),
                source,
            })?;

        for n in 0..=MAX_SUFFIX {
            let path = self.dir.join(numbered_name(file.name(), n));
            // create_new so a concurrent writer cannot be clobbered
            let mut out = match OpenOptions::new().write(true).create_new(true).open(&path).await {
                Ok(out) => out,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    debug!(path = %path.display(), "Name taken, trying next");
                    continue;
                }
                Err(source) => return Err(ExportError::Write { path, source }),
            };

            let written = async {
                out.write_all(file.blob().data()).await?;
                out.flush().await
            }
            .await;
            if let Err(source) = written {
                let _ = fs::remove_file(&path).await;
                return Err(ExportError::Write { path, source });
            }

            info!(path = %path.display(), size = %file.blob().human_readable_size(), "Capture saved");
            return Ok(path);
        }

        Err(ExportError::NameExhausted(file.name().to_string()))
    }
}
