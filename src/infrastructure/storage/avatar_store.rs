//! Filesystem-backed avatar storage
//!
//! Uploads are streamed into a staging directory, validated by sniffing
//! their leading bytes, and promoted to `user_{id}.{ext}` in the public
//! avatar directory. Promotion sets previous variants aside instead of
//! deleting them so that a failed database write can put everything back.

use std::io;
use std::path::{Path, PathBuf};

use image::ImageFormat;
use tempfile::TempPath;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::domain::avatar::DEFAULT_MAX_AVATAR_BYTES;
use crate::domain::{AvatarFormat, AvatarRejection};

/// Number of leading bytes kept for format sniffing.
const SNIFF_LEN: usize = 32;

/// Avatar storage configuration
#[derive(Debug, Clone)]
pub struct AvatarStoreConfig {
    /// Directory holding `user_{id}.{ext}` files and the default image
    pub directory: PathBuf,
    /// Directory for in-flight uploads and set-aside files. Keep it on the
    /// same filesystem as `directory` so promotion is a rename.
    pub staging_directory: PathBuf,
    /// Prefix stored in the database and used in URLs
    pub public_prefix: String,
    /// File name of the fallback image inside `directory`
    pub default_file: String,
    pub max_bytes: u64,
}

impl Default for AvatarStoreConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("./data/uploads/avatars"),
            staging_directory: PathBuf::from("./data/avatar-staging"),
            public_prefix: "uploads/avatars".to_string(),
            default_file: "default.png".to_string(),
            max_bytes: DEFAULT_MAX_AVATAR_BYTES,
        }
    }
}

#[derive(Debug, Error)]
pub enum AvatarStoreError {
    #[error("Could not stage upload: {0}")]
    Staging(#[source] io::Error),

    #[error("Could not write avatar to storage: {0}")]
    StorageWrite(#[source] io::Error),
}

/// An upload received in full and held in a temporary file.
#[derive(Debug)]
pub struct StagedUpload {
    path: TempPath,
    size: u64,
    head: Vec<u8>,
}

impl StagedUpload {
    /// Total bytes received, including any past the size limit.
    pub fn size(&self) -> u64 {
        self.size
    }
}

/// A staged upload that passed validation and may be promoted.
#[derive(Debug)]
pub struct ValidatedUpload {
    path: TempPath,
    format: AvatarFormat,
}

impl ValidatedUpload {
    pub fn format(&self) -> AvatarFormat {
        self.format
    }
}

/// Streams an incoming file into the staging directory.
///
/// Bytes beyond the configured limit are counted but not written; the
/// upload is then rejected during validation.
pub struct UploadStager {
    file: tokio::fs::File,
    path: TempPath,
    size: u64,
    head: Vec<u8>,
    max_bytes: u64,
}

impl UploadStager {
    pub async fn write_chunk(&mut self, chunk: &[u8]) -> io::Result<()> {
        if self.head.len() < SNIFF_LEN {
            let take = (SNIFF_LEN - self.head.len()).min(chunk.len());
            self.head.extend_from_slice(&chunk[..take]);
        }

        let room = self.max_bytes.saturating_sub(self.size);
        let writable = usize::try_from(room).unwrap_or(usize::MAX).min(chunk.len());
        if writable > 0 {
            self.file.write_all(&chunk[..writable]).await?;
        }
        self.size += chunk.len() as u64;
        Ok(())
    }

    /// True once more bytes arrived than the store accepts.
    pub fn over_limit(&self) -> bool {
        self.size > self.max_bytes
    }

    pub async fn finish(mut self) -> io::Result<StagedUpload> {
        self.file.flush().await?;
        Ok(StagedUpload {
            path: self.path,
            size: self.size,
            head: self.head,
        })
    }
}

/// A promoted avatar whose fate depends on the surrounding transaction.
///
/// Call [`finalize`](Self::finalize) once the database commit succeeded or
/// [`revert`](Self::revert) to restore the store to its previous state. A
/// promotion dropped without either, e.g. because the request future was
/// cancelled, reverts synchronously in `Drop`.
#[derive(Debug)]
pub struct Promotion {
    stored_path: String,
    /// Destination of the new file, set once it may exist on disk
    file: Option<PathBuf>,
    /// `(set-aside location, original location)` of previous variants
    displaced: Vec<(PathBuf, PathBuf)>,
    settled: bool,
}

impl Promotion {
    /// Path to record in the database, e.g. `uploads/avatars/user_7.jpg`.
    pub fn stored_path(&self) -> &str {
        &self.stored_path
    }

    /// Deletes the set-aside previous variants. Failures only leave unused
    /// files behind and are logged.
    pub async fn finalize(mut self) {
        self.settled = true;
        for (aside, original) in std::mem::take(&mut self.displaced) {
            if let Err(e) = tokio::fs::remove_file(&aside).await {
                warn!(
                    file = %original.display(),
                    error = %e,
                    "Failed to delete superseded avatar"
                );
            }
        }
    }

    /// Removes the promoted file and moves the previous variants back.
    pub async fn revert(mut self) {
        if let Some(file) = self.file.take() {
            if let Err(e) = tokio::fs::remove_file(&file).await {
                if e.kind() != io::ErrorKind::NotFound {
                    warn!(file = %file.display(), error = %e, "Failed to remove promoted avatar");
                }
            }
        }
        // Popped one at a time so `Drop` finishes the rest if this is cancelled.
        while let Some((aside, original)) = self.displaced.pop() {
            if let Err(e) = tokio::fs::rename(&aside, &original).await {
                warn!(
                    file = %original.display(),
                    error = %e,
                    "Failed to restore previous avatar"
                );
            }
        }
        self.settled = true;
    }
}

impl Drop for Promotion {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        warn!(avatar = %self.stored_path, "Unsettled avatar promotion dropped, restoring previous files");

        if let Some(file) = self.file.take() {
            if let Err(e) = std::fs::remove_file(&file) {
                if e.kind() != io::ErrorKind::NotFound {
                    warn!(file = %file.display(), error = %e, "Failed to remove promoted avatar");
                }
            }
        }
        while let Some((aside, original)) = self.displaced.pop() {
            if let Err(e) = std::fs::rename(&aside, &original) {
                warn!(
                    file = %original.display(),
                    error = %e,
                    "Failed to restore previous avatar"
                );
            }
        }
    }
}

/// Filesystem avatar store keyed by user id
#[derive(Debug, Clone)]
pub struct AvatarStore {
    config: AvatarStoreConfig,
}

impl AvatarStore {
    pub fn new(config: AvatarStoreConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AvatarStoreConfig {
        &self.config
    }

    pub fn max_bytes(&self) -> u64 {
        self.config.max_bytes
    }

    /// Opens a temporary file for an incoming upload.
    pub async fn begin_upload(&self) -> Result<UploadStager, AvatarStoreError> {
        tokio::fs::create_dir_all(&self.config.staging_directory)
            .await
            .map_err(AvatarStoreError::Staging)?;

        let temp = tempfile::Builder::new()
            .prefix("upload-")
            .tempfile_in(&self.config.staging_directory)
            .map_err(AvatarStoreError::Staging)?;
        let (file, path) = temp.into_parts();

        Ok(UploadStager {
            file: tokio::fs::File::from_std(file),
            path,
            size: 0,
            head: Vec::with_capacity(SNIFF_LEN),
            max_bytes: self.config.max_bytes,
        })
    }

    /// Checks size and sniffed format. Nothing is moved; a rejected upload is
    /// discarded when the staged file is dropped.
    pub fn validate(&self, staged: StagedUpload) -> Result<ValidatedUpload, AvatarRejection> {
        if staged.size > self.config.max_bytes {
            return Err(AvatarRejection::FileTooLarge {
                limit_bytes: self.config.max_bytes,
            });
        }

        let format = sniff_format(&staged.head).ok_or(AvatarRejection::UnsupportedFormat)?;
        debug!(format = format.mime_type(), size = staged.size, "Avatar upload validated");

        Ok(ValidatedUpload {
            path: staged.path,
            format,
        })
    }

    /// Moves a validated upload to `user_{id}.{ext}`, setting aside every
    /// existing `user_{id}.*` file first.
    pub async fn promote(
        &self,
        user_id: i32,
        upload: ValidatedUpload,
    ) -> Result<Promotion, AvatarStoreError> {
        let dir = &self.config.directory;
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(AvatarStoreError::StorageWrite)?;
        tokio::fs::create_dir_all(&self.config.staging_directory)
            .await
            .map_err(AvatarStoreError::StorageWrite)?;

        let file_name = format!("user_{}.{}", user_id, upload.format.extension());
        let dest = dir.join(&file_name);
        let mut promotion = Promotion {
            stored_path: format!("{}/{}", self.config.public_prefix, file_name),
            file: None,
            displaced: Vec::new(),
            settled: false,
        };

        if let Err(e) = self.set_aside_variants(user_id, &mut promotion.displaced).await {
            promotion.revert().await;
            return Err(e);
        }

        // Every `user_{id}.*` file is aside now, so `dest` is never a previous avatar.
        promotion.file = Some(dest.clone());
        if let Err(e) = move_into_place(upload.path, &dest).await {
            promotion.revert().await;
            return Err(AvatarStoreError::StorageWrite(e));
        }

        info!(user_id, file = %dest.display(), "Avatar promoted");
        Ok(promotion)
    }

    /// Deletes the file behind a stored avatar path. A missing file is not an
    /// error, and the default image is never deleted.
    pub async fn remove(&self, stored_path: &str) -> io::Result<()> {
        let Some(path) = self.resolve(stored_path) else {
            return Ok(());
        };

        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                info!(file = %path.display(), "Avatar removed");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// URL for rendering a user's avatar, falling back to the default image.
    pub fn public_url(&self, avatar: Option<&str>) -> String {
        match avatar {
            Some(path) if !path.is_empty() => format!("/{}", path.trim_start_matches('/')),
            _ => format!("/{}/{}", self.config.public_prefix, self.config.default_file),
        }
    }

    /// Maps a stored path onto the store directory using only its file name.
    fn resolve(&self, stored_path: &str) -> Option<PathBuf> {
        let name = Path::new(stored_path).file_name()?;
        if name == self.config.default_file.as_str() {
            return None;
        }
        Some(self.config.directory.join(name))
    }

    /// Renames every `user_{id}.*` file into the staging directory, recording
    /// each move in `displaced` as it happens.
    async fn set_aside_variants(
        &self,
        user_id: i32,
        displaced: &mut Vec<(PathBuf, PathBuf)>,
    ) -> Result<(), AvatarStoreError> {
        let prefix = format!("user_{}.", user_id);
        let mut entries = tokio::fs::read_dir(&self.config.directory)
            .await
            .map_err(AvatarStoreError::StorageWrite)?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(AvatarStoreError::StorageWrite)?
        {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if !name.starts_with(&prefix) {
                continue;
            }

            let original = entry.path();
            let aside = self
                .config
                .staging_directory
                .join(format!("displaced-{}-{}", uuid::Uuid::new_v4(), name));

            tokio::fs::rename(&original, &aside)
                .await
                .map_err(AvatarStoreError::StorageWrite)?;
            displaced.push((aside, original));
        }

        Ok(())
    }
}

fn sniff_format(head: &[u8]) -> Option<AvatarFormat> {
    match image::guess_format(head).ok()? {
        ImageFormat::Jpeg => Some(AvatarFormat::Jpeg),
        ImageFormat::Png => Some(AvatarFormat::Png),
        ImageFormat::WebP => Some(AvatarFormat::Webp),
        _ => None,
    }
}

/// Renames the temp file into place, copying when the rename crosses
/// filesystems.
async fn move_into_place(temp: TempPath, dest: &Path) -> io::Result<()> {
    match temp.persist(dest) {
        Ok(()) => Ok(()),
        Err(e) => {
            debug!(error = %e.error, "Rename failed, copying avatar instead");
            let temp = e.path;
            tokio::fs::copy(&temp, dest).await?;
            drop(temp);
            Ok(())
        }
    }
}
