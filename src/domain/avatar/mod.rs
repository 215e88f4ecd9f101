//! Avatar image types shared by the store and the account workflow.

use thiserror::Error;

/// Default upload limit: 2 MiB.
pub const DEFAULT_MAX_AVATAR_BYTES: u64 = 2 * 1024 * 1024;

/// Image formats accepted for avatars.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AvatarFormat {
    Jpeg,
    Png,
    Webp,
}

impl AvatarFormat {
    pub const ALL: [AvatarFormat; 3] = [Self::Jpeg, Self::Png, Self::Webp];

    /// Extension used for the stored file name.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Webp => "webp",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Webp => "image/webp",
        }
    }

    pub fn from_mime_type(mime: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.mime_type() == mime)
    }
}

/// Why an uploaded avatar was refused. These are user-correctable and are
/// reported alongside the other form errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AvatarRejection {
    #[error("The avatar exceeds the maximum allowed size ({}).", human_size(*limit_bytes))]
    FileTooLarge { limit_bytes: u64 },

    #[error("Avatar format not allowed. Use JPG, PNG or WEBP.")]
    UnsupportedFormat,

    #[error("An error occurred while uploading the avatar.")]
    UploadTransportError,
}

fn human_size(bytes: u64) -> String {
    const MIB: u64 = 1024 * 1024;
    if bytes >= MIB && bytes % MIB == 0 {
        format!("{}MB", bytes / MIB)
    } else {
        format!("{} bytes", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mime_types_map_to_extensions() {
        assert_eq!(AvatarFormat::from_mime_type("image/jpeg"), Some(AvatarFormat::Jpeg));
        assert_eq!(AvatarFormat::from_mime_type("image/png").map(|f| f.extension()), Some("png"));
        assert_eq!(AvatarFormat::from_mime_type("image/webp").map(|f| f.extension()), Some("webp"));
        assert_eq!(AvatarFormat::from_mime_type("image/gif"), None);
    }

    #[test]
    fn too_large_message_uses_megabytes() {
        let rejection = AvatarRejection::FileTooLarge {
            limit_bytes: DEFAULT_MAX_AVATAR_BYTES,
        };
        assert_eq!(
            rejection.to_string(),
            "The avatar exceeds the maximum allowed size (2MB)."
        );
    }
}
