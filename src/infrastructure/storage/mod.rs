//! Avatar file storage

pub mod avatar_store;

pub use avatar_store::{
    AvatarStore, AvatarStoreConfig, AvatarStoreError, Promotion, StagedUpload, UploadStager,
    ValidatedUpload,
};
