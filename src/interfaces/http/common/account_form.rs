//! Multipart extractor for the account forms
//!
//! Text fields are collected into a map. The `avatar` file part is streamed
//! chunk by chunk into the avatar store's staging area, so the upload never
//! sits in memory as a whole.
//!
//! The request body is capped by the router (see
//! [`upload_body_limit`](crate::interfaces::http::router::upload_body_limit)).
//! An avatar cut off by that cap has already passed the store's size limit
//! and is kept as a staged upload, so validation reports it as too large
//! rather than as a transport error.

use std::collections::HashMap;

use axum::extract::multipart::{Field, MultipartRejection};
use axum::extract::{FromRef, FromRequest, Multipart};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::{error, warn};

use crate::application::accounts::AvatarSubmission;
use crate::infrastructure::storage::AvatarStore;

/// Name of the file input carrying the avatar.
pub const AVATAR_FIELD: &str = "avatar";

/// A submitted account form.
#[derive(Debug, Default)]
pub struct AccountMultipart {
    fields: HashMap<String, String>,
    pub avatar: AvatarSubmission,
}

impl AccountMultipart {
    /// Value of a text field, empty when absent.
    pub fn text(&self, name: &str) -> String {
        self.fields.get(name).cloned().unwrap_or_default()
    }

    /// Checkbox state: any non-empty value other than `0` counts as checked.
    pub fn flag(&self, name: &str) -> bool {
        self.fields
            .get(name)
            .is_some_and(|v| !v.is_empty() && v != "0")
    }

    pub fn take_avatar(&mut self) -> AvatarSubmission {
        std::mem::take(&mut self.avatar)
    }
}

pub struct AccountMultipartRejection(MultipartRejection);

impl IntoResponse for AccountMultipartRejection {
    fn into_response(self) -> Response {
        (StatusCode::BAD_REQUEST, format!("Invalid form submission: {}", self.0)).into_response()
    }
}

impl<S> FromRequest<S> for AccountMultipart
where
    AvatarStore: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AccountMultipartRejection;

    async fn from_request(req: axum::extract::Request, state: &S) -> Result<Self, Self::Rejection> {
        let mut multipart = Multipart::from_request(req, state)
            .await
            .map_err(AccountMultipartRejection)?;
        let store = AvatarStore::from_ref(state);

        let mut form = AccountMultipart::default();
        loop {
            let field = match multipart.next_field().await {
                Ok(Some(field)) => field,
                Ok(None) => break,
                Err(e) => {
                    // The rest of the body is unusable once the stream breaks.
                    warn!(error = %e, "Multipart stream ended unexpectedly");
                    if matches!(form.avatar, AvatarSubmission::None) {
                        form.avatar = AvatarSubmission::Interrupted;
                    }
                    break;
                }
            };

            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };

            // Later fields are still read; a broken stream ends the loop above.
            if name == AVATAR_FIELD {
                form.avatar = stage_avatar(&store, field).await;
                continue;
            }

            match field.text().await {
                Ok(value) => {
                    form.fields.insert(name, value);
                }
                Err(e) => {
                    warn!(field = %name, error = %e, "Failed to read form field");
                    form.avatar = AvatarSubmission::Interrupted;
                    break;
                }
            }
        }

        Ok(form)
    }
}

async fn stage_avatar(store: &AvatarStore, mut field: Field<'_>) -> AvatarSubmission {
    // Browsers send an empty, nameless part when no file was chosen.
    if field.file_name().map_or(true, str::is_empty) {
        return AvatarSubmission::None;
    }

    let mut stager = match store.begin_upload().await {
        Ok(stager) => stager,
        Err(e) => {
            error!(error = %e, "Cannot stage avatar upload");
            return AvatarSubmission::Interrupted;
        }
    };

    loop {
        match field.chunk().await {
            Ok(Some(chunk)) => {
                if let Err(e) = stager.write_chunk(&chunk).await {
                    error!(error = %e, "Failed to write avatar chunk");
                    return AvatarSubmission::Interrupted;
                }
            }
            Ok(None) => break,
            Err(e) if stager.over_limit() => {
                warn!(error = %e, "Avatar upload cut off past the size limit");
                break;
            }
            Err(e) => {
                warn!(error = %e, "Avatar upload interrupted");
                return AvatarSubmission::Interrupted;
            }
        }
    }

    match stager.finish().await {
        Ok(staged) => AvatarSubmission::Staged(staged),
        Err(e) => {
            error!(error = %e, "Failed to finish avatar upload");
            AvatarSubmission::Interrupted
        }
    }
}
