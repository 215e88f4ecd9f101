//! Own-profile page

use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Redirect, Response},
    Extension,
};
use tracing::error;

use crate::application::accounts::{AccountError, NameFields, ProfileForm};
use crate::application::identity::RequestContext;
use crate::domain::User;
use crate::interfaces::http::common::AccountMultipart;
use crate::interfaces::http::router::AppState;
use crate::interfaces::http::views::{
    profile::{profile_page, ProfileView},
    Nav,
};

fn names_of(user: &User) -> NameFields {
    NameFields {
        first_name: user.first_name.clone(),
        last_name: user.last_name.clone(),
        middle_name: user.middle_name.clone(),
    }
}

fn render(
    state: &AppState,
    ctx: &RequestContext,
    user: &User,
    names: &NameFields,
    errors: &[String],
    success: Option<&str>,
) -> Response {
    let view = ProfileView {
        user,
        names,
        avatar_url: state.avatars.public_url(user.avatar.as_deref()),
        errors,
        success,
    };
    profile_page(&state.views, &Nav::new(ctx, &state.avatars), &view)
}

/// The account behind the session is gone; drop the session.
fn stale_session(state: &AppState) -> Response {
    let mut response = Redirect::to("/login").into_response();
    if let Some(cleared) = state.cookies.cleared() {
        response.headers_mut().append(header::SET_COOKIE, cleared);
    }
    response
}

/// `GET /profile`
pub async fn show_profile(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
) -> Response {
    match state.users.find_by_id(ctx.user_id()).await {
        Ok(Some(user)) => render(&state, &ctx, &user, &names_of(&user), &[], None),
        Ok(None) => stale_session(&state),
        Err(e) => {
            error!(user_id = ctx.user_id(), error = %e, "Failed to load profile");
            state.views.server_error()
        }
    }
}

/// `POST /profile`
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    mut submitted: AccountMultipart,
) -> Response {
    let names = NameFields {
        first_name: submitted.text("first_name"),
        last_name: submitted.text("last_name"),
        middle_name: submitted.text("middle_name"),
    };
    let form = ProfileForm {
        names: names.clone(),
        remove_avatar: submitted.flag("remove_avatar"),
        avatar: submitted.take_avatar(),
    };

    match state.accounts.update_profile(&ctx, form).await {
        Ok(outcome) => {
            let session = outcome
                .refreshed_session
                .as_ref()
                .and_then(|fresh| state.reissue_session(fresh));
            let current = session.as_ref().map(|s| &s.context).unwrap_or(&ctx);

            let mut response = render(
                &state,
                current,
                &outcome.user,
                &names_of(&outcome.user),
                &[],
                Some(&outcome.message),
            );
            if let Some(cookie) = session.as_ref().and_then(|s| state.cookies.session(s)) {
                response.headers_mut().append(header::SET_COOKIE, cookie);
            }
            response
        }
        Err(AccountError::NotFound) => stale_session(&state),
        Err(e) => match state.users.find_by_id(ctx.user_id()).await {
            Ok(Some(user)) => render(&state, &ctx, &user, &names, &e.messages(), None),
            Ok(None) => stale_session(&state),
            Err(load) => {
                error!(user_id = ctx.user_id(), error = %load, "Failed to reload profile");
                state.views.server_error()
            }
        },
    }
}
