//! User management pages (admin only)

use axum::{
    extract::{Path, State},
    http::header,
    response::Response,
    Extension,
};
use tracing::error;

use crate::application::accounts::{
    parse_role_id, AccountError, AccountFields, CreateUserForm, EditUserForm, NameFields,
    NewUserFields,
};
use crate::application::identity::RequestContext;
use crate::domain::{Role, User};
use crate::interfaces::http::common::AccountMultipart;
use crate::interfaces::http::router::AppState;
use crate::interfaces::http::views::{
    users::{
        create_user_page, edit_user_page, user_list_page, CreateUserView, EditUserView, UserRow,
    },
    Nav,
};

const USER_NOT_FOUND: &str = "User not found.";

fn submitted_names(form: &AccountMultipart) -> NameFields {
    NameFields {
        first_name: form.text("first_name"),
        last_name: form.text("last_name"),
        middle_name: form.text("middle_name"),
    }
}

fn fields_of(user: &User) -> AccountFields {
    AccountFields {
        names: NameFields {
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            middle_name: user.middle_name.clone(),
        },
        role_id: Some(user.role_id),
        status: user.status.to_string(),
    }
}

async fn load_roles(state: &AppState) -> Option<Vec<Role>> {
    match state.users.list_roles().await {
        Ok(roles) => Some(roles),
        Err(e) => {
            error!(error = %e, "Failed to load roles");
            None
        }
    }
}

/// `GET /admin/users`
pub async fn list_users(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
) -> Response {
    let users = match state.users.list_users().await {
        Ok(users) => users,
        Err(e) => {
            error!(error = %e, "Failed to list users");
            return state.views.server_error();
        }
    };

    let rows: Vec<UserRow<'_>> = users
        .iter()
        .map(|user| UserRow {
            user,
            avatar_url: state.avatars.public_url(user.avatar.as_deref()),
        })
        .collect();
    user_list_page(&state.views, &Nav::new(&ctx, &state.avatars), &rows)
}

fn render_create(
    state: &AppState,
    ctx: &RequestContext,
    fields: &NewUserFields,
    roles: &[Role],
    errors: &[String],
    success: Option<&str>,
) -> Response {
    let view = CreateUserView {
        fields,
        roles,
        errors,
        success,
    };
    create_user_page(&state.views, &Nav::new(ctx, &state.avatars), &view)
}

/// `GET /admin/users/new`
pub async fn show_create_user(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
) -> Response {
    let Some(roles) = load_roles(&state).await else {
        return state.views.server_error();
    };
    render_create(&state, &ctx, &NewUserFields::default(), &roles, &[], None)
}

/// `POST /admin/users/new`
pub async fn create_user(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    mut submitted: AccountMultipart,
) -> Response {
    let fields = NewUserFields {
        names: submitted_names(&submitted),
        email: submitted.text("email"),
        role_id: parse_role_id(&submitted.text("role_id")),
        status: submitted.text("status"),
    };
    let form = CreateUserForm {
        fields: fields.clone(),
        password: submitted.text("password"),
        password_confirmation: submitted.text("password_confirmation"),
        avatar: submitted.take_avatar(),
    };

    let result = state.accounts.create_user(&ctx, form).await;
    let Some(roles) = load_roles(&state).await else {
        return state.views.server_error();
    };

    match result {
        // A fresh form follows a successful registration.
        Ok(outcome) => render_create(
            &state,
            &ctx,
            &NewUserFields::default(),
            &roles,
            &[],
            Some(&outcome.message),
        ),
        Err(e) => render_create(&state, &ctx, &fields, &roles, &e.messages(), None),
    }
}

fn render_edit(
    state: &AppState,
    ctx: &RequestContext,
    user: &User,
    fields: &AccountFields,
    roles: &[Role],
    errors: &[String],
    success: Option<&str>,
) -> Response {
    let view = EditUserView {
        user,
        fields,
        roles,
        avatar_url: state.avatars.public_url(user.avatar.as_deref()),
        errors,
        success,
    };
    edit_user_page(&state.views, &Nav::new(ctx, &state.avatars), &view)
}

/// `GET /admin/users/{id}/edit`
pub async fn show_edit_user(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<i32>,
) -> Response {
    let user = match state.users.find_by_id(id).await {
        Ok(Some(user)) => user,
        Ok(None) => return state.views.not_found(&Nav::new(&ctx, &state.avatars), USER_NOT_FOUND),
        Err(e) => {
            error!(user_id = id, error = %e, "Failed to load user");
            return state.views.server_error();
        }
    };
    let Some(roles) = load_roles(&state).await else {
        return state.views.server_error();
    };
    render_edit(&state, &ctx, &user, &fields_of(&user), &roles, &[], None)
}

/// `POST /admin/users/{id}/edit`
pub async fn update_user(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<i32>,
    mut submitted: AccountMultipart,
) -> Response {
    let fields = AccountFields {
        names: submitted_names(&submitted),
        role_id: parse_role_id(&submitted.text("role_id")),
        status: submitted.text("status"),
    };
    let form = EditUserForm {
        fields: fields.clone(),
        remove_avatar: submitted.flag("remove_avatar"),
        avatar: submitted.take_avatar(),
    };

    let result = state.accounts.edit_user(&ctx, id, form).await;
    let Some(roles) = load_roles(&state).await else {
        return state.views.server_error();
    };

    match result {
        Ok(outcome) => {
            let session = outcome
                .refreshed_session
                .as_ref()
                .and_then(|fresh| state.reissue_session(fresh));
            let current = session.as_ref().map(|s| &s.context).unwrap_or(&ctx);

            let mut response = render_edit(
                &state,
                current,
                &outcome.user,
                &fields_of(&outcome.user),
                &roles,
                &[],
                Some(&outcome.message),
            );
            if let Some(cookie) = session.as_ref().and_then(|s| state.cookies.session(s)) {
                response.headers_mut().append(header::SET_COOKIE, cookie);
            }
            response
        }
        Err(AccountError::NotFound) => {
            state.views.not_found(&Nav::new(&ctx, &state.avatars), USER_NOT_FOUND)
        }
        Err(e) => match state.users.find_by_id(id).await {
            Ok(Some(user)) => render_edit(&state, &ctx, &user, &fields, &roles, &e.messages(), None),
            Ok(None) => state.views.not_found(&Nav::new(&ctx, &state.avatars), USER_NOT_FOUND),
            Err(load) => {
                error!(user_id = id, error = %load, "Failed to reload user");
                state.views.server_error()
            }
        },
    }
}
