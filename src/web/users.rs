// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Account pages: sign up, log in, log out

use axum::{
    extract::{Query, State},
    response::{IntoResponse, Response},
    Form,
};
use axum_extra::extract::cookie::CookieJar;
use minijinja::context;
use std::sync::Arc;
use tracing::{info, warn};

use crate::auth;
use crate::db::NewUser;
use crate::forms::{LoginForm, LoginFormData, SignupForm, SignupFormData};
use crate::Result;

use super::session::{found, log_in, log_out};
use super::templates::render;
use super::{last_param, AppState, CurrentUser, QueryPairs};

pub async fn signup_form(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
) -> Result<Response> {
    render(
        "users/signup.html",
        context! { site_title => state.site_title(), user, form => SignupForm::unbound() },
    )
}

pub async fn signup_submit(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(data): Form<SignupFormData>,
) -> Result<Response> {
    let mut form = SignupForm::bind(data);
    let Some(clean) = form.clean(&state.db)? else {
        return render(
            "users/signup.html",
            context! { site_title => state.site_title(), form },
        );
    };

    let password_hash = auth::hash_password(&clean.password)?;
    let user = state.db.create_user(&NewUser {
        username: &clean.username,
        first_name: &clean.first_name,
        last_name: &clean.last_name,
        password_hash: &password_hash,
    })?;
    info!("New user registered: {}", user.username);

    let jar = log_in(&state, jar, &user)?;
    Ok((jar, found("/")).into_response())
}

pub async fn login_form(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<QueryPairs>,
) -> Result<Response> {
    let form = LoginForm::unbound(last_param(&query, "next").map(str::to_string));
    render(
        "users/login.html",
        context! { site_title => state.site_title(), user, form },
    )
}

pub async fn login_submit(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(data): Form<LoginFormData>,
) -> Result<Response> {
    let mut form = LoginForm::bind(data);
    let Some(user) = form.clean(&state.db)? else {
        warn!("Failed login attempt for {:?}", form.username.value);
        return render(
            "users/login.html",
            context! { site_title => state.site_title(), form },
        );
    };

    let jar = log_in(&state, jar, &user)?;
    Ok((jar, found(form.redirect_target())).into_response())
}

pub async fn logout(State(state): State<Arc<AppState>>, jar: CookieJar) -> Result<Response> {
    let jar = log_out(&state, jar)?;
    let page = render(
        "users/logged_out.html",
        context! { site_title => state.site_title() },
    )?;
    Ok((jar, page).into_response())
}
