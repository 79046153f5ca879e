// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Embedded HTML templates and rendering

use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use minijinja::{Environment, HtmlEscape, Value};
use std::sync::OnceLock;
use tracing::debug;

use crate::Result;

/// Marks a response with the template it was rendered from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemplateName(pub &'static str);

const TEMPLATES: &[(&str, &str)] = &[
    ("base.html", include_str!("../../templates/base.html")),
    ("includes/post_card.html", include_str!("../../templates/includes/post_card.html")),
    ("includes/paginator.html", include_str!("../../templates/includes/paginator.html")),
    ("includes/field.html", include_str!("../../templates/includes/field.html")),
    ("posts/index.html", include_str!("../../templates/posts/index.html")),
    ("posts/group_list.html", include_str!("../../templates/posts/group_list.html")),
    ("posts/profile.html", include_str!("../../templates/posts/profile.html")),
    ("posts/post_detail.html", include_str!("../../templates/posts/post_detail.html")),
    ("posts/create_post.html", include_str!("../../templates/posts/create_post.html")),
    ("users/signup.html", include_str!("../../templates/users/signup.html")),
    ("users/login.html", include_str!("../../templates/users/login.html")),
    ("users/logged_out.html", include_str!("../../templates/users/logged_out.html")),
    ("core/404.html", include_str!("../../templates/core/404.html")),
    ("core/500.html", include_str!("../../templates/core/500.html")),
];

/// Process-wide template environment, compiled on first use
pub fn environment() -> Result<&'static Environment<'static>> {
    static ENV: OnceLock<Environment<'static>> = OnceLock::new();
    if let Some(env) = ENV.get() {
        return Ok(env);
    }
    let env = build_environment(TEMPLATES)?;
    debug!("Loaded {} templates", TEMPLATES.len());
    Ok(ENV.get_or_init(|| env))
}

fn build_environment(sources: &[(&'static str, &'static str)]) -> Result<Environment<'static>> {
    let mut env = Environment::new();
    for &(name, source) in sources {
        env.add_template(name, source)?;
    }
    env.add_filter("linebreaksbr", linebreaksbr);
    env.add_filter("datefmt", datefmt);
    Ok(env)
}

/// Render `name` with a 200 status
pub fn render(name: &'static str, ctx: Value) -> Result<Response> {
    render_with_status(StatusCode::OK, name, ctx)
}

pub fn render_with_status(status: StatusCode, name: &'static str, ctx: Value) -> Result<Response> {
    let html = environment()?.get_template(name)?.render(ctx)?;
    let mut response = (status, Html(html)).into_response();
    response.extensions_mut().insert(TemplateName(name));
    Ok(response)
}

/// Escape HTML, then turn newlines into `<br>`
fn linebreaksbr(value: String) -> Value {
    let escaped = HtmlEscape(&value.replace("\r\n", "\n")).to_string();
    Value::from_safe_string(escaped.replace('\n', "<br>"))
}

/// RFC 3339 timestamp as `17 Oct 2026`; anything unparsable passes through
fn datefmt(value: String) -> String {
    match DateTime::parse_from_rfc3339(&value) {
        Ok(dt) => dt.with_timezone(&Utc).format("%d %b %Y").to_string(),
        Err(_) => value,
    }
}
