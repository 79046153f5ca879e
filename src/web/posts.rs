// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Post listings, detail pages and the create/edit form

use axum::{
    extract::{Path, Query, State},
    response::Response,
    Form,
};
use minijinja::context;
use std::sync::Arc;
use tracing::info;

use crate::db::Post;
use crate::forms::{PostForm, PostFormData};
use crate::pagination::Paginator;
use crate::{Result, YatubeError};

use super::session::found;
use super::templates::render;
use super::{last_param, AppState, CurrentUser, LoginRequired, QueryPairs};

pub fn profile_url(username: &str) -> String {
    format!("/profile/{}/", urlencoding::encode(username))
}

pub fn post_url(id: i64) -> String {
    format!("/posts/{}/", id)
}

/// Ids that are not integers cannot name a post
fn parse_post_id(raw: &str) -> Result<i64> {
    raw.parse::<i64>()
        .map_err(|_| YatubeError::not_found(format!("post {}", raw)))
}

fn fetch_post(state: &AppState, raw_id: &str) -> Result<Post> {
    let id = parse_post_id(raw_id)?;
    state
        .db
        .post_by_id(id)?
        .ok_or_else(|| YatubeError::not_found(format!("post {}", id)))
}

/// Latest posts from everyone
pub async fn index(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<QueryPairs>,
) -> Result<Response> {
    let paginator = Paginator::new(state.db.count_posts()?, state.per_page());
    let request = paginator.get_page(last_param(&query, "page"));
    let page_obj = request.fill(state.db.recent_posts(request.offset(), request.limit())?);

    render(
        "posts/index.html",
        context! { site_title => state.site_title(), user, page_obj },
    )
}

/// Posts filed under one group
pub async fn group_list(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(slug): Path<String>,
    Query(query): Query<QueryPairs>,
) -> Result<Response> {
    let group = state
        .db
        .group_by_slug(&slug)?
        .ok_or_else(|| YatubeError::not_found(format!("group {}", slug)))?;

    let paginator = Paginator::new(state.db.count_group_posts(group.id)?, state.per_page());
    let request = paginator.get_page(last_param(&query, "page"));
    let page_obj = request.fill(state.db.group_posts(group.id, request.offset(), request.limit())?);

    render(
        "posts/group_list.html",
        context! { site_title => state.site_title(), user, group, page_obj },
    )
}

/// One author's posts
pub async fn profile(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(username): Path<String>,
    Query(query): Query<QueryPairs>,
) -> Result<Response> {
    let author = state
        .db
        .user_by_username(&username)?
        .ok_or_else(|| YatubeError::not_found(format!("user {}", username)))?;

    let posts_count = state.db.count_author_posts(author.id)?;
    let paginator = Paginator::new(posts_count, state.per_page());
    let request = paginator.get_page(last_param(&query, "page"));
    let page_obj = request.fill(state.db.author_posts(author.id, request.offset(), request.limit())?);

    render(
        "posts/profile.html",
        context! { site_title => state.site_title(), user, author, page_obj, posts_count },
    )
}

pub async fn post_detail(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(post_id): Path<String>,
) -> Result<Response> {
    let post = fetch_post(&state, &post_id)?;
    let first_30: String = post.text.chars().take(30).collect();
    let posts_count = state.db.count_author_posts(post.author.id)?;
    let is_author = user.as_ref().is_some_and(|u| u.id == post.author.id);

    render(
        "posts/post_detail.html",
        context! {
            site_title => state.site_title(),
            user,
            post_id => post.id,
            post,
            first_30,
            posts_count,
            is_author,
        },
    )
}

fn render_post_form(state: &AppState, user: crate::db::User, form: PostForm, edit_id: Option<i64>) -> Result<Response> {
    let groups = state.db.all_groups()?;
    render(
        "posts/create_post.html",
        context! {
            site_title => state.site_title(),
            user,
            form,
            groups,
            is_edit => edit_id.is_some(),
            post_id => edit_id,
        },
    )
}

pub async fn post_create_form(
    State(state): State<Arc<AppState>>,
    LoginRequired(user): LoginRequired,
) -> Result<Response> {
    render_post_form(&state, user, PostForm::unbound(), None)
}

pub async fn post_create_submit(
    State(state): State<Arc<AppState>>,
    LoginRequired(user): LoginRequired,
    Form(data): Form<PostFormData>,
) -> Result<Response> {
    let mut form = PostForm::bind(data);
    let Some(clean) = form.clean(&state.db)? else {
        return render_post_form(&state, user, form, None);
    };

    let id = state.db.create_post(user.id, &clean.text, clean.group_id)?;
    info!("User {} published post {}", user.username, id);
    Ok(found(&profile_url(&user.username)))
}

pub async fn post_edit_form(
    State(state): State<Arc<AppState>>,
    LoginRequired(user): LoginRequired,
    Path(post_id): Path<String>,
) -> Result<Response> {
    let post = fetch_post(&state, &post_id)?;
    if post.author.id != user.id {
        return Ok(found(&post_url(post.id)));
    }
    render_post_form(&state, user, PostForm::for_post(&post), Some(post.id))
}

pub async fn post_edit_submit(
    State(state): State<Arc<AppState>>,
    LoginRequired(user): LoginRequired,
    Path(post_id): Path<String>,
    Form(data): Form<PostFormData>,
) -> Result<Response> {
    let post = fetch_post(&state, &post_id)?;
    if post.author.id != user.id {
        info!("User {} tried to edit post {} by {}", user.username, post.id, post.author.username);
        return Ok(found(&post_url(post.id)));
    }

    let mut form = PostForm::bind(data);
    let Some(clean) = form.clean(&state.db)? else {
        return render_post_form(&state, user, form, Some(post.id));
    };

    state.db.update_post(post.id, &clean.text, clean.group_id)?;
    info!("User {} edited post {}", user.username, post.id);
    Ok(found(&post_url(post.id)))
}
