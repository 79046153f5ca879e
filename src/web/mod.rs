// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Web front end: routing, shared state and error pages

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode, Uri},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use minijinja::context;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

use crate::config::AppConfig;
use crate::db::Database;
use crate::YatubeError;

pub mod posts;
pub mod session;
pub mod templates;
pub mod users;


pub use session::{CurrentUser, LoginRequired};
pub use templates::TemplateName;

/// Shared application state
pub struct AppState {
    pub db: Database,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(db: Database, config: AppConfig) -> Arc<Self> {
        Arc::new(Self { db, config })
    }

    fn site_title(&self) -> &str {
        &self.config.site.title
    }

    fn per_page(&self) -> usize {
        self.config.pagination.posts_per_page
    }
}

/// Raw query string pairs; repeated keys are kept
pub type QueryPairs = Vec<(String, String)>;

/// Last value given for `key`, so `?page=1&page=2` reads as page 2
pub fn last_param<'a>(pairs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    pairs.iter().rev().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
}

/// Create the web application router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Posts
        .route("/", get(posts::index))
        .route("/group/:slug/", get(posts::group_list))
        .route("/profile/:username/", get(posts::profile))
        .route("/posts/:post_id/", get(posts::post_detail))
        .route("/posts/:post_id/edit/", get(posts::post_edit_form).post(posts::post_edit_submit))
        .route("/create/", get(posts::post_create_form).post(posts::post_create_submit))
        // Accounts
        .route("/auth/signup/", get(users::signup_form).post(users::signup_submit))
        .route("/auth/login/", get(users::login_form).post(users::login_submit))
        .route("/auth/logout/", get(users::logout))
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(state.clone(), error_pages))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn not_found(uri: Uri) -> YatubeError {
    YatubeError::not_found(uri.path().to_string())
}

/// Marks a response produced from a [`YatubeError`]
#[derive(Debug, Clone, Copy)]
struct ErrorPage;

impl IntoResponse for YatubeError {
    fn into_response(self) -> Response {
        let status = match &self {
            YatubeError::NotFound(what) => {
                debug!("Not found: {}", what);
                StatusCode::NOT_FOUND
            }
            other => {
                error!("Request failed: {}", other);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        // Bare page; `error_pages` fills in the visitor and path
        let mut response = match templates::render_with_status(status, error_template(status), context! {}) {
            Ok(response) => response,
            Err(e) => {
                error!("Failed to render error page: {}", e);
                status.into_response()
            }
        };
        response.extensions_mut().insert(ErrorPage);
        response
    }
}

fn error_template(status: StatusCode) -> &'static str {
    if status == StatusCode::NOT_FOUND {
        "core/404.html"
    } else {
        "core/500.html"
    }
}

/// Re-render error pages with the same context as every other page
async fn error_pages(State(state): State<Arc<AppState>>, req: Request<Body>, next: Next) -> Response {
    let headers = req.headers().clone();
    let path = req.uri().path().to_string();

    let response = next.run(req).await;
    if response.extensions().get::<ErrorPage>().is_none() {
        return response;
    }

    let status = response.status();
    let user = match session::user_from_headers(&state, &headers) {
        Ok(user) => user,
        Err(e) => {
            error!("Failed to resolve user for error page: {}", e);
            None
        }
    };
    let ctx = context! { site_title => state.site_title(), user, path };
    match templates::render_with_status(status, error_template(status), ctx) {
        Ok(mut page) => {
            page.extensions_mut().insert(ErrorPage);
            page
        }
        Err(e) => {
            error!("Failed to render error page: {}", e);
            response
        }
    }
}

/// Start the web server with config and database
pub async fn start_server(config: AppConfig, db: Database) -> crate::Result<()> {
    templates::environment()?;
    let addr = format!("{}:{}", config.web.host, config.web.port);
    let state = AppState::new(db, config);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("Yatube available at http://{}", addr);

    let router = create_router(state);
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
}
