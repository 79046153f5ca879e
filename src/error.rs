// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Error types for Yatube

use thiserror::Error;

/// Result type alias for Yatube operations
pub type Result<T> = std::result::Result<T, YatubeError>;

/// Yatube error types
#[derive(Error, Debug)]
pub enum YatubeError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File system error: {0}")]
    FileSystem(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),

    #[error("Password hash error: {0}")]
    PasswordHash(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl YatubeError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }
}
