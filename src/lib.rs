// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Yatube: a small blog platform
//!
//! Users publish text posts, optionally filed under a group. Visitors browse
//! the paginated feed, group pages, author profiles and single posts.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod forms;
pub mod pagination;
pub mod web;

pub use config::AppConfig;
pub use error::{Result, YatubeError};
