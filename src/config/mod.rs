// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Configuration management for Yatube

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main application configuration
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct AppConfig {
    /// Web server settings
    #[serde(default)]
    pub web: WebConfig,

    /// Database settings
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Listing page sizes
    #[serde(default)]
    pub pagination: PaginationConfig,

    /// Session cookie settings
    #[serde(default)]
    pub auth: AuthConfig,

    /// Site-wide presentation
    #[serde(default)]
    pub site: SiteConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WebConfig {
    #[serde(default = "default_web_host")]
    pub host: String,
    #[serde(default = "default_web_port")]
    pub port: u16,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PaginationConfig {
    #[serde(default = "default_posts_per_page")]
    pub posts_per_page: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AuthConfig {
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
    #[serde(default = "default_session_ttl_hours")]
    pub session_ttl_hours: i64,
    /// Mark the session cookie `Secure` (only sent over HTTPS)
    #[serde(default)]
    pub secure_cookie: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SiteConfig {
    #[serde(default = "default_site_title")]
    pub title: String,
}

// Default value functions
fn default_web_host() -> String { "127.0.0.1".to_string() }
fn default_web_port() -> u16 { 8000 }
fn default_db_path() -> String { "yatube.db".to_string() }
fn default_posts_per_page() -> usize { 10 }
fn default_cookie_name() -> String { "yatube_session".to_string() }
fn default_session_ttl_hours() -> i64 { 24 * 14 }
fn default_site_title() -> String { "Yatube".to_string() }

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: default_web_host(),
            port: default_web_port(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            posts_per_page: default_posts_per_page(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            cookie_name: default_cookie_name(),
            session_ttl_hours: default_session_ttl_hours(),
            secure_cookie: false,
        }
    }
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            title: default_site_title(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> crate::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = serde_json::from_str(&content)
                .map_err(|e| crate::YatubeError::Config(format!("Failed to parse config: {}", e)))?;
            config.validate()?;
            Ok(config)
        } else {
            tracing::info!("Config file not found at {:?}, using defaults", path);
            Ok(Self::default())
        }
    }

    /// Save configuration to a JSON file
    pub fn save(&self, path: &Path) -> crate::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    fn validate(&self) -> crate::Result<()> {
        if self.pagination.posts_per_page == 0 {
            return Err(crate::YatubeError::Config(
                "pagination.posts_per_page must be at least 1".to_string(),
            ));
        }
        if self.auth.session_ttl_hours <= 0 {
            return Err(crate::YatubeError::Config(
                "auth.session_ttl_hours must be positive".to_string(),
            ));
        }
        if self.auth.cookie_name.is_empty() {
            return Err(crate::YatubeError::Config("auth.cookie_name is empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load(&dir.path().join("nope.json")).unwrap();
        assert_eq!(config.web.port, 8000);
        assert_eq!(config.pagination.posts_per_page, 10);
        assert_eq!(config.auth.cookie_name, "yatube_session");
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"web": {"port": 9000}, "site": {"title": "Blog"}}"#).unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.web.port, 9000);
        assert_eq!(config.web.host, "127.0.0.1");
        assert_eq!(config.site.title, "Blog");
        assert_eq!(config.database.path, "yatube.db");
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut config = AppConfig::default();
        config.pagination.posts_per_page = 25;
        config.save(&path).unwrap();

        let loaded = AppConfig::load(&path).unwrap();
        assert_eq!(loaded.pagination.posts_per_page, 25);
    }

    #[test]
    fn test_zero_page_size_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"pagination": {"posts_per_page": 0}}"#).unwrap();
        assert!(matches!(AppConfig::load(&path), Err(crate::YatubeError::Config(_))));
    }

    #[test]
    fn test_malformed_json_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(AppConfig::load(&path).is_err());
    }
}
