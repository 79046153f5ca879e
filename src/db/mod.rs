// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Database module for users, groups, posts and login sessions

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::{Result, YatubeError};

/// Database manager for Yatube (thread-safe wrapper)
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

/// A registered user
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
    pub date_joined: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub password_hash: String,
}

/// Fields needed to register a user
#[derive(Debug, Clone, Default)]
pub struct NewUser<'a> {
    pub username: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub password_hash: &'a str,
}

/// A category posts can be filed under
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Group {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub description: String,
}

/// Author summary embedded in a post
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Author {
    pub id: i64,
    pub username: String,
    pub full_name: String,
}

/// Group summary embedded in a post
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct GroupRef {
    pub id: i64,
    pub slug: String,
    pub title: String,
}

/// A post joined with its author and group
#[derive(Debug, Clone, Serialize)]
pub struct Post {
    pub id: i64,
    pub text: String,
    pub pub_date: DateTime<Utc>,
    pub author: Author,
    pub group: Option<GroupRef>,
}

/// A login session referenced by the session cookie
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub user_id: i64,
    pub expires_at: DateTime<Utc>,
}

/// Database statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbStats {
    pub user_count: i64,
    pub group_count: i64,
    pub post_count: i64,
    pub session_count: i64,
}

const POST_SELECT: &str = r#"
    SELECT p.id, p.text, p.pub_date,
           u.id, u.username, u.first_name, u.last_name,
           g.id, g.slug, g.title
    FROM posts p
    JOIN users u ON u.id = p.author_id
    LEFT JOIN post_groups g ON g.id = p.group_id
"#;

const POST_ORDER: &str = "ORDER BY p.pub_date DESC, p.id DESC";

const USER_SELECT: &str =
    "SELECT id, username, first_name, last_name, password, date_joined FROM users";

impl Database {
    /// Open or create the database
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.initialize()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.initialize()?;
        Ok(db)
    }

    fn lock_conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| YatubeError::Config("Database lock poisoned".to_string()))
    }

    /// Initialize database schema
    fn initialize(&self) -> Result<()> {
        let conn = self.lock_conn()?;
        conn.execute_batch(r#"
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT NOT NULL UNIQUE,
                first_name TEXT NOT NULL DEFAULT '',
                last_name TEXT NOT NULL DEFAULT '',
                password TEXT NOT NULL,
                date_joined TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS post_groups (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                slug TEXT NOT NULL UNIQUE,
                description TEXT NOT NULL DEFAULT ''
            );

            CREATE TABLE IF NOT EXISTS posts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                text TEXT NOT NULL,
                pub_date TEXT NOT NULL,
                author_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                group_id INTEGER REFERENCES post_groups(id) ON DELETE SET NULL
            );

            CREATE TABLE IF NOT EXISTS sessions (
                token TEXT PRIMARY KEY,
                user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                expires_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_posts_pub_date ON posts(pub_date);
            CREATE INDEX IF NOT EXISTS idx_posts_author ON posts(author_id);
            CREATE INDEX IF NOT EXISTS idx_posts_group ON posts(group_id);
        "#)?;
        Ok(())
    }

    // === Users ===

    /// Register a user; the username must be free
    pub fn create_user(&self, new: &NewUser<'_>) -> Result<User> {
        let conn = self.lock_conn()?;
        let now = Utc::now();
        conn.execute(
            r#"INSERT INTO users (username, first_name, last_name, password, date_joined)
               VALUES (?1, ?2, ?3, ?4, ?5)"#,
            params![new.username, new.first_name, new.last_name, new.password_hash, timestamp(&now)],
        )?;
        let id = conn.last_insert_rowid();
        let sql = format!("{USER_SELECT} WHERE id = ?1");
        Ok(conn.query_row(&sql, params![id], user_from_row)?)
    }

    pub fn user_by_username(&self, username: &str) -> Result<Option<User>> {
        let conn = self.lock_conn()?;
        let sql = format!("{USER_SELECT} WHERE username = ?1");
        Ok(conn.query_row(&sql, params![username], user_from_row).optional()?)
    }

    // === Groups ===

    /// Add a group; slugs are unique
    pub fn create_group(&self, title: &str, slug: &str, description: &str) -> Result<Group> {
        let conn = self.lock_conn()?;
        conn.execute(
            "INSERT INTO post_groups (title, slug, description) VALUES (?1, ?2, ?3)",
            params![title, slug, description],
        )?;
        Ok(Group {
            id: conn.last_insert_rowid(),
            title: title.to_string(),
            slug: slug.to_string(),
            description: description.to_string(),
        })
    }

    pub fn group_by_slug(&self, slug: &str) -> Result<Option<Group>> {
        let conn = self.lock_conn()?;
        Ok(conn
            .query_row(
                "SELECT id, title, slug, description FROM post_groups WHERE slug = ?1",
                params![slug],
                group_from_row,
            )
            .optional()?)
    }

    pub fn group_by_id(&self, id: i64) -> Result<Option<Group>> {
        let conn = self.lock_conn()?;
        Ok(conn
            .query_row(
                "SELECT id, title, slug, description FROM post_groups WHERE id = ?1",
                params![id],
                group_from_row,
            )
            .optional()?)
    }

    /// All groups ordered by title
    pub fn all_groups(&self) -> Result<Vec<Group>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare("SELECT id, title, slug, description FROM post_groups ORDER BY title")?;
        let groups = stmt.query_map([], group_from_row)?.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(groups)
    }

    // === Posts ===

    /// Insert a post and return its id
    pub fn create_post(&self, author_id: i64, text: &str, group_id: Option<i64>) -> Result<i64> {
        let conn = self.lock_conn()?;
        conn.execute(
            "INSERT INTO posts (text, pub_date, author_id, group_id) VALUES (?1, ?2, ?3, ?4)",
            params![text, timestamp(&Utc::now()), author_id, group_id],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Replace a post's text and group; `pub_date` and author stay
    pub fn update_post(&self, id: i64, text: &str, group_id: Option<i64>) -> Result<()> {
        let conn = self.lock_conn()?;
        let changed = conn.execute(
            "UPDATE posts SET text = ?1, group_id = ?2 WHERE id = ?3",
            params![text, group_id, id],
        )?;
        if changed == 0 {
            return Err(YatubeError::not_found(format!("post {}", id)));
        }
        Ok(())
    }

    pub fn post_by_id(&self, id: i64) -> Result<Option<Post>> {
        let conn = self.lock_conn()?;
        let sql = format!("{POST_SELECT} WHERE p.id = ?1");
        Ok(conn.query_row(&sql, params![id], post_from_row).optional()?)
    }

    pub fn count_posts(&self) -> Result<usize> {
        let conn = self.lock_conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM posts", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// A slice of all posts, newest first
    pub fn recent_posts(&self, offset: usize, limit: usize) -> Result<Vec<Post>> {
        let conn = self.lock_conn()?;
        let sql = format!("{POST_SELECT} {POST_ORDER} LIMIT ?1 OFFSET ?2");
        let mut stmt = conn.prepare(&sql)?;
        let posts = stmt
            .query_map(params![limit as i64, offset as i64], post_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(posts)
    }

    pub fn count_group_posts(&self, group_id: i64) -> Result<usize> {
        let conn = self.lock_conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM posts WHERE group_id = ?1",
            params![group_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// A slice of one group's posts, newest first
    pub fn group_posts(&self, group_id: i64, offset: usize, limit: usize) -> Result<Vec<Post>> {
        let conn = self.lock_conn()?;
        let sql = format!("{POST_SELECT} WHERE p.group_id = ?1 {POST_ORDER} LIMIT ?2 OFFSET ?3");
        let mut stmt = conn.prepare(&sql)?;
        let posts = stmt
            .query_map(params![group_id, limit as i64, offset as i64], post_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(posts)
    }

    pub fn count_author_posts(&self, author_id: i64) -> Result<usize> {
        let conn = self.lock_conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM posts WHERE author_id = ?1",
            params![author_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// A slice of one author's posts, newest first
    pub fn author_posts(&self, author_id: i64, offset: usize, limit: usize) -> Result<Vec<Post>> {
        let conn = self.lock_conn()?;
        let sql = format!("{POST_SELECT} WHERE p.author_id = ?1 {POST_ORDER} LIMIT ?2 OFFSET ?3");
        let mut stmt = conn.prepare(&sql)?;
        let posts = stmt
            .query_map(params![author_id, limit as i64, offset as i64], post_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(posts)
    }

    // === Sessions ===

    /// Open a session for `user_id` that lasts `ttl`
    pub fn create_session(&self, user_id: i64, ttl: Duration) -> Result<Session> {
        let conn = self.lock_conn()?;
        let session = Session {
            token: Uuid::new_v4().simple().to_string(),
            user_id,
            expires_at: Utc::now() + ttl,
        };
        conn.execute(
            "INSERT INTO sessions (token, user_id, expires_at) VALUES (?1, ?2, ?3)",
            params![session.token, session.user_id, timestamp(&session.expires_at)],
        )?;
        Ok(session)
    }

    /// The user behind a live session token
    pub fn session_user(&self, token: &str) -> Result<Option<User>> {
        let conn = self.lock_conn()?;
        let sql = r#"
            SELECT u.id, u.username, u.first_name, u.last_name, u.password, u.date_joined
            FROM sessions s JOIN users u ON u.id = s.user_id
            WHERE s.token = ?1 AND s.expires_at > ?2
        "#;
        Ok(conn
            .query_row(sql, params![token, timestamp(&Utc::now())], user_from_row)
            .optional()?)
    }

    pub fn delete_session(&self, token: &str) -> Result<()> {
        let conn = self.lock_conn()?;
        conn.execute("DELETE FROM sessions WHERE token = ?1", params![token])?;
        Ok(())
    }

    /// Drop expired sessions, returning how many went
    pub fn purge_expired_sessions(&self) -> Result<usize> {
        let conn = self.lock_conn()?;
        let removed = conn.execute(
            "DELETE FROM sessions WHERE expires_at <= ?1",
            params![timestamp(&Utc::now())],
        )?;
        Ok(removed)
    }

    /// Get database statistics
    pub fn stats(&self) -> Result<DbStats> {
        let conn = self.lock_conn()?;
        let count = |table: &str| -> rusqlite::Result<i64> {
            conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
        };
        Ok(DbStats {
            user_count: count("users")?,
            group_count: count("post_groups")?,
            post_count: count("posts")?,
            session_count: count("sessions")?,
        })
    }
}

/// Fixed-width UTC timestamps so text ordering matches time ordering
fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e)))
}

pub(crate) fn full_name(first_name: &str, last_name: &str, username: &str) -> String {
    let joined = format!("{} {}", first_name.trim(), last_name.trim());
    let joined = joined.trim();
    if joined.is_empty() {
        username.to_string()
    } else {
        joined.to_string()
    }
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    let username: String = row.get(1)?;
    let first_name: String = row.get(2)?;
    let last_name: String = row.get(3)?;
    Ok(User {
        id: row.get(0)?,
        full_name: full_name(&first_name, &last_name, &username),
        username,
        first_name,
        last_name,
        password_hash: row.get(4)?,
        date_joined: parse_timestamp(row, 5)?,
    })
}

fn group_from_row(row: &Row<'_>) -> rusqlite::Result<Group> {
    Ok(Group {
        id: row.get(0)?,
        title: row.get(1)?,
        slug: row.get(2)?,
        description: row.get(3)?,
    })
}

fn post_from_row(row: &Row<'_>) -> rusqlite::Result<Post> {
    let username: String = row.get(4)?;
    let first_name: String = row.get(5)?;
    let last_name: String = row.get(6)?;
    let group_id: Option<i64> = row.get(7)?;
    let group = match group_id {
        Some(id) => Some(GroupRef {
            id,
            slug: row.get(8)?,
            title: row.get(9)?,
        }),
        None => None,
    };

    Ok(Post {
        id: row.get(0)?,
        text: row.get(1)?,
        pub_date: parse_timestamp(row, 2)?,
        author: Author {
            id: row.get(3)?,
            full_name: full_name(&first_name, &last_name, &username),
            username,
        },
        group,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(db: &Database, username: &str) -> User {
        db.create_user(&NewUser {
            username,
            password_hash: "x",
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_create_and_fetch_post() {
        let db = Database::in_memory().unwrap();
        let author = user(&db, "leo");
        let group = db.create_group("Cats", "cats", "All about cats").unwrap();

        let id = db.create_post(author.id, "Hello there", Some(group.id)).unwrap();
        let post = db.post_by_id(id).unwrap().unwrap();

        assert_eq!(post.text, "Hello there");
        assert_eq!(post.author.username, "leo");
        assert_eq!(post.group.map(|g| g.slug), Some("cats".to_string()));
    }

    #[test]
    fn test_missing_records_are_none() {
        let db = Database::in_memory().unwrap();
        assert!(db.post_by_id(42).unwrap().is_none());
        assert!(db.group_by_slug("nope").unwrap().is_none());
        assert!(db.user_by_username("ghost").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_slug_rejected() {
        let db = Database::in_memory().unwrap();
        db.create_group("One", "same", "").unwrap();
        assert!(matches!(db.create_group("Two", "same", ""), Err(YatubeError::Database(_))));
    }

    #[test]
    fn test_duplicate_username_rejected() {
        let db = Database::in_memory().unwrap();
        user(&db, "leo");
        assert!(db
            .create_user(&NewUser { username: "leo", password_hash: "y", ..Default::default() })
            .is_err());
    }

    #[test]
    fn test_listings_are_newest_first_and_sliced() {
        let db = Database::in_memory().unwrap();
        let author = user(&db, "leo");
        let other = user(&db, "kim");
        let group = db.create_group("Cats", "cats", "").unwrap();
        for i in 0..5 {
            db.create_post(author.id, &format!("post {i}"), Some(group.id)).unwrap();
        }
        db.create_post(other.id, "ungrouped", None).unwrap();

        let all = db.recent_posts(0, 10).unwrap();
        assert_eq!(all.len(), 6);
        assert_eq!(all[0].text, "ungrouped");
        assert_eq!(all[1].text, "post 4");

        assert_eq!(db.count_group_posts(group.id).unwrap(), 5);
        let slice = db.group_posts(group.id, 3, 10).unwrap();
        assert_eq!(slice.iter().map(|p| p.text.as_str()).collect::<Vec<_>>(), ["post 1", "post 0"]);

        assert_eq!(db.count_author_posts(other.id).unwrap(), 1);
        assert_eq!(db.author_posts(author.id, 0, 2).unwrap().len(), 2);
    }

    #[test]
    fn test_update_post_keeps_pub_date() {
        let db = Database::in_memory().unwrap();
        let author = user(&db, "leo");
        let group = db.create_group("Cats", "cats", "").unwrap();
        let id = db.create_post(author.id, "before", Some(group.id)).unwrap();
        let before = db.post_by_id(id).unwrap().unwrap();

        db.update_post(id, "after", None).unwrap();
        let after = db.post_by_id(id).unwrap().unwrap();

        assert_eq!(after.text, "after");
        assert!(after.group.is_none());
        assert_eq!(after.pub_date, before.pub_date);
        assert!(matches!(db.update_post(999, "x", None), Err(YatubeError::NotFound(_))));
    }

    #[test]
    fn test_post_requires_existing_author() {
        let db = Database::in_memory().unwrap();
        assert!(db.create_post(77, "orphan", None).is_err());
    }

    #[test]
    fn test_sessions_expire() {
        let db = Database::in_memory().unwrap();
        let author = user(&db, "leo");

        let live = db.create_session(author.id, Duration::hours(1)).unwrap();
        let dead = db.create_session(author.id, Duration::hours(-1)).unwrap();

        assert_eq!(db.session_user(&live.token).unwrap().map(|u| u.id), Some(author.id));
        assert!(db.session_user(&dead.token).unwrap().is_none());
        assert_eq!(db.purge_expired_sessions().unwrap(), 1);

        db.delete_session(&live.token).unwrap();
        assert!(db.session_user(&live.token).unwrap().is_none());
        assert_eq!(db.stats().unwrap().session_count, 0);
    }

    #[test]
    fn test_full_name_falls_back_to_username() {
        assert_eq!(full_name("Leo", "Tolstoy", "leo"), "Leo Tolstoy");
        assert_eq!(full_name("", " ", "leo"), "leo");
        assert_eq!(full_name("Leo", "", "leo"), "Leo");
    }
}
