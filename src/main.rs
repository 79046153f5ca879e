// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Yatube: a small blog platform
//!
//! Runs the web server and provides admin commands for users, groups and
//! the database.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;

use yatube::auth::hash_password;
use yatube::config::AppConfig;
use yatube::db::{Database, NewUser};
use yatube::forms::valid_username;
use yatube::{Result, YatubeError};

/// Yatube CLI - blog server and administration
#[derive(Parser, Debug)]
#[command(name = "yatube")]
#[command(author = "Jonathan D. A. Jewell <hyperpolymath>")]
#[command(version)]
#[command(about = "Small blog platform with groups and author profiles", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (JSON format)
    #[arg(short, long, default_value = "config.json", global = true)]
    config: PathBuf,

    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable trace logging (most verbose)
    #[arg(long, global = true)]
    trace: bool,

    /// Suppress non-essential output (quiet mode)
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the web server
    Serve {
        /// Host to bind to
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// User management
    User {
        #[command(subcommand)]
        action: UserCommands,
    },

    /// Group management
    Group {
        #[command(subcommand)]
        action: GroupCommands,
    },

    /// Database operations
    Db {
        #[command(subcommand)]
        action: DbCommands,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },

    /// Write a default configuration file
    Init {
        /// Directory to initialize (default: current)
        path: Option<PathBuf>,

        /// Force overwrite existing configuration
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand, Debug)]
enum UserCommands {
    /// Register a user
    Create {
        username: String,

        #[arg(long)]
        password: String,

        #[arg(long, default_value = "")]
        first_name: String,

        #[arg(long, default_value = "")]
        last_name: String,
    },
}

#[derive(Subcommand, Debug)]
enum GroupCommands {
    /// Add a group
    Create {
        title: String,

        /// URL slug, letters, digits, `-` and `_`
        slug: String,

        #[arg(short, long, default_value = "")]
        description: String,
    },

    /// List all groups
    List,
}

#[derive(Subcommand, Debug)]
enum DbCommands {
    /// Show database statistics
    Stats,

    /// Delete expired login sessions
    PurgeSessions,
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Generate default configuration file
    Generate {
        /// Output file path
        #[arg(short, long, default_value = "config.json")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config = AppConfig::load(&cli.config)?;

    match cli.command {
        Some(Commands::Serve { host, port }) => run_serve(config, host, port).await,
        Some(Commands::User { action }) => run_user_command(config, action),
        Some(Commands::Group { action }) => run_group_command(config, action),
        Some(Commands::Db { action }) => run_db_command(config, action),
        Some(Commands::Config { action }) => run_config_command(config, action),
        Some(Commands::Init { path, force }) => run_init(path, force),
        None => run_serve(config, None, None).await,
    }
}

/// Run the web server
async fn run_serve(mut config: AppConfig, host: Option<String>, port: Option<u16>) -> Result<()> {
    if let Some(host) = host {
        config.web.host = host;
    }
    if let Some(port) = port {
        config.web.port = port;
    }

    info!("Yatube v{}", env!("CARGO_PKG_VERSION"));
    let db = Database::open(&config.database.path)?;
    info!("Database: {}", config.database.path);

    let purged = db.purge_expired_sessions()?;
    if purged > 0 {
        info!("Purged {} expired sessions", purged);
    }

    yatube::web::start_server(config, db).await
}

fn run_user_command(config: AppConfig, action: UserCommands) -> Result<()> {
    let db = Database::open(&config.database.path)?;

    match action {
        UserCommands::Create { username, password, first_name, last_name } => {
            if !valid_username(&username) {
                return Err(YatubeError::Config(format!("Invalid username: {:?}", username)));
            }
            if db.user_by_username(&username)?.is_some() {
                return Err(YatubeError::Config(format!("User {} already exists", username)));
            }
            let password_hash = hash_password(&password)?;
            let user = db.create_user(&NewUser {
                username: &username,
                first_name: &first_name,
                last_name: &last_name,
                password_hash: &password_hash,
            })?;
            println!("Created user {} (id {})", user.username, user.id);
        }
    }

    Ok(())
}

fn run_group_command(config: AppConfig, action: GroupCommands) -> Result<()> {
    let db = Database::open(&config.database.path)?;

    match action {
        GroupCommands::Create { title, slug, description } => {
            if !valid_slug(&slug) {
                return Err(YatubeError::Config(format!("Invalid slug: {:?}", slug)));
            }
            if title.trim().is_empty() || title.chars().count() > 200 {
                return Err(YatubeError::Config("Group title must be 1-200 characters".to_string()));
            }
            if db.group_by_slug(&slug)?.is_some() {
                return Err(YatubeError::Config(format!("Group {} already exists", slug)));
            }
            let group = db.create_group(title.trim(), &slug, &description)?;
            println!("Created group {} at /group/{}/", group.title, group.slug);
        }
        GroupCommands::List => {
            let groups = db.all_groups()?;
            println!("Groups:");
            for group in groups {
                let count = db.count_group_posts(group.id)?;
                println!("  {} - {} ({} posts)", group.slug, group.title, count);
            }
        }
    }

    Ok(())
}

fn run_db_command(config: AppConfig, action: DbCommands) -> Result<()> {
    let db = Database::open(&config.database.path)?;

    match action {
        DbCommands::Stats => {
            let stats = db.stats()?;
            println!("Database Statistics:");
            println!("  Users: {}", stats.user_count);
            println!("  Groups: {}", stats.group_count);
            println!("  Posts: {}", stats.post_count);
            println!("  Sessions: {}", stats.session_count);
        }
        DbCommands::PurgeSessions => {
            let removed = db.purge_expired_sessions()?;
            println!("Removed {} expired sessions", removed);
        }
    }

    Ok(())
}

fn run_config_command(config: AppConfig, action: ConfigCommands) -> Result<()> {
    match action {
        ConfigCommands::Show => {
            let json = serde_json::to_string_pretty(&config)?;
            println!("{}", json);
        }
        ConfigCommands::Generate { output } => {
            AppConfig::default().save(&output)?;
            println!("Generated config at {:?}", output);
        }
    }

    Ok(())
}

/// Write a default config.json into `dir`
fn run_init(dir: Option<PathBuf>, force: bool) -> Result<()> {
    let target = dir.unwrap_or_else(|| PathBuf::from("."));
    let config_path = target.join("config.json");

    if config_path.exists() && !force {
        return Err(YatubeError::Config(
            "config.json already exists. Use --force to overwrite".to_string(),
        ));
    }

    std::fs::create_dir_all(&target)?;
    AppConfig::default().save(&config_path)?;
    print_next_steps(&target);

    Ok(())
}

fn print_next_steps(target: &Path) {
    println!("Yatube initialized in {:?}", target);
    println!("\nNext steps:");
    println!("  1. Create a group: yatube group create \"Cats\" cats");
    println!("  2. Create a user:  yatube user create leo --password ...");
    println!("  3. Start server:   yatube serve");
}

/// `[-a-zA-Z0-9_]+`
fn valid_slug(slug: &str) -> bool {
    !slug.is_empty() && slug.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::try_parse_from(["yatube"]).unwrap();
        assert!(!cli.verbose);
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_cli_serve_command() {
        let cli = Cli::try_parse_from(["yatube", "serve", "--port", "9000", "-H", "0.0.0.0"]).unwrap();

        match cli.command {
            Some(Commands::Serve { host, port }) => {
                assert_eq!(host.as_deref(), Some("0.0.0.0"));
                assert_eq!(port, Some(9000));
            }
            _ => panic!("Expected Serve command"),
        }
    }

    #[test]
    fn test_cli_group_create_command() {
        let cli = Cli::try_parse_from([
            "yatube", "group", "create", "Cats", "cats", "--description", "All about cats",
        ])
        .unwrap();

        match cli.command {
            Some(Commands::Group { action: GroupCommands::Create { title, slug, description } }) => {
                assert_eq!(title, "Cats");
                assert_eq!(slug, "cats");
                assert_eq!(description, "All about cats");
            }
            _ => panic!("Expected Group Create command"),
        }
    }

    #[test]
    fn test_cli_user_requires_password() {
        assert!(Cli::try_parse_from(["yatube", "user", "create", "leo"]).is_err());
    }

    #[test]
    fn test_slug_validation() {
        assert!(valid_slug("test-slug_2"));
        assert!(!valid_slug(""));
        assert!(!valid_slug("with space"));
        assert!(!valid_slug("кошки"));
    }

    #[test]
    fn test_cli_init_takes_positional_path() {
        let cli = Cli::try_parse_from(["yatube", "init", "site", "--force"]).unwrap();
        match cli.command {
            Some(Commands::Init { path, force }) => {
                assert_eq!(path, Some(PathBuf::from("site")));
                assert!(force);
            }
            _ => panic!("Expected Init command"),
        }

        let cli = Cli::try_parse_from(["yatube", "init"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Init { path: None, force: false })));
        assert!(Cli::try_parse_from(["yatube", "init", "--dir", "site"]).is_err());
    }

    #[test]
    fn test_init_refuses_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        run_init(Some(dir.path().to_path_buf()), false).unwrap();
        assert!(dir.path().join("config.json").exists());
        assert!(run_init(Some(dir.path().to_path_buf()), false).is_err());
        assert!(run_init(Some(dir.path().to_path_buf()), true).is_ok());
    }
}
