//! Configuration system for the `MarketChat` client.
//!
//! Supports layered configuration with the following priority (highest first):
//! 1. CLI arguments
//! 2. Environment variables (via clap `env` attribute)
//! 3. TOML config file (`~/.config/marketchat/config.toml`)
//! 4. Compiled defaults
//!
//! Missing config file is not an error (defaults are used). An explicit
//! `--config` path that doesn't exist is an error.

use std::path::PathBuf;
use std::time::Duration;

use marketchat_proto::model::{ProductId, RoomId, User, UserId};

use crate::catalog::WishlistPolicy;
use crate::chat::refresh::DEFAULT_POLL_INTERVAL;
use crate::identity::{Credential, IdentityContext};

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse the TOML configuration.
    #[error("failed to parse config file: {0}")]
    ParseToml(#[from] toml::de::Error),

    /// No signed-in identity was configured.
    #[error("missing {0}; pass it on the command line or set it under [identity]")]
    MissingIdentity(&'static str),
}

// ---------------------------------------------------------------------------
// TOML file structs (all fields Option for partial overrides)
// ---------------------------------------------------------------------------

/// Top-level TOML config file structure.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ConfigFile {
    server: ServerFileConfig,
    identity: IdentityFileConfig,
    chat: ChatFileConfig,
    catalog: CatalogFileConfig,
    ui: UiFileConfig,
}

/// `[server]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ServerFileConfig {
    url: Option<String>,
    request_timeout_secs: Option<u64>,
}

/// `[identity]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct IdentityFileConfig {
    user_id: Option<u64>,
    display_name: Option<String>,
    token: Option<String>,
}

/// `[chat]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ChatFileConfig {
    poll_interval_ms: Option<u64>,
}

/// `[catalog]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct CatalogFileConfig {
    wishlist_policy: Option<WishlistPolicy>,
}

/// `[ui]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct UiFileConfig {
    timestamp_format: Option<String>,
}

// ---------------------------------------------------------------------------
// Resolved configuration (concrete types, all fields populated)
// ---------------------------------------------------------------------------

/// Fully resolved client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    // -- Server --
    /// Backend base URL.
    pub server_url: String,
    /// Per-request timeout.
    pub request_timeout: Duration,

    // -- Identity --
    /// Signed-in user id.
    pub user_id: Option<u64>,
    /// Signed-in user's display name.
    pub display_name: Option<String>,
    /// Bearer token.
    pub token: Option<String>,

    // -- Chat --
    /// Period between background message fetches.
    pub poll_interval: Duration,

    // -- Catalog --
    /// When the wishlist flag changes on screen.
    pub wishlist_policy: WishlistPolicy,

    // -- UI --
    /// Timestamp display format string (chrono).
    pub timestamp_format: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:5000".to_string(),
            request_timeout: Duration::from_secs(10),
            user_id: None,
            display_name: None,
            token: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            wishlist_policy: WishlistPolicy::Confirm,
            timestamp_format: "%H:%M".to_string(),
        }
    }
}

impl ClientConfig {
    /// Load configuration by merging CLI args, env vars, and a TOML file.
    ///
    /// If `--config` is given and the file does not exist, returns an
    /// error. If no `--config` is given, the default path
    /// (`~/.config/marketchat/config.toml`) is tried and silently ignored
    /// if missing.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the explicit config file cannot be read
    /// or parsed.
    pub fn load(cli: &CliArgs) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref())?;
        Ok(Self::resolve(cli, file))
    }

    /// Resolve a `ClientConfig` from CLI args and a parsed config file.
    ///
    /// Priority: CLI > file > default.
    fn resolve(cli: &CliArgs, file: ConfigFile) -> Self {
        let defaults = Self::default();

        Self {
            server_url: cli
                .server_url
                .clone()
                .or(file.server.url)
                .unwrap_or(defaults.server_url),
            request_timeout: file
                .server
                .request_timeout_secs
                .map_or(defaults.request_timeout, Duration::from_secs),
            user_id: cli.user_id.or(file.identity.user_id),
            display_name: cli.display_name.clone().or(file.identity.display_name),
            token: cli.token.clone().or(file.identity.token),
            poll_interval: cli
                .poll_interval_ms
                .or(file.chat.poll_interval_ms)
                .map_or(defaults.poll_interval, Duration::from_millis),
            wishlist_policy: file
                .catalog
                .wishlist_policy
                .unwrap_or(defaults.wishlist_policy),
            timestamp_format: cli
                .timestamp_format
                .clone()
                .or(file.ui.timestamp_format)
                .unwrap_or(defaults.timestamp_format),
        }
    }

    /// Build the [`IdentityContext`] for the configured user.
    ///
    /// The display name defaults to `user-<id>` when not configured.
    ///
    /// # Errors
    ///
    /// [`ConfigError::MissingIdentity`] if the user id or token is absent.
    pub fn identity(&self) -> Result<IdentityContext, ConfigError> {
        let id = self
            .user_id
            .ok_or(ConfigError::MissingIdentity("user id (--user-id)"))?;
        let token = self
            .token
            .clone()
            .ok_or(ConfigError::MissingIdentity("token (--token)"))?;
        let name = self
            .display_name
            .clone()
            .unwrap_or_else(|| format!("user-{id}"));
        Ok(IdentityContext::new(
            User::new(UserId::new(id), name),
            Credential::bearer(token),
        ))
    }
}

/// CLI arguments parsed by clap.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "Marketplace listings, wishlist and buyer-seller chat")]
pub struct CliArgs {
    /// Backend base URL.
    #[arg(long, env = "MARKETCHAT_URL")]
    pub server_url: Option<String>,

    /// Your account id.
    #[arg(long, env = "MARKETCHAT_USER_ID")]
    pub user_id: Option<u64>,

    /// Your display name.
    #[arg(long, env = "MARKETCHAT_DISPLAY_NAME")]
    pub display_name: Option<String>,

    /// Bearer token for your account.
    #[arg(long, env = "MARKETCHAT_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Path to config file (default: `~/.config/marketchat/config.toml`).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Milliseconds between message refreshes in an open chat.
    #[arg(long)]
    pub poll_interval_ms: Option<u64>,

    /// Timestamp display format (chrono format string).
    #[arg(long)]
    pub timestamp_format: Option<String>,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "MARKETCHAT_LOG")]
    pub log_level: String,

    /// Log file path (default: `<tmp>/marketchat.log`).
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// What to do.
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Client subcommands.
#[derive(clap::Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// List all products with the actions available to you.
    Products,
    /// List your own listings.
    Mine,
    /// List your wishlist.
    Wishes,
    /// Toggle a product on or off your wishlist.
    Wish {
        /// Product id.
        product: ProductId,
    },
    /// List a product for sale.
    Sell {
        /// Title.
        name: String,
        /// Asking price.
        price: u64,
        /// Optional description.
        #[arg(long)]
        description: Option<String>,
    },
    /// Mark one of your listings sold out.
    SoldOut {
        /// Product id.
        product: ProductId,
    },
    /// Put one of your listings back on sale.
    OnSale {
        /// Product id.
        product: ProductId,
    },
    /// Delete one of your listings.
    Delete {
        /// Product id.
        product: ProductId,
    },
    /// List your chat rooms.
    Rooms,
    /// Open an interactive chat.
    Chat {
        /// Start (or resume) the chat about this product.
        #[arg(long, conflicts_with = "room")]
        product: Option<ProductId>,
        /// Open this room from your room list.
        #[arg(long)]
        room: Option<RoomId>,
    },
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Load and parse a TOML config file.
///
/// If `explicit_path` is `Some`, the file must exist. Otherwise, the
/// default path is tried and a missing file returns defaults.
fn load_config_file(explicit_path: Option<&std::path::Path>) -> Result<ConfigFile, ConfigError> {
    let (path, required) = match explicit_path {
        Some(p) => (p.to_path_buf(), true),
        None => match dirs::config_dir() {
            Some(dir) => (dir.join("marketchat").join("config.toml"), false),
            None => return Ok(ConfigFile::default()),
        },
    };

    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if !required && e.kind() == std::io::ErrorKind::NotFound => {
            Ok(ConfigFile::default())
        }
        Err(source) => Err(ConfigError::ReadFile { path, source }),
    }
}
