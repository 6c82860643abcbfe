//! Configuration types.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;
use crate::pipeline::menu::MenuConfig;

/// Which transport the binary wires up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    WhatsApp,
    Cli,
}

impl std::str::FromStr for ChannelKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "whatsapp" => Ok(Self::WhatsApp),
            "cli" => Ok(Self::Cli),
            other => Err(ConfigError::InvalidValue {
                key: "BOT_CHANNEL".to_string(),
                message: format!("unknown channel '{other}' (expected 'whatsapp' or 'cli')"),
            }),
        }
    }
}

impl std::fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WhatsApp => write!(f, "whatsapp"),
            Self::Cli => write!(f, "cli"),
        }
    }
}

/// Runtime configuration for the responder binary.
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Name shown on the liveness banner.
    pub name: String,
    /// Path of the JSON contact store.
    pub data_file: PathBuf,
    /// Port for the liveness routes and the bridge webhook.
    pub http_port: u16,
    /// Selected transport.
    pub channel: ChannelKind,
    /// Pause before and after each typing indicator.
    pub typing_delay: Duration,
    /// Optional JSON menu table; the built-in menu is used when unset.
    pub menu_path: Option<PathBuf>,
    /// Optional directory for daily-rolling log files.
    pub log_dir: Option<PathBuf>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            name: "DeBocaOnBoca".to_string(),
            data_file: PathBuf::from("data.json"),
            http_port: 3000,
            channel: ChannelKind::WhatsApp,
            typing_delay: Duration::from_millis(500),
            menu_path: None,
            log_dir: None,
        }
    }
}

impl BotConfig {
    /// Build config from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup (environment in production).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let name = lookup("BOT_NAME")
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(defaults.name);

        let data_file = lookup("BOT_DATA_FILE")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.data_file);

        let http_port = match lookup("BOT_HTTP_PORT") {
            Some(raw) => parse_number::<u16>("BOT_HTTP_PORT", &raw)?,
            None => defaults.http_port,
        };

        let channel = match lookup("BOT_CHANNEL") {
            Some(raw) => raw.parse()?,
            None => defaults.channel,
        };

        let typing_delay = match lookup("BOT_TYPING_DELAY_MS") {
            Some(raw) => Duration::from_millis(parse_number::<u64>("BOT_TYPING_DELAY_MS", &raw)?),
            None => defaults.typing_delay,
        };

        let menu_path = lookup("MENU_CONFIG_PATH")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);

        let log_dir = lookup("BOT_LOG_DIR")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            name,
            data_file,
            http_port,
            channel,
            typing_delay,
            menu_path,
            log_dir,
        })
    }

    /// Load the menu table named by `menu_path`, or the built-in one.
    pub fn load_menu(&self) -> Result<MenuConfig, ConfigError> {
        match &self.menu_path {
            Some(path) => load_menu_file(path),
            None => Ok(MenuConfig::default()),
        }
    }
}

/// Read and validate a JSON menu table from disk.
pub fn load_menu_file(path: &Path) -> Result<MenuConfig, ConfigError> {
    let raw = std::fs::read_to_string(path)?;
    let menu: MenuConfig = serde_json::from_str(&raw)
        .map_err(|e| ConfigError::ParseError(format!("{}: {e}", path.display())))?;
    menu.validate()?;
    Ok(menu)
}

pub(crate) fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("'{raw}': {e}"),
    })
}
