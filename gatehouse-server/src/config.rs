//! Server configuration options.

use std::fmt::{self, Debug, Formatter};
use std::path::{Path, PathBuf};

use derive_more::Deref;

use figment::{
    Figment,
    providers::{Env, Format as _, Toml},
    value::Uncased,
};
use serde::{Deserialize, Serialize};

use gatehouse_model::{Id, oauth::DEFAULT_AUTHORIZE_BASE};

/// The default port the server is hosted on.
pub const DEFAULT_PORT: u16 = 3000;

/// The default Discord REST API base.
pub const DEFAULT_API_BASE: &str = "https://discord.com/api/v10";

/// Bare environment variables accepted in place of their prefixed
/// counterparts.
const ENV_ALIASES: [(&str, &str); 8] = [
    ("PORT", "SERVER.PORT"),
    ("DATABASE_URL", "SERVER.DATABASE_URL"),
    ("DISCORD_CLIENT_ID", "DISCORD.CLIENT_ID"),
    ("DISCORD_CLIENT_SECRET", "DISCORD.CLIENT_SECRET"),
    ("DISCORD_BOT_TOKEN", "DISCORD.BOT_TOKEN"),
    ("REDIRECT_URI", "DISCORD.REDIRECT_URI"),
    ("GUILD_ID", "DISCORD.GUILD_ID"),
    ("VERIFIED_ROLE_ID", "DISCORD.ROLE_ID"),
];

/// Server configuration.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    pub discord: DiscordConfig,
}

impl Config {
    /// Reads the config from the environment and a given config path.
    pub fn load(config_path: impl AsRef<Path>) -> Result<Config, figment::Error> {
        Config::figment(config_path).extract()
    }

    /// The layered config sources, lowest priority first.
    pub fn figment(config_path: impl AsRef<Path>) -> Figment {
        let aliases = ENV_ALIASES.map(|(from, _)| from);

        Figment::new()
            .merge(Toml::file(config_path))
            .merge(Env::prefixed("GATEHOUSE_").split("__"))
            .merge(Env::raw().only(&aliases).map(|k| {
                ENV_ALIASES
                    .iter()
                    .find(|(from, _)| k == *from)
                    .map(|(_, to)| Uncased::from(*to))
                    .unwrap_or_else(|| k.into())
            }))
    }
}

/// HTTP server settings.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct ServerConfig {
    /// The port the server is binded to.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Where verified users are recorded.
    ///
    /// Persistence is skipped entirely if this is not set.
    #[serde(default)]
    pub database_url: Option<String>,
    /// Directory raw Discord responses are written to for debugging.
    ///
    /// Nothing is dumped if this is not set.
    #[serde(default)]
    pub dump_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            port: DEFAULT_PORT,
            database_url: None,
            dump_dir: None,
        }
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

/// Discord application and verification settings.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct DiscordConfig {
    /// The OAuth2 application id.
    pub client_id: Id,
    /// The OAuth2 application secret.
    pub client_secret: Secret,
    /// The bot token used for privileged guild member calls.
    pub bot_token: Secret,
    /// Must match one of the application's registered redirects exactly.
    pub redirect_uri: String,
    /// The guild users are verified into.
    pub guild_id: Id,
    /// The role granted to verified users.
    pub role_id: Id,
    /// The scopes requested from users.
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,
    /// The REST API base, without a trailing slash.
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// The user-facing authorization page.
    #[serde(default = "default_authorize_base")]
    pub authorize_base: String,
    /// Whether the role is assigned even if the member already holds it.
    #[serde(default)]
    pub always_assign_role: bool,
}

impl DiscordConfig {
    /// The OAuth2 application settings alone.
    pub fn oauth(&self) -> OAuthConfig {
        OAuthConfig {
            client_id: self.client_id,
            client_secret: self.client_secret.clone(),
            redirect_uri: self.redirect_uri.clone(),
            scopes: self.scopes.clone(),
            api_base: self.api_base.clone(),
        }
    }
}

/// The subset of [`DiscordConfig`] a code exchange needs.
///
/// Read from the same `discord` table, so a config without a bot or guild
/// still exchanges codes.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct OAuthConfig {
    pub client_id: Id,
    pub client_secret: Secret,
    pub redirect_uri: String,
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

fn default_scopes() -> Vec<String> {
    ["identify", "guilds", "guilds.members.read"]
        .map(String::from)
        .to_vec()
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.into()
}

fn default_authorize_base() -> String {
    DEFAULT_AUTHORIZE_BASE.into()
}

/// A configuration value that must never end up in logs.
#[derive(Clone, Deserialize, Serialize, PartialEq, Eq, Deref)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    /// Creates a new `Secret`.
    pub fn new(secret: impl Into<String>) -> Secret {
        Secret(secret.into())
    }
}

impl Debug for Secret {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(..)")
    }
}
