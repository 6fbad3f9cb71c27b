//! Bot configuration.

use std::fmt::{self, Debug, Formatter};
use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format as _, Toml},
    value::Uncased,
};
use serde::{Deserialize, Deserializer, de::Error as _};

use gatehouse_model::oauth::{AuthorizeUrl, DEFAULT_AUTHORIZE_BASE};

use twilight_model::id::{Id, marker::GuildMarker};

/// Bare environment variables shared with the server.
const ENV_ALIASES: [(&str, &str); 4] = [
    ("DISCORD_BOT_TOKEN", "GENERAL.DISCORD_TOKEN"),
    ("DISCORD_CLIENT_ID", "OAUTH.CLIENT_ID"),
    ("REDIRECT_URI", "OAUTH.REDIRECT_URI"),
    ("GUILD_ID", "OAUTH.GUILD_ID"),
];

/// The main configuration struct.
#[derive(Deserialize, Debug, Clone)]
pub struct Config {
    pub general: GeneralConfig,
    /// The OAuth2 application users are sent to.
    pub oauth: OAuthConfig,
    /// The verification notice's text.
    #[serde(default)]
    pub notice: NoticeConfig,
}

impl Config {
    /// Loads a config from the environment and a given config path.
    pub fn load(config_path: impl AsRef<Path>) -> Result<Config, figment::Error> {
        let aliases = ENV_ALIASES.map(|(from, _)| from);

        Figment::new()
            .merge(Toml::file(config_path))
            .merge(Env::prefixed("GATEHOUSE_BOT_").split("__"))
            .merge(Env::raw().only(&aliases).map(|k| {
                ENV_ALIASES
                    .iter()
                    .find(|(from, _)| k == *from)
                    .map(|(_, to)| Uncased::from(*to))
                    .unwrap_or_else(|| k.into())
            }))
            .extract()
    }

    /// The URL the verification button links to.
    pub fn authorize_url(&self) -> AuthorizeUrl {
        AuthorizeUrl::new(self.oauth.client_id.to_string(), &self.oauth.redirect_uri)
            .base(&self.oauth.authorize_base)
            .scopes(&self.oauth.scopes)
    }
}

/// General bot settings.
#[derive(Deserialize, Clone)]
pub struct GeneralConfig {
    /// The token the bot uses.
    pub discord_token: String,
    /// The default color of embeds.
    #[serde(default = "default_embed_color", deserialize_with = "deser_hex_color")]
    pub embed_color: u32,
}

impl Debug for GeneralConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneralConfig")
            .field("embed_color", &format_args!("#{:06x}", self.embed_color))
            .finish_non_exhaustive()
    }
}

fn default_embed_color() -> u32 {
    0x0099ff
}

/// The OAuth2 application and guild.
#[derive(Deserialize, Debug, Clone)]
pub struct OAuthConfig {
    pub client_id: gatehouse_model::Id,
    /// Where Discord sends users after they authorize.
    pub redirect_uri: String,
    /// The guild commands are registered in.
    pub guild_id: gatehouse_model::Id,
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,
    #[serde(default = "default_authorize_base")]
    pub authorize_base: String,
}

impl OAuthConfig {
    /// The guild id, as twilight wants it.
    pub fn guild_id(&self) -> Id<GuildMarker> {
        Id::from(*self.guild_id)
    }
}

fn default_scopes() -> Vec<String> {
    vec!["identify".into(), "guilds.members.read".into()]
}

fn default_authorize_base() -> String {
    DEFAULT_AUTHORIZE_BASE.into()
}

/// Text of the verification notice.
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct NoticeConfig {
    pub title: String,
    pub description: String,
    pub button_label: String,
}

impl Default for NoticeConfig {
    fn default() -> Self {
        NoticeConfig {
            title: "Discord Verification".into(),
            description: "Click the button below to verify your identity and receive a role."
                .into(),
            button_label: "Verify with Discord".into(),
        }
    }
}

fn deser_hex_color<'de, D>(deser: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let color = String::deserialize(deser)?;
    let color = color.strip_prefix("#").unwrap_or(&color);
    u32::from_str_radix(color, 16).map_err(D::Error::custom)
}
