//! Gatehouse server command-line interface.
//!
//! The subcommands replay parts of the OAuth2 flow by hand, for debugging an
//! application's credentials and redirect outside of the browser.

use std::path::PathBuf;

use anyhow::Error;

use clap::{Parser, Subcommand};

use figment::Figment;

use gatehouse_model::oauth::AuthorizeUrl;

use rand::distr::{Alphanumeric, SampleString as _};

use serde::Deserialize;

use crate::config::{Config, DiscordConfig, OAuthConfig, ServerConfig};
use crate::discord::Client;
use crate::dump::Dump;

/// The length of the `state` generated for authorize URLs.
pub const STATE_LENGTH: usize = 16;

/// The command line arguments.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Subcommands.
    ///
    /// The server is started if none is given.
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Operational commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    Exchange(Exchange),
    AuthorizeUrl(AuthorizeUrlArgs),
    CheckConfig,
}

/// Exchanges an authorization code and prints Discord's raw answer.
#[derive(clap::Args, Debug)]
pub struct Exchange {
    /// The authorization code from the callback URL.
    pub code: String,
}

/// Prints an authorize URL to get a fresh authorization code with.
#[derive(clap::Args, Debug)]
pub struct AuthorizeUrlArgs {
    /// Uses this `state` instead of a random one.
    #[arg(short, long)]
    pub state: Option<String>,
}

/// What `exchange` reads from the config.
///
/// Neither the bot token nor the guild is needed to exchange a code.
#[derive(Deserialize, Debug)]
struct ExchangeConfig {
    #[serde(default)]
    server: ServerConfig,
    discord: OAuthConfig,
}

/// Runs a command.
pub async fn run_command(command: &Command, figment: &Figment) -> Result<(), Error> {
    match command {
        Command::Exchange(command) => exchange(command, &figment.extract()?).await,
        Command::AuthorizeUrl(command) => {
            authorize_url(command, &figment.extract_inner("discord")?);
            Ok(())
        }
        Command::CheckConfig => check_config(figment),
    }
}

async fn exchange(command: &Exchange, config: &ExchangeConfig) -> Result<(), Error> {
    let code = command.code.trim();
    let prefix = code.chars().take(10).collect::<String>();

    println!("code: {}... ({} chars)", prefix, code.chars().count());

    let client = Client::oauth(&config.discord)?;
    let res = client.exchange_code(code).raw().await?;

    let status = res.status();
    println!("status: {}", status);

    println!("headers:");
    for (name, value) in res.headers() {
        println!("  {}: {}", name, value.to_str().unwrap_or("<binary>"));
    }

    let body = res.bytes().await?;

    if let Some(dir) = config.server.dump_dir.as_ref() {
        let dump = Dump::open(dir).await?;
        dump.write("token", status, &body).await;
    }

    match serde_json::from_slice::<serde_json::Value>(&body) {
        Ok(mut json) => {
            if status.is_success() {
                crate::dump::redact(&mut json);
            }
            println!("body: {}", serde_json::to_string_pretty(&json)?);
        }
        Err(_) => println!("body: {}", String::from_utf8_lossy(&body)),
    }

    if status.is_success() {
        println!("token exchange successful");
        Ok(())
    } else {
        Err(Error::msg(format!("token exchange failed with {}", status)))
    }
}

fn authorize_url(command: &AuthorizeUrlArgs, config: &DiscordConfig) {
    let state = command
        .state
        .clone()
        .unwrap_or_else(|| Alphanumeric.sample_string(&mut rand::rng(), STATE_LENGTH));

    let url = AuthorizeUrl::new(config.client_id.to_string(), &config.redirect_uri)
        .base(&config.authorize_base)
        .scopes(&config.scopes)
        .state(&state);

    println!("{}", url);
    println!("state: {}", state);
}

/// The settings a verification cannot run without.
const REQUIRED: [(&str, &str); 5] = [
    ("client id", "discord.client_id"),
    ("client secret", "discord.client_secret"),
    ("bot token", "discord.bot_token"),
    ("guild id", "discord.guild_id"),
    ("role id", "discord.role_id"),
];

fn check_config(figment: &Figment) -> Result<(), Error> {
    let mut missing = 0;

    for (name, key) in REQUIRED {
        let set = figment
            .find_value(key)
            .map(|value| value.as_str().map(|s| !s.trim().is_empty()).unwrap_or(true))
            .unwrap_or(false);

        if !set {
            missing += 1;
        }

        println!("{}: {}", name, if set { "set" } else { "missing" });
    }

    match figment.find_value("discord.redirect_uri") {
        Ok(value) => println!("redirect uri: {}", value.as_str().unwrap_or("<not a string>")),
        Err(_) => {
            missing += 1;
            println!("redirect uri: missing");
        }
    }

    if missing > 0 {
        return Err(Error::msg(format!("{} required settings missing", missing)));
    }

    // catch malformed values too
    let config = figment.extract::<Config>()?;
    println!("port: {}", config.server.port);
    println!("scopes: {}", config.discord.scopes.join(" "));

    Ok(())
}
