//! Discord API client.

use std::sync::Arc;

use anyhow::Error;

use axum::body::Bytes;

use http::{HeaderValue, Method, header};

use gatehouse_model::{Id, oauth::TokenResponse};

use serde::Serialize;

use crate::config::{DiscordConfig, OAuthConfig, Secret};
use crate::discord::UpstreamError;
use crate::discord::request::{
    guild::{AddGuildMemberRole, GetGuildMember},
    oauth::ExchangeCode,
    user::{GetCurrentUser, GetCurrentUserGuilds},
};
use crate::dump::Dump;

/// The user agent Discord sees on every request.
pub const USER_AGENT: &str = concat!(
    "DiscordBot (gatehouse, ",
    env!("CARGO_PKG_VERSION"),
    ")"
);

/// A client used to access Discord's OAuth2 and REST APIs.
///
/// Cheaply cloneable, as it uses an `Arc` to track internal state and manage
/// connections.
#[derive(Clone, Debug)]
pub struct Client {
    http: reqwest::Client,
    state: Arc<ClientState>,
    bot_authorization: Option<HeaderValue>,
    dump: Option<Dump>,
}

#[derive(Debug)]
pub(crate) struct ClientState {
    pub api_base: String,
    pub client_id: Id,
    pub client_secret: Secret,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
}

impl Client {
    /// Creates a new client that can act as both the application and the
    /// bot.
    pub fn new(config: &DiscordConfig) -> Result<Client, Error> {
        Client::oauth(&config.oauth())?.with_bot_token(&config.bot_token)
    }

    /// Creates a new client that can only act as the application.
    ///
    /// Requests made as the bot fail with [`UpstreamError::MissingBotToken`].
    pub fn oauth(config: &OAuthConfig) -> Result<Client, Error> {
        let http = reqwest::Client::builder()
            .use_rustls_tls()
            .user_agent(USER_AGENT)
            .build()?;

        let state = ClientState {
            api_base: config.api_base.trim_end_matches('/').to_owned(),
            client_id: config.client_id,
            client_secret: config.client_secret.clone(),
            redirect_uri: config.redirect_uri.clone(),
            scopes: config.scopes.clone(),
        };

        Ok(Client {
            http,
            state: Arc::new(state),
            bot_authorization: None,
            dump: None,
        })
    }

    /// Authorizes bot requests with `token`.
    pub fn with_bot_token(self, token: &Secret) -> Result<Client, Error> {
        let mut bot_authorization = HeaderValue::from_str(&format!("Bot {}", &**token))
            .map_err(|_| Error::msg("bot token contains invalid characters"))?;
        bot_authorization.set_sensitive(true);

        Ok(Client {
            bot_authorization: Some(bot_authorization),
            ..self
        })
    }

    /// Writes every response body this client receives to `dump`.
    pub fn with_dump(self, dump: Dump) -> Client {
        Client {
            dump: Some(dump),
            ..self
        }
    }

    /// Exchanges an authorization code for an access token.
    pub fn exchange_code(&self, code: impl Into<String>) -> ExchangeCode {
        ExchangeCode::new(self.clone(), code.into())
    }

    /// Gets the user a token was issued for.
    pub fn current_user(&self, token: &TokenResponse) -> GetCurrentUser {
        GetCurrentUser::new(self.clone(), token.authorization())
    }

    /// Lists the guilds the user a token was issued for is in.
    pub fn current_user_guilds(&self, token: &TokenResponse) -> GetCurrentUserGuilds {
        GetCurrentUserGuilds::new(self.clone(), token.authorization())
    }

    /// Gets a member of a guild as the bot.
    pub fn guild_member(&self, guild_id: Id, user_id: Id) -> GetGuildMember {
        GetGuildMember::new(self.clone(), guild_id, user_id)
    }

    /// Adds a role to a member of a guild as the bot.
    pub fn add_guild_member_role(
        &self,
        guild_id: Id,
        user_id: Id,
        role_id: Id,
    ) -> AddGuildMemberRole {
        AddGuildMemberRole::new(self.clone(), guild_id, user_id, role_id)
    }

    /// Makes a generic request to Discord.
    pub(crate) fn request(&self, method: Method, url: impl AsRef<str>) -> Request {
        Request::new(self.clone(), method, url)
    }

    pub(crate) fn state(&self) -> &ClientState {
        &self.state
    }
}

/// A HTTP client request.
#[derive(Debug)]
pub struct Request {
    client: Client,
    request: reqwest::RequestBuilder,
    label: &'static str,
}

impl Request {
    /// Creates a new `Request`.
    ///
    /// The url is appended to the API base.
    pub fn new(client: Client, method: Method, url: impl AsRef<str>) -> Request {
        let url = format!("{}{}", client.state.api_base, url.as_ref());

        Request {
            request: client.http.request(method, url),
            client,
            label: "response",
        }
    }

    /// Names the request in debug dumps.
    pub fn label(self, label: &'static str) -> Request {
        Request { label, ..self }
    }

    /// Serializes the body into the request as a urlencoded form.
    pub fn form<T>(self, form: &T) -> Request
    where
        T: Serialize + ?Sized,
    {
        Request {
            request: self.request.form(form),
            ..self
        }
    }

    /// Sets a header on the request.
    pub fn header(self, name: header::HeaderName, value: HeaderValue) -> Request {
        Request {
            request: self.request.header(name, value),
            ..self
        }
    }

    /// Authorizes the request with a user's OAuth2 token.
    ///
    /// `authorization` is the full header value, token type included.
    pub fn authorization(self, authorization: impl AsRef<str>) -> Request {
        Request {
            request: self
                .request
                .header(header::AUTHORIZATION, authorization.as_ref()),
            ..self
        }
    }

    /// Sends the request as the bot.
    pub async fn send_privileged(self) -> Result<Bytes, UpstreamError> {
        let Some(value) = self.client.bot_authorization.clone() else {
            return Err(UpstreamError::MissingBotToken);
        };

        self.header(header::AUTHORIZATION, value).send().await
    }

    /// Sends the request, failing on any non-success status.
    pub async fn send(self) -> Result<Bytes, UpstreamError> {
        let res = self.request.send().await?;
        let status = res.status();
        let body = res.bytes().await?;

        if let Some(dump) = self.client.dump.as_ref() {
            dump.write(self.label, status, &body).await;
        }

        if status.is_success() {
            Ok(body)
        } else {
            let body = serde_json::from_slice(&body).unwrap_or_else(|_| {
                serde_json::Value::String(String::from_utf8_lossy(&body).into_owned())
            });

            Err(UpstreamError::Status { status, body })
        }
    }

    /// Sends the request and hands back the response untouched.
    pub async fn send_raw(self) -> Result<reqwest::Response, reqwest::Error> {
        self.request.send().await
    }
}
