//! OAuth2 authorization code grant payloads.

use std::fmt::{self, Debug, Display, Formatter};

use serde::{Deserialize, Serialize};

/// Discord's user-facing authorization page.
pub const DEFAULT_AUTHORIZE_BASE: &str = "https://discord.com/oauth2/authorize";

/// Form body of the token endpoint for the `authorization_code` grant.
#[derive(Clone, Serialize)]
pub struct TokenRequest<'a> {
    pub client_id: &'a str,
    pub client_secret: &'a str,
    pub grant_type: &'static str,
    pub code: &'a str,
    pub redirect_uri: &'a str,
    /// Space separated; must match the scopes the user consented to.
    pub scope: String,
}

impl<'a> TokenRequest<'a> {
    /// Creates a new `authorization_code` request.
    pub fn authorization_code(
        client_id: &'a str,
        client_secret: &'a str,
        code: &'a str,
        redirect_uri: &'a str,
        scopes: &[String],
    ) -> TokenRequest<'a> {
        TokenRequest {
            client_id,
            client_secret,
            grant_type: "authorization_code",
            code,
            redirect_uri,
            scope: scopes.join(" "),
        }
    }
}

impl Debug for TokenRequest<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenRequest")
            .field("client_id", &self.client_id)
            .field("grant_type", &self.grant_type)
            .field("redirect_uri", &self.redirect_uri)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

/// A successful token endpoint response.
#[derive(Clone, Deserialize, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    #[serde(default)]
    pub expires_in: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: String,
}

impl TokenResponse {
    /// The value of an `Authorization` header carrying this token.
    pub fn authorization(&self) -> String {
        format!("{} {}", self.token_type, self.access_token)
    }
}

impl Debug for TokenResponse {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenResponse")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

/// An RFC 6749 error body.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct OAuthError {
    pub error: OAuthErrorCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

/// The `error` field of an [`OAuthError`].
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(from = "String", into = "String")]
pub enum OAuthErrorCode {
    /// The code is invalid, expired, revoked, or was issued to another
    /// redirect URI.
    InvalidGrant,
    /// Client authentication failed.
    InvalidClient,
    InvalidRequest,
    UnauthorizedClient,
    UnsupportedGrantType,
    InvalidScope,
    /// Any other error code.
    Other(String),
}

impl From<String> for OAuthErrorCode {
    fn from(value: String) -> Self {
        match value.as_str() {
            "invalid_grant" => OAuthErrorCode::InvalidGrant,
            "invalid_client" => OAuthErrorCode::InvalidClient,
            "invalid_request" => OAuthErrorCode::InvalidRequest,
            "unauthorized_client" => OAuthErrorCode::UnauthorizedClient,
            "unsupported_grant_type" => OAuthErrorCode::UnsupportedGrantType,
            "invalid_scope" => OAuthErrorCode::InvalidScope,
            _ => OAuthErrorCode::Other(value),
        }
    }
}

impl From<OAuthErrorCode> for String {
    fn from(value: OAuthErrorCode) -> Self {
        match value {
            OAuthErrorCode::InvalidGrant => "invalid_grant".into(),
            OAuthErrorCode::InvalidClient => "invalid_client".into(),
            OAuthErrorCode::InvalidRequest => "invalid_request".into(),
            OAuthErrorCode::UnauthorizedClient => "unauthorized_client".into(),
            OAuthErrorCode::UnsupportedGrantType => "unsupported_grant_type".into(),
            OAuthErrorCode::InvalidScope => "invalid_scope".into(),
            OAuthErrorCode::Other(other) => other,
        }
    }
}

/// An authorization page URL.
///
/// Formats to the full URL with its query string.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthorizeUrl {
    base: String,
    client_id: String,
    redirect_uri: String,
    scopes: Vec<String>,
    state: Option<String>,
}

#[derive(Serialize)]
struct AuthorizeQuery<'a> {
    client_id: &'a str,
    redirect_uri: &'a str,
    response_type: &'static str,
    scope: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    state: Option<&'a str>,
}

impl AuthorizeUrl {
    /// Creates a new `AuthorizeUrl` pointing at Discord's authorization page.
    pub fn new(client_id: impl Into<String>, redirect_uri: impl Into<String>) -> AuthorizeUrl {
        AuthorizeUrl {
            base: DEFAULT_AUTHORIZE_BASE.into(),
            client_id: client_id.into(),
            redirect_uri: redirect_uri.into(),
            scopes: Vec::new(),
            state: None,
        }
    }

    /// Changes the authorization page.
    pub fn base(self, base: impl Into<String>) -> AuthorizeUrl {
        AuthorizeUrl {
            base: base.into(),
            ..self
        }
    }

    /// Sets the requested scopes.
    pub fn scopes<I>(self, scopes: I) -> AuthorizeUrl
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        AuthorizeUrl {
            scopes: scopes.into_iter().map(Into::into).collect(),
            ..self
        }
    }

    /// Attaches an opaque `state` value.
    pub fn state(self, state: impl Into<String>) -> AuthorizeUrl {
        AuthorizeUrl {
            state: Some(state.into()),
            ..self
        }
    }
}

impl Display for AuthorizeUrl {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let query = serde_urlencoded::to_string(AuthorizeQuery {
            client_id: &self.client_id,
            redirect_uri: &self.redirect_uri,
            response_type: "code",
            scope: self.scopes.join(" "),
            state: self.state.as_deref(),
        })
        .map_err(|_| fmt::Error)?;

        write!(f, "{}?{}", self.base, query)
    }
}
