//! Requests made on behalf of the user.

use futures_util::future::BoxFuture;

use http::Method;

use gatehouse_model::discord::{PartialGuild, User};

use crate::discord::{Client, UpstreamError};

/// Gets the user an access token belongs to.
#[derive(Debug)]
pub struct GetCurrentUser {
    client: Client,
    authorization: String,
}

impl GetCurrentUser {
    /// Creates a new `GetCurrentUser`.
    pub fn new(client: Client, authorization: String) -> GetCurrentUser {
        GetCurrentUser {
            client,
            authorization,
        }
    }
}

impl IntoFuture for GetCurrentUser {
    type Output = Result<User, UpstreamError>;
    type IntoFuture = BoxFuture<'static, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move {
            let body = self
                .client
                .request(Method::GET, "/users/@me")
                .label("user")
                .authorization(&self.authorization)
                .send()
                .await?;

            Ok(serde_json::from_slice(&body)?)
        })
    }
}

/// Lists the guilds the user an access token belongs to is in.
#[derive(Debug)]
pub struct GetCurrentUserGuilds {
    client: Client,
    authorization: String,
}

impl GetCurrentUserGuilds {
    /// Creates a new `GetCurrentUserGuilds`.
    pub fn new(client: Client, authorization: String) -> GetCurrentUserGuilds {
        GetCurrentUserGuilds {
            client,
            authorization,
        }
    }
}

impl IntoFuture for GetCurrentUserGuilds {
    type Output = Result<Vec<PartialGuild>, UpstreamError>;
    type IntoFuture = BoxFuture<'static, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move {
            let body = self
                .client
                .request(Method::GET, "/users/@me/guilds")
                .label("guilds")
                .authorization(&self.authorization)
                .send()
                .await?;

            Ok(serde_json::from_slice(&body)?)
        })
    }
}
