//! OAuth2 token requests.

use futures_util::future::BoxFuture;

use http::Method;

use gatehouse_model::oauth::{TokenRequest, TokenResponse};

use crate::discord::{Client, Request, UpstreamError};

/// Exchanges an authorization code for an access token.
#[derive(Debug)]
pub struct ExchangeCode {
    client: Client,
    code: String,
}

impl ExchangeCode {
    /// Creates a new `ExchangeCode`.
    pub fn new(client: Client, code: String) -> ExchangeCode {
        ExchangeCode { client, code }
    }

    fn request(&self) -> Request {
        let state = self.client.state();
        let client_id = state.client_id.to_string();

        let form = TokenRequest::authorization_code(
            &client_id,
            &state.client_secret,
            &self.code,
            &state.redirect_uri,
            &state.scopes,
        );

        self.client
            .request(Method::POST, "/oauth2/token")
            .label("token")
            .form(&form)
    }

    /// Sends the exchange without interpreting the response.
    pub async fn raw(self) -> Result<reqwest::Response, reqwest::Error> {
        self.request().send_raw().await
    }
}

impl IntoFuture for ExchangeCode {
    type Output = Result<TokenResponse, UpstreamError>;
    type IntoFuture = BoxFuture<'static, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move {
            let body = self.request().send().await?;

            Ok(serde_json::from_slice(&body)?)
        })
    }
}
