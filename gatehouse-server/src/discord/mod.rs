//! Discord OAuth2 and REST access.

pub mod client;
pub mod request;

pub use client::{Client, Request};

use derive_more::{Display, Error};

use http::StatusCode;

/// A failed call to Discord.
#[derive(Debug, Display, Error)]
pub enum UpstreamError {
    /// The request never produced a response.
    #[display("request failed: {_0}")]
    Transport(reqwest::Error),
    /// Discord answered with a non-success status.
    #[display("discord responded with {status}: {body}")]
    Status {
        status: StatusCode,
        /// The response body, as JSON if it parsed as such.
        #[error(not(source))]
        body: serde_json::Value,
    },
    /// Discord answered successfully, but with an unexpected body.
    #[display("unexpected response body: {_0}")]
    Decode(serde_json::Error),
    /// A bot request was made by a client without a bot token.
    #[display("no bot token configured")]
    MissingBotToken,
}

impl UpstreamError {
    /// The status Discord responded with, if it responded.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            UpstreamError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// The error body Discord responded with, if it responded.
    pub fn body(&self) -> Option<&serde_json::Value> {
        match self {
            UpstreamError::Status { body, .. } => Some(body),
            _ => None,
        }
    }

    /// Checks if the failure is on our side of the wire.
    pub fn is_internal(&self) -> bool {
        !matches!(self, UpstreamError::Status { .. })
    }
}

impl From<reqwest::Error> for UpstreamError {
    fn from(value: reqwest::Error) -> Self {
        UpstreamError::Transport(value)
    }
}

impl From<serde_json::Error> for UpstreamError {
    fn from(value: serde_json::Error) -> Self {
        UpstreamError::Decode(value)
    }
}
