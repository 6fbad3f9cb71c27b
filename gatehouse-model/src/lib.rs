//! Gatehouse data representations.

use std::{
    fmt::{self, Display, Formatter},
    num::NonZeroU64,
    str::FromStr,
};

use serde::{Deserialize, Deserializer, Serialize, Serializer, de::Error as _};

use derive_more::{Deref, DerefMut, Error, From, Into};

pub mod discord;
pub mod oauth;
pub mod request;
pub mod response;

/// A container used to serialize and deserialize large ids.
///
/// Because Discord snowflakes approach sizes of integer not representable by
/// Javascript's usual JSON parsing utilities, they are encoded as string
/// atoms.
#[derive(Clone, Copy, Debug, From, Into, Deref, DerefMut, PartialEq, Eq, Hash)]
pub struct Id(NonZeroU64);

impl Id {
    /// Creates a new `Id`.
    ///
    /// Returns `None` if the id is 0.
    pub fn new(inner: u64) -> Option<Id> {
        NonZeroU64::new(inner).map(Id)
    }
}

impl Display for Id {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl FromStr for Id {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<NonZeroU64>().map(Id).map_err(|_| IdParseError)
    }
}

/// An id failed to parse from a string.
#[derive(Clone, Copy, Debug, Error, derive_more::Display)]
#[display("invalid snowflake id")]
pub struct IdParseError;

impl<'de> Deserialize<'de> for Id {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        // configuration sources may hand over ids as plain integers
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            String(String),
            Integer(u64),
        }

        let id = match Repr::deserialize(deserializer)? {
            Repr::String(s) => s.parse::<u64>().map_err(D::Error::custom)?,
            Repr::Integer(id) => id,
        };

        NonZeroU64::new(id)
            .map(Id)
            .ok_or_else(|| D::Error::custom("id is 0"))
    }
}

impl Serialize for Id {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.get().to_string().serialize(serializer)
    }
}

/// API error.
#[derive(Clone, Debug, Deserialize, Serialize, Error)]
pub struct Error {
    /// An API error code.
    pub code: ErrorCode,
    /// A user-friendly message of the error.
    pub message: String,
    /// The raw error body Discord answered with, if the failure came from
    /// upstream.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[error(not(source))]
    pub error: Option<serde_json::Value>,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.message.fmt(f)
    }
}

/// An API error code.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(from = "u32", into = "u32")]
pub enum ErrorCode {
    /// The request consisted of malformed JSON.
    MalformedJson,
    /// The request had a well-formed body, but the data was otherwise
    /// unexpected.
    InvalidData,
    /// The server refuses to serve that content type.
    UnsupportedContentType,
    /// The resource was not found.
    NotFound,
    /// The verification request carried no authorization code.
    MissingCode,
    /// The authorization code is obviously not one Discord would issue.
    MalformedCode,
    /// Discord reported the code as invalid, expired or already redeemed.
    InvalidGrant,
    /// Discord rejected the application's client credentials.
    ClientRejected,
    /// The token exchange failed for any other reason.
    ExchangeFailed,
    /// A Discord API call other than the token exchange failed.
    UpstreamFailure,
    /// The user is not a member of the verification guild.
    NotAMember,
    /// An internal server error occured.
    ///
    /// This is a bug, usually.
    InternalServerError,
    /// Any other error code.
    Other(u32),
}

impl From<u32> for ErrorCode {
    fn from(value: u32) -> Self {
        match value {
            4000 => ErrorCode::MalformedJson,
            4001 => ErrorCode::InvalidData,
            4002 => ErrorCode::UnsupportedContentType,
            4003 => ErrorCode::NotFound,
            4011 => ErrorCode::MissingCode,
            4012 => ErrorCode::MalformedCode,
            4013 => ErrorCode::InvalidGrant,
            4014 => ErrorCode::ClientRejected,
            4015 => ErrorCode::ExchangeFailed,
            4016 => ErrorCode::UpstreamFailure,
            4017 => ErrorCode::NotAMember,
            5000 => ErrorCode::InternalServerError,
            other => ErrorCode::Other(other),
        }
    }
}

impl From<ErrorCode> for u32 {
    fn from(value: ErrorCode) -> Self {
        match value {
            ErrorCode::MalformedJson => 4000,
            ErrorCode::InvalidData => 4001,
            ErrorCode::UnsupportedContentType => 4002,
            ErrorCode::NotFound => 4003,
            ErrorCode::MissingCode => 4011,
            ErrorCode::MalformedCode => 4012,
            ErrorCode::InvalidGrant => 4013,
            ErrorCode::ClientRejected => 4014,
            ErrorCode::ExchangeFailed => 4015,
            ErrorCode::UpstreamFailure => 4016,
            ErrorCode::NotAMember => 4017,
            ErrorCode::InternalServerError => 5000,
            ErrorCode::Other(other) => other,
        }
    }
}
