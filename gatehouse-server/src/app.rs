//! Gatehouse general application items.

use std::fmt::{self, Debug, Display, Formatter};
use std::sync::Arc;

use anyhow::Error;

use axum::RequestExt as _;
use axum::extract::Request;
use axum::extract::rejection::{FormRejection, JsonRejection};
use axum::middleware::Next;
use axum::{
    Form, Json,
    extract::FromRequest,
    response::{IntoResponse, Response},
};

use http::{HeaderValue, StatusCode, header};

use gatehouse_model::{
    Error as ApiError, ErrorCode,
    oauth::{OAuthError, OAuthErrorCode},
};

use serde::{Deserialize as _, de::DeserializeOwned};
use sqlx::SqlitePool;

use derive_more::{Deref, Display, From};

use crate::config::{Config, DiscordConfig};
use crate::discord::{self, UpstreamError};
use crate::dump::Dump;
use crate::store;
use crate::verify::VerifyError;

/// Shared server state.
///
/// Cheaply cloneable.
#[derive(Clone)]
pub struct AppState {
    /// The port the server is binded to.
    pub port: u16,
    /// The Discord client verifications go through.
    pub discord: discord::Client,
    /// The Discord application and guild settings.
    pub config: Arc<DiscordConfig>,
    /// A database connection pool, if persistence is enabled.
    pub db: Option<SqlitePool>,
}

impl AppState {
    /// Creates a new `AppState`.
    ///
    /// See [`Config`] to learn more on what the options do.
    pub async fn new(config: Config) -> Result<AppState, Error> {
        let Config { server, discord } = config;

        let mut client = discord::Client::new(&discord)?;

        if let Some(dir) = server.dump_dir.as_ref() {
            let dump = Dump::open(dir).await?;
            tracing::warn!(dir = %dump.dir().display(), "dumping discord responses");

            client = client.with_dump(dump);
        }

        // establish database connection
        let db = match server.database_url.as_ref() {
            Some(database_url) => Some(store::connect(database_url).await?),
            None => {
                tracing::info!("no `DATABASE_URL` set, verified users will not be recorded");
                None
            }
        };

        Ok(AppState {
            port: server.port,
            discord: client,
            config: Arc::new(discord),
            db,
        })
    }
}

impl Debug for AppState {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("port", &self.port)
            .field("guild_id", &self.config.guild_id)
            .field("persistent", &self.db.is_some())
            .finish_non_exhaustive()
    }
}

/// App REST headers.
pub async fn app_rest_headers(request: Request, next: Next) -> Response {
    let mut res = next.run(request).await;

    // apply additional headers for REST safety
    res.headers_mut().extend([
        (header::CACHE_CONTROL, HeaderValue::from_static("no-store")),
        (
            header::CONTENT_SECURITY_POLICY,
            HeaderValue::from_static("frame-ancestors 'none'"),
        ),
        (
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ),
        (header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY")),
    ]);

    res
}

/// Logs internal errors attached to responses by [`AppError`].
pub async fn log_app_errors(request: Request, next: Next) -> Response {
    let response = next.run(request).await;

    if let Some(err) = response.extensions().get::<Arc<AppError>>() {
        tracing::error!(?err, "an unexpected error occurred inside a handler");
    }

    response
}

/// Selective body extractor.
///
/// Accepts JSON and urlencoded forms.
#[derive(Deref)]
pub struct Payload<T>(pub T);

impl<S, T> FromRequest<S> for Payload<T>
where
    T: DeserializeOwned + 'static,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        // switch on content type
        let content_type = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .ok_or(AppErrorKind::MissingContentType)?;

        // ignore parameters like `charset`
        let mime = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim();

        match mime {
            "application/x-www-form-urlencoded" => {
                let AppForm(form) = req.extract_with_state::<AppForm<T>, _, _>(state).await?;
                Ok(Payload(form))
            }
            "application/json" => {
                let AppJson(json) = req.extract_with_state::<AppJson<T>, _, _>(state).await?;
                Ok(Payload(json))
            }
            mime => Err(AppErrorKind::UnsupportedContentType(mime.to_owned()).into()),
        }
    }
}

/// App Form extractor.
#[derive(Deref, FromRequest)]
#[from_request(via(Form), rejection(AppError))]
pub struct AppForm<T>(pub T);

/// App JSON extractor and responder.
#[derive(Deref, FromRequest)]
#[from_request(via(Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

impl<T> IntoResponse for AppJson<T>
where
    Json<T>: IntoResponse,
{
    fn into_response(self) -> Response {
        Json(self.0).into_response()
    }
}

/// An app error.
#[derive(Debug)]
pub struct AppError {
    kind: AppErrorKind,
}

impl AppError {
    /// The kind of error.
    pub fn kind(&self) -> &AppErrorKind {
        &self.kind
    }

    /// Checks if an error is internal.
    pub fn is_internal(&self) -> bool {
        self.kind.is_internal()
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.kind, f)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            AppErrorKind::Json(err) => Some(err),
            AppErrorKind::Form(err) => Some(err),
            AppErrorKind::Verify(err) => Some(err),
            _ => None,
        }
    }
}

impl<T> From<T> for AppError
where
    AppErrorKind: From<T>,
{
    fn from(value: T) -> Self {
        AppError {
            kind: AppErrorKind::from(value),
        }
    }
}

#[derive(Debug, Display, From)]
pub enum AppErrorKind {
    /// The request's urlencoded body was malformed or unexpected.
    #[display("{_0}")]
    Form(FormRejection),
    /// The request's JSON body was malformed or unexpected.
    #[display("{_0}")]
    Json(JsonRejection),
    /// A request sent a payload without a MIME type.
    #[display("Missing request content type")]
    MissingContentType,
    /// A request sent a payload with a MIME type the server refused to serve.
    #[from(ignore)]
    #[display("Unrecognized MIME type: {_0}")]
    UnsupportedContentType(String),
    /// The resource wasn't found.
    #[from(ignore)]
    #[display("Resource not found")]
    NotFound,
    /// The verification pipeline failed.
    #[display("{_0}")]
    Verify(VerifyError),
}

impl AppErrorKind {
    /// Checks if an error is internal.
    pub fn is_internal(&self) -> bool {
        match self {
            AppErrorKind::Verify(err) => err.is_internal(),
            AppErrorKind::Json(JsonRejection::BytesRejection(_))
            | AppErrorKind::Form(FormRejection::BytesRejection(_)) => true,
            _ => false,
        }
    }
}

/// The error code and message reported for a failed token exchange.
fn exchange_failure(err: &UpstreamError) -> (ErrorCode, &'static str) {
    let code = err
        .body()
        .and_then(|body| OAuthError::deserialize(body).ok())
        .map(|body| body.error);

    match code {
        Some(OAuthErrorCode::InvalidGrant) => (
            ErrorCode::InvalidGrant,
            "Authorization code is invalid, expired, or was already used. Please restart verification.",
        ),
        Some(OAuthErrorCode::InvalidClient | OAuthErrorCode::UnauthorizedClient) => (
            ErrorCode::ClientRejected,
            "The verification service is misconfigured (client credentials rejected).",
        ),
        Some(
            OAuthErrorCode::InvalidRequest
            | OAuthErrorCode::UnsupportedGrantType
            | OAuthErrorCode::InvalidScope,
        ) => (
            ErrorCode::ExchangeFailed,
            "The authorization request was rejected by Discord.",
        ),
        _ => (ErrorCode::ExchangeFailed, "Failed to exchange code for token."),
    }
}

/// Mirrors a Discord failure's status.
fn mirrored(err: &UpstreamError) -> StatusCode {
    match err.status() {
        Some(status) if status.is_client_error() || status.is_server_error() => status,
        Some(_) => StatusCode::BAD_GATEWAY,
        None => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn bad_request(code: ErrorCode, message: impl Into<String>) -> (StatusCode, ApiError) {
    (
        StatusCode::BAD_REQUEST,
        ApiError {
            code,
            message: message.into(),
            error: None,
        },
    )
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error) = match &self.kind {
            // FORM errors
            AppErrorKind::Form(FormRejection::FailedToDeserializeForm(error)) => {
                bad_request(ErrorCode::InvalidData, error.to_string())
            }
            AppErrorKind::Form(FormRejection::FailedToDeserializeFormBody(error)) => {
                bad_request(ErrorCode::InvalidData, error.to_string())
            }
            AppErrorKind::Form(FormRejection::InvalidFormContentType(_)) => bad_request(
                ErrorCode::UnsupportedContentType,
                "No supported content type.",
            ),
            // JSON errors
            AppErrorKind::Json(JsonRejection::JsonDataError(error)) => {
                bad_request(ErrorCode::InvalidData, error.to_string())
            }
            AppErrorKind::Json(JsonRejection::JsonSyntaxError(error)) => {
                bad_request(ErrorCode::MalformedJson, error.to_string())
            }
            AppErrorKind::Json(JsonRejection::MissingJsonContentType(_)) => bad_request(
                ErrorCode::UnsupportedContentType,
                "No supported content type.",
            ),
            // Other request errors
            AppErrorKind::UnsupportedContentType(mime) => bad_request(
                ErrorCode::UnsupportedContentType,
                format!("Unrecognized MIME type: {}.", mime),
            ),
            AppErrorKind::MissingContentType => bad_request(
                ErrorCode::UnsupportedContentType,
                "Missing request content type.",
            ),
            AppErrorKind::NotFound => (
                StatusCode::NOT_FOUND,
                ApiError {
                    code: ErrorCode::NotFound,
                    message: "The resource was not found.".into(),
                    error: None,
                },
            ),
            // Verification errors
            AppErrorKind::Verify(VerifyError::MissingCode) => {
                bad_request(ErrorCode::MissingCode, "Authorization code missing.")
            }
            AppErrorKind::Verify(VerifyError::MalformedCode) => {
                bad_request(ErrorCode::MalformedCode, "Authorization code is malformed.")
            }
            AppErrorKind::Verify(VerifyError::NotAMember { body, .. }) => (
                StatusCode::FORBIDDEN,
                ApiError {
                    code: ErrorCode::NotAMember,
                    message: "You must be a member of our Discord server to verify.".into(),
                    error: body.clone(),
                },
            ),
            AppErrorKind::Verify(err) => match err.upstream() {
                Some(upstream) if !upstream.is_internal() => {
                    let (code, message) = match err {
                        VerifyError::Exchange(_) => exchange_failure(upstream),
                        VerifyError::Identify(_) => {
                            (ErrorCode::UpstreamFailure, "Failed to fetch user information.")
                        }
                        VerifyError::AssignRole(_) => {
                            (ErrorCode::UpstreamFailure, "Failed to assign role.")
                        }
                        _ => (
                            ErrorCode::UpstreamFailure,
                            "Failed to confirm guild membership.",
                        ),
                    };

                    (
                        mirrored(upstream),
                        ApiError {
                            code,
                            message: message.into(),
                            error: upstream.body().cloned(),
                        },
                    )
                }
                _ => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiError {
                        code: ErrorCode::InternalServerError,
                        message: "Internal server error during verification.".into(),
                        error: None,
                    },
                ),
            },
            // create a generic internal error
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiError {
                    code: ErrorCode::InternalServerError,
                    message: "An internal server error occured.".into(),
                    error: None,
                },
            ),
        };

        let mut response = (status, AppJson(error)).into_response();
        if self.is_internal() || status.is_server_error() {
            response.extensions_mut().insert(Arc::new(self));
        }
        response
    }
}
