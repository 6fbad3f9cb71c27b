//! The verification pipeline.
//!
//! A verification is a chain of dependent Discord calls. Every stage hands
//! its result to the next or fails the whole verification with a
//! [`VerifyError`]; nothing is retried.

use std::ops::RangeInclusive;

use derive_more::{Display, Error};

use gatehouse_model::{
    Id,
    discord::{GuildMember, User},
    oauth::TokenResponse,
    request::VerifyRequest,
    response::VerifyResponse,
};

use tracing::instrument;

use crate::app::AppState;
use crate::discord::UpstreamError;
use crate::store;

/// The accepted length of an authorization code.
///
/// Discord currently issues 30 character codes.
pub const CODE_LENGTH: RangeInclusive<usize> = 16..=128;

/// The audit log reason attached to role assignments.
pub const AUDIT_LOG_REASON: &str = "Verified through OAuth2";

/// A failed verification.
#[derive(Debug, Display, Error)]
pub enum VerifyError {
    /// No authorization code was sent.
    #[display("authorization code missing")]
    MissingCode,
    /// The authorization code can't be one Discord issued.
    #[display("authorization code malformed")]
    MalformedCode,
    /// The code could not be exchanged for a token.
    #[display("token exchange failed: {_0}")]
    Exchange(UpstreamError),
    /// The token's user could not be fetched.
    #[display("fetching user failed: {_0}")]
    Identify(UpstreamError),
    /// The user is not in the guild, or the bot cannot see them.
    #[display("user {user_id} is not a member of the guild")]
    NotAMember {
        user_id: Id,
        /// Discord's answer to the member lookup, if it answered.
        #[error(not(source))]
        body: Option<serde_json::Value>,
    },
    /// The member lookup failed before Discord could answer it.
    #[display("fetching member failed: {_0}")]
    Membership(UpstreamError),
    /// The role could not be assigned.
    #[display("role assignment failed: {_0}")]
    AssignRole(UpstreamError),
    /// The user's guild list could not be fetched.
    #[display("confirming guilds failed: {_0}")]
    ConfirmGuilds(UpstreamError),
}

impl VerifyError {
    /// The Discord failure behind this error, if any.
    pub fn upstream(&self) -> Option<&UpstreamError> {
        match self {
            VerifyError::Exchange(err)
            | VerifyError::Identify(err)
            | VerifyError::Membership(err)
            | VerifyError::AssignRole(err)
            | VerifyError::ConfirmGuilds(err) => Some(err),
            _ => None,
        }
    }

    /// Checks if an error is internal.
    pub fn is_internal(&self) -> bool {
        self.upstream().map(|err| err.is_internal()).unwrap_or(false)
    }
}

/// How a verification ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The role was assigned.
    RoleAssigned,
    /// The member already held the role, so nothing was changed.
    AlreadyVerified,
}

/// A successful verification.
#[derive(Clone, Debug)]
pub struct Verified {
    pub user: User,
    pub outcome: Outcome,
}

impl From<Verified> for VerifyResponse {
    fn from(value: Verified) -> Self {
        let message = match value.outcome {
            Outcome::RoleAssigned => "Verification successful and role assigned!",
            Outcome::AlreadyVerified => "You are already verified and have the role.",
        };

        VerifyResponse {
            message: message.into(),
            username: value.user.username,
            discriminator: value.user.discriminator,
        }
    }
}

/// Checks that an authorization code is plausible before it is sent
/// anywhere.
pub fn validate_code(code: Option<&str>) -> Result<&str, VerifyError> {
    let code = code
        .map(str::trim)
        .filter(|code| !code.is_empty())
        .ok_or(VerifyError::MissingCode)?;

    let well_formed = CODE_LENGTH.contains(&code.len())
        && code
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

    if well_formed {
        Ok(code)
    } else {
        Err(VerifyError::MalformedCode)
    }
}

/// A single verification.
#[derive(Debug)]
pub struct Verification<'a> {
    state: &'a AppState,
}

impl<'a> Verification<'a> {
    /// Creates a new `Verification`.
    pub fn new(state: &'a AppState) -> Verification<'a> {
        Verification { state }
    }

    /// Runs the verification to completion.
    #[instrument(skip_all)]
    pub async fn run(&self, request: &VerifyRequest) -> Result<Verified, VerifyError> {
        let code = validate_code(request.code.as_deref())?;

        if request.state.is_some() || request.timestamp.is_some() {
            tracing::debug!(state = ?request.state, timestamp = ?request.timestamp, "callback metadata");
        }

        let token = self.exchange(code).await?;
        let user = self.identify(&token).await?;

        self.persist(&user).await;

        let member = self.membership(&user).await?;

        let settings = &self.state.config;
        if member.has_role(settings.role_id) && !settings.always_assign_role {
            tracing::info!(user_id = %user.id, "user already holds the verified role");

            return Ok(Verified {
                user,
                outcome: Outcome::AlreadyVerified,
            });
        }

        self.assign_role(&user).await?;
        self.confirm_guilds(&token, &user).await?;

        tracing::info!(
            user_id = %user.id,
            role_id = %settings.role_id,
            "assigned verified role to {}",
            user.tag(),
        );

        Ok(Verified {
            user,
            outcome: Outcome::RoleAssigned,
        })
    }

    async fn exchange(&self, code: &str) -> Result<TokenResponse, VerifyError> {
        tracing::debug!(code_len = code.len(), "exchanging authorization code");

        self.state
            .discord
            .exchange_code(code)
            .await
            .inspect_err(|err| log_upstream("token exchange", err))
            .map_err(VerifyError::Exchange)
    }

    async fn identify(&self, token: &TokenResponse) -> Result<User, VerifyError> {
        let user = self
            .state
            .discord
            .current_user(token)
            .await
            .inspect_err(|err| log_upstream("user fetch", err))
            .map_err(VerifyError::Identify)?;

        tracing::info!(user_id = %user.id, "user {} identified", user.tag());
        tracing::debug!(?user, "fetched user");

        Ok(user)
    }

    async fn persist(&self, user: &User) {
        let Some(db) = self.state.db.as_ref() else {
            return;
        };

        if let Err(err) = store::upsert_user(db, user).await {
            tracing::warn!(user_id = %user.id, %err, "failed to persist user");
        }
    }

    async fn membership(&self, user: &User) -> Result<GuildMember, VerifyError> {
        let guild_id = self.state.config.guild_id;

        match self.state.discord.guild_member(guild_id, user.id).await {
            Ok(member) => {
                tracing::debug!(roles = ?member.roles, "fetched guild member");
                Ok(member)
            }
            Err(UpstreamError::Status { status, body }) => {
                tracing::warn!(
                    user_id = %user.id,
                    %guild_id,
                    %status,
                    "user is not in the guild or the bot cannot see them",
                );

                Err(VerifyError::NotAMember {
                    user_id: user.id,
                    body: Some(body),
                })
            }
            Err(err) => {
                log_upstream("member fetch", &err);
                Err(VerifyError::Membership(err))
            }
        }
    }

    async fn assign_role(&self, user: &User) -> Result<(), VerifyError> {
        let settings = &self.state.config;

        self.state
            .discord
            .add_guild_member_role(settings.guild_id, user.id, settings.role_id)
            .reason(AUDIT_LOG_REASON)
            .await
            .inspect_err(|err| log_upstream("role assignment", err))
            .map_err(VerifyError::AssignRole)
    }

    async fn confirm_guilds(&self, token: &TokenResponse, user: &User) -> Result<(), VerifyError> {
        let guild_id = self.state.config.guild_id;

        let guilds = self
            .state
            .discord
            .current_user_guilds(token)
            .await
            .inspect_err(|err| log_upstream("guild list fetch", err))
            .map_err(VerifyError::ConfirmGuilds)?;

        tracing::debug!(guilds = guilds.len(), "fetched user guilds");

        if guilds.iter().any(|guild| guild.id == guild_id) {
            Ok(())
        } else {
            tracing::warn!(user_id = %user.id, %guild_id, "guild missing from user's guild list");

            Err(VerifyError::NotAMember {
                user_id: user.id,
                body: None,
            })
        }
    }
}

fn log_upstream(stage: &str, err: &UpstreamError) {
    match err {
        UpstreamError::Status { status, body } => {
            tracing::error!(stage, %status, %body, "discord rejected request")
        }
        err => tracing::error!(stage, %err, "discord request failed"),
    }
}
