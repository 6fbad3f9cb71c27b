//! Guild member requests, made as the bot.

use futures_util::future::BoxFuture;

use http::{HeaderName, HeaderValue, Method};

use gatehouse_model::{Id, discord::GuildMember};

use crate::discord::{Client, UpstreamError};

/// Attached to role changes in the guild's audit log.
pub const X_AUDIT_LOG_REASON: HeaderName = HeaderName::from_static("x-audit-log-reason");

/// Gets a member of a guild.
#[derive(Debug)]
pub struct GetGuildMember {
    client: Client,
    guild_id: Id,
    user_id: Id,
}

impl GetGuildMember {
    /// Creates a new `GetGuildMember`.
    pub fn new(client: Client, guild_id: Id, user_id: Id) -> GetGuildMember {
        GetGuildMember {
            client,
            guild_id,
            user_id,
        }
    }
}

impl IntoFuture for GetGuildMember {
    type Output = Result<GuildMember, UpstreamError>;
    type IntoFuture = BoxFuture<'static, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move {
            let body = self
                .client
                .request(
                    Method::GET,
                    format!("/guilds/{}/members/{}", self.guild_id, self.user_id),
                )
                .label("member")
                .send_privileged()
                .await?;

            Ok(serde_json::from_slice(&body)?)
        })
    }
}

/// Adds a role to a member of a guild.
///
/// Adding a role the member already holds is a no-op on Discord's side.
#[derive(Debug)]
pub struct AddGuildMemberRole {
    client: Client,
    guild_id: Id,
    user_id: Id,
    role_id: Id,
    reason: Option<String>,
}

impl AddGuildMemberRole {
    /// Creates a new `AddGuildMemberRole`.
    pub fn new(client: Client, guild_id: Id, user_id: Id, role_id: Id) -> AddGuildMemberRole {
        AddGuildMemberRole {
            client,
            guild_id,
            user_id,
            role_id,
            reason: None,
        }
    }

    /// Sets the audit log reason.
    pub fn reason(self, reason: impl Into<String>) -> AddGuildMemberRole {
        AddGuildMemberRole {
            reason: Some(reason.into()),
            ..self
        }
    }
}

impl IntoFuture for AddGuildMemberRole {
    type Output = Result<(), UpstreamError>;
    type IntoFuture = BoxFuture<'static, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move {
            let mut request = self
                .client
                .request(
                    Method::PUT,
                    format!(
                        "/guilds/{}/members/{}/roles/{}",
                        self.guild_id, self.user_id, self.role_id
                    ),
                )
                .label("role");

            // reasons that can't be sent as a header are dropped
            if let Some(reason) = self
                .reason
                .as_deref()
                .and_then(|reason| HeaderValue::from_str(reason).ok())
            {
                request = request.header(X_AUDIT_LOG_REASON, reason);
            }

            request.send_privileged().await?;

            Ok(())
        })
    }
}
