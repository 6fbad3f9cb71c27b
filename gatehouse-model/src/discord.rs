//! Discord REST payloads.
//!
//! Only the fields the verification flow reads are modeled; everything else
//! Discord sends is ignored on deserialization.

use serde::{Deserialize, Serialize};

use crate::Id;

/// A Discord user, as returned by `GET /users/@me`.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct User {
    /// The user's snowflake.
    pub id: Id,
    /// The user's unique username.
    pub username: String,
    /// The legacy `#0000` discriminator.
    ///
    /// Migrated accounts report `"0"`.
    #[serde(default = "default_discriminator")]
    pub discriminator: String,
    /// The user's display name, if set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_name: Option<String>,
    /// Only present with the `email` scope.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

fn default_discriminator() -> String {
    "0".into()
}

impl User {
    /// The `name#discriminator` tag of the user.
    pub fn tag(&self) -> String {
        format!("{}#{}", self.username, self.discriminator)
    }
}

/// A user's membership in a single guild.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct GuildMember {
    /// The role ids the member holds.
    #[serde(default)]
    pub roles: Vec<Id>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nick: Option<String>,
}

impl GuildMember {
    /// Checks if the member holds a role.
    pub fn has_role(&self, role_id: Id) -> bool {
        self.roles.contains(&role_id)
    }
}

/// An entry of `GET /users/@me/guilds`.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct PartialGuild {
    pub id: Id,
    #[serde(default)]
    pub name: String,
}
