//! Command suite.

use std::sync::Arc;

use twilight_http::Client;

use twilight_model::{
    application::{
        command::{Command, CommandType},
        interaction::{Interaction, InteractionContextType},
    },
    guild::Permissions,
    id::{Id, marker::ApplicationMarker},
    oauth::ApplicationIntegrationType,
};

use twilight_util::builder::command::CommandBuilder;

use crate::config::Config;

use derive_more::Deref;

/// Posts the verification notice.
pub const VERIFY_SETUP: &str = "verify-setup";

/// Command context.
///
/// Drills some useful things to the command endpoint.
#[derive(Clone, Debug, Deref)]
pub struct InteractionContext {
    /// The interaction this request is responding to.
    #[deref]
    pub interaction: Interaction,
    /// HTTP Client used to respond to interactions.
    pub client: Arc<Client>,
    pub config: Arc<Config>,
    /// The URL verification buttons link to.
    pub authorize_url: Arc<str>,
    pub application_id: Id<ApplicationMarker>,
}

/// Returns a list of commands the bot offers.
///
/// These are registered in the configured guild only.
pub fn commands() -> [Command; 1] {
    [CommandBuilder::new(
        VERIFY_SETUP,
        "Sends the Discord verification message with a button.",
        CommandType::ChatInput,
    )
    .integration_types([ApplicationIntegrationType::GuildInstall])
    .contexts([InteractionContextType::Guild])
    .default_member_permissions(Permissions::MANAGE_ROLES)
    .build()]
}
