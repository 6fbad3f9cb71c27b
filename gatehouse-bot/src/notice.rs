//! The verification notice.
//!
//! See [`command_verify_setup`].

use anyhow::Error;

use twilight_model::{
    channel::message::{
        AllowedMentions, Component, Embed, MessageFlags,
        component::{ActionRow, Button, ButtonStyle},
    },
    guild::Permissions,
    http::interaction::{InteractionResponse, InteractionResponseType},
};

use twilight_util::builder::{InteractionResponseDataBuilder, embed::EmbedBuilder};

use crate::commands::InteractionContext;
use crate::config::NoticeConfig;

/// Sent to callers without permission to post the notice.
pub const REJECTED: &str = "You do not have permission to use this command.";

/// Acknowledges a posted notice.
pub const SENT: &str = "Verification message sent!";

/// `/verify-setup`, posts the verification notice in the invoking channel.
pub async fn command_verify_setup(cx: InteractionContext) -> anyhow::Result<()> {
    let permissions = cx.member.as_ref().and_then(|member| member.permissions);

    if !can_post_notice(permissions) {
        tracing::info!(?permissions, "/verify-setup: caller lacks permissions");
        respond_ephemeral(&cx, REJECTED).await?;

        return Ok(());
    }

    let channel_id = cx
        .channel
        .as_ref()
        .map(|channel| channel.id)
        .ok_or_else(|| Error::msg("missing channel in interaction"))?;

    let embed = notice_embed(&cx.config.notice, cx.config.general.embed_color);
    let components = notice_components(&*cx.authorize_url, &cx.config.notice.button_label);

    cx.client
        .create_message(channel_id)
        .embeds(&[embed])
        .components(&components)
        .await?;

    tracing::info!(%channel_id, "/verify-setup: posted verification notice");

    respond_ephemeral(&cx, SENT).await
}

/// Checks if a member may post the notice.
///
/// `permissions` are the member's resolved permissions in the channel.
pub fn can_post_notice(permissions: Option<Permissions>) -> bool {
    permissions.is_some_and(|permissions| {
        permissions.intersects(Permissions::MANAGE_ROLES | Permissions::ADMINISTRATOR)
    })
}

/// Builds the notice embed.
pub fn notice_embed(notice: &NoticeConfig, color: u32) -> Embed {
    EmbedBuilder::new()
        .title(&notice.title)
        .description(&notice.description)
        .color(color)
        .build()
}

/// Builds the row holding the link button to the authorize page.
pub fn notice_components(url: impl Into<String>, label: impl Into<String>) -> Vec<Component> {
    let button = Button {
        custom_id: None,
        disabled: false,
        emoji: None,
        label: Some(label.into()),
        style: ButtonStyle::Link,
        url: Some(url.into()),
        sku_id: None,
    };

    vec![Component::ActionRow(ActionRow {
        components: vec![Component::Button(button)],
    })]
}

async fn respond_ephemeral(cx: &InteractionContext, content: &str) -> anyhow::Result<()> {
    cx.client
        .interaction(cx.application_id)
        .create_response(
            cx.id,
            &cx.token,
            &InteractionResponse {
                kind: InteractionResponseType::ChannelMessageWithSource,
                data: Some(
                    InteractionResponseDataBuilder::new()
                        .flags(MessageFlags::EPHEMERAL)
                        .content(content)
                        .allowed_mentions(AllowedMentions::default())
                        .build(),
                ),
            },
        )
        .await?;

    Ok(())
}
