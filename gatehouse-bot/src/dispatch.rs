//! Interaction dispatch.

use tracing::instrument;

use twilight_model::application::interaction::{
    InteractionData, InteractionType, application_command::CommandData,
};

use crate::commands::{InteractionContext, VERIFY_SETUP};

/// Handles an interaction.
#[instrument(skip(cx), fields(id = %cx.id))]
pub async fn interaction(mut cx: InteractionContext) {
    match cx.kind {
        InteractionType::ApplicationCommand => {
            let data = cx.interaction.data.take();
            let Some(InteractionData::ApplicationCommand(data)) = data else {
                tracing::error!("failed to get interaction payload");
                return;
            };

            if let Err(err) = slash_command(cx, *data).await {
                for err in err.chain() {
                    tracing::error!("{:?}", err);
                }
            }
        }
        // ignore other payloads
        _ => (),
    }
}

async fn slash_command(cx: InteractionContext, data: CommandData) -> anyhow::Result<()> {
    match data.name.as_str() {
        VERIFY_SETUP => crate::notice::command_verify_setup(cx).await?,
        name => tracing::warn!(name, "unknown command"),
    }

    Ok(())
}
