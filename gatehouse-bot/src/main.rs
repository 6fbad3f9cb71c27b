use std::sync::Arc;

use gatehouse_bot::{commands::InteractionContext, config::Config, dispatch};

use tracing_subscriber::EnvFilter;

use twilight_gateway::{Event, EventTypeFlags, Intents, Shard, ShardId, StreamExt as _};
use twilight_http::Client;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // load config
    let config = Arc::new(Config::load("gatehouse-bot.toml")?);
    let authorize_url: Arc<str> = config.authorize_url().to_string().into();
    let guild_id = config.oauth.guild_id();

    // setup discord connection
    let token = config.general.discord_token.clone();
    let intents = Intents::GUILDS | Intents::GUILD_MEMBERS;

    // setup client
    let client = Arc::new(Client::new(token.clone()));
    let application = client.current_user_application().await?.model().await?;

    if let Some(owner) = application.owner.as_ref() {
        tracing::info!("application id: {}, owner: {}", application.id, owner.name);
    } else {
        tracing::info!("application id: {}", application.id);
    }

    if application.id.get() != config.oauth.client_id.get() {
        tracing::warn!(
            client_id = %config.oauth.client_id,
            "bot token belongs to another application than the authorize url",
        );
    }

    let interaction = client.interaction(application.id);

    let mut shard = Shard::new(ShardId::ONE, token, intents);

    while let Some(item) = shard.next_event(EventTypeFlags::all()).await {
        let event = match item {
            Ok(event) => event,
            Err(source) => {
                tracing::warn!(?source, "error receiving event");
                continue;
            }
        };

        tracing::trace!(?event, "received event");

        match event {
            Event::Ready(ready) => {
                tracing::info!(
                    "serving bot as {}#{} in {} guilds",
                    ready.user.name,
                    ready.user.discriminator(),
                    ready.guilds.len()
                );
                tracing::info!("verification url: {}", authorize_url);

                // create commands
                match interaction
                    .set_guild_commands(guild_id, &gatehouse_bot::commands::commands())
                    .await
                {
                    Ok(_) => tracing::info!(%guild_id, "registered guild commands"),
                    Err(err) => tracing::error!(%guild_id, ?err, "failed to register commands"),
                }
            }
            Event::InteractionCreate(interaction) => {
                let interaction = interaction.0;

                // setup command context
                let cx = InteractionContext {
                    interaction,
                    client: client.clone(),
                    config: config.clone(),
                    authorize_url: authorize_url.clone(),
                    application_id: application.id,
                };

                tokio::spawn(dispatch::interaction(cx));
            }
            _ => (),
        }
    }

    Ok(())
}
