use std::{io, net::SocketAddr, path::PathBuf};

use anyhow::Error;

use clap::Parser as _;

use gatehouse_server::{
    app::AppState,
    cli::{Args, run_command},
    config::Config,
    routes,
};

use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Error> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    // load config
    let config_path = args
        .config
        .unwrap_or_else(|| PathBuf::from("./gatehouse.toml"));
    let figment = Config::figment(config_path);

    // Execute command if it exists
    if let Some(command) = args.command {
        return run_command(&command, &figment).await;
    }

    let config = figment.extract::<Config>()?;

    if !config.discord.redirect_uri.ends_with("/verify/callback") {
        tracing::warn!(
            redirect_uri = %config.discord.redirect_uri,
            "redirect uri does not point at `/verify/callback`",
        );
    }

    let state = AppState::new(config).await?;
    tracing::debug!(?state, "app state ready");

    let addr: SocketAddr = ([0, 0, 0, 0], state.port).into();

    let router = routes::router(state);

    // Serve HTTP
    tracing::info!("listening on {} (http)", addr);

    axum_server::bind(addr)
        .serve(router.into_make_service())
        .await
        .map_err(From::from)
}
