mod discord_commands;

use dclink_backend::aggregator::StatusAggregator;
use dclink_backend::panel::{DiscordPanel, PanelPublisher};
use dclink_backend::status::PrimarySource;
use dclink_backend::{AppState, RateLimitConfig, create_app, tasks};
use dclink_db::Database;
use poise::{Framework, FrameworkOptions, serenity_prelude as serenity};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

type Context<'a> = poise::Context<'a, crate::Data, crate::discord_commands::Error>;

pub(crate) struct Data {
    pub(crate) state: Arc<AppState>,
    pub(crate) http_client: reqwest::Client,
    pub(crate) max_accounts: u32,
}

#[tokio::main]
async fn main() {
    // Initialize tracing for structured logging
    #[cfg(debug_assertions)]
    let log_level = tracing::Level::DEBUG;
    #[cfg(not(debug_assertions))]
    let log_level = tracing::Level::INFO;

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .init();
    tracing::info!("Starting dclink backend server...");
    // Load configuration from environment variables or use defaults
    let config = dclink_backend::config::Config::from_env();
    tracing::info!(
        "Configuration: port={}, db_path={}, publish_interval={}s, refresh_interval={}s",
        config.port,
        config.database_path,
        config.publish_interval.as_secs(),
        config.refresh_interval.as_secs()
    );
    tracing::info!(
        "Sources: query_host={:?}, rcon_host={:?}, status_url={:?}",
        config.query_host,
        config.rcon_host,
        config.status_url
    );

    let db = Database::open(&config.database_path).await.unwrap();
    let state = AppState::new(db.clone(), &config);

    let rate_limit = RateLimitConfig {
        player_per_sec: config.rate_limit_player_per_sec,
        player_burst: config.rate_limit_player_burst,
        general_per_sec: config.rate_limit_general_per_sec,
        general_burst: config.rate_limit_general_burst,
    };
    let app = create_app(
        Arc::clone(&state),
        config.request_body_limit,
        config.request_timeout,
        rate_limit,
    );
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&addr).await.unwrap();
    tracing::info!("Server listening on {}", addr);

    let token = config
        .discord_token
        .clone()
        .expect("DISCORD_TOKEN environment variable is required");

    // The panel publisher drives the Discord REST API directly; it does not
    // need the gateway connection.
    let discord_http = Arc::new(serenity::Http::new(&token));
    let publisher = Arc::new(PanelPublisher::new(DiscordPanel::new(
        Arc::clone(&discord_http),
        config.status_channel_id,
    )));

    let source = Arc::new(PrimarySource::from_config(&config));
    let aggregator = Arc::new(StatusAggregator::new(
        Arc::clone(&source),
        Arc::clone(&state.cache),
        Arc::clone(&state.presence),
    ));

    let task_set = tasks::spawn_loops(
        aggregator,
        publisher,
        Arc::clone(&state.refresher),
        Arc::clone(&state.presence),
        source,
        Arc::clone(&state.publish_notify),
        Arc::clone(&state.healthy),
        config.publish_interval,
        config.refresh_interval,
    );

    let intents = serenity::GatewayIntents::default();
    let data = Data {
        state: Arc::clone(&state),
        http_client: reqwest::Client::new(),
        max_accounts: config.max_accounts,
    };

    let framework = Framework::builder()
        .options(FrameworkOptions {
            commands: vec![
                discord_commands::link(),
                discord_commands::unlink(),
                discord_commands::whoami(),
                discord_commands::stats(),
                discord_commands::status(),
            ],
            pre_command: |ctx| {
                Box::pin(async move {
                    tracing::info!(
                        "Executing command '{}' by user '{}'",
                        ctx.command().name,
                        ctx.author().name
                    );
                })
            },
            post_command: |ctx| {
                Box::pin(async move {
                    tracing::info!(
                        "Finished command '{}' by user '{}'",
                        ctx.command().name,
                        ctx.author().name
                    );
                })
            },
            ..Default::default()
        })
        .setup(move |ctx, _ready, framework| {
            Box::pin(async move {
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;
                Ok(data)
            })
        })
        .build();

    let mut client = serenity::ClientBuilder::new(&token, intents)
        .framework(framework)
        .await
        .expect("Error creating Discord client");
    tokio::select! {
        result = axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()) => {
            if let Err(e) = result {
                tracing::error!("Axum server error: {}", e);
            }
        }
        result = client.start() => {
            if let Err(e) = result {
                tracing::error!("Discord client error: {:?}", e);
            }
        }
    }

    // Stop the periodic loops before the process winds down
    task_set.shutdown();
}
