//! Gridiron Dash - live feed runner
//!
//! Connects the dashboard's live feed (real or simulated, per environment)
//! and logs every update until interrupted.

use anyhow::Context;
use gridiron_client::{FeedConfig, LiveFeed};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("gridiron_dash=info,gridiron_client=info")),
        )
        .init();

    let config = FeedConfig::from_env().context("invalid feed configuration")?;
    tracing::info!(
        "Starting {:?} feed{}",
        config.mode,
        config
            .websocket_url
            .as_deref()
            .map(|url| format!(" at {url}"))
            .unwrap_or_default()
    );

    let feed = LiveFeed::from_config(&config).context("invalid feed configuration")?;

    let _subscriptions = [
        feed.subscribe_connection_status(|state| tracing::info!("Feed is {}", state)),
        feed.subscribe_game_updates(|games| {
            let live = games.iter().filter(|game| game.is_live()).count();
            tracing::info!("Game list: {} games, {} live", games.len(), live);
        }),
        feed.subscribe_score_updates(|update| {
            tracing::info!(
                "Score {}: {}-{}",
                update.game_id,
                update.home_score,
                update.away_score
            );
        }),
        feed.subscribe_status_updates(|update| {
            tracing::info!(
                "Status {}: {} {}",
                update.game_id,
                update.status,
                update.time.as_deref().unwrap_or("")
            );
        }),
        feed.subscribe_stat_updates(|update| {
            tracing::info!(
                "Stats {}: {} passing yds {}, {} passing yds {}",
                update.game_id,
                update.home_team.id,
                update.home_team.stats.passing.yards,
                update.away_team.id,
                update.away_team.stats.passing.yards
            );
        }),
        feed.subscribe_news_updates(|item| {
            tracing::info!("News [{}]: {}", item.timestamp.format("%H:%M:%S"), item.headline);
        }),
        feed.subscribe_errors(|message| tracing::warn!("Feed error: {}", message)),
    ];

    feed.connect();

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    tracing::info!("Shutting down");
    feed.disconnect();

    Ok(())
}
