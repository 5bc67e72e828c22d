use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod error;
mod messages;
mod models;
mod services;

use config::Config;
use services::google_calendar::GoogleCalendarService;
use services::ics::IcsLinkPublisher;
use services::line::LineService;
use services::schedule::ScheduleFeedService;
use services::sync::Reconciler;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stream_calendar_sync=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;

    tracing::info!("Starting Stream Calendar Sync");

    // Initialize services
    let feed = ScheduleFeedService::new(&config.feed)?;
    let calendar = Arc::new(GoogleCalendarService::new(&config.calendar)?);
    let broadcast = Arc::new(LineService::new(&config.line)?);
    let links = Arc::new(IcsLinkPublisher::new(&config.storage)?);

    let reconciler = Reconciler::new(calendar, broadcast, links, config.sync.clone());

    if config.sync.run_once {
        run_pass(&feed, &reconciler).await;
        tracing::info!("Single pass complete");
        return Ok(());
    }

    let mut ticker = tokio::time::interval(Duration::from_secs(config.sync.interval_seconds));

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                run_pass(&feed, &reconciler).await;
            }
            _ = shutdown_signal() => {
                tracing::info!("Shutdown signal received");
                break;
            }
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn run_pass(feed: &ScheduleFeedService, reconciler: &Reconciler) {
    let events = match feed.fetch_events().await {
        Ok(events) => events,
        Err(e) => {
            tracing::warn!("Schedule feed fetch failed: {}", e);
            return;
        }
    };

    tracing::info!("Reconciling {} live events", events.len());

    if let Err(e) = reconciler.run_pass(&events, Utc::now()).await {
        tracing::error!("Reconciliation pass failed: {}", e);
    }
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut term = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        {
            Ok(term) => term,
            Err(e) => {
                tracing::warn!("Failed to bind SIGTERM: {}", e);
                let _ = ctrl_c.await;
                return;
            }
        };
        tokio::select! {
            _ = ctrl_c => {},
            _ = term.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
    }
}
