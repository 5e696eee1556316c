use anyhow::Result;
use clap::Parser;
use lobbywatch::config;
use lobbywatch::integrations::accounts::HttpCredentialSource;
use lobbywatch::integrations::notifier::HttpNotifier;
use lobbywatch::integrations::watchlist::HttpWatchListSource;
use lobbywatch::integrations::WatchListSource;
use lobbywatch::scheduler::{Intervals, Scheduler};
use lobbywatch::search::{SearchCycle, SearchSettings};
use lobbywatch::session::gateway::GatewayConnector;
use lobbywatch::session::manager::SessionManager;
use lobbywatch::tracking::{CooldownTracker, WatchListCache};
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "lobbywatch")]
#[command(about = "Watch a live matchmaking feed for tracked players")]
#[command(version)]
struct Args {
    /// Initialize configuration
    #[arg(long)]
    init: bool,

    /// Run a single search tick, print the outcome and exit
    #[arg(long)]
    once: bool,

    /// Path to config file
    #[arg(long, short)]
    config: Option<std::path::PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("lobbywatch=info".parse()?),
        )
        .init();

    if args.init {
        config::init_wizard().await?;
        return Ok(());
    }

    let config = config::load(args.config.as_deref())?;
    let token = config.endpoints.api_token.clone();
    let api = config.endpoints.api_base_url.clone();

    let sessions = Arc::new(SessionManager::new(
        Arc::new(GatewayConnector::new(config.endpoints.gateway_url.clone())),
        Arc::new(HttpCredentialSource::new(api.clone(), token.clone())),
        config.credentials.batch_size,
    ));
    let watchlist = Arc::new(WatchListCache::new());
    let watchlist_source: Arc<dyn WatchListSource> =
        Arc::new(HttpWatchListSource::new(api.clone(), token.clone()));
    let cycle = Arc::new(SearchCycle::new(
        Arc::clone(&sessions),
        Arc::clone(&watchlist),
        Arc::new(CooldownTracker::new(config.notify.cooldown())),
        Arc::new(HttpNotifier::new(api, token)),
        SearchSettings::from(&config.search),
    ));

    // Neither failure is fatal: the timers retry both
    let (session, _) = tokio::join!(
        sessions.acquire(),
        watchlist.refresh(watchlist_source.as_ref())
    );
    if let Err(e) = session {
        tracing::warn!("Starting without a session: {}", e);
    }

    if args.once {
        let outcome = cycle.run_tick().await;
        println!("{:?}", outcome);
        cycle.flush().await;
        sessions.shutdown().await;
        return Ok(());
    }

    let scheduler = Scheduler::new(
        cycle,
        Arc::clone(&sessions),
        watchlist,
        watchlist_source,
        Intervals::from_config(&config),
    );

    scheduler
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await;

    Ok(())
}
