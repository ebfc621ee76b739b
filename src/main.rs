use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use tracing::{debug, info, warn};
use tracing_subscriber::{filter::EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use airsense_lib::config::{config_path, ClientConfig};
use airsense_lib::{
    ApiClient, AuthenticatedTransport, Environment, EnvironmentPages, Identity, PageSource,
    PaginatedCollectionLoader, ReqwestHttpClient, Room, RoomPages, Session, SessionStore,
};

const USAGE: &str = "usage: airsense environments | airsense rooms <environment-id>";

/// Page through a collection until the backend returns a short page
async fn drain<T: Clone + Send + Sync + 'static>(
    source: Arc<dyn PageSource<T>>,
    page_size: usize,
) -> Result<Vec<T>> {
    let loader = PaginatedCollectionLoader::new(source, page_size)?;
    loader.wait_idle().await;

    loop {
        let before = loader.state();
        if !before.has_more {
            break;
        }
        loader.load_more().await;
        let after = loader.state();
        if after.items.len() == before.items.len() && after.has_more {
            // The fetch failed; the warning is already logged
            warn!(cursor = after.cursor, "Stopping after failed page fetch");
            break;
        }
    }

    Ok(loader.items())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file if it exists
    let env_file_path = dotenvy::dotenv().ok();

    // Initialize the tracing subscriber for structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            if cfg!(debug_assertions) {
                "airsense_lib=debug,airsense=debug,warn".into()
            } else {
                "airsense_lib=info,airsense=info,warn".into()
            }
        }))
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();

    match env_file_path {
        Some(path) => info!("Loaded environment variables from {}", path.display()),
        None => debug!("No .env file found. Using existing environment variables."),
    };

    let config = ClientConfig::load(&config_path()).await?;
    config.validate()?;

    // The host app normally owns sign-in; here a session token can be supplied directly
    let store = match std::env::var("AIRSENSE_SESSION_TOKEN") {
        Ok(token) => SessionStore::with_session(
            Identity::new("cli", "command line"),
            Session::new(token, "cli"),
        ),
        Err(_) => {
            warn!("AIRSENSE_SESSION_TOKEN not set, requests will be unauthenticated");
            SessionStore::new()
        }
    };

    let http = ReqwestHttpClient::with_timeout(config.request_timeout())?;
    let transport = AuthenticatedTransport::new(Arc::new(http), store, config.base_url.clone());
    let api = ApiClient::new(transport);

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        Some("environments") => {
            let source: Arc<dyn PageSource<Environment>> = Arc::new(EnvironmentPages::new(api));
            let environments = drain(source, config.page_size).await?;
            info!(count = environments.len(), "Fetched environments");
            for environment in environments {
                println!("{}\t{}\t{}", environment.id, environment.name, environment.role);
            }
        }
        Some("rooms") => {
            let environment_id: i64 = args
                .get(1)
                .ok_or_else(|| anyhow!(USAGE))?
                .parse()
                .context("environment id must be an integer")?;
            let source: Arc<dyn PageSource<Room>> = Arc::new(RoomPages::new(api, environment_id));
            let rooms = drain(source, config.page_size).await?;
            info!(count = rooms.len(), environment_id, "Fetched rooms");
            for room in rooms {
                let parameters = room.parameters.map(|p| p.len()).unwrap_or(0);
                println!("{}\t{}\t{} parameters", room.id, room.name, parameters);
            }
        }
        _ => return Err(anyhow!(USAGE)),
    }

    Ok(())
}
