//! Client startup.

use crate::{ClientEvent, ClientRuntime, RuntimeParts, SessionResult};
use client_config_and_utils::{Config, HostPlatform, InstallLayout, Paths, CLIENT_VERSION};
use client_storage::SqliteStore;
use self_updater::{installer_for, HttpDownloader};
use service_connection::{TransportOptions, WsConnector, WsSettings};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};

/// Assemble a runtime for this installation from its configuration.
pub fn build_runtime(config: &Config, paths: &Paths) -> SessionResult<ClientRuntime> {
    paths.ensure_dirs()?;

    let store = Arc::new(SqliteStore::open(&paths.database_file())?);
    info!(path = %paths.database_file().display(), "Store opened");

    let settings = WsSettings {
        heartbeat_interval_secs: config.heartbeat_interval_secs,
        connect_timeout_secs: config.connect_timeout_secs,
        reconnect_base_delay_secs: config.reconnect_base_delay_secs,
        reconnect_max_delay_secs: config.reconnect_max_delay_secs,
        max_connect_attempts: config.max_connect_attempts,
    };
    let connector = WsConnector::new(
        config.manager_url()?.as_str(),
        config.fetcher_url()?.as_str(),
        settings,
    );

    let host = HostPlatform::detect()?;
    let layout = InstallLayout::current(host.platform)?;
    let downloader = HttpDownloader::new(&format!("chainprox/{}", CLIENT_VERSION))?;

    ClientRuntime::new(RuntimeParts {
        store,
        connector: Arc::new(connector),
        downloader: Arc::new(downloader),
        installer: installer_for(host.platform),
        layout,
        downloads_dir: paths.downloads_dir(),
        transport: TransportOptions {
            tls_enabled: config.tls_enabled,
        },
        host,
        auto_upgrade: config.auto_upgrade,
    })
}

/// Run the client until interrupted or the session ends.
///
/// Without explicit credentials the last persisted user is resumed.
pub async fn run_client(
    config: Config,
    paths: Paths,
    credentials: Option<(String, String)>,
) -> Result<(), Box<dyn std::error::Error>> {
    info!(version = CLIENT_VERSION, "Starting Chainprox client");

    let runtime = build_runtime(&config, &paths)?;
    let mut events = runtime.subscribe();
    runtime.spawn();

    let started = match credentials {
        Some((email, password)) => runtime
            .session()
            .start(&email, &password)
            .await
            .map(|()| true),
        None => runtime.resume_last_user().await.map(|user| user.is_some()),
    };

    match started {
        Ok(true) => {}
        Ok(false) => {
            runtime.shutdown().await;
            return Err("no saved login, pass --email and --password".into());
        }
        Err(e) => {
            runtime.shutdown().await;
            return Err(e.into());
        }
    }

    let outcome = tokio::select! {
        result = tokio::signal::ctrl_c() => {
            info!("Interrupted");
            result.map_err(Into::into)
        }
        outcome = present_events(&mut events) => outcome,
    };

    runtime.shutdown().await;
    outcome
}

/// Print client events until the session ends.
async fn present_events(
    events: &mut broadcast::Receiver<ClientEvent>,
) -> Result<(), Box<dyn std::error::Error>> {
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "Missed client events");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => return Ok(()),
        };

        match event {
            ClientEvent::Authenticated { email } => println!("Logged in as {}", email),
            ClientEvent::MinimizeToBackground => println!("Running in the background"),
            ClientEvent::BalanceUpdated { text } => println!("{}", text),
            ClientEvent::UpgradeAvailable { version } => {
                println!("Version {} is available, run `chainprox upgrade`", version)
            }
            ClientEvent::UpgradeProgress { phase } => println!("Upgrade: {:?}", phase),
            ClientEvent::AuthFailed { message } => {
                eprintln!("Login failed: {}", message);
                return Err(message.into());
            }
            ClientEvent::SessionClosed { reason } => {
                eprintln!("Session closed: {}", reason);
                return Err(reason.into());
            }
        }
    }
}
