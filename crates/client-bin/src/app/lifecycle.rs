//! One-shot commands: logout, upgrade, status.

use crate::app::build_runtime;
use client_config_and_utils::{Config, Paths};
use client_storage::{CredentialStore, SqliteStore};

/// Forget the saved login.
pub fn logout(paths: &Paths) -> Result<(), Box<dyn std::error::Error>> {
    let store = SqliteStore::open(&paths.database_file())?;
    store.delete_user()?;
    println!("Logged out");
    Ok(())
}

/// Download and install the newest known update.
pub async fn upgrade(config: &Config, paths: &Paths) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = build_runtime(config, paths)?;
    let record = runtime.updates().start_upgrade().await?;
    println!("Installed version {}, restart the client to use it", record.version);
    Ok(())
}

/// Print the saved login and the newest known update.
pub fn show_status(paths: &Paths) -> Result<(), Box<dyn std::error::Error>> {
    let store = SqliteStore::open(&paths.database_file())?;

    match store.last_user()? {
        Some(user) => println!("User: {}", user.email),
        None => println!("User: not logged in"),
    }

    match store.last_update()? {
        Some(update) => {
            let state = if update.is_installed {
                "installed"
            } else if update.is_downloaded {
                "downloaded"
            } else {
                "available"
            };
            println!(
                "Update: {} ({}, announced {})",
                update.version,
                state,
                update.created_at.format("%Y-%m-%d %H:%M")
            );
        }
        None => println!("Update: none known"),
    }

    println!("Client version: {}", client_config_and_utils::CLIENT_VERSION);
    Ok(())
}
