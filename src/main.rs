use std::time::Duration;

use crate::{
    configuration::Configuration, configuration_handler::ConfigurationHandler,
    database_interface::DatabaseInterface, http::create_app, local_store::LocalStore,
};
use tokio::time::sleep;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod backend;
mod configuration;
mod configuration_handler;
mod database_interface;
mod directory;
mod error;
mod event_bus;
mod http;
mod identity;
mod local_store;
mod notification;
mod renewal;
mod report;
mod scheduling;
mod schema;
#[cfg(test)]
mod testutils;
mod types;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let configuration = ConfigurationHandler::parse_arguments();

    let address = format!("0.0.0.0:{}", configuration.port());
    let listener = match tokio::net::TcpListener::bind(&address).await {
        Ok(listener) => listener,
        Err(err) => {
            error!(%err, %address, "Failed to bind listener");
            return;
        }
    };
    info!(%address, "Clinic manager listening");

    let app = if let Some(database_url) = configuration.database_url() {
        let backend = loop {
            match DatabaseInterface::new(&database_url) {
                Ok(backend) => {
                    info!("Successfully connected to database");
                    break backend;
                }
                Err(err) => {
                    error!(
                        ?err,
                        %database_url,
                        "Failed to establish database connection, retrying in 1 sec"
                    );
                    sleep(Duration::from_secs(1)).await;
                }
            }
        };
        create_app(backend, configuration)
    } else {
        warn!("No database configured, records are kept in memory only");
        create_app(LocalStore::default(), configuration)
    };

    if let Err(err) = axum::serve(listener, app).await {
        error!(%err, "Server terminated");
    }
}
