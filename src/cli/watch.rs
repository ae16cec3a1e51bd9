//! `dashwire watch`: follow live run events until Ctrl-C.

use std::sync::Arc;

use color_eyre::Result;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use super::output::format_event;
use crate::adapters::HttpEndpointResolver;
use crate::config::DashwireConfig;
use crate::websocket::StreamConnection;

pub async fn handle_watch_command(config: &DashwireConfig, run_ids: Vec<String>) -> Result<()> {
    let resolver = Arc::new(HttpEndpointResolver::new(config));
    info!("Resolving event endpoint via {}", resolver.lookup_url());

    let connection = StreamConnection::new(resolver, config);
    let mut events = connection.subscribe();

    if !run_ids.is_empty() {
        connection.subscribe_to_topics(run_ids);
    }
    connection.connect();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, closing connection");
                break;
            }
            received = events.recv() => match received {
                Ok(event) => println!("{}", format_event(&event)),
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Output fell behind, skipped {} events", skipped);
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    connection.shutdown();
    Ok(())
}
