pub mod config;
pub mod dispatcher;
pub mod handler;
pub mod net;
pub mod store;
pub mod types;
pub mod verifier;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use config::HubConfig;
use dispatcher::Dispatcher;
use handler::HubHandler;
use net::client::HttpSender;
use net::server::run;
use store::SubscriptionStore;
use verifier::Verifier;

/// Wires store, verifier and dispatcher together and serves the hub
/// until the shutdown token fires. The store is the only shared
/// persistent state; everything else is per-request.
pub async fn init(config: HubConfig, shutdown: CancellationToken) -> crate::error::Result<()> {
    let config = Arc::new(config);

    let sender = Arc::new(HttpSender::new(&config)?);
    let store = Arc::new(SubscriptionStore::new(&config.subscribers_file));
    let dispatcher = Dispatcher::new(sender.clone(), store.clone());
    let verifier = Verifier::new(sender, store);

    let handler = Arc::new(HubHandler::new(config.clone(), dispatcher, verifier));

    run(&config.addr, handler, config.max_body_bytes, shutdown).await?;
    Ok(())
}
