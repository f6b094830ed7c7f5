use std::error::Error;
use std::future;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, instrument, trace, warn};
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

mod cli;

use sunrelay_api as api;
use sunrelay_control as control;
use sunrelay_model as model;
use sunrelay_remote as remote;
use sunrelay_store as store;
use sunrelay_util as util;

use crate::api::{ApiState, Listener};
use crate::cli::Cli;
use crate::control::RelayController;
use crate::remote::{
    Poller, RemoteConfig, RequestConfig, TelemetryProvider, ThingSpeakClient, start_poll,
};
use crate::store::TelemetryStore;
use crate::util::dirs::state_dir;

fn initialize_tracing() {
    // Initialize tracing subscriber for human-readable logs
    tracing_subscriber::registry()
        .with(
            // Use some log defaults. These can be overriden using
            // RUST_LOG
            EnvFilter::try_from_default_env().unwrap_or(
                EnvFilter::default()
                    .add_directive("debug".parse().unwrap())
                    .add_directive("hyper=error".parse().unwrap())
                    .add_directive("reqwest=info".parse().unwrap()),
            ),
        )
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_span_events(FmtSpan::CLOSE)
                .event_format(fmt::format().compact().with_target(false).without_time()),
        )
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    initialize_tracing();

    let cli = cli::parse();

    start_relay(cli).await
}

#[instrument(name = "sunrelay", skip_all, err)]
async fn start_relay(cli: Cli) -> Result<(), Box<dyn Error>> {
    let remote_config = RemoteConfig {
        api_endpoint: cli.remote_api_endpoint,
        channel_id: cli.channel_id,
        read_api_key: cli.read_api_key,
        write_api_key: cli.write_api_key,
        request: RequestConfig {
            timeout: cli.request_timeout,
            max_attempts: cli.request_max_attempts,
            retry_delay: cli.request_retry_delay,
        },
    };
    trace!(remote = ?remote_config, "using config:");

    let data_dir = cli.data_dir.unwrap_or_else(state_dir);
    let store = Arc::new(TelemetryStore::open(&data_dir).await?);
    debug!("using data directory {}", data_dir.display());

    let provider: Arc<dyn TelemetryProvider> = Arc::new(ThingSpeakClient::new(&remote_config)?);
    let poller = Arc::new(Poller::new(
        provider.clone(),
        store.clone(),
        remote_config.channel_id,
    ));
    let relay = RelayController::new(
        provider,
        store.clone(),
        remote_config.channel_id,
        cli.settle_delay,
    );

    // Try to bind to the API port first, this will avoid polling
    // if the local port is taken
    let listener = Listener::bind(&cli.local_api_address).await?;
    debug!("bound to local address {}", cli.local_api_address);

    if cli.api_access_token.is_none() {
        warn!("no access token configured, the local API is unauthenticated");
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Start remote polling
    let poll = tokio::spawn(start_poll(
        poller.clone(),
        cli.poll_interval,
        shutdown_rx.clone(),
    ));

    // Start local API server
    let api = api::start(
        listener,
        ApiState {
            channel_id: remote_config.channel_id,
            store,
            poller,
            relay: relay.clone(),
            access_token: cli.api_access_token,
        },
        shutdown_rx,
    );
    tokio::pin!(api);

    let res = tokio::select! {
        res = &mut api => res,
        _ = wait_for_interrupt() => {
            shutdown_tx.send_replace(true);
            api.await
        }
    };

    // Let an in flight poll finish before exiting
    shutdown_tx.send_replace(true);
    poll.await?;

    // A command whose client went away may still be settling
    relay.wait_idle().await;
    debug!("relay idle");

    res?;
    Ok(())
}

async fn wait_for_interrupt() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("interrupt received"),
        Err(e) => {
            warn!("failed to listen for interrupts: {e}");
            future::pending().await
        }
    }
}
