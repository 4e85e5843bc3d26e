use clap::Parser;
use gangway::bridge::{Activity, Bridge, PendingBaud};
use gangway::cli::{run_attach, Cli, Commands};
use gangway::config::Config;
use gangway::connectivity::ConnectivityManager;
use gangway::handlers::{router, AppState};
use gangway::indicator::{Indicator, LogIndicator, SysfsLed};
use gangway::link::NmcliLink;
use gangway::provision::FileDropProvisioner;
use gangway::registry::ViewerRegistry;
use gangway::serial::{SerialPeer, TtyPeer};
use gangway::storage::FileStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    // Default to INFO if RUST_LOG is not set
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    // Check if running as attach client
    if let Some(Commands::Attach { url }) = cli.command {
        if let Err(e) = run_attach(url).await {
            error!("attach client error: {}", e);
            std::process::exit(1);
        }
        return;
    }

    // Otherwise, run the bridge
    let config = Config::from_env();
    info!(
        device = %config.serial_device,
        baud = config.baud_rate,
        port = config.port,
        "starting gangway bridge"
    );

    let serial: Arc<dyn SerialPeer> = match TtyPeer::open(&config.serial_device, config.baud_rate)
    {
        Ok(peer) => Arc::new(peer),
        Err(e) => {
            error!("failed to open serial device: {}", e);
            std::process::exit(1);
        }
    };

    let indicator: Arc<dyn Indicator> = match config.led_path.clone() {
        Some(path) => Arc::new(SysfsLed::new(path)),
        None => Arc::new(LogIndicator),
    };

    let manager = Arc::new(ConnectivityManager::new(
        Arc::new(NmcliLink::new(config.wireless_ifname.clone())),
        Arc::new(FileDropProvisioner::new(config.provision_path.clone())),
        Arc::new(FileStore::new(config.credentials_path.clone())),
        indicator.clone(),
        Duration::from_secs(config.assoc_timeout_secs),
        Duration::from_millis(config.assoc_poll_ms),
    ));

    // Bring the link up before serving anything; provisioning may park us
    // here until a human pairs the device.
    manager.ensure_connected().await;

    let registry = Arc::new(ViewerRegistry::new(
        config.replay_capacity,
        config.max_viewers,
    ));
    let pending_baud = Arc::new(PendingBaud::new());
    let activity = Activity::new();
    let bridge = Arc::new(Bridge::new(
        serial,
        registry.clone(),
        manager.state(),
        indicator,
        pending_baud.clone(),
        activity.clone(),
    ));

    // The poll loop: link health first, then one serial drain. The
    // watchdog stalls this task while re-associating; viewers see a pause
    // in traffic, nothing more.
    let poll_interval = Duration::from_millis(config.poll_interval_ms);
    {
        let manager = manager.clone();
        let bridge = bridge.clone();
        tokio::spawn(async move {
            loop {
                manager.watchdog().await;
                bridge.poll_once();
                tokio::time::sleep(poll_interval).await;
            }
        });
    }

    let app = router(AppState {
        registry,
        bridge,
        state: manager.state(),
        pending_baud,
        activity,
    });

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    info!("gangway listening on {}", addr);

    axum::serve(listener, app)
        .await
        .expect("Failed to start server");
}
