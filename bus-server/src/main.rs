use std::net::SocketAddr;
use std::path::Path;

use tracing_subscriber::EnvFilter;

use bus_server::config::Config;
use bus_server::gtfs::SharedSnapshot;
use bus_server::web::{AppState, create_router};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    // Optional explicit config path as the first argument.
    let config = match std::env::args().nth(1) {
        Some(path) => Config::load(Path::new(&path)),
        None => Config::find_and_load(),
    };
    let config = config.expect("Failed to load configuration");

    // Fail fast: a server without a snapshot has nothing to serve. After
    // startup, refreshes that fail keep the old snapshot instead.
    let snapshot = SharedSnapshot::load(&config.gtfs.data_dir)
        .expect("Failed to load GTFS dataset; run gtfs_refresh first");
    let current = snapshot.current().await;
    println!(
        "Loaded GTFS snapshot: {} stops, {} trips, {} stop times",
        current.stop_count(),
        current.trip_count(),
        current.stop_time_count()
    );
    drop(current);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .expect("Invalid server host/port");

    let state = AppState::new(snapshot, config);
    let app = create_router(state);

    println!("Bus arrival server listening on http://{addr}");
    println!();
    println!("Endpoints:");
    println!("  GET  /                  - Service status");
    println!("  GET  /health            - Health check");
    println!("  GET  /bus               - Arrivals as JSON");
    println!("  GET  /bus/speech        - Voice assistant payload");
    println!("  GET  /lametric          - LaMetric poll frames");
    println!("  GET  /lametric/activate - Activate with 5-minute revert");
    println!("  POST /admin/reload      - Re-read the dataset directory");

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
