mod config;
mod console;
mod gateway;
mod sessions;
mod simulation;

use std::net::SocketAddr;
use std::time::Duration;

use config::ServerConfig;
use lineage_game::{GameEngine, Registry};
use lineage_world::storage::WorldStorage;
use lineage_world::WorldMap;
use simulation::{Cadence, SimCommand, Simulation};
use tokio::io::AsyncBufReadExt;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

fn load_world(config: &ServerConfig, storage: &WorldStorage, registry: &Registry) -> WorldMap {
    match storage.load() {
        Ok(Some(save)) => match WorldMap::from_save(save, registry.spawn_tables()) {
            Ok(map) => {
                info!(
                    path = %storage.path().display(),
                    seed = map.seed(),
                    objects = map.object_count(),
                    "world loaded"
                );
                return map;
            }
            Err(e) => warn!("saved world is unusable, generating a new one: {e}"),
        },
        Ok(None) => {}
        Err(e) => warn!("failed to read saved world, generating a new one: {e}"),
    }

    let seed = config.world.seed.unwrap_or_else(rand::random);
    let mut map = WorldMap::generate(seed, Default::default(), registry.spawn_tables());
    let biomes: Vec<String> = map
        .biome_counts()
        .into_iter()
        .map(|(biome, count)| format!("{}={count}", biome.name()))
        .collect();
    info!(seed, objects = map.object_count(), biomes = %biomes.join(" "), "world generated");
    map.request_save_now();
    map
}

#[tokio::main]
async fn main() {
    let config = match ServerConfig::load_or_default("server.toml") {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load server.toml: {e}");
            std::process::exit(1);
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    info!(
        "Lineage server v{} starting on {}:{}",
        env!("CARGO_PKG_VERSION"),
        config.server.address,
        config.server.port
    );

    let registry = match Registry::load(&config.world.data_dir) {
        Ok(r) => r,
        Err(e) => {
            error!("Failed to load registry from {}: {e}", config.world.data_dir.display());
            std::process::exit(1);
        }
    };

    let storage = WorldStorage::new(&config.world.save_path);
    let map = load_world(&config, &storage, &registry);
    let engine = match GameEngine::new(map, registry, config.game.clone(), rand::random()) {
        Ok(e) => e,
        Err(e) => {
            error!("Failed to start game engine: {e}");
            std::process::exit(1);
        }
    };

    let addr: SocketAddr = match format!("{}:{}", config.server.address, config.server.port).parse() {
        Ok(a) => a,
        Err(e) => {
            error!("Invalid bind address: {e}");
            std::process::exit(1);
        }
    };
    let listener = match TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("Failed to bind {addr}: {e}");
            std::process::exit(1);
        }
    };
    info!("Listening on {addr}");

    let (commands_tx, commands_rx) = tokio::sync::mpsc::channel::<SimCommand>(1024);
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    // Handle Ctrl+C
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        let _ = shutdown_tx.send(true);
    });

    // Console REPL: read lines from stdin
    let console_tx = commands_tx.clone();
    tokio::spawn(async move {
        let stdin = tokio::io::BufReader::new(tokio::io::stdin());
        let mut lines = stdin.lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let line = line.trim().to_string();
            if line.is_empty() {
                continue;
            }
            let (reply, response) = tokio::sync::oneshot::channel();
            if console_tx.send(SimCommand::Console { line, reply }).await.is_err() {
                break;
            }
            if let Ok(text) = response.await {
                println!("{text}");
            }
        }
    });

    tokio::spawn(gateway::run(listener, commands_tx));

    let cadence = Cadence {
        slow: config.server.slow_tick(),
        fast: config.server.fast_tick(),
    };
    let grace = Duration::from_secs(config.session.reconnect_grace_secs);
    Simulation::new(engine, storage, grace)
        .run(cadence, commands_rx, shutdown_rx)
        .await;

    info!("Server shut down.");
}
