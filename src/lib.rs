pub mod config;
pub mod entities;
pub mod error;
pub mod net;
pub mod persistence;
pub mod telemetry;
pub mod world;

use std::sync::Arc;

use tracing::{info, warn};

pub use config::{AppConfig, ServerSettings, SessionTimings, StorageKind};
pub use error::{CodecError, HandshakeError, ServerError, StateError, StoreError};
pub use net::handshake::{run_handshake, HandshakeContext, HandshakeExit, ServerContext};
pub use net::server::{install_shutdown_handler, run_server, ServerControl, Supervisor};
pub use net::state::{ConnectionState, ConnectionStateMachine};

use net::session_ids::SessionIdPool;
use persistence::store::{MemoryStore, Storage};
use persistence::yaml::YamlStore;
use telemetry::logging::{self, LogConfig};
use world::time::GameClock;

pub fn build_context(config: &AppConfig) -> Result<ServerContext, ServerError> {
    let settings = &config.settings;
    let store: Arc<dyn Storage> = match settings.storage {
        StorageKind::Memory => {
            warn!("memory storage selected, accounts and characters are lost on exit");
            Arc::new(MemoryStore::new())
        }
        StorageKind::Yaml => Arc::new(YamlStore::open(&config.root, settings.roster_cache)?),
    };
    Ok(ServerContext::new(
        store,
        GameClock::default(),
        settings.timings(),
        SessionIdPool::new(settings.session_id_initial, settings.session_id_max),
    ))
}

pub fn run(args: &[String]) -> Result<(), String> {
    let config = AppConfig::from_args(args).map_err(|err| err.to_string())?;
    let path = logging::init(
        &config.root,
        &LogConfig {
            level: config.settings.log_level.clone(),
        },
    )?;
    info!(log = %path.display(), "logging started");
    info!(
        root = %config.root.display(),
        storage = ?config.settings.storage,
        max_connections = config.settings.max_connections,
        "starting gateway"
    );

    let control = Arc::new(ServerControl::new());
    install_shutdown_handler(Arc::clone(&control)).map_err(|err| err.to_string())?;
    let server = Arc::new(build_context(&config).map_err(|err| err.to_string())?);
    run_server(
        &config.settings.bind_addr,
        server,
        config.settings.max_connections,
        &control,
    )
    .map_err(|err| err.to_string())?;
    info!("gateway stopped");
    Ok(())
}
