use std::process::ExitCode;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use rudis::config::ServerConfig;
use rudis::context::{Role, ServerContext};
use rudis::dispatcher;
use rudis::rdb;
use rudis::replication;
use rudis::store;

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = match ServerConfig::from_args(std::env::args()) {
        Ok(config) => config,
        Err(err) => {
            error!(%err, "invalid command line arguments");
            return ExitCode::FAILURE;
        }
    };

    let ctx = ServerContext::new(config);

    match rdb::load_rdb_file(&ctx.config.rdb_path(), &ctx.store).await {
        Ok(0) => {}
        Ok(loaded) => info!(loaded, path = %ctx.config.rdb_path().display(), "loaded snapshot"),
        Err(err) => warn!(%err, "failed to load snapshot, starting with an empty store"),
    }

    store::spawn_expiry_reaper(Arc::clone(&ctx.store));

    if let Role::Replica { host, port } = ctx.role.clone() {
        let driver_ctx = Arc::clone(&ctx);
        tokio::spawn(async move {
            if let Err(err) = replication::run(driver_ctx, &host, port).await {
                error!(%err, "replication driver stopped");
            }
        });
    }

    let address = format!("0.0.0.0:{}", ctx.config.port);
    let listener = match TcpListener::bind(&address).await {
        Ok(listener) => listener,
        Err(err) => {
            error!(%address, %err, "failed to bind listener");
            return ExitCode::FAILURE;
        }
    };

    info!(%address, role = ctx.role.as_str(), repl_id = %ctx.repl_id, "server started");
    dispatcher::serve(ctx, listener).await;

    ExitCode::SUCCESS
}
