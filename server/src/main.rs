use hyper_util::rt::TokioIo;
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use pagekeeper_server::cache::sqlite::SqliteCacheStore;
use pagekeeper_server::{CacheStore, Config, GatewayState, HttpUpstream, Upstream, server};
use pagekeeper_server::lifecycle;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tower::Service;
use tracing::{debug, error, info};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = Config::load().expect("Failed to load configuration");

    // PAGEKEEPER_DB points at the SQLite file holding the cache generations
    let db_path = std::env::var("PAGEKEEPER_DB")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("./pagekeeper.db"));
    let store: Arc<dyn CacheStore> = Arc::new(
        SqliteCacheStore::new(&db_path).expect("Failed to open cache store"),
    );

    let upstream: Arc<dyn Upstream> = Arc::new(
        HttpUpstream::new(&config.upstream).expect("Failed to build upstream client"),
    );

    // Install the configured generation, then retire every other one.
    // An install failure exits without touching previously installed
    // generations; the supervisor retries the deployment later.
    lifecycle::install(&config, store.as_ref(), upstream.as_ref())
        .await
        .expect("Failed to install cache generation");
    lifecycle::activate(&config, store.as_ref())
        .await
        .expect("Failed to activate cache generation");

    let listen_addr = config.listen_addr.clone();
    let state = Arc::new(
        GatewayState::new(config, store, upstream).expect("Invalid origin configuration"),
    );
    let app = server::create_app(state);

    let listener = tokio::net::TcpListener::bind(&listen_addr)
        .await
        .expect("Failed to bind listen address");
    info!("Pagekeeper gateway listening on http://{} (HTTP/1.1 + HTTP/2)", listen_addr);
    info!("Cache store: {}", db_path.display());

    // Use hyper's auto-negotiating server to support both HTTP/1.1 and HTTP/2
    let conn_builder = ConnBuilder::new(hyper_util::rt::TokioExecutor::new());

    loop {
        let (stream, addr) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                error!("Failed to accept connection: {}", e);
                continue;
            }
        };
        debug!("New connection from: {}", addr);
        let io = TokioIo::new(stream);
        let app_clone = app.clone();
        let conn_builder = conn_builder.clone();

        tokio::spawn(async move {
            if let Err(err) = conn_builder
                .serve_connection_with_upgrades(
                    io,
                    hyper::service::service_fn(move |req| app_clone.clone().call(req)),
                )
                .await
            {
                // Check if the error is an io::Error indicating a normal close
                let is_normal_close = err
                    .source()
                    .and_then(|e| e.downcast_ref::<io::Error>())
                    .map(|io_err| {
                        matches!(
                            io_err.kind(),
                            io::ErrorKind::ConnectionReset
                                | io::ErrorKind::BrokenPipe
                                | io::ErrorKind::UnexpectedEof
                        )
                    })
                    .unwrap_or(false);

                if is_normal_close {
                    debug!("Connection from {} closed normally", addr);
                } else {
                    error!("Error serving connection from {}: {}", addr, err);
                }
            }
        });
    }
}
