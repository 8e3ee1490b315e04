use std::net::SocketAddr;
use std::sync::Once;
use std::time::Duration;

use d_health::serve_with_listener;
use d_health::Checker;
use d_health::Client;
use d_health::HealthService;
use d_health::Result;
use d_health::ServerConfig;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::timeout;

pub const WAIT_FOR_SERVER_IN_SEC: u64 = 5;

static LOGGER_INIT: Once = Once::new();

pub fn enable_logger() {
    LOGGER_INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// A health server on an ephemeral localhost port.
pub struct TestServer {
    pub addr: SocketAddr,
    shutdown_tx: watch::Sender<()>,
    handle: JoinHandle<Result<()>>,
}

impl TestServer {
    pub async fn start<C: Checker>(service: HealthService<C>) -> Self {
        Self::start_with_config(service, ServerConfig::default()).await
    }

    pub async fn start_with_config<C: Checker>(
        service: HealthService<C>,
        config: ServerConfig,
    ) -> Self {
        enable_logger();
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind ephemeral port");
        let addr = listener.local_addr().expect("local addr");
        let (shutdown_tx, shutdown_rx) = watch::channel(());
        let handle = tokio::spawn(serve_with_listener(service, config, listener, shutdown_rx));
        Self {
            addr,
            shutdown_tx,
            handle,
        }
    }

    pub async fn client(&self) -> Client {
        Client::builder(self.addr.to_string())
            .connect_timeout(Duration::from_secs(WAIT_FOR_SERVER_IN_SEC))
            .build()
            .await
            .expect("connect to test server")
    }

    /// Signals shutdown and waits for the server to finish.
    pub async fn shutdown(self) {
        self.shutdown_tx.send(()).expect("server still listening");
        timeout(Duration::from_secs(WAIT_FOR_SERVER_IN_SEC), self.handle)
            .await
            .expect("server did not stop in time")
            .expect("server task panicked")
            .expect("server failed");
    }
}
