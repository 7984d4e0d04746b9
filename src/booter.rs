use anyhow::Error;
use axum::Router;
use std::net::SocketAddr;
use tokio::net::TcpListener;

pub struct Booter {
    pub port: u16,
    tcp_listener: TcpListener,
}

impl Booter {
    pub async fn new(port: u16) -> Result<Self, Error> {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        let listener = TcpListener::bind(addr).await?;
        tracing::info!("Listening on {}", addr);

        Ok(Self {
            port,
            tcp_listener: listener,
        })
    }

    pub async fn start(self, router: Router) -> Result<(), Error> {
        axum::serve(
            self.tcp_listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await?;
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
