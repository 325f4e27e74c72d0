//! The `chatrelay` binary: configure from the environment and serve.

use std::sync::Arc;

use chatrelay::prelude::*;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), ChatRelayError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::from_env()?;
    tracing::info!(
        bind = %config.bind_addr,
        transport = ?config.transport,
        wire = ?config.wire,
        "starting chatrelay"
    );

    let mut builder = ChatRelayServer::builder().config(config.clone());
    if let Some(path) = &config.chat_log {
        builder = builder.chat_log(Arc::new(FileChatLog::open(path).await?));
    }

    match (config.transport, config.wire) {
        (TransportKind::Tcp, WireFormat::Json) => serve(builder.build_tcp(JsonCodec).await?).await,
        (TransportKind::Tcp, WireFormat::PlainText) => {
            serve(builder.build_tcp(PlainTextCodec).await?).await
        }
        (TransportKind::WebSocket, WireFormat::Json) => {
            serve(builder.build_websocket(JsonCodec).await?).await
        }
        (TransportKind::WebSocket, WireFormat::PlainText) => {
            serve(builder.build_websocket(PlainTextCodec).await?).await
        }
    }
}

/// Runs `server` with Ctrl-C wired to shutdown: the first press starts the
/// countdown, the next one closes immediately.
async fn serve<T: Transport, C: Codec>(server: ChatRelayServer<T, C>) -> Result<(), ChatRelayError> {
    let handle = server.handle();
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            let handle = handle.clone();
            tokio::spawn(async move { handle.shutdown().await });
        }
    });

    server.run().await
}
