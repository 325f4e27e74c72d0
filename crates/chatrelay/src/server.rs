//! `ChatRelayServer` builder, accept loop, and shutdown handle.
//!
//! This is the entry point for running a relay. It ties together all the
//! layers: transport → protocol → roster → sessions.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chatrelay_protocol::{Codec, JsonCodec, lines};
use chatrelay_roster::Roster;
use chatrelay_transport::{TcpTransport, Transport, WebSocketTransport};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinSet;

use crate::handler::{SessionEnd, handle_connection};
use crate::{
    ChatLog, ChatRelayError, HelpViewer, NullChatLog, ServerConfig, TracingHelpViewer,
};

/// How long `run()` waits for sessions to finish after shutdown.
const SESSION_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Countdown granularity.
const COUNTDOWN_TICK: Duration = Duration::from_secs(1);

/// The countdown is announced whenever this many seconds divide what is left.
const ANNOUNCE_EVERY_SECS: u64 = 5;

/// Shared server state passed to each session task.
///
/// Wrapped in `Arc` so it can be cheaply cloned across tasks. The roster
/// is the only mutable state shared between sessions and sits behind a
/// single lock.
pub(crate) struct ServerState {
    pub(crate) roster: Mutex<Roster>,
    pub(crate) config: ServerConfig,
    pub(crate) log: Arc<dyn ChatLog>,
    pub(crate) help: Arc<dyn HelpViewer>,
    /// Flips to `true` exactly once, while the roster lock is held.
    pub(crate) shutdown: watch::Sender<bool>,
    countdown_started: AtomicBool,
}

impl ServerState {
    pub(crate) fn new(
        config: ServerConfig,
        log: Arc<dyn ChatLog>,
        help: Arc<dyn HelpViewer>,
    ) -> Self {
        Self {
            roster: Mutex::new(Roster::new()),
            config,
            log,
            help,
            shutdown: watch::Sender::new(false),
            countdown_started: AtomicBool::new(false),
        }
    }

    /// True once the server has closed. Checked under the roster lock so
    /// nothing registers or broadcasts after the final notice.
    pub(crate) fn is_shutting_down(&self) -> bool {
        *self.shutdown.borrow()
    }
}

/// Builder for configuring and starting a relay server.
///
/// # Example
///
/// ```rust,no_run
/// use chatrelay::prelude::*;
///
/// # async fn start() -> Result<(), ChatRelayError> {
/// let server = ChatRelayServer::builder()
///     .bind("0.0.0.0:9999")
///     .build_tcp(JsonCodec)
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct ChatRelayServerBuilder {
    config: ServerConfig,
    log: Arc<dyn ChatLog>,
    help: Arc<dyn HelpViewer>,
}

impl ChatRelayServerBuilder {
    /// Creates a new builder with default settings, no chat log, and help
    /// requests going to the server log.
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            log: Arc::new(NullChatLog),
            help: Arc::new(TracingHelpViewer),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets where finalized chat lines are recorded.
    pub fn chat_log(mut self, log: Arc<dyn ChatLog>) -> Self {
        self.log = log;
        self
    }

    /// Sets what handles `/help`.
    pub fn help_viewer(mut self, help: Arc<dyn HelpViewer>) -> Self {
        self.help = help;
        self
    }

    /// Binds a newline-delimited TCP listener and builds the server.
    pub async fn build_tcp<C: Codec>(
        self,
        codec: C,
    ) -> Result<ChatRelayServer<TcpTransport, C>, ChatRelayError> {
        let transport = TcpTransport::bind(&self.config.bind_addr).await?;
        Ok(self.build_with(transport, codec))
    }

    /// Binds a WebSocket listener and builds the server.
    pub async fn build_websocket<C: Codec>(
        self,
        codec: C,
    ) -> Result<ChatRelayServer<WebSocketTransport, C>, ChatRelayError> {
        let transport = WebSocketTransport::bind(&self.config.bind_addr).await?;
        Ok(self.build_with(transport, codec))
    }

    /// Builds the server around an already bound transport.
    pub fn build_with<T: Transport, C: Codec>(
        self,
        transport: T,
        codec: C,
    ) -> ChatRelayServer<T, C> {
        ChatRelayServer {
            transport,
            codec: Arc::new(codec),
            state: Arc::new(ServerState::new(self.config, self.log, self.help)),
        }
    }
}

impl Default for ChatRelayServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A relay server bound to a listener.
///
/// Call [`run()`](Self::run) to start accepting connections and
/// [`handle()`](Self::handle) for a way to stop it.
pub struct ChatRelayServer<T: Transport, C: Codec> {
    transport: T,
    codec: Arc<C>,
    state: Arc<ServerState>,
}

impl ChatRelayServer<TcpTransport, JsonCodec> {
    /// Creates a new builder.
    ///
    /// Lives on the default instantiation so `ChatRelayServer::builder()`
    /// needs no type annotations; the `build_*` methods pick the real
    /// transport and codec.
    pub fn builder() -> ChatRelayServerBuilder {
        ChatRelayServerBuilder::new()
    }
}

impl<T: Transport, C: Codec> ChatRelayServer<T, C> {
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.transport.local_addr()
    }

    /// A handle that can shut the server down from another task.
    pub fn handle(&self) -> ServerHandle {
        ServerHandle {
            state: Arc::clone(&self.state),
        }
    }

    /// Runs the accept loop until the server is shut down.
    ///
    /// Every accepted connection gets its own session task. A failed
    /// accept is logged and retried after the configured delay; it never
    /// stops the server. After shutdown the listener is closed and the
    /// remaining sessions get a short grace period to finish.
    pub async fn run(mut self) -> Result<(), ChatRelayError> {
        let mut shutdown = self.state.shutdown.subscribe();
        let mut sessions: JoinSet<SessionEnd> = JoinSet::new();

        match self.local_addr() {
            Ok(addr) => tracing::info!(%addr, "chatrelay server running"),
            Err(_) => tracing::info!("chatrelay server running"),
        }

        loop {
            if *shutdown.borrow_and_update() {
                break;
            }

            tokio::select! {
                _ = shutdown.changed() => break,
                accepted = self.transport.accept() => match accepted {
                    Ok(conn) => {
                        let state = Arc::clone(&self.state);
                        let codec = Arc::clone(&self.codec);
                        sessions.spawn(handle_connection(conn, state, codec));
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "accept failed");
                        tokio::time::sleep(self.state.config.accept_retry_delay).await;
                    }
                },
                Some(finished) = sessions.join_next(), if !sessions.is_empty() => {
                    reap(finished);
                }
            }
        }

        if let Err(e) = self.transport.shutdown().await {
            tracing::warn!(error = %e, "transport shutdown failed");
        }

        let drain = async {
            while let Some(finished) = sessions.join_next().await {
                reap(finished);
            }
        };
        if tokio::time::timeout(SESSION_DRAIN_TIMEOUT, drain).await.is_err() {
            tracing::warn!(remaining = sessions.len(), "aborting sessions that did not finish");
            sessions.abort_all();
        }

        tracing::info!("chatrelay server stopped");
        Ok(())
    }
}

fn reap(finished: Result<SessionEnd, tokio::task::JoinError>) {
    if let Err(e) = finished {
        if e.is_panic() {
            tracing::error!(error = %e, "session task panicked");
        }
    }
}

/// Stops a running server from outside the accept loop.
///
/// Cheap to clone; every clone controls the same server.
#[derive(Clone)]
pub struct ServerHandle {
    state: Arc<ServerState>,
}

impl ServerHandle {
    /// Announces the shutdown, counts down, then closes the server.
    ///
    /// Everyone is told "Server has received a shutdown request and will
    /// shut down in N seconds.", then "Ns until server shutdown" whenever
    /// the remaining seconds are a multiple of five. Calling this again
    /// while a countdown is running closes the server immediately.
    pub async fn shutdown(&self) {
        if self.state.countdown_started.swap(true, Ordering::SeqCst) {
            tracing::warn!("repeated shutdown request, closing now");
            self.shutdown_now().await;
            return;
        }

        let total = self.state.config.shutdown_countdown.as_secs();
        tracing::info!(secs = total, "shutdown requested");
        self.broadcast(&lines::shutdown_announced(total)).await;

        let mut closed = self.state.shutdown.subscribe();
        let mut remaining = total;
        while remaining > 0 {
            if self.state.is_shutting_down() {
                return;
            }
            tokio::select! {
                _ = closed.changed() => return,
                _ = tokio::time::sleep(COUNTDOWN_TICK) => {}
            }
            remaining -= 1;
            if remaining > 0 && remaining % ANNOUNCE_EVERY_SECS == 0 {
                self.broadcast(&lines::shutdown_countdown(remaining)).await;
            }
        }

        self.shutdown_now().await;
    }

    /// Closes the server without a countdown.
    ///
    /// Every registered client gets "Server closed." and `/disconnect`,
    /// then its connection is closed. Sessions that never connected are
    /// signalled to stop as well. Idempotent.
    pub async fn shutdown_now(&self) {
        let mut roster = self.state.roster.lock().await;
        if self.state.is_shutting_down() {
            return;
        }

        roster.broadcast(lines::SERVER_CLOSED);
        roster.broadcast(lines::DISCONNECT);

        let ids: Vec<_> = roster.entries().map(|entry| entry.writer().id()).collect();
        for id in ids {
            if let Some(entry) = roster.unregister(id) {
                entry.writer().close();
            }
        }

        self.state.shutdown.send_replace(true);
        tracing::info!("server closed");
    }

    /// True once the server has closed.
    pub fn is_closed(&self) -> bool {
        self.state.is_shutting_down()
    }

    async fn broadcast(&self, line: &str) {
        let roster = self.state.roster.lock().await;
        if !self.state.is_shutting_down() {
            roster.broadcast(line);
        }
    }
}
