use std::future::Future;
#[cfg(unix)]
use std::path::Path;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use gss_notify::{ChangeNotifier, NotifierConfig};
use gss_protocol::{BusCodec, PROTOCOL_VERSION};
use gss_store::InMemoryStateStore;

use crate::config::{ListenAddr, ServerConfig};
use crate::error::{ServerError, ServerResult};
use crate::handler::RequestHandler;
use crate::session::Session;

/// The GameState service: one store, one notifier, many bus connections.
///
/// Construction creates the store and wires it to the notifier; the store
/// lives exactly as long as the service value and its clones.
#[derive(Clone)]
pub struct GameStateService {
    config: ServerConfig,
    notifier: Arc<ChangeNotifier>,
    store: Arc<InMemoryStateStore>,
    handler: Arc<RequestHandler>,
    connections: Arc<Semaphore>,
}

impl GameStateService {
    pub fn new(config: ServerConfig) -> Self {
        let notifier = Arc::new(ChangeNotifier::new(NotifierConfig {
            channel_capacity: config.channel_capacity,
        }));
        let store = Arc::new(InMemoryStateStore::new(Arc::clone(&notifier)));
        let handler = Arc::new(RequestHandler::new(store.clone(), config.bus.clone()));
        // Configs that skipped `validate` must not panic here.
        let permits = config.max_connections.min(Semaphore::MAX_PERMITS);
        let connections = Arc::new(Semaphore::new(permits));
        Self {
            config,
            notifier,
            store,
            handler,
            connections,
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<InMemoryStateStore> {
        &self.store
    }

    pub fn notifier(&self) -> &Arc<ChangeNotifier> {
        &self.notifier
    }

    /// Serve one already-established connection on a new task.
    ///
    /// Connections beyond `max_connections` are dropped immediately.
    pub fn spawn_connection<S>(&self, stream: S, peer: String)
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let permit = match Arc::clone(&self.connections).try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                warn!(peer = %peer, max = self.config.max_connections, "connection limit reached, rejecting");
                return;
            }
        };
        let session = Session::new(
            peer,
            Arc::clone(&self.handler),
            Arc::clone(&self.notifier),
            BusCodec::new(self.config.max_frame_size),
        );
        tokio::spawn(async move {
            session.run(stream).await;
            drop(permit);
        });
    }

    /// Bind the configured address and serve until `shutdown` resolves.
    pub async fn serve_until<F>(self, shutdown: F) -> ServerResult<()>
    where
        F: Future<Output = ()>,
    {
        match self.config.listen.clone() {
            ListenAddr::Tcp(addr) => {
                let listener = TcpListener::bind(addr).await?;
                self.serve_tcp(listener, shutdown).await
            }
            #[cfg(unix)]
            ListenAddr::Unix(path) => {
                remove_stale_socket(&path)?;
                let listener = tokio::net::UnixListener::bind(&path)?;
                let result = self.serve_unix(listener, shutdown).await;
                let _ = std::fs::remove_file(&path);
                result
            }
            #[cfg(not(unix))]
            ListenAddr::Unix(path) => Err(ServerError::Config(format!(
                "unix sockets are not supported on this platform: {}",
                path.display()
            ))),
        }
    }

    /// Serve until the process receives Ctrl-C.
    pub async fn serve(self) -> ServerResult<()> {
        self.serve_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Accept loop over an already-bound TCP listener.
    pub async fn serve_tcp<F>(self, listener: TcpListener, shutdown: F) -> ServerResult<()>
    where
        F: Future<Output = ()>,
    {
        let local = listener.local_addr()?;
        self.log_started(&ListenAddr::Tcp(local));
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let _ = stream.set_nodelay(true);
                        self.spawn_connection(stream, peer.to_string());
                    }
                    Err(e) => warn!(error = %e, "accept failed"),
                },
            }
        }
        info!("service stopped");
        Ok(())
    }

    /// Accept loop over an already-bound Unix listener.
    #[cfg(unix)]
    pub async fn serve_unix<F>(
        self,
        listener: tokio::net::UnixListener,
        shutdown: F,
    ) -> ServerResult<()>
    where
        F: Future<Output = ()>,
    {
        let local = listener
            .local_addr()?
            .as_pathname()
            .map(|p| p.to_path_buf())
            .ok_or_else(|| ServerError::Internal("unnamed unix listener".into()))?;
        self.log_started(&ListenAddr::Unix(local));
        tokio::pin!(shutdown);
        let mut next_peer = 0u64;
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, _)) => {
                        next_peer += 1;
                        self.spawn_connection(stream, format!("unix#{next_peer}"));
                    }
                    Err(e) => warn!(error = %e, "accept failed"),
                },
            }
        }
        info!("service stopped");
        Ok(())
    }

    fn log_started(&self, listen: &ListenAddr) {
        info!(
            listen = %listen,
            service = %self.config.bus.service,
            object_path = %self.config.bus.object_path,
            interface = %self.config.bus.interface,
            protocol_version = PROTOCOL_VERSION,
            "GameState service listening"
        );
    }
}

/// Remove a socket file left behind by an earlier run, which would block
/// bind. Anything else at the path is left alone and reported.
#[cfg(unix)]
fn remove_stale_socket(path: &Path) -> ServerResult<()> {
    use std::os::unix::fs::FileTypeExt;

    match std::fs::symlink_metadata(path) {
        Ok(meta) if meta.file_type().is_socket() => {
            std::fs::remove_file(path)?;
            Ok(())
        }
        Ok(_) => Err(ServerError::Config(format!(
            "{} exists and is not a socket",
            path.display()
        ))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

impl std::fmt::Debug for GameStateService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameStateService")
            .field("listen", &self.config.listen)
            .field("store", &self.store)
            .field("notifier", &self.notifier)
            .finish()
    }
}
