use std::collections::HashMap;
#[cfg(unix)]
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use gss_notify::ChangeEvent;
use gss_protocol::{BusAddress, BusCodec, BusMessage, Method, ReplyBody, SignalBody, WireValue};
use gss_types::TypedValue;

use crate::error::{SdkError, SdkResult};

/// Replies still owed to callers, keyed by serial. `None` once the
/// connection is gone, so late callers fail instead of waiting forever.
type Pending = Arc<Mutex<Option<HashMap<u32, oneshot::Sender<ReplyBody>>>>>;

const SIGNAL_BUFFER: usize = 1024;
const OUTBOUND_QUEUE: usize = 256;

/// Stream of `Changed` signals received on a client connection.
pub struct ChangeStream {
    receiver: broadcast::Receiver<ChangeEvent>,
}

impl ChangeStream {
    /// Wait for the next change. Returns `None` once the connection closes.
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(missed)) => {
                    warn!(missed, "change stream lagged, signals dropped");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}

/// Async client for one bus connection to the service.
pub struct GameStateClient {
    bus: BusAddress,
    outbound: mpsc::Sender<BusMessage>,
    pending: Pending,
    signals: broadcast::Sender<ChangeEvent>,
    next_serial: AtomicU32,
    tasks: [JoinHandle<()>; 2],
}

impl GameStateClient {
    /// Connect over TCP.
    pub async fn connect_tcp(addr: impl ToSocketAddrs, bus: BusAddress) -> SdkResult<Self> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        Ok(Self::from_stream(stream, bus))
    }

    /// Connect over a Unix domain socket.
    #[cfg(unix)]
    pub async fn connect_unix(path: impl AsRef<Path>, bus: BusAddress) -> SdkResult<Self> {
        let stream = tokio::net::UnixStream::connect(path).await?;
        Ok(Self::from_stream(stream, bus))
    }

    /// Run the protocol over an established stream.
    pub fn from_stream<S>(stream: S, bus: BusAddress) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let codec = BusCodec::default();
        let (mut reader, mut writer) = tokio::io::split(stream);
        let (outbound, mut queue) = mpsc::channel::<BusMessage>(OUTBOUND_QUEUE);
        let pending: Pending = Arc::new(Mutex::new(Some(HashMap::new())));
        let (signals, _) = broadcast::channel(SIGNAL_BUFFER);

        let writer_task = tokio::spawn(async move {
            while let Some(msg) = queue.recv().await {
                if let Err(e) = codec.write_message(&mut writer, &msg).await {
                    debug!(error = %e, "client write failed");
                    break;
                }
            }
        });

        let reader_task = {
            let pending = Arc::clone(&pending);
            let signals = signals.clone();
            tokio::spawn(async move {
                loop {
                    match codec.read_message(&mut reader).await {
                        Ok(Some(msg)) => route(msg, &pending, &signals),
                        Ok(None) => break,
                        Err(e) => {
                            warn!(error = %e, "client read failed");
                            break;
                        }
                    }
                }
                // Dropping the senders wakes every waiting caller.
                pending.lock().unwrap_or_else(PoisonError::into_inner).take();
                debug!("client connection closed");
            })
        };

        Self {
            bus,
            outbound,
            pending,
            signals,
            next_serial: AtomicU32::new(1),
            tasks: [reader_task, writer_task],
        }
    }

    pub fn bus(&self) -> &BusAddress {
        &self.bus
    }

    /// Read a key. An unset key fails with a `KeyNotFound` fault.
    pub async fn get(&self, key: &str) -> SdkResult<TypedValue> {
        match self.call(Method::Get { key: key.into() }).await? {
            ReplyBody::Value(wire) => Ok(wire.decode()?),
            other => Err(unexpected("Get", other)),
        }
    }

    /// Write a key.
    pub async fn set(&self, key: &str, value: &TypedValue) -> SdkResult<()> {
        self.set_wire(key, WireValue::from(value)).await
    }

    /// Write a key with a caller-built tag and payload, unchecked locally.
    pub async fn set_wire(&self, key: &str, value: WireValue) -> SdkResult<()> {
        let method = Method::Set {
            key: key.into(),
            value,
        };
        match self.call(method).await? {
            ReplyBody::Ack => Ok(()),
            other => Err(unexpected("Set", other)),
        }
    }

    pub async fn ping(&self) -> SdkResult<()> {
        match self.call(Method::Ping).await? {
            ReplyBody::Ack => Ok(()),
            other => Err(unexpected("Ping", other)),
        }
    }

    /// Attach this connection to `Changed` signals, for the given keys or
    /// every key. The service keeps one filter per connection, so calling
    /// this again replaces the filter for all streams of this client.
    pub async fn subscribe(&self, keys: Option<Vec<String>>) -> SdkResult<ChangeStream> {
        // Take the receiver first so no signal after the ack is missed.
        let receiver = self.signals.subscribe();
        match self.call(Method::Subscribe { keys }).await? {
            ReplyBody::Ack => Ok(ChangeStream { receiver }),
            other => Err(unexpected("Subscribe", other)),
        }
    }

    /// Detach this connection from `Changed` signals.
    pub async fn unsubscribe(&self) -> SdkResult<()> {
        match self.call(Method::Unsubscribe).await? {
            ReplyBody::Ack => Ok(()),
            other => Err(unexpected("Unsubscribe", other)),
        }
    }

    /// Issue one call and wait for its reply. Fault replies become
    /// [`SdkError::Fault`].
    async fn call(&self, method: Method) -> SdkResult<ReplyBody> {
        let serial = self.next_serial.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
            match pending.as_mut() {
                Some(map) => {
                    map.insert(serial, tx);
                }
                None => return Err(SdkError::Disconnected),
            }
        }

        let msg = BusMessage::Call {
            serial,
            path: self.bus.object_path.clone(),
            interface: self.bus.interface.clone(),
            method,
        };
        if self.outbound.send(msg).await.is_err() {
            self.forget(serial);
            return Err(SdkError::Disconnected);
        }

        match rx.await {
            Ok(ReplyBody::Fault(fault)) => Err(SdkError::Fault(fault)),
            Ok(body) => Ok(body),
            Err(_) => Err(SdkError::Disconnected),
        }
    }

    fn forget(&self, serial: u32) {
        if let Some(map) = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_mut()
        {
            map.remove(&serial);
        }
    }
}

impl Drop for GameStateClient {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

impl std::fmt::Debug for GameStateClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameStateClient")
            .field("object_path", &self.bus.object_path)
            .field("interface", &self.bus.interface)
            .finish()
    }
}

fn unexpected(method: &'static str, reply: ReplyBody) -> SdkError {
    SdkError::UnexpectedReply {
        method,
        reply: format!("{reply:?}"),
    }
}

/// Deliver one inbound message to its waiting caller or to the signal
/// streams.
fn route(msg: BusMessage, pending: &Pending, signals: &broadcast::Sender<ChangeEvent>) {
    match msg {
        BusMessage::Reply { serial, body } => {
            let waiter = pending
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .as_mut()
                .and_then(|map| map.remove(&serial));
            match waiter {
                Some(tx) => {
                    let _ = tx.send(body);
                }
                None => warn!(serial, "reply for unknown call"),
            }
        }
        BusMessage::Signal {
            signal: SignalBody::Changed {
                key,
                value,
                sequence,
            },
            ..
        } => match value.decode() {
            Ok(value) => {
                // No live streams is fine.
                let _ = signals.send(ChangeEvent::new(sequence, key, value));
            }
            Err(e) => warn!(key = %key, error = %e, "undecodable Changed signal"),
        },
        BusMessage::Call { serial, .. } => {
            warn!(serial, "ignoring call from service");
        }
    }
}
