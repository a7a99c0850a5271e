use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use gss_notify::{ChangeNotifier, SubscriberId, SubscriptionFilter};
use gss_protocol::{BusCodec, BusMessage, ReplyBody, SignalBody, WireValue};

use crate::handler::{Outcome, RequestHandler};

/// Outbound frames queued per connection before producers wait.
const OUTBOUND_QUEUE: usize = 1024;

/// The connection's current attachment to the change notifier.
struct Attachment {
    id: SubscriberId,
    forwarder: JoinHandle<()>,
}

/// One bus connection.
///
/// Calls are read and handled one at a time. Replies and forwarded
/// `Changed` signals share a single outbound queue drained by one writer
/// task, so frames never interleave on the wire. When the connection ends
/// its subscription is detached; a write that was already applied stays
/// applied and published.
pub struct Session {
    peer: String,
    handler: Arc<RequestHandler>,
    notifier: Arc<ChangeNotifier>,
    codec: BusCodec,
    attachment: Option<Attachment>,
}

impl Session {
    pub fn new(
        peer: impl Into<String>,
        handler: Arc<RequestHandler>,
        notifier: Arc<ChangeNotifier>,
        codec: BusCodec,
    ) -> Self {
        Self {
            peer: peer.into(),
            handler,
            notifier,
            codec,
            attachment: None,
        }
    }

    /// Serve the connection until the peer hangs up or sends garbage.
    pub async fn run<S>(mut self, stream: S)
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (mut reader, mut writer) = tokio::io::split(stream);
        let (outbound, mut queue) = mpsc::channel::<BusMessage>(OUTBOUND_QUEUE);

        let codec = self.codec;
        let peer = self.peer.clone();
        let writer_task = tokio::spawn(async move {
            while let Some(msg) = queue.recv().await {
                if let Err(e) = codec.write_message(&mut writer, &msg).await {
                    debug!(peer = %peer, error = %e, "write failed, closing writer");
                    break;
                }
            }
        });

        info!(peer = %self.peer, "connection opened");
        loop {
            let msg = match self.codec.read_message(&mut reader).await {
                Ok(Some(msg)) => msg,
                Ok(None) => break,
                Err(e) => {
                    warn!(peer = %self.peer, error = %e, "malformed frame, closing connection");
                    break;
                }
            };

            match msg {
                BusMessage::Call {
                    serial,
                    path,
                    interface,
                    method,
                } => {
                    debug!(peer = %self.peer, serial, method = method.name(), "call");
                    let body = match self.handler.handle(&path, &interface, method) {
                        Outcome::Reply(body) => body,
                        Outcome::Subscribe(filter) => {
                            self.attach(filter, outbound.clone());
                            ReplyBody::Ack
                        }
                        Outcome::Unsubscribe => {
                            self.detach();
                            ReplyBody::Ack
                        }
                    };
                    if outbound.send(BusMessage::Reply { serial, body }).await.is_err() {
                        break;
                    }
                }
                other => {
                    warn!(peer = %self.peer, kind = other.type_name(), "ignoring non-call message");
                }
            }
        }

        self.detach();
        drop(outbound);
        let _ = writer_task.await;
        info!(peer = %self.peer, "connection closed");
    }

    /// Attach (or re-attach with a new filter) to the change notifier.
    fn attach(&mut self, filter: SubscriptionFilter, outbound: mpsc::Sender<BusMessage>) {
        self.detach();

        let mut subscription = self.notifier.subscribe(filter);
        let id = subscription.id();
        let path = self.handler.bus().object_path.clone();
        let interface = self.handler.bus().interface.clone();

        let forwarder = tokio::spawn(async move {
            while let Some(event) = subscription.recv().await {
                let signal = BusMessage::Signal {
                    path: path.clone(),
                    interface: interface.clone(),
                    signal: SignalBody::Changed {
                        value: WireValue::from(&event.value),
                        key: event.key,
                        sequence: event.sequence,
                    },
                };
                if outbound.send(signal).await.is_err() {
                    break;
                }
            }
        });

        debug!(peer = %self.peer, subscriber = %id, "subscribed");
        self.attachment = Some(Attachment { id, forwarder });
    }

    fn detach(&mut self) {
        if let Some(attachment) = self.attachment.take() {
            self.notifier.detach(attachment.id);
            attachment.forwarder.abort();
            debug!(peer = %self.peer, subscriber = %attachment.id, "unsubscribed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gss_protocol::{BusAddress, Fault, FaultCode, Method};
    use gss_store::{InMemoryStateStore, StateStore};
    use gss_types::TypedValue;
    use tokio::io::DuplexStream;

    struct Harness {
        codec: BusCodec,
        client: DuplexStream,
        store: Arc<InMemoryStateStore>,
        notifier: Arc<ChangeNotifier>,
        bus: BusAddress,
        serial: u32,
    }

    impl Harness {
        fn start() -> Self {
            let notifier = Arc::new(ChangeNotifier::default());
            let store = Arc::new(InMemoryStateStore::new(Arc::clone(&notifier)));
            let bus = BusAddress::default();
            let handler = Arc::new(RequestHandler::new(store.clone(), bus.clone()));
            let (client, server) = tokio::io::duplex(64 * 1024);
            let session = Session::new("test", handler, Arc::clone(&notifier), BusCodec::default());
            tokio::spawn(session.run(server));
            Self {
                codec: BusCodec::default(),
                client,
                store,
                notifier,
                bus,
                serial: 0,
            }
        }

        async fn send(&mut self, method: Method) -> u32 {
            self.serial += 1;
            let msg = BusMessage::Call {
                serial: self.serial,
                path: self.bus.object_path.clone(),
                interface: self.bus.interface.clone(),
                method,
            };
            self.codec.write_message(&mut self.client, &msg).await.unwrap();
            self.serial
        }

        async fn next(&mut self) -> BusMessage {
            self.codec.read_message(&mut self.client).await.unwrap().unwrap()
        }

        async fn call(&mut self, method: Method) -> ReplyBody {
            let serial = self.send(method).await;
            match self.next().await {
                BusMessage::Reply { serial: s, body } => {
                    assert_eq!(s, serial);
                    body
                }
                other => panic!("expected reply, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn get_and_set_over_the_connection() {
        let mut h = Harness::start();
        let value = TypedValue::Double(0.10);
        let body = h
            .call(Method::Set {
                key: "SAMPLE_003".into(),
                value: WireValue::from(&value),
            })
            .await;
        assert_eq!(body, ReplyBody::Ack);
        assert_eq!(h.store.get("SAMPLE_003").unwrap(), value);

        let body = h.call(Method::Get { key: "SAMPLE_003".into() }).await;
        assert_eq!(body, ReplyBody::Value(WireValue::from(&value)));
    }

    #[tokio::test]
    async fn missing_key_is_a_fault_reply() {
        let mut h = Harness::start();
        let body = h.call(Method::Get { key: "SAMPLE_NOTFOUND".into() }).await;
        assert!(matches!(
            body,
            ReplyBody::Fault(Fault { code: FaultCode::KeyNotFound, .. })
        ));
    }

    #[tokio::test]
    async fn subscriber_sees_its_own_change() {
        let mut h = Harness::start();
        assert_eq!(h.call(Method::Subscribe { keys: None }).await, ReplyBody::Ack);
        assert_eq!(h.notifier.subscriber_count(), 1);

        let value = TypedValue::Bool(true);
        let serial = h
            .send(Method::Set {
                key: "SAMPLE_001".into(),
                value: WireValue::from(&value),
            })
            .await;

        // Reply and signal may arrive in either order.
        let mut got_reply = false;
        let mut got_signal = false;
        for _ in 0..2 {
            match h.next().await {
                BusMessage::Reply { serial: s, body } => {
                    assert_eq!(s, serial);
                    assert_eq!(body, ReplyBody::Ack);
                    got_reply = true;
                }
                BusMessage::Signal {
                    signal: SignalBody::Changed { key, value: v, sequence },
                    ..
                } => {
                    assert_eq!(key, "SAMPLE_001");
                    assert_eq!(v.decode().unwrap(), value);
                    assert_eq!(sequence, 1);
                    got_signal = true;
                }
                other => panic!("unexpected {other:?}"),
            }
        }
        assert!(got_reply && got_signal);
    }

    #[tokio::test]
    async fn unsubscribe_detaches() {
        let mut h = Harness::start();
        h.call(Method::Subscribe { keys: None }).await;
        assert_eq!(h.notifier.subscriber_count(), 1);
        assert_eq!(h.call(Method::Unsubscribe).await, ReplyBody::Ack);
        assert_eq!(h.notifier.subscriber_count(), 0);

        // A later write produces no signal: the next frame is the ping reply.
        h.store.set("k", TypedValue::Int64(1)).unwrap();
        assert_eq!(h.call(Method::Ping).await, ReplyBody::Ack);
    }

    #[tokio::test]
    async fn resubscribe_replaces_filter() {
        let mut h = Harness::start();
        h.call(Method::Subscribe { keys: Some(vec!["A".into()]) }).await;
        h.call(Method::Subscribe { keys: Some(vec!["B".into()]) }).await;
        assert_eq!(h.notifier.subscriber_count(), 1);

        h.store.set("A", TypedValue::Int64(1)).unwrap();
        h.store.set("B", TypedValue::Int64(2)).unwrap();
        match h.next().await {
            BusMessage::Signal {
                signal: SignalBody::Changed { key, .. },
                ..
            } => assert_eq!(key, "B"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn hangup_detaches_subscription() {
        let mut h = Harness::start();
        h.call(Method::Subscribe { keys: None }).await;
        assert_eq!(h.notifier.subscriber_count(), 1);

        let notifier = Arc::clone(&h.notifier);
        drop(h);
        for _ in 0..100 {
            if notifier.subscriber_count() == 0 {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        panic!("subscription not detached after hangup");
    }

    #[tokio::test]
    async fn garbage_closes_the_connection() {
        use tokio::io::AsyncWriteExt;

        let mut h = Harness::start();
        h.client.write_all(&[0, 0, 0, 2, 99, 0]).await.unwrap();
        let next = h.codec.read_message(&mut h.client).await.unwrap();
        assert!(next.is_none());
    }
}
