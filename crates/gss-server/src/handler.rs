use std::sync::Arc;

use tracing::debug;

use gss_notify::SubscriptionFilter;
use gss_protocol::{BusAddress, Method, ReplyBody, WireValue};
use gss_store::StateStore;
use gss_types::TypedValue;

use crate::error::{ServerError, ServerResult};

/// What the transport must do with a handled call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Send this reply.
    Reply(ReplyBody),
    /// Attach the calling connection with this filter, then acknowledge.
    Subscribe(SubscriptionFilter),
    /// Detach the calling connection, then acknowledge.
    Unsubscribe,
}

/// Translates bus calls into store operations and back into replies.
///
/// The handler holds no per-call or per-connection state; the only state it
/// touches is the shared store. Subscription bookkeeping belongs to the
/// connection that owns the caller identity, so those calls come back as
/// [`Outcome`]s for the transport to act on.
pub struct RequestHandler {
    store: Arc<dyn StateStore>,
    bus: BusAddress,
}

impl RequestHandler {
    pub fn new(store: Arc<dyn StateStore>, bus: BusAddress) -> Self {
        Self { store, bus }
    }

    pub fn bus(&self) -> &BusAddress {
        &self.bus
    }

    /// Handle one call addressed to `path` / `interface`.
    pub fn handle(&self, path: &str, interface: &str, method: Method) -> Outcome {
        if let Err(e) = self.check_target(path, interface) {
            return Outcome::Reply(ReplyBody::Fault(e.to_fault()));
        }
        match method {
            Method::Get { key } => Outcome::Reply(match self.handle_get(&key) {
                Ok(value) => ReplyBody::Value(WireValue::from(&value)),
                Err(e) => ReplyBody::Fault(e.to_fault()),
            }),
            Method::Set { key, value } => Outcome::Reply(match self.handle_set(&key, &value) {
                Ok(_) => ReplyBody::Ack,
                Err(e) => ReplyBody::Fault(e.to_fault()),
            }),
            Method::Subscribe { keys } => Outcome::Subscribe(SubscriptionFilter { keys }),
            Method::Unsubscribe => Outcome::Unsubscribe,
            Method::Ping => Outcome::Reply(ReplyBody::Ack),
        }
    }

    /// Read a key. Absent keys fail with `KeyNotFound`.
    pub fn handle_get(&self, key: &str) -> ServerResult<TypedValue> {
        let value = self.store.get(key)?;
        debug!(key, kind = %value.kind(), "get");
        Ok(value)
    }

    /// Decode and write a value. A payload that does not match its tag
    /// fails before the store is touched.
    pub fn handle_set(&self, key: &str, value: &WireValue) -> ServerResult<u64> {
        let value = value.decode()?;
        let sequence = self.store.set(key, value)?;
        debug!(key, sequence, "set");
        Ok(sequence)
    }

    fn check_target(&self, path: &str, interface: &str) -> ServerResult<()> {
        if path != self.bus.object_path {
            return Err(ServerError::UnknownObject(path.to_string()));
        }
        if interface != self.bus.interface {
            return Err(ServerError::UnknownInterface(interface.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gss_notify::ChangeNotifier;
    use gss_protocol::{Fault, FaultCode};
    use gss_store::InMemoryStateStore;

    fn setup() -> (RequestHandler, Arc<InMemoryStateStore>, Arc<ChangeNotifier>) {
        let notifier = Arc::new(ChangeNotifier::default());
        let store = Arc::new(InMemoryStateStore::new(Arc::clone(&notifier)));
        let handler = RequestHandler::new(store.clone(), BusAddress::default());
        (handler, store, notifier)
    }

    fn call(handler: &RequestHandler, method: Method) -> Outcome {
        let bus = BusAddress::default();
        handler.handle(&bus.object_path, &bus.interface, method)
    }

    fn set(key: &str, value: &TypedValue) -> Method {
        Method::Set {
            key: key.into(),
            value: WireValue::from(value),
        }
    }

    fn fault_code(outcome: Outcome) -> FaultCode {
        match outcome {
            Outcome::Reply(ReplyBody::Fault(Fault { code, .. })) => code,
            other => panic!("expected fault, got {other:?}"),
        }
    }

    #[test]
    fn set_then_get_replies_with_value() {
        let (handler, _, _) = setup();
        let value = TypedValue::StringSequence(vec!["1".into(), "2".into(), "3".into()]);
        assert_eq!(call(&handler, set("SAMPLE_006", &value)), Outcome::Reply(ReplyBody::Ack));
        assert_eq!(
            call(&handler, Method::Get { key: "SAMPLE_006".into() }),
            Outcome::Reply(ReplyBody::Value(WireValue::from(&value)))
        );
    }

    #[test]
    fn get_missing_key_faults() {
        let (handler, _, _) = setup();
        let outcome = call(&handler, Method::Get { key: "SAMPLE_NOTFOUND".into() });
        assert_eq!(fault_code(outcome), FaultCode::KeyNotFound);
    }

    #[test]
    fn mismatched_set_faults_and_leaves_store_unchanged() {
        let (handler, store, notifier) = setup();
        let mut sub = notifier.subscribe(SubscriptionFilter::all());
        store.set("k", TypedValue::Int64(1)).unwrap();
        sub.try_recv().unwrap();

        let bad = Method::Set {
            key: "k".into(),
            value: WireValue::new("b", vec![9, 9, 9]),
        };
        assert_eq!(fault_code(call(&handler, bad)), FaultCode::TypeMismatch);

        let unknown = Method::Set {
            key: "k".into(),
            value: WireValue::new("v", vec![]),
        };
        assert_eq!(fault_code(call(&handler, unknown)), FaultCode::TypeMismatch);

        assert_eq!(store.get("k").unwrap(), TypedValue::Int64(1));
        assert!(sub.try_recv().is_none());
    }

    #[test]
    fn empty_key_faults() {
        let (handler, _, _) = setup();
        let outcome = call(&handler, set("", &TypedValue::Bool(true)));
        assert_eq!(fault_code(outcome), FaultCode::InvalidKey);
    }

    #[test]
    fn wrong_target_faults() {
        let (handler, store, _) = setup();
        let bus = BusAddress::default();
        let outcome = handler.handle("/elsewhere", &bus.interface, set("k", &TypedValue::Bool(true)));
        assert_eq!(fault_code(outcome), FaultCode::UnknownObject);

        let outcome = handler.handle(&bus.object_path, "org.other", Method::Ping);
        assert_eq!(fault_code(outcome), FaultCode::UnknownInterface);
        assert!(store.is_empty());
    }

    #[test]
    fn subscription_calls_become_outcomes() {
        let (handler, _, _) = setup();
        assert_eq!(
            call(&handler, Method::Subscribe { keys: Some(vec!["A".into()]) }),
            Outcome::Subscribe(SubscriptionFilter::keys(["A"]))
        );
        assert_eq!(call(&handler, Method::Unsubscribe), Outcome::Unsubscribe);
        assert_eq!(call(&handler, Method::Ping), Outcome::Reply(ReplyBody::Ack));
    }

    #[test]
    fn set_publishes_change() {
        let (handler, _, notifier) = setup();
        let mut sub = notifier.subscribe(SubscriptionFilter::all());
        let sequence = handler
            .handle_set("A", &WireValue::from(&TypedValue::Bool(true)))
            .unwrap();
        let event = sub.try_recv().unwrap();
        assert_eq!(event.sequence, sequence);
        assert_eq!(event.key, "A");
        assert_eq!(event.value, TypedValue::Bool(true));
    }
}
