// Host-side seam: the observed service object and its change broadcast
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::debug;

use crate::ionizer::StateError;
use crate::ionizer::state::AttrValue;

/// Capacity of the update broadcast. Subscribers that fall further behind
/// are skipped forward with a warning instead of stalling the host.
const UPDATE_CHANNEL_CAPACITY: usize = 256;

/// The service object mirrored into Ionizer. Implemented by the host
/// application; the adapter only ever talks to this trait.
#[async_trait]
pub trait AttributeSource: Send + Sync {
    /// Display name reported to Ionizer.
    fn service_name(&self) -> String;

    /// Serialized attribute tree. The root must be an [`AttrValue::Group`].
    fn serialize(&self) -> AttrValue;

    /// Apply a new value to the attribute at `path`.
    async fn set_attribute(&self, path: &str, value: AttrValue) -> Result<(), StateError>;

    /// Invoke the method at `path` with positional JSON arguments.
    async fn call_method(&self, path: &str, args: Vec<Value>) -> Result<Value, StateError>;
}

/// A single attribute change reported by the host.
#[derive(Debug, Clone)]
pub struct AttributeUpdate {
    pub path: String,
    pub value: AttrValue,
}

/// Fan-out point between the host service and Ionizer subscribers.
///
/// The host registers every attribute mutation through [`notify`]; each
/// connected Ionizer client holds a broadcast receiver.
///
/// [`notify`]: StateObserver::notify
pub struct StateObserver {
    source: Arc<dyn AttributeSource>,
    updates: broadcast::Sender<AttributeUpdate>,
}

impl StateObserver {
    pub fn new(source: Arc<dyn AttributeSource>) -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Self { source, updates }
    }

    /// Report an attribute change. Having no subscribers is fine: Ionizer
    /// may simply not be connected.
    pub fn notify(&self, path: impl Into<String>, value: AttrValue) {
        let update = AttributeUpdate {
            path: path.into(),
            value,
        };
        debug!("updating ionizer with {}={:?}", update.path, update.value);
        let _ = self.updates.send(update);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AttributeUpdate> {
        self.updates.subscribe()
    }

    pub fn source(&self) -> &Arc<dyn AttributeSource> {
        &self.source
    }
}

impl fmt::Debug for StateObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateObserver")
            .field("service", &self.source.service_name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    struct Dummy;

    #[async_trait]
    impl AttributeSource for Dummy {
        fn service_name(&self) -> String {
            "Dummy".to_string()
        }

        fn serialize(&self) -> AttrValue {
            AttrValue::Group(BTreeMap::new())
        }

        async fn set_attribute(&self, _path: &str, _value: AttrValue) -> Result<(), StateError> {
            Ok(())
        }

        async fn call_method(&self, _path: &str, _args: Vec<Value>) -> Result<Value, StateError> {
            Ok(Value::Null)
        }
    }

    #[tokio::test]
    async fn subscribers_receive_updates() {
        let observer = StateObserver::new(Arc::new(Dummy));
        let mut rx = observer.subscribe();
        observer.notify("voltage", AttrValue::Float(1.5));
        let update = rx.recv().await.unwrap();
        assert_eq!(update.path, "voltage");
        assert_eq!(update.value, AttrValue::Float(1.5));
    }

    #[test]
    fn notify_without_subscribers_is_a_no_op() {
        let observer = StateObserver::new(Arc::new(Dummy));
        observer.notify("voltage", AttrValue::Float(1.5));
    }
}
