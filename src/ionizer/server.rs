// Ionizer server - tonic transport and notify-side translation
use std::net::SocketAddr;
use std::sync::Arc;

use serde_json::Value;
use tonic::transport::Server;
use tracing::info;

use crate::ionizer::observer::StateObserver;
use crate::ionizer::proto::ionizer_rpc_server::IonizerRpcServer;
use crate::ionizer::rpc_interface::RpcInterface;
use crate::ionizer::state::{self, AttrValue};

/// Serves the Ionizer RPC surface for one host service.
///
/// ```no_run
/// use std::sync::Arc;
/// use service_base::ionizer::{IonizerServer, StateObserver};
/// # use service_base::ionizer::AttributeSource;
///
/// # async fn demo(service: Arc<dyn AttributeSource>) -> anyhow::Result<()> {
/// let observer = Arc::new(StateObserver::new(service));
/// // ... hand `observer` to the host so it can call notify() ...
/// IonizerServer::new(observer, "0.0.0.0:6007".parse()?)
///     .serve()
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct IonizerServer {
    observer: Arc<StateObserver>,
    addr: SocketAddr,
}

impl IonizerServer {
    pub fn new(observer: Arc<StateObserver>, addr: SocketAddr) -> Self {
        Self { observer, addr }
    }

    /// Run the server until the transport shuts down.
    pub async fn serve(self) -> Result<(), tonic::transport::Error> {
        info!(
            "serving ionizer interface for {} on {}",
            self.observer.source().service_name(),
            self.addr
        );
        Server::builder()
            .add_service(IonizerRpcServer::new(RpcInterface::new(self.observer)))
            .serve(self.addr)
            .await
    }
}

/// Translate a host-side update into the shape Ionizer expects: enums
/// collapse to their variant name and quantities to their magnitude (via
/// the wire mapping), and a trailing `.value` whose parent is a slider
/// collapses onto the parent path, since Ionizer does not know about
/// slider internals.
pub(crate) fn translate_update(root: &AttrValue, path: &str, value: &AttrValue) -> (String, Value) {
    let wire = state::to_wire(value);

    if let Some(parent) = path.strip_suffix(".value")
        && let Ok(parts) = state::parse_access_path(parent)
        && matches!(state::lookup(root, &parts), Some(AttrValue::Slider { .. }))
    {
        return (parent.to_string(), wire);
    }

    (path.to_string(), wire)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn tree_with_slider() -> AttrValue {
        let mut root = BTreeMap::new();
        root.insert(
            "power".to_string(),
            AttrValue::Slider {
                value: Box::new(AttrValue::Float(0.5)),
                min: 0.0,
                max: 1.0,
                step_size: 0.01,
            },
        );
        AttrValue::Group(root)
    }

    #[test]
    fn slider_value_collapses_to_parent_path() {
        let root = tree_with_slider();
        let (path, value) = translate_update(&root, "power.value", &AttrValue::Float(0.8));
        assert_eq!(path, "power");
        assert_eq!(value, json!(0.8));
    }

    #[test]
    fn non_slider_value_paths_stay_unchanged() {
        let root = tree_with_slider();
        let (path, _) = translate_update(&root, "missing.value", &AttrValue::Float(1.0));
        assert_eq!(path, "missing.value");
    }

    #[test]
    fn enums_and_quantities_collapse_to_plain_values() {
        let root = tree_with_slider();
        let (_, value) = translate_update(
            &root,
            "mode",
            &AttrValue::Enum {
                value: "cooling".to_string(),
                variants: vec!["idle".to_string(), "cooling".to_string()],
            },
        );
        assert_eq!(value, json!("cooling"));

        let (_, value) = translate_update(
            &root,
            "wavelength",
            &AttrValue::Quantity {
                magnitude: 729.0,
                unit: "nm".to_string(),
            },
        );
        assert_eq!(value, json!(729.0));
    }
}
