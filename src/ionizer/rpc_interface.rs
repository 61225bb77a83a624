// gRPC handler implementing the Ionizer RPC contract
use std::sync::Arc;

use tokio_stream::wrappers::ReceiverStream;
use tonic::{Request, Response, Status};
use tracing::warn;

use crate::ionizer::StateError;
use crate::ionizer::observer::StateObserver;
use crate::ionizer::proto::ionizer_rpc_server::IonizerRpc;
use crate::ionizer::proto::{
    EmitReply, EmitRequest, GetParamRequest, GetPropsReply, GetPropsRequest, NameReply,
    NameRequest, ParamReply, ParamUpdate, RemoteCallRequest, SetParamReply, SetParamRequest,
    SubscribeUpdatesRequest, VersionReply, VersionRequest,
};
use crate::ionizer::server::translate_update;
use crate::ionizer::state::{self, AttrValue, PathPart};

/// Reserved update path used for free-form messages sent through `Emit`.
const MESSAGE_PATH: &str = "message";

/// RPC interface handed to the tonic server to interface with Ionizer.
pub struct RpcInterface {
    observer: Arc<StateObserver>,
}

impl RpcInterface {
    pub fn new(observer: Arc<StateObserver>) -> Self {
        Self { observer }
    }
}

#[tonic::async_trait]
impl IonizerRpc for RpcInterface {
    async fn version(
        &self,
        _request: Request<VersionRequest>,
    ) -> Result<Response<VersionReply>, Status> {
        Ok(Response::new(VersionReply {
            version: format!("service-base v{}", env!("CARGO_PKG_VERSION")),
        }))
    }

    async fn name(&self, _request: Request<NameRequest>) -> Result<Response<NameReply>, Status> {
        Ok(Response::new(NameReply {
            name: self.observer.source().service_name(),
        }))
    }

    async fn get_props(
        &self,
        _request: Request<GetPropsRequest>,
    ) -> Result<Response<GetPropsReply>, Status> {
        let root = self.observer.source().serialize();
        let AttrValue::Group(map) = &root else {
            return Err(Status::internal("service root is not a group"));
        };
        let props = state::flatten_value(map);
        let props_json = serde_json::to_string(&props)
            .map_err(|e| Status::internal(format!("serializing props failed: {e}")))?;
        Ok(Response::new(GetPropsReply { props_json }))
    }

    async fn get_param(
        &self,
        request: Request<GetParamRequest>,
    ) -> Result<Response<ParamReply>, Status> {
        let req = request.into_inner();
        let root = self.observer.source().serialize();
        let parts = state::parse_access_path(&req.name)?;
        let node =
            state::lookup(&root, &parts).ok_or_else(|| StateError::NotFound(req.name.clone()))?;

        let value = match node {
            // widgets display methods through their call signature
            AttrValue::Method { parameters } => {
                let short_name = parts
                    .iter()
                    .rev()
                    .find_map(|part| match part {
                        PathPart::Attr(name) => Some(name.as_str()),
                        _ => None,
                    })
                    .unwrap_or(req.name.as_str());
                serde_json::Value::String(state::method_signature(short_name, parameters))
            }
            other => state::to_wire(other),
        };

        Ok(Response::new(ParamReply {
            value_json: value.to_string(),
        }))
    }

    async fn set_param(
        &self,
        request: Request<SetParamRequest>,
    ) -> Result<Response<SetParamReply>, Status> {
        let req = request.into_inner();
        let incoming: serde_json::Value = serde_json::from_str(&req.value_json)
            .map_err(|e| Status::invalid_argument(format!("invalid value payload: {e}")))?;

        let root = self.observer.source().serialize();
        let (path, value) = state::resolve_set_target(&root, &req.name, &incoming)?;
        self.observer.source().set_attribute(&path, value).await?;
        Ok(Response::new(SetParamReply {}))
    }

    async fn remote_call(
        &self,
        request: Request<RemoteCallRequest>,
    ) -> Result<Response<ParamReply>, Status> {
        let req = request.into_inner();
        let args = req
            .args_json
            .iter()
            .map(|arg| serde_json::from_str(arg))
            .collect::<Result<Vec<serde_json::Value>, _>>()
            .map_err(|e| Status::invalid_argument(format!("invalid argument payload: {e}")))?;

        let root = self.observer.source().serialize();
        let parts = state::parse_access_path(&req.name)?;
        let node =
            state::lookup(&root, &parts).ok_or_else(|| StateError::NotFound(req.name.clone()))?;
        if !matches!(node, AttrValue::Method { .. }) {
            return Err(StateError::NotCallable(req.name).into());
        }

        let result = self.observer.source().call_method(&req.name, args).await?;
        Ok(Response::new(ParamReply {
            value_json: result.to_string(),
        }))
    }

    async fn emit(&self, request: Request<EmitRequest>) -> Result<Response<EmitReply>, Status> {
        let req = request.into_inner();
        // emitted messages surface as updates on the reserved message path
        self.observer
            .notify(MESSAGE_PATH, AttrValue::Str(req.message));
        Ok(Response::new(EmitReply {}))
    }

    type SubscribeUpdatesStream = ReceiverStream<Result<ParamUpdate, Status>>;

    async fn subscribe_updates(
        &self,
        _request: Request<SubscribeUpdatesRequest>,
    ) -> Result<Response<Self::SubscribeUpdatesStream>, Status> {
        let mut rx = self.observer.subscribe();
        let source = Arc::clone(self.observer.source());
        let (tx, stream_rx) = tokio::sync::mpsc::channel(32);

        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(update) => {
                        let root = source.serialize();
                        let (name, value) = translate_update(&root, &update.path, &update.value);
                        let message = ParamUpdate {
                            name,
                            value_json: value.to_string(),
                        };
                        // exit if the subscriber dropped its stream
                        if tx.send(Ok(message)).await.is_err() {
                            break;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        warn!("ionizer update stream lagged, dropped {n} updates");
                        continue;
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        Ok(Response::new(ReceiverStream::new(stream_rx)))
    }
}
