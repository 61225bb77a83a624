// Ionizer interface - mirrors a service object into the Ionizer control system
pub mod observer;
pub mod rpc_interface;
pub mod server;
pub mod state;

/// Generated gRPC types for the Ionizer RPC contract.
pub mod proto {
    #![allow(clippy::all)]
    tonic::include_proto!("ionizer.v1");
}

pub use observer::{AttributeSource, AttributeUpdate, StateObserver};
pub use rpc_interface::RpcInterface;
pub use server::IonizerServer;
pub use state::{AttrValue, MethodParam};

use thiserror::Error;

/// Errors crossing the host seam.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("no attribute at '{0}'")]
    NotFound(String),

    #[error("invalid access path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("type mismatch at '{path}': expected {expected}")]
    TypeMismatch {
        path: String,
        expected: &'static str,
    },

    #[error("'{0}' is not callable")]
    NotCallable(String),

    #[error("enum index {index} out of range at '{path}'")]
    EnumOutOfRange { path: String, index: usize },
}

impl From<StateError> for tonic::Status {
    fn from(error: StateError) -> Self {
        match &error {
            StateError::NotFound(_) => tonic::Status::not_found(error.to_string()),
            StateError::InvalidPath { .. }
            | StateError::TypeMismatch { .. }
            | StateError::NotCallable(_)
            | StateError::EnumOutOfRange { .. } => {
                tonic::Status::invalid_argument(error.to_string())
            }
        }
    }
}
