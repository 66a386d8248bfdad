//! Error types for controller operations

use core::time::Duration;

use fermlink_codec::CodecError;
use thiserror::Error;

use crate::address::IdChain;
use crate::protocol::Command;
use crate::registry::{ObjectTypeId, RegistryError};

/// Local, pre-call validation failures
///
/// Raised before anything is sent to the device.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("definition of {type_name} does not survive an encode/decode round trip (encoded {encoded:02x?})")]
    DefinitionMismatch {
        type_name: &'static str,
        encoded: Vec<u8>,
    },

    #[error("threshold {threshold} is negative")]
    NegativeThreshold { threshold: i16 },

    #[error("definition requires a non-empty block")]
    EmptyBlock,

    #[error("object takes no definition block (got {len} bytes)")]
    UnexpectedDefinition { len: usize },

    #[error("malformed definition block: {0}")]
    MalformedDefinition(#[from] CodecError),

    #[error("value cannot be encoded: {0}")]
    InvalidValue(CodecError),

    #[error("id-chain {0} does not address an object")]
    RootAddress(IdChain),

    #[error("system objects are fixed and cannot be created or deleted")]
    SystemTree,
}

/// Failures reported by an [`IdService`](crate::IdService)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdServiceError {
    #[error("no controller ids left to hand out")]
    Exhausted,

    #[error("{0:#04x} is not an assignable controller id")]
    NotAssignable(u8),

    #[error("controller id {0} was already released")]
    AlreadyReleased(u8),
}

/// Error types for controller operations
#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("{command} failed with device error code {code}")]
    DeviceOperationFailed { command: Command, code: i32 },

    #[error("{command} returned no data")]
    NoData { command: Command },

    #[error("write to {id_chain} not verified: sent {sent:02x?}, device echoed {echoed:02x?}")]
    EchoMismatch {
        id_chain: IdChain,
        sent: Vec<u8>,
        echoed: Vec<u8>,
    },

    #[error("malformed response to {command}: {source}")]
    MalformedResponse {
        command: Command,
        #[source]
        source: CodecError,
    },

    #[error("unexpected response to {command}: {detail}")]
    UnexpectedResponse { command: Command, detail: String },

    #[error("{command} timed out after {timeout:?}")]
    Timeout { command: Command, timeout: Duration },

    #[error("transport closed before {command} completed")]
    TransportClosed { command: Command },

    #[error("reference holds type {found}, expected {expected}")]
    TypeMismatch {
        expected: ObjectTypeId,
        found: ObjectTypeId,
    },

    #[error("type registry: {0}")]
    Registry(#[from] RegistryError),

    #[error("id service: {0}")]
    IdService(#[from] IdServiceError),
}

impl ConnectorError {
    /// True for failures where the device answered but its data cannot be
    /// trusted
    pub fn is_data_integrity(&self) -> bool {
        matches!(
            self,
            ConnectorError::NoData { .. }
                | ConnectorError::EchoMismatch { .. }
                | ConnectorError::MalformedResponse { .. }
                | ConnectorError::UnexpectedResponse { .. }
        )
    }

    /// True for failures raised locally before any device call
    pub fn is_validation(&self) -> bool {
        matches!(self, ConnectorError::Validation(_))
    }

    /// Device error code, if the device reported one
    pub fn device_code(&self) -> Option<i32> {
        match self {
            ConnectorError::DeviceOperationFailed { code, .. } => Some(*code),
            _ => None,
        }
    }
}

pub type Result<T> = core::result::Result<T, ConnectorError>;
