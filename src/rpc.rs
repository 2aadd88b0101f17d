//! The RPC collaborator seam.
//!
//! Framing, generated service stubs and SASL negotiation live behind these
//! traits. The driver only needs to open a transport, authenticate it, open a
//! session and drive statements through it.

use crate::auth::TransportLayer;
use crate::error::Result;
use secrecy::SecretString;
use std::collections::HashMap;
use std::future::Future;

/// Client protocol version sent when opening a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolVersion(pub i32);

pub const HIVE_CLI_SERVICE_PROTOCOL_V6: ProtocolVersion = ProtocolVersion(5);

/// Server-side session identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionHandle {
    pub id: String,
}

/// Server-side identifier of one submitted statement.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OperationHandle {
    pub id: String,
    pub has_result_set: bool,
}

#[derive(Debug)]
pub struct OpenSessionRequest {
    pub protocol_version: ProtocolVersion,
    pub username: Option<String>,
    pub password: Option<SecretString>,
    pub configuration: HashMap<String, String>,
}

/// Remote state of an operation as reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationState {
    Initialized,
    Pending,
    Running,
    Finished,
    Canceled,
    Closed,
    Error,
}

impl OperationState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OperationState::Finished
                | OperationState::Canceled
                | OperationState::Closed
                | OperationState::Error
        )
    }
}

#[derive(Debug, Clone)]
pub struct OperationStatus {
    pub state: OperationState,
    /// Diagnostic text reported by the engine for failed operations.
    pub error_message: Option<String>,
}

/// Metadata for a single result column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDesc {
    pub name: String,
    pub type_name: String,
}

/// A single cell value from a query result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellValue {
    Text(String),
    Null,
}

impl CellValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s),
            CellValue::Null => None,
        }
    }
}

/// One page of rows returned by a fetch.
#[derive(Debug, Clone, Default)]
pub struct RowPage {
    pub rows: Vec<Vec<CellValue>>,
    pub has_more_rows: bool,
}

/// Fully drained result set.
#[derive(Debug)]
pub struct QueryResult {
    pub columns: Vec<ColumnDesc>,
    pub rows: Vec<Vec<CellValue>>,
}

/// Opens transports to a remote engine.
pub trait Connector {
    type Client: RpcClient;

    /// Open the raw transport to `address`. Failures map to `DriverError::Transport`.
    fn open_transport(&self, address: &str) -> impl Future<Output = Result<Self::Client>> + Send;
}

/// Calls against one open transport.
pub trait RpcClient: Send {
    /// Wrap the transport in the selected layer. Failures map to `DriverError::Auth`.
    fn authenticate(&mut self, layer: &TransportLayer) -> impl Future<Output = Result<()>> + Send;

    fn open_session(
        &mut self,
        request: OpenSessionRequest,
    ) -> impl Future<Output = Result<SessionHandle>> + Send;

    fn submit_statement(
        &mut self,
        session: &SessionHandle,
        sql: &str,
    ) -> impl Future<Output = Result<OperationHandle>> + Send;

    fn poll_status(
        &mut self,
        operation: &OperationHandle,
    ) -> impl Future<Output = Result<OperationStatus>> + Send;

    fn result_metadata(
        &mut self,
        operation: &OperationHandle,
    ) -> impl Future<Output = Result<Vec<ColumnDesc>>> + Send;

    fn fetch_rows(
        &mut self,
        operation: &OperationHandle,
        batch_size: usize,
    ) -> impl Future<Output = Result<RowPage>> + Send;

    fn cancel_operation(
        &mut self,
        operation: &OperationHandle,
    ) -> impl Future<Output = Result<()>> + Send;

    fn close_operation(
        &mut self,
        operation: &OperationHandle,
    ) -> impl Future<Output = Result<()>> + Send;

    fn close_session(&mut self, session: &SessionHandle) -> impl Future<Output = Result<()>> + Send;
}
