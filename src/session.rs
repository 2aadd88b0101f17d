//! One authenticated session against the remote engine.
//!
//! `Unconnected -> TransportOpen -> Authenticated -> Closed`. The first two
//! states only exist inside [`Session::open`]; a `Session` value is either
//! authenticated or closed.

use crate::auth;
use crate::config::ConnectConfig;
use crate::error::{DriverError, Result};
use crate::rpc::{
    Connector, OpenSessionRequest, OperationHandle, RpcClient, SessionHandle,
    HIVE_CLI_SERVICE_PROTOCOL_V6,
};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unconnected,
    TransportOpen,
    Authenticated,
    Closed,
}

pub struct Session<C: RpcClient> {
    client: C,
    handle: Option<SessionHandle>,
    state: SessionState,
    /// The single operation this session may have open.
    operation: Option<OperationHandle>,
}

impl<C: RpcClient> Session<C> {
    /// Open a transport, authenticate it and open a session.
    ///
    /// No step is retried; the first failure ends the attempt.
    pub async fn open<K>(connector: &K, config: &ConnectConfig) -> Result<Self>
    where
        K: Connector<Client = C>,
    {
        let mut state = SessionState::Unconnected;
        let resolved = auth::resolve(
            config.auth,
            config.username.as_deref(),
            config.password.as_ref(),
            config.options.batch_size,
        )?;

        debug!(address = %config.address, ?state, "opening transport");
        let mut client = connector
            .open_transport(&config.address)
            .await
            .map_err(|e| match e {
                DriverError::Transport { .. } => e,
                other => DriverError::Transport {
                    message: other.to_string(),
                },
            })?;
        state = SessionState::TransportOpen;

        debug!(mechanism = %config.auth, ?state, "authenticating transport");
        client
            .authenticate(&resolved.layer)
            .await
            .map_err(|e| match e {
                DriverError::Auth { .. } => e,
                other => DriverError::Auth {
                    message: other.to_string(),
                },
            })?;

        let username = resolved.username;
        let password = if username.is_some() { resolved.password } else { None };
        let request = OpenSessionRequest {
            protocol_version: HIVE_CLI_SERVICE_PROTOCOL_V6,
            username,
            password,
            configuration: config.session_configuration(),
        };
        let handle = client.open_session(request).await?;
        state = SessionState::Authenticated;
        info!(session = %handle.id, "session opened ({})", config.summary());

        Ok(Self {
            client,
            handle: Some(handle),
            state,
            operation: None,
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        self.state == SessionState::Closed
    }

    /// The server-side handle, or `SessionClosed`.
    pub fn handle(&self) -> Result<&SessionHandle> {
        match (&self.state, &self.handle) {
            (SessionState::Authenticated, Some(handle)) => Ok(handle),
            _ => Err(DriverError::SessionClosed),
        }
    }

    /// The RPC client, for driving a [`Statement`](crate::execution::Statement) directly.
    pub fn client_mut(&mut self) -> &mut C {
        &mut self.client
    }

    /// Split borrow of the client and the session handle for submission.
    pub(crate) fn parts_mut(&mut self) -> Result<(&mut C, &SessionHandle)> {
        match (&self.state, &self.handle) {
            (SessionState::Authenticated, Some(handle)) => Ok((&mut self.client, handle)),
            _ => Err(DriverError::SessionClosed),
        }
    }

    pub fn current_operation(&self) -> Option<&OperationHandle> {
        self.operation.as_ref()
    }

    pub(crate) fn set_operation(&mut self, operation: OperationHandle) {
        self.operation = Some(operation);
    }

    pub(crate) fn clear_operation(&mut self, operation: &OperationHandle) {
        if self.operation.as_ref() == Some(operation) {
            self.operation = None;
        }
    }

    /// Close a leftover operation, e.g. from a cursor dropped without `close`.
    pub(crate) async fn release_operation(&mut self) {
        if let Some(operation) = self.operation.take() {
            debug!(operation = %operation.id, "closing leftover operation");
            if let Err(e) = self.client.close_operation(&operation).await {
                warn!(operation = %operation.id, error = %e, "failed to close leftover operation");
            }
        }
    }

    /// Close the session. Idempotent.
    ///
    /// The local handle is invalidated even when the engine reports an error,
    /// which is still returned to the caller.
    pub async fn close(&mut self) -> Result<()> {
        if self.state == SessionState::Closed {
            return Ok(());
        }
        self.release_operation().await;
        self.state = SessionState::Closed;
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };
        match self.client.close_session(&handle).await {
            Ok(()) => {
                info!(session = %handle.id, "session closed");
                Ok(())
            }
            Err(e) => {
                warn!(session = %handle.id, error = %e, "session close failed; handle released locally");
                Err(e)
            }
        }
    }
}
