//! Statement submission, polling and outcome classification.

use crate::config::ConnectionOptions;
use crate::error::{DriverError, Result};
use crate::rpc::{ColumnDesc, OperationHandle, OperationState, RpcClient};
use crate::session::Session;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Upper bound on waiting for the engine to acknowledge a cancel.
pub const CANCEL_NOTIFY_TIMEOUT: Duration = Duration::from_secs(10);

/// Local lifecycle of one statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionState {
    Submitted,
    Running,
    Succeeded,
    /// Carries the engine's diagnostic text unmodified.
    Failed(String),
    Cancelled,
}

impl ExecutionState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExecutionState::Succeeded | ExecutionState::Failed(_) | ExecutionState::Cancelled
        )
    }
}

/// A submitted statement. Never reused across queries.
#[derive(Debug)]
pub struct Statement {
    handle: OperationHandle,
    state: ExecutionState,
}

impl Statement {
    pub fn handle(&self) -> &OperationHandle {
        &self.handle
    }

    pub fn state(&self) -> &ExecutionState {
        &self.state
    }

    /// Ask the engine for the current state.
    ///
    /// Once terminal the cached state is returned without contacting the engine.
    /// A failing status call ends the statement as `Failed`.
    pub async fn poll<C: RpcClient>(&mut self, client: &mut C) -> Result<ExecutionState> {
        if self.state.is_terminal() {
            return Ok(self.state.clone());
        }

        let status = match client.poll_status(&self.handle).await {
            Ok(status) => status,
            Err(e) => {
                self.state = ExecutionState::Failed(e.to_string());
                return Err(e);
            }
        };

        let next = match status.state {
            OperationState::Initialized | OperationState::Pending | OperationState::Running => {
                ExecutionState::Running
            }
            OperationState::Finished => ExecutionState::Succeeded,
            OperationState::Error => ExecutionState::Failed(
                status
                    .error_message
                    .unwrap_or_else(|| "unknown error".to_string()),
            ),
            OperationState::Canceled | OperationState::Closed => ExecutionState::Cancelled,
        };
        if next != self.state {
            debug!(operation = %self.handle.id, state = ?next, "statement state changed");
        }
        self.state = next.clone();
        Ok(next)
    }

    /// Mark the statement cancelled and tell the engine, without waiting
    /// longer than [`CANCEL_NOTIFY_TIMEOUT`] for an answer.
    pub async fn cancel<C: RpcClient>(&mut self, client: &mut C) {
        if self.state.is_terminal() {
            return;
        }
        self.state = ExecutionState::Cancelled;
        match tokio::time::timeout(CANCEL_NOTIFY_TIMEOUT, client.cancel_operation(&self.handle)).await
        {
            Ok(Ok(())) => debug!(operation = %self.handle.id, "statement cancelled"),
            Ok(Err(e)) => {
                warn!(operation = %self.handle.id, error = %e, "cancel request failed")
            }
            Err(_) => warn!(operation = %self.handle.id, "cancel request not acknowledged"),
        }
    }
}

/// Submit fully interpolated SQL on `session`.
///
/// An operation left open by the previous statement is closed first. A
/// failing submit call is returned as is; nothing is polled.
pub async fn submit<C: RpcClient>(session: &mut Session<C>, sql: &str) -> Result<Statement> {
    session.handle()?;
    session.release_operation().await;

    let (client, handle) = session.parts_mut()?;
    debug!(session = %handle.id, sql, "submitting statement");
    let operation = client.submit_statement(handle, sql).await?;
    session.set_operation(operation.clone());

    Ok(Statement {
        handle: operation,
        state: ExecutionState::Submitted,
    })
}

/// Poll `statement` every `poll_interval` until it reaches a terminal state.
///
/// `cancel` and `options.query_timeout` are checked before every poll and
/// interrupt the sleep in between; either one moves the statement to
/// `Cancelled`.
pub async fn wait<C: RpcClient>(
    client: &mut C,
    statement: &mut Statement,
    options: &ConnectionOptions,
    cancel: &CancellationToken,
) -> Result<()> {
    let deadline = options.query_timeout.map(|t| Instant::now() + t);

    loop {
        if cancel.is_cancelled() {
            statement.cancel(client).await;
            return Err(DriverError::StatementCancelled);
        }
        if let (Some(deadline), Some(timeout)) = (deadline, options.query_timeout)
            && Instant::now() >= deadline
        {
            statement.cancel(client).await;
            return Err(DriverError::Timeout {
                seconds: timeout.as_secs(),
            });
        }

        match statement.poll(client).await? {
            ExecutionState::Succeeded => return Ok(()),
            ExecutionState::Failed(message) => return Err(DriverError::StatementFailed { message }),
            ExecutionState::Cancelled => return Err(DriverError::StatementCancelled),
            ExecutionState::Submitted | ExecutionState::Running => {}
        }

        let deadline_reached = async {
            match deadline {
                Some(d) => tokio::time::sleep_until(d).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::select! {
            _ = cancel.cancelled() => {}
            _ = deadline_reached => {}
            _ = tokio::time::sleep(options.poll_interval) => {}
        }
    }
}

/// Column metadata of a succeeded statement, with names normalized per `options`.
pub async fn result_columns<C: RpcClient>(
    client: &mut C,
    statement: &Statement,
    options: &ConnectionOptions,
) -> Result<Vec<ColumnDesc>> {
    if !statement.handle.has_result_set {
        return Ok(Vec::new());
    }
    let mut columns = client.result_metadata(&statement.handle).await?;
    if !options.qualify_column_names {
        for column in &mut columns {
            column.name = normalize_column_name(&column.name);
        }
    }
    Ok(columns)
}

/// Strip a `table.` qualifier: `"t.name"` → `"name"`, `"name"` → `"name"`, `"."` → `""`.
pub fn normalize_column_name(name: &str) -> String {
    match name.split_once('.') {
        Some((_, column)) => column.to_string(),
        None => name.to_string(),
    }
}
