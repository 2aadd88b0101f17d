use crate::config::{ConnectConfig, ConnectionOptions};
use crate::cursor::ResultCursor;
use crate::error::Result;
use crate::execution::{self, Statement};
use crate::interpolate::ParamsInterpolator;
use crate::rpc::{Connector, RpcClient};
use crate::session::Session;
use crate::value::{NamedValue, Value};
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

const PING_SQL: &str = "SELECT 1";

/// A connection to the engine: one session, one statement at a time.
pub struct Connection<C: RpcClient> {
    session: Session<C>,
    options: ConnectionOptions,
    interpolator: ParamsInterpolator,
}

impl<C: RpcClient> Connection<C> {
    pub async fn connect<K>(connector: &K, config: &ConnectConfig) -> Result<Self>
    where
        K: Connector<Client = C>,
    {
        let session = Session::open(connector, config).await?;
        Ok(Self {
            session,
            options: config.options.clone(),
            interpolator: ParamsInterpolator::with_zone(config.options.zone),
        })
    }

    pub fn options(&self) -> &ConnectionOptions {
        &self.options
    }

    pub fn interpolator(&self) -> &ParamsInterpolator {
        &self.interpolator
    }

    pub fn session(&self) -> &Session<C> {
        &self.session
    }

    pub fn is_closed(&self) -> bool {
        self.session.is_closed()
    }

    /// Run a query and return a cursor over its rows.
    pub async fn query(&mut self, query: &str, args: &[Value]) -> Result<ResultCursor<'_, C>> {
        self.query_with(query, args, &CancellationToken::new()).await
    }

    /// Like [`query`](Self::query) for arguments coming from a generic API that may carry names.
    pub async fn query_named(
        &mut self,
        query: &str,
        args: &[NamedValue],
    ) -> Result<ResultCursor<'_, C>> {
        let sql = self.interpolator.interpolate_named(query, args)?;
        let statement = self.run(&sql, &CancellationToken::new()).await?;
        self.open_cursor(statement).await
    }

    /// Run a query whose poll wait can be aborted through `cancel`.
    pub async fn query_with(
        &mut self,
        query: &str,
        args: &[Value],
        cancel: &CancellationToken,
    ) -> Result<ResultCursor<'_, C>> {
        let sql = self.interpolator.interpolate(query, args)?;
        let statement = self.run(&sql, cancel).await?;
        self.open_cursor(statement).await
    }

    /// Run a statement that produces no rows.
    pub async fn exec(&mut self, query: &str, args: &[Value]) -> Result<()> {
        self.exec_with(query, args, &CancellationToken::new()).await
    }

    pub async fn exec_with(
        &mut self,
        query: &str,
        args: &[Value],
        cancel: &CancellationToken,
    ) -> Result<()> {
        let sql = self.interpolator.interpolate(query, args)?;
        self.run(&sql, cancel).await?;
        self.session.release_operation().await;
        Ok(())
    }

    /// Health check: run `SELECT 1` and drain it.
    pub async fn ping(&mut self) -> Result<()> {
        let cursor = self.query(PING_SQL, &[]).await?;
        cursor.collect_all().await?;
        Ok(())
    }

    /// Close the session. Idempotent; see [`Session::close`].
    pub async fn close(&mut self) -> Result<()> {
        self.session.close().await
    }

    async fn run(&mut self, sql: &str, cancel: &CancellationToken) -> Result<Statement> {
        let started = Instant::now();
        let mut statement = execution::submit(&mut self.session, sql).await?;
        let waited = execution::wait(
            self.session.client_mut(),
            &mut statement,
            &self.options,
            cancel,
        )
        .await;
        if let Err(e) = waited {
            debug!(operation = %statement.handle().id, error = %e, "statement did not succeed");
            self.session.release_operation().await;
            return Err(e);
        }
        info!(
            operation = %statement.handle().id,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "statement succeeded"
        );
        Ok(statement)
    }

    async fn open_cursor(&mut self, statement: Statement) -> Result<ResultCursor<'_, C>> {
        let columns =
            execution::result_columns(self.session.client_mut(), &statement, &self.options)
                .await?;
        Ok(ResultCursor::new(
            &mut self.session,
            statement.handle().clone(),
            columns,
            self.options.batch_size,
        ))
    }
}
