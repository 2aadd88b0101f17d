use crate::error::Result;
use crate::rpc::{CellValue, ColumnDesc, OperationHandle, QueryResult, RpcClient};
use crate::session::Session;
use std::collections::VecDeque;
use tracing::{debug, warn};

/// How a column's values should be decoded by the caller.
///
/// The engine returns every value as text; callers decode using `type_name`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanType {
    Text,
}

/// Metadata for one result column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    /// Engine type name, e.g. `VARCHAR_TYPE`.
    pub type_name: String,
    pub scan_type: ScanType,
}

impl From<ColumnDesc> for Column {
    fn from(desc: ColumnDesc) -> Self {
        Self {
            name: desc.name,
            type_name: desc.type_name,
            scan_type: ScanType::Text,
        }
    }
}

/// Rows of one statement, fetched a page at a time.
///
/// Borrows the connection's session, so it cannot outlive it and no other
/// statement can run while it is open. Dropping without [`close`](Self::close)
/// leaves the server-side operation open until the next statement or session
/// close releases it.
pub struct ResultCursor<'c, C: RpcClient> {
    session: &'c mut Session<C>,
    operation: OperationHandle,
    columns: Vec<Column>,
    batch_size: usize,
    page: VecDeque<Vec<CellValue>>,
    exhausted: bool,
    closed: bool,
}

impl<'c, C: RpcClient> ResultCursor<'c, C> {
    pub(crate) fn new(
        session: &'c mut Session<C>,
        operation: OperationHandle,
        columns: Vec<ColumnDesc>,
        batch_size: usize,
    ) -> Self {
        let exhausted = !operation.has_result_set;
        Self {
            session,
            operation,
            columns: columns.into_iter().map(Column::from).collect(),
            batch_size,
            page: VecDeque::new(),
            exhausted,
            closed: false,
        }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn operation(&self) -> &OperationHandle {
        &self.operation
    }

    /// Next row, or `None` once the result set is exhausted or the cursor closed.
    pub async fn next_row(&mut self) -> Result<Option<Vec<CellValue>>> {
        if self.closed {
            return Ok(None);
        }
        while self.page.is_empty() && !self.exhausted {
            self.fetch_page().await?;
        }
        Ok(self.page.pop_front())
    }

    async fn fetch_page(&mut self) -> Result<()> {
        let page = self
            .session
            .client_mut()
            .fetch_rows(&self.operation, self.batch_size)
            .await?;
        debug!(
            operation = %self.operation.id,
            rows = page.rows.len(),
            has_more = page.has_more_rows,
            "fetched page"
        );
        // An empty page ends the stream even if the engine claims more rows.
        if page.rows.is_empty() || !page.has_more_rows {
            self.exhausted = true;
        }
        self.page.extend(page.rows);
        Ok(())
    }

    /// Drain the remaining rows into a [`QueryResult`] and close the cursor.
    pub async fn collect_all(mut self) -> Result<QueryResult> {
        let mut rows = Vec::new();
        while let Some(row) = self.next_row().await? {
            rows.push(row);
        }
        let columns = self
            .columns
            .iter()
            .map(|c| ColumnDesc {
                name: c.name.clone(),
                type_name: c.type_name.clone(),
            })
            .collect();
        self.close().await?;
        Ok(QueryResult { columns, rows })
    }

    /// Release the server-side operation. Idempotent.
    ///
    /// The cursor is closed locally even when the engine reports an error.
    pub async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.page.clear();
        self.session.clear_operation(&self.operation);
        match self.session.client_mut().close_operation(&self.operation).await {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!(operation = %self.operation.id, error = %e, "failed to close operation");
                Err(e)
            }
        }
    }
}
