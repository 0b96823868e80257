// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Sessions against the database under test.

use std::collections::BTreeMap;
use std::fmt;

use anyhow::anyhow;
use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, NoTls, SimpleQueryMessage};
use tracing::{debug, error, info};

use crate::batch::{BatchJob, BatchTemplate};
use crate::config::ConnectionConfig;
use crate::error::{Error, pg_error};
use crate::value::Value;

/// How a [`Statement`] travels over the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    /// Parse, bind, and execute, with parameters.
    Extended,
    /// A single `Query` message. Takes no parameters.
    Simple,
}

/// SQL text plus its bound parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    sql: String,
    params: Vec<Value>,
    protocol: Protocol,
}

impl Statement {
    pub fn new(sql: impl Into<String>) -> Statement {
        Statement {
            sql: sql.into(),
            params: vec![],
            protocol: Protocol::Extended,
        }
    }

    pub fn simple(sql: impl Into<String>) -> Statement {
        Statement {
            protocol: Protocol::Simple,
            ..Statement::new(sql)
        }
    }

    /// Appends a positional parameter.
    pub fn bind(mut self, value: impl Into<Value>) -> Statement {
        self.params.push(value.into());
        self
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.sql)?;
        if !self.params.is_empty() {
            f.write_str(" -- params: ")?;
            for (i, p) in self.params.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{}", p)?;
            }
        }
        Ok(())
    }
}

/// The outcome of one statement.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionResult {
    /// Rows affected by DDL or DML.
    RowCount(u64),
    /// Rows returned by a query.
    Rows {
        columns: Vec<String>,
        rows: Vec<Vec<Value>>,
    },
}

impl ExecutionResult {
    pub fn row_count(&self) -> u64 {
        match self {
            ExecutionResult::RowCount(n) => *n,
            ExecutionResult::Rows { rows, .. } => rows.len() as u64,
        }
    }

    /// Column names, empty for a row count.
    pub fn columns(&self) -> &[String] {
        match self {
            ExecutionResult::RowCount(_) => &[],
            ExecutionResult::Rows { columns, .. } => columns,
        }
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        match self {
            ExecutionResult::RowCount(_) => &[],
            ExecutionResult::Rows { rows, .. } => rows,
        }
    }

    /// The single value of a one-row, one-column result.
    pub fn scalar(&self) -> Option<&Value> {
        match self.rows() {
            [row] if row.len() == 1 => row.first(),
            _ => None,
        }
    }
}

impl fmt::Display for ExecutionResult {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ExecutionResult::RowCount(n) => write!(f, "OK {}", n),
            ExecutionResult::Rows { columns, rows } => {
                write!(f, "{}", columns.join(" | "))?;
                for row in rows {
                    f.write_str("\n")?;
                    for (i, value) in row.iter().enumerate() {
                        if i > 0 {
                            f.write_str(" | ")?;
                        }
                        write!(f, "{}", value)?;
                    }
                }
                write!(f, "\n({} rows)", rows.len())
            }
        }
    }
}

/// An open, authenticated connection to the database.
///
/// Requests are issued in lock step: each method returns only once the server
/// has answered. Errors are reported as [`anyhow::Error`]s; callers attach the
/// statement or batch they belong to.
#[async_trait]
pub trait Session: Send {
    /// Executes one statement.
    async fn execute(&mut self, stmt: &Statement) -> Result<ExecutionResult, anyhow::Error>;

    /// Prepares `template` under its name so that batches can refer to it.
    async fn prepare(&mut self, template: &BatchTemplate) -> Result<(), anyhow::Error>;

    /// Submits every row of `job` as one pipelined request and waits for all
    /// of them. Returns the total number of rows affected.
    async fn send_batch(&mut self, job: &BatchJob) -> Result<u64, anyhow::Error>;

    /// Binds `sql` to a portal inside a transaction and fetches `pages` pages
    /// of at most `page_size` rows each.
    async fn fetch_pages(
        &mut self,
        sql: &str,
        page_size: i32,
        pages: usize,
    ) -> Result<Vec<Vec<Vec<Value>>>, anyhow::Error>;
}

/// A [`Session`] backed by a `tokio-postgres` client.
pub struct PgSession {
    client: Client,
    connection: JoinHandle<()>,
    prepared: BTreeMap<String, tokio_postgres::Statement>,
}

impl fmt::Debug for PgSession {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("PgSession")
            .field("prepared", &self.prepared.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

/// Opens a session against the database described by `config`.
///
/// There is no retry: if the server is unreachable or rejects the connection,
/// the error is returned immediately.
pub async fn connect(config: &ConnectionConfig) -> Result<PgSession, Error> {
    let connection_error = |source| Error::Connection {
        host: config.host.clone(),
        port: config.port,
        source,
    };
    if config.host.is_empty() {
        return Err(connection_error(anyhow!("no host given")));
    }

    info!(
        host = %config.host,
        port = config.port,
        database = %config.database,
        user = %config.user,
        "connecting"
    );
    let (client, connection) = config
        .pg_config()
        .connect(NoTls)
        .await
        .map_err(|e| connection_error(pg_error(e)))?;

    // The connection object performs the actual communication with the
    // database, so spawn it off to run on its own.
    let connection = tokio::spawn(async move {
        if let Err(e) = connection.await {
            error!("connection error: {}", e);
        }
    });

    Ok(PgSession {
        client,
        connection,
        prepared: BTreeMap::new(),
    })
}

impl PgSession {
    /// Closes the session and waits for the connection to shut down.
    pub async fn close(self) -> Result<(), anyhow::Error> {
        drop(self.client);
        self.connection.await?;
        Ok(())
    }
}

/// The parts of a simple query response that decide the shape of its result.
#[derive(Debug, PartialEq)]
enum SimpleResponse {
    Columns(Vec<String>),
    Row(Vec<Value>),
    Complete(u64),
}

/// A statement that described its columns returned rows, even if none
/// arrived. Anything else reports the count from its command tag.
fn simple_result(responses: impl IntoIterator<Item = SimpleResponse>) -> ExecutionResult {
    let mut columns = None;
    let mut rows = vec![];
    let mut count = 0;
    for response in responses {
        match response {
            SimpleResponse::Columns(c) => columns = Some(c),
            SimpleResponse::Row(row) => rows.push(row),
            SimpleResponse::Complete(n) => count = n,
        }
    }
    match columns {
        Some(columns) => ExecutionResult::Rows { columns, rows },
        None => ExecutionResult::RowCount(count),
    }
}

fn param_refs(params: &[Value]) -> Vec<&(dyn ToSql + Sync)> {
    params.iter().map(|p| p as &(dyn ToSql + Sync)).collect()
}

#[async_trait]
impl Session for PgSession {
    async fn execute(&mut self, stmt: &Statement) -> Result<ExecutionResult, anyhow::Error> {
        match stmt.protocol() {
            Protocol::Simple => {
                if !stmt.params().is_empty() {
                    return Err(anyhow!("the simple query protocol takes no parameters"));
                }
                let messages = self
                    .client
                    .simple_query(stmt.sql())
                    .await
                    .map_err(pg_error)?;
                let responses = messages.into_iter().filter_map(|message| match message {
                    SimpleQueryMessage::RowDescription(columns) => Some(SimpleResponse::Columns(
                        columns.iter().map(|c| c.name().to_string()).collect(),
                    )),
                    SimpleQueryMessage::Row(row) => Some(SimpleResponse::Row(
                        (0..row.len())
                            .map(|i| row.get(i).map_or(Value::Null, Value::text))
                            .collect(),
                    )),
                    SimpleQueryMessage::CommandComplete(n) => Some(SimpleResponse::Complete(n)),
                    _ => None,
                });
                Ok(simple_result(responses))
            }
            Protocol::Extended => {
                let prepared = self.client.prepare(stmt.sql()).await.map_err(pg_error)?;
                let params = param_refs(stmt.params());
                debug!(sql = stmt.sql(), ?params, "executing");
                if prepared.columns().is_empty() {
                    let n = self
                        .client
                        .execute(&prepared, &params)
                        .await
                        .map_err(pg_error)?;
                    Ok(ExecutionResult::RowCount(n))
                } else {
                    let columns = prepared
                        .columns()
                        .iter()
                        .map(|c| c.name().to_string())
                        .collect();
                    let rows = self
                        .client
                        .query(&prepared, &params)
                        .await
                        .map_err(pg_error)?
                        .iter()
                        .map(Value::decode_row)
                        .collect::<Result<_, _>>()
                        .map_err(pg_error)?;
                    Ok(ExecutionResult::Rows { columns, rows })
                }
            }
        }
    }

    async fn prepare(&mut self, template: &BatchTemplate) -> Result<(), anyhow::Error> {
        let types: Vec<_> = template.column_types().iter().map(|t| t.pg_type()).collect();
        let stmt = self
            .client
            .prepare_typed(template.sql(), &types)
            .await
            .map_err(pg_error)?;
        self.prepared.insert(template.name().to_string(), stmt);
        Ok(())
    }

    async fn send_batch(&mut self, job: &BatchJob) -> Result<u64, anyhow::Error> {
        let name = job.template().name();
        let stmt = self
            .prepared
            .get(name)
            .ok_or_else(|| anyhow!("statement {} has not been prepared", name))?;
        let client = &self.client;
        // Every execute request is written before any response is awaited, so
        // the whole batch shares one round trip.
        let pending = job.rows().iter().map(|row| async move {
            let params = param_refs(row);
            client.execute(stmt, &params).await
        });
        let counts = futures::future::try_join_all(pending)
            .await
            .map_err(pg_error)?;
        Ok(counts.into_iter().sum())
    }

    async fn fetch_pages(
        &mut self,
        sql: &str,
        page_size: i32,
        pages: usize,
    ) -> Result<Vec<Vec<Vec<Value>>>, anyhow::Error> {
        let tx = self.client.transaction().await.map_err(pg_error)?;
        let portal = tx.bind(sql, &[]).await.map_err(pg_error)?;
        let mut out = Vec::with_capacity(pages);
        for _ in 0..pages {
            let rows = tx
                .query_portal(&portal, page_size)
                .await
                .map_err(pg_error)?;
            let rows = rows
                .iter()
                .map(Value::decode_row)
                .collect::<Result<_, _>>()
                .map_err(pg_error)?;
            out.push(rows);
        }
        tx.commit().await.map_err(pg_error)?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statement_display_lists_params() {
        let stmt = Statement::new("insert into t1 (x) values (?)").bind(1);
        assert_eq!(stmt.to_string(), "insert into t1 (x) values (?) -- params: 1");
        assert_eq!(
            Statement::simple("refresh table t1").to_string(),
            "refresh table t1"
        );
        assert_eq!(Statement::simple("select 1").protocol(), Protocol::Simple);
    }

    #[test]
    fn execution_result_shapes() {
        let count = ExecutionResult::RowCount(3);
        assert_eq!(count.row_count(), 3);
        assert!(count.rows().is_empty());
        assert_eq!(count.to_string(), "OK 3");

        let rows = ExecutionResult::Rows {
            columns: vec!["id".into(), "name".into()],
            rows: vec![
                vec![Value::Int4(1), Value::text("Arthur")],
                vec![Value::Int4(2), Value::Null],
            ],
        };
        assert_eq!(rows.row_count(), 2);
        assert_eq!(rows.scalar(), None);
        assert_eq!(rows.to_string(), "id | name\n1 | Arthur\n2 | NULL\n(2 rows)");

        let scalar = ExecutionResult::Rows {
            columns: vec!["count(*)".into()],
            rows: vec![vec![Value::Int8(0)]],
        };
        assert_eq!(scalar.scalar(), Some(&Value::Int8(0)));
    }

    #[test]
    fn simple_select_without_rows_keeps_its_columns() {
        let result = simple_result([
            SimpleResponse::Columns(vec!["a".into()]),
            SimpleResponse::Complete(0),
        ]);
        assert_eq!(
            result,
            ExecutionResult::Rows {
                columns: vec!["a".into()],
                rows: vec![],
            }
        );
        assert_eq!(result.columns(), ["a".to_string()]);
        assert_eq!(result.to_string(), "a\n(0 rows)");
    }

    #[test]
    fn simple_responses_shape_the_result() {
        assert_eq!(
            simple_result([SimpleResponse::Complete(3)]),
            ExecutionResult::RowCount(3)
        );
        assert_eq!(
            simple_result([
                SimpleResponse::Columns(vec!["id".into(), "name".into()]),
                SimpleResponse::Row(vec![Value::text("1"), Value::text("Arthur")]),
                SimpleResponse::Row(vec![Value::text("2"), Value::Null]),
                SimpleResponse::Complete(2),
            ]),
            ExecutionResult::Rows {
                columns: vec!["id".into(), "name".into()],
                rows: vec![
                    vec![Value::text("1"), Value::text("Arthur")],
                    vec![Value::text("2"), Value::Null],
                ],
            }
        );
    }

    #[tokio::test]
    async fn connect_reports_refused_dial() {
        let config = ConnectionConfig::new("127.0.0.1", 1);
        match connect(&config).await {
            Err(Error::Connection { host, port, .. }) => {
                assert_eq!(host, "127.0.0.1");
                assert_eq!(port, 1);
            }
            other => panic!("expected connection error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn connect_rejects_empty_host() {
        let config = ConnectionConfig::new("", 5432);
        match connect(&config).await {
            Err(Error::Connection { host, port, .. }) => {
                assert_eq!(host, "");
                assert_eq!(port, 5432);
            }
            other => panic!("expected connection error, got {:?}", other),
        }
    }
}
