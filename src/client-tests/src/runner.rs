// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Sequential statement execution.

use tracing::info;

use crate::error::Error;
use crate::session::{ExecutionResult, Session, Statement};
use crate::value::Value;

/// Runs statements against a session one at a time, printing each statement
/// and its result.
///
/// The first failing statement is returned as an [`Error::Statement`] and
/// nothing after it runs.
#[derive(Debug)]
pub struct StatementRunner<'a, S: ?Sized> {
    session: &'a mut S,
    completed: usize,
}

impl<'a, S> StatementRunner<'a, S>
where
    S: Session + ?Sized,
{
    pub fn new(session: &'a mut S) -> StatementRunner<'a, S> {
        StatementRunner {
            session,
            completed: 0,
        }
    }

    /// The number of statements that have succeeded so far.
    pub fn completed(&self) -> usize {
        self.completed
    }

    pub fn session(&mut self) -> &mut S {
        self.session
    }

    pub async fn run(&mut self, stmt: Statement) -> Result<ExecutionResult, Error> {
        println!(">> {}", stmt);
        info!(step = self.completed + 1, sql = stmt.sql(), "executing");
        let result = self
            .session
            .execute(&stmt)
            .await
            .map_err(|e| Error::statement(stmt.sql(), e))?;
        println!("{}", result);
        self.completed += 1;
        Ok(result)
    }

    pub async fn run_all(
        &mut self,
        stmts: impl IntoIterator<Item = Statement>,
    ) -> Result<Vec<ExecutionResult>, Error> {
        let mut results = vec![];
        for stmt in stmts {
            results.push(self.run(stmt).await?);
        }
        Ok(results)
    }

    /// Runs `stmt` and checks that it affected or returned `expected` rows.
    pub async fn expect_count(
        &mut self,
        stmt: Statement,
        expected: u64,
    ) -> Result<ExecutionResult, Error> {
        let sql = stmt.sql().to_string();
        let result = self.run(stmt).await?;
        if result.row_count() != expected {
            return Err(Error::unexpected(
                sql,
                format!("{} rows", expected),
                format!("{} rows", result.row_count()),
            ));
        }
        Ok(result)
    }

    /// Runs a query that must return exactly one row with one column.
    pub async fn query_scalar(&mut self, stmt: Statement) -> Result<Value, Error> {
        let sql = stmt.sql().to_string();
        let result = self.run(stmt).await?;
        match result.scalar() {
            Some(value) => Ok(value.clone()),
            None => Err(Error::unexpected(sql, "a single value", &result)),
        }
    }
}
