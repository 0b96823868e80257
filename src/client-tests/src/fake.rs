// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! A scripted, in-memory [`Session`] for unit tests.

use anyhow::anyhow;
use async_trait::async_trait;

use crate::batch::{BatchJob, BatchTemplate};
use crate::session::{ExecutionResult, Session, Statement};
use crate::value::Value;

/// Answers statements from a script of SQL prefixes.
///
/// The first scripted prefix that a statement's SQL starts with decides the
/// response. Unscripted statements affect one row.
#[derive(Debug, Default)]
pub struct FakeSession {
    pub script: Vec<(String, Result<ExecutionResult, String>)>,
    pub executed: Vec<Statement>,
    pub prepared: Vec<BatchTemplate>,
    pub batches: Vec<BatchJob>,
    /// Fail the batch with this index.
    pub fail_batch: Option<usize>,
    /// Acknowledge this many fewer rows than were sent.
    pub batch_ack_shortfall: u64,
    /// Rows the portal hands out, page by page.
    pub portal_rows: Vec<Vec<Value>>,
}

impl FakeSession {
    pub fn respond(mut self, prefix: &str, result: ExecutionResult) -> FakeSession {
        self.script.push((prefix.into(), Ok(result)));
        self
    }

    pub fn fail(mut self, prefix: &str, message: &str) -> FakeSession {
        self.script.push((prefix.into(), Err(message.into())));
        self
    }

    /// The SQL of every executed statement, in order.
    pub fn executed_sql(&self) -> Vec<&str> {
        self.executed.iter().map(|s| s.sql()).collect()
    }
}

/// A single-column result.
pub fn column(name: &str, values: Vec<Value>) -> ExecutionResult {
    ExecutionResult::Rows {
        columns: vec![name.into()],
        rows: values.into_iter().map(|v| vec![v]).collect(),
    }
}

#[async_trait]
impl Session for FakeSession {
    async fn execute(&mut self, stmt: &Statement) -> Result<ExecutionResult, anyhow::Error> {
        self.executed.push(stmt.clone());
        let scripted = self
            .script
            .iter()
            .find(|(prefix, _)| stmt.sql().starts_with(prefix.as_str()));
        match scripted {
            Some((_, Ok(result))) => Ok(result.clone()),
            Some((_, Err(message))) => Err(anyhow!("{}", message)),
            None => Ok(ExecutionResult::RowCount(1)),
        }
    }

    async fn prepare(&mut self, template: &BatchTemplate) -> Result<(), anyhow::Error> {
        self.prepared.push(template.clone());
        Ok(())
    }

    async fn send_batch(&mut self, job: &BatchJob) -> Result<u64, anyhow::Error> {
        if !self.prepared.contains(job.template()) {
            return Err(anyhow!("statement {} has not been prepared", job.template().name()));
        }
        if self.fail_batch == Some(self.batches.len()) {
            return Err(anyhow!("connection reset by peer"));
        }
        self.batches.push(job.clone());
        Ok(job.len() as u64 - self.batch_ack_shortfall)
    }

    async fn fetch_pages(
        &mut self,
        sql: &str,
        page_size: i32,
        pages: usize,
    ) -> Result<Vec<Vec<Vec<Value>>>, anyhow::Error> {
        self.executed.push(Statement::new(sql));
        let page_size = usize::try_from(page_size)?;
        Ok(self
            .portal_rows
            .chunks(page_size)
            .take(pages)
            .map(|chunk| chunk.to_vec())
            .collect())
    }
}
