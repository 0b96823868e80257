// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Batched, parameterized inserts.
//!
//! A [`BatchTemplate`] is prepared once. Each batch then binds many rows
//! against it and is submitted as a single pipelined round trip. Row ids are
//! derived from the batch and row index, so they are unique within a run no
//! matter what the [`RowGenerator`] produces for the other columns.

use anyhow::anyhow;
use rand::Rng;
use tracing::{debug, info};

use crate::error::Error;
use crate::session::Session;
use crate::value::{ColumnType, Value};

/// A named, typed statement shared by every row of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchTemplate {
    name: String,
    sql: String,
    column_types: Vec<ColumnType>,
}

impl BatchTemplate {
    pub fn new(
        name: impl Into<String>,
        sql: impl Into<String>,
        column_types: Vec<ColumnType>,
    ) -> BatchTemplate {
        BatchTemplate {
            name: name.into(),
            sql: sql.into(),
            column_types,
        }
    }

    /// `INSERT INTO users (id, name, value) VALUES ($1, $2, $3)` as `ps1`.
    pub fn users() -> BatchTemplate {
        BatchTemplate::new(
            "ps1",
            "INSERT INTO users (id, name, value) VALUES ($1, $2, $3)",
            vec![ColumnType::Int4, ColumnType::Varchar, ColumnType::Float4],
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn column_types(&self) -> &[ColumnType] {
        &self.column_types
    }
}

/// A row that does not match its batch's template.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InvalidRow {
    #[error("row {index} has {actual} values, template {template} takes {expected}")]
    Arity {
        template: String,
        index: usize,
        expected: usize,
        actual: usize,
    },
    #[error("row {index} column {column}: {value:?} does not fit {expected}")]
    Type {
        index: usize,
        column: usize,
        value: Value,
        expected: ColumnType,
    },
}

/// Rows bound to one template, in submission order.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchJob {
    template: BatchTemplate,
    rows: Vec<Vec<Value>>,
}

impl BatchJob {
    pub fn new(template: BatchTemplate) -> BatchJob {
        BatchJob {
            template,
            rows: vec![],
        }
    }

    /// Appends `row`, rejecting it unless it matches the template's arity and
    /// column types.
    pub fn push(&mut self, row: Vec<Value>) -> Result<(), InvalidRow> {
        let index = self.rows.len();
        let types = self.template.column_types();
        if row.len() != types.len() {
            return Err(InvalidRow::Arity {
                template: self.template.name().to_string(),
                index,
                expected: types.len(),
                actual: row.len(),
            });
        }
        for (column, (value, ty)) in row.iter().zip(types).enumerate() {
            if !value.fits(*ty) {
                return Err(InvalidRow::Type {
                    index,
                    column,
                    value: value.clone(),
                    expected: *ty,
                });
            }
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn template(&self) -> &BatchTemplate {
        &self.template
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Produces the values of one batch row.
pub trait RowGenerator {
    /// Returns the row with id `id`, the `index`th row of batch `batch`.
    fn row(&mut self, id: i32, batch: usize, index: usize) -> Vec<Value>;
}

/// Rows for [`BatchTemplate::users`]: the id, `user_{batch}_{index}`, and a
/// random `real` in `[0, 1)`.
#[derive(Debug)]
pub struct UserRows<R> {
    rng: R,
}

impl<R: Rng> UserRows<R> {
    pub fn new(rng: R) -> UserRows<R> {
        UserRows { rng }
    }
}

impl<R: Rng> RowGenerator for UserRows<R> {
    fn row(&mut self, id: i32, batch: usize, index: usize) -> Vec<Value> {
        vec![
            Value::Int4(id),
            Value::text(format!("user_{}_{}", batch, index)),
            Value::Float4(self.rng.r#gen::<f32>()),
        ]
    }
}

/// The id of row `index` of batch `batch`.
pub fn row_id(batch: usize, index: usize, rows_per_batch: usize) -> Option<i32> {
    let id = batch.checked_mul(rows_per_batch)?.checked_add(index)?;
    i32::try_from(id).ok()
}

/// What a completed bulk load submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchReport {
    pub batches: usize,
    pub rows: u64,
}

/// Prepares `template` and submits `batch_count` batches of `rows_per_batch`
/// rows each, one after the other.
///
/// The first batch that fails to build or submit ends the load; earlier
/// batches stay committed.
pub async fn load_batches<S, G>(
    session: &mut S,
    template: &BatchTemplate,
    generator: &mut G,
    batch_count: usize,
    rows_per_batch: usize,
) -> Result<BatchReport, Error>
where
    S: Session + ?Sized,
    G: RowGenerator + ?Sized,
{
    session
        .prepare(template)
        .await
        .map_err(|e| Error::statement(template.sql(), e))?;
    debug!(name = template.name(), sql = template.sql(), "prepared");

    let mut report = BatchReport {
        batches: 0,
        rows: 0,
    };
    for batch in 0..batch_count {
        println!("batch {}", batch);
        let batch_error = |source| Error::Batch { batch, source };

        let mut job = BatchJob::new(template.clone());
        for index in 0..rows_per_batch {
            let id = row_id(batch, index, rows_per_batch)
                .ok_or_else(|| batch_error(anyhow!("row id for row {} overflows int4", index)))?;
            job.push(generator.row(id, batch, index))
                .map_err(|e| batch_error(e.into()))?;
        }

        let acknowledged = session.send_batch(&job).await.map_err(batch_error)?;
        if acknowledged != job.len() as u64 {
            return Err(batch_error(anyhow!(
                "expected {} rows acknowledged, got {}",
                job.len(),
                acknowledged
            )));
        }
        info!(batch, rows = acknowledged, "batch complete");
        report.batches += 1;
        report.rows += acknowledged;
    }
    Ok(report)
}
