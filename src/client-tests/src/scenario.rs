// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! The smoke test scenarios.
//!
//! Each scenario is a fixed sequence of statements. It stops at the first
//! statement that fails or returns something other than what CrateDB is
//! expected to return; the tables it creates are left behind for inspection.

use chrono::{DateTime, Utc};
use tracing::info;

use crate::batch::{BatchReport, BatchTemplate, RowGenerator, load_batches};
use crate::config::BulkConfig;
use crate::error::Error;
use crate::runner::StatementRunner;
use crate::session::{Session, Statement};
use crate::value::Value;
use crate::verify::{timestamp_tolerance, verify};

/// Mountains in `sys.summits`, highest first.
pub const HIGHEST_SUMMITS: [&str; 4] = ["Mont Blanc", "Monte Rosa", "Dom", "Liskamm"];

/// Columns of the `log_entries` table, in declaration order.
pub const LOG_ENTRY_COLUMNS: [&str; 5] =
    ["log_time", "client_ip", "request", "status_code", "object_size"];

const LOG_ENTRY_ROWS: u64 = 10;
/// Rows in `INSERT_LOG_ENTRIES` with an `object_size` of 0.
const EMPTY_LOG_ENTRIES: u64 = 4;

const INSERT_LOG_ENTRIES: &str = "INSERT INTO log_entries \
    (log_time, client_ip, request, status_code, object_size) VALUES \
    ('2012-01-01T00:00:00Z', '25.152.171.147', '/books/Six_Easy_Pieces.html', 404, 271), \
    ('2012-01-01T00:00:03Z', '243.180.100.114', '/slideshow/1.jpg', 304, 0), \
    ('2012-01-01T00:00:03Z', '149.60.38.76', \
     '/courses/cs100/finalprojects/adventure/javadocs_/index.html?index-filesindex-16.html', 200, 705), \
    ('2012-01-01T00:00:10Z', '243.180.100.114', '/slideshow/2.jpg', 304, 0), \
    ('2012-01-01T00:00:11Z', '134.121.15.97', '/courses/cs101/old/2002/syllabus.html', 404, 277), \
    ('2012-01-01T00:00:17Z', '243.180.100.114', '/slideshow/3.jpg', 304, 0), \
    ('2012-01-01T00:00:17Z', '252.202.20.160', '/degrees/masters/', 200, 3233), \
    ('2012-01-01T00:00:17Z', '252.202.20.160', '/degrees/masters/masters.gif', 200, 7921), \
    ('2012-01-01T00:00:18Z', '149.60.38.76', '/people/wvv/marron/', 200, 1642), \
    ('2012-01-01T00:00:18Z', '134.121.15.97', '/about/rooms/345/', 304, 0)";

/// `refresh table <table>`, which makes prior writes visible to reads.
pub fn refresh(table: &str) -> Statement {
    Statement::new(format!("refresh table {}", table))
}

async fn expect_table_count<S>(
    runner: &mut StatementRunner<'_, S>,
    query: &str,
    expected: usize,
) -> Result<(), Error>
where
    S: Session + ?Sized,
{
    let count = runner.query_scalar(Statement::new(query)).await?;
    match count.as_i64() {
        Some(n) if n == expected as i64 => Ok(()),
        _ => Err(Error::unexpected(query, expected, count)),
    }
}

/// Create, insert, update, and delete a row, checking that a timestamp
/// survives the round trip.
///
/// `now` supplies the timestamp that is written.
pub async fn basic_queries<S, F>(session: &mut S, now: F) -> Result<(), Error>
where
    S: Session + ?Sized,
    F: Fn() -> DateTime<Utc>,
{
    let mut runner = StatementRunner::new(session);

    let name = runner
        .query_scalar(Statement::new("select name || $1 from sys.cluster").bind("foo"))
        .await?;
    println!("{}", name);

    runner.run(Statement::new("drop table if exists t1")).await?;
    runner
        .run(Statement::new("create table t1 (x integer, ts timestamp)"))
        .await?;

    let ts = now();
    runner
        .expect_count(
            Statement::new("insert into t1 (x, ts) values (?, ?)")
                .bind(1)
                .bind(ts),
            1,
        )
        .await?;
    runner.run(refresh("t1")).await?;

    let query = "select ts from t1";
    let read = runner.query_scalar(Statement::new(query)).await?;
    let read = read
        .as_timestamp()
        .ok_or_else(|| Error::unexpected(query, "a timestamp", &read))?;
    verify(ts, read, timestamp_tolerance())?;
    info!(written = %ts, %read, "timestamp round trip ok");

    runner
        .expect_count(Statement::new("update t1 set x = ?").bind(2), 1)
        .await?;
    runner.run(refresh("t1")).await?;
    runner
        .expect_count(Statement::new("delete from t1 where x = ?").bind(2), 1)
        .await?;
    runner.run(refresh("t1")).await?;
    expect_table_count(&mut runner, "select count(*) from t1", 0).await
}

/// Bulk load `users` in pipelined batches and check that every row arrived
/// exactly once.
pub async fn bulk_operations<S, G>(
    session: &mut S,
    generator: &mut G,
    config: &BulkConfig,
) -> Result<BatchReport, Error>
where
    S: Session + ?Sized,
    G: RowGenerator + ?Sized,
{
    let mut runner = StatementRunner::new(&mut *session);
    runner.run(Statement::new("drop table if exists users")).await?;
    runner
        .run(Statement::new(
            "create table users (id integer, name varchar, value real)",
        ))
        .await?;

    let report = load_batches(
        &mut *session,
        &BatchTemplate::users(),
        generator,
        config.batch_count,
        config.rows_per_batch,
    )
    .await?;
    info!(batches = report.batches, rows = report.rows, "bulk load complete");

    let mut runner = StatementRunner::new(session);
    runner.run(refresh("users")).await?;
    let total = config.total_rows();
    expect_table_count(&mut runner, "select count(*) from users", total).await?;
    expect_table_count(&mut runner, "select count(distinct id) from users", total).await?;
    Ok(report)
}

/// Insert one row with literals and one through a prepared statement, then
/// read both back.
pub async fn prepared_statements<S>(session: &mut S) -> Result<(), Error>
where
    S: Session + ?Sized,
{
    let mut runner = StatementRunner::new(session);
    runner
        .run(Statement::simple("DROP TABLE IF EXISTS tbl"))
        .await?;
    runner
        .run(Statement::simple(
            "CREATE TABLE tbl (id int primary key, x int not null, name text not null)",
        ))
        .await?;
    runner
        .expect_count(
            Statement::new("INSERT INTO tbl (id, x, name) VALUES (1, 10, 'Arthur')"),
            1,
        )
        .await?;
    runner
        .expect_count(
            Statement::new("INSERT INTO tbl (id, x, name) values ($1, $2, $3)")
                .bind(2)
                .bind(20)
                .bind("Trillian"),
            1,
        )
        .await?;
    runner.run(refresh("tbl")).await?;

    let query = "SELECT id, x, name FROM tbl";
    let result = runner.expect_count(Statement::new(query), 2).await?;
    for row in result.rows() {
        let [id, x, name] = row.as_slice() else {
            return Err(Error::unexpected(query, "3 columns", row.len()));
        };
        println!("id={} x={} name={}", id, x, name);
        if !matches!(id.as_i64(), Some(1 | 2)) {
            return Err(Error::unexpected(query, "id 1 or 2", id));
        }
    }
    Ok(())
}

/// Read `sys.summits` through a portal, two rows per fetch.
pub async fn fetch_size<S>(session: &mut S) -> Result<(), Error>
where
    S: Session + ?Sized,
{
    let query = "select mountain from sys.summits order by height desc";
    println!(">> {} -- fetch size 2", query);
    let pages = session
        .fetch_pages(query, 2, 2)
        .await
        .map_err(|e| Error::statement(query, e))?;

    let mut mountains = vec![];
    for page in &pages {
        if page.len() != 2 {
            return Err(Error::unexpected(query, "pages of 2 rows", page.len()));
        }
        for row in page {
            let mountain = row.first().and_then(Value::as_str).unwrap_or_default();
            println!("{}", mountain);
            mountains.push(mountain.to_string());
        }
    }
    if mountains != HIGHEST_SUMMITS {
        return Err(Error::unexpected(
            query,
            HIGHEST_SUMMITS.join(", "),
            mountains.join(", "),
        ));
    }
    Ok(())
}

/// Insert ten rows with a single multi-value `INSERT`, then update the
/// zero-sized ones and check the rows the update returns.
pub async fn multi_value_insert<S>(session: &mut S) -> Result<(), Error>
where
    S: Session + ?Sized,
{
    let mut runner = StatementRunner::new(session);
    runner
        .run(Statement::new("drop table if exists log_entries"))
        .await?;
    runner
        .run(Statement::new(
            "create table log_entries (log_time timestamp with time zone, client_ip text, \
             request text, status_code smallint, object_size bigint)",
        ))
        .await?;
    runner
        .expect_count(Statement::new(INSERT_LOG_ENTRIES), LOG_ENTRY_ROWS)
        .await?;
    runner.run(refresh("log_entries")).await?;

    let query = "select * from log_entries";
    let result = runner
        .expect_count(Statement::new(query), LOG_ENTRY_ROWS)
        .await?;
    if result.columns() != LOG_ENTRY_COLUMNS {
        return Err(Error::unexpected(
            query,
            LOG_ENTRY_COLUMNS.join(", "),
            result.columns().join(", "),
        ));
    }

    // DML with a RETURNING clause answers with rows rather than a count.
    let update = "update log_entries set object_size = 40 where object_size = 0 returning *";
    let result = runner
        .expect_count(Statement::new(update), EMPTY_LOG_ENTRIES)
        .await?;
    let size = result
        .columns()
        .iter()
        .position(|c| c == "object_size")
        .ok_or_else(|| {
            Error::unexpected(update, "an object_size column", result.columns().join(", "))
        })?;
    for row in result.rows() {
        let value = row.get(size).unwrap_or(&Value::Null);
        if value.as_i64() != Some(40) {
            return Err(Error::unexpected(update, "object_size 40", value));
        }
    }

    runner.run(Statement::new("drop table log_entries")).await?;
    Ok(())
}
