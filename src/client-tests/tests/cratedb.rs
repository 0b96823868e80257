// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Scenarios against a live CrateDB node.
//!
//! These tests are ignored by default. To run them, start CrateDB and point
//! the tests at it:
//!
//! ```text
//! docker run -it --rm --publish=5432:5432 crate/crate:nightly
//! CRATEDB_HOST=localhost cargo test -p client-tests -- --ignored
//! ```

use std::env;

use chrono::Utc;
use rand::SeedableRng;
use rand::rngs::StdRng;

use client_tests::batch::UserRows;
use client_tests::scenario;
use client_tests::session::Statement;
use client_tests::value::Value;
use client_tests::{BulkConfig, ConnectionConfig, PgSession, Session};

fn config() -> ConnectionConfig {
    let host = env::var("CRATEDB_HOST").unwrap_or_else(|_| "localhost".into());
    let port = env::var("CRATEDB_PORT")
        .ok()
        .map(|p| p.parse().expect("CRATEDB_PORT must be a port number"))
        .unwrap_or(5432);
    ConnectionConfig::new(host, port)
}

async fn session() -> PgSession {
    client_tests::connect(&config())
        .await
        .expect("connecting to CrateDB")
}

#[tokio::test]
#[ignore = "requires a running CrateDB node"]
async fn connect_and_select() {
    let mut session = session().await;
    let result = session
        .execute(&Statement::new("select 1 + $1").bind(1))
        .await
        .unwrap();
    assert_eq!(result.scalar().and_then(Value::as_i64), Some(2));
    session.close().await.unwrap();
}

#[tokio::test]
#[ignore = "requires a running CrateDB node"]
async fn basic_queries() {
    let mut session = session().await;
    scenario::basic_queries(&mut session, Utc::now).await.unwrap();
    session.close().await.unwrap();
}

#[tokio::test]
#[ignore = "requires a running CrateDB node"]
async fn bulk_operations() {
    let mut session = session().await;
    let config = BulkConfig::default();
    let mut rows = UserRows::new(StdRng::seed_from_u64(42));
    let report = scenario::bulk_operations(&mut session, &mut rows, &config)
        .await
        .unwrap();
    assert_eq!(report.batches, 20);
    assert_eq!(report.rows, 10_000);
    session.close().await.unwrap();
}

#[tokio::test]
#[ignore = "requires a running CrateDB node"]
async fn prepared_statements() {
    let mut session = session().await;
    scenario::prepared_statements(&mut session).await.unwrap();
    session.close().await.unwrap();
}

#[tokio::test]
#[ignore = "requires a running CrateDB node"]
async fn fetch_size() {
    let mut session = session().await;
    scenario::fetch_size(&mut session).await.unwrap();
    session.close().await.unwrap();
}

#[tokio::test]
#[ignore = "requires a running CrateDB node"]
async fn multi_value_insert() {
    let mut session = session().await;
    scenario::multi_value_insert(&mut session).await.unwrap();
    session.close().await.unwrap();
}

#[tokio::test]
#[ignore = "requires a running CrateDB node"]
async fn simple_select_without_rows_has_columns() {
    let mut session = session().await;
    let result = session
        .execute(&Statement::simple("select 1 as a where false"))
        .await
        .unwrap();
    assert_eq!(result.columns(), ["a".to_string()]);
    assert!(result.rows().is_empty());
    session.close().await.unwrap();
}
