// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Smoke tests for PostgreSQL wire protocol clients against CrateDB.
//!
//! The crate connects to a running CrateDB node, issues a handful of DDL and
//! DML statements, bulk loads parameterized rows in pipelined batches, and
//! checks that the responses have the expected shape. Each scenario in
//! [`scenario`] stops at the first error; the binary turns that error into a
//! non-zero exit status.

#![warn(missing_debug_implementations)]

pub mod batch;
pub mod config;
pub mod error;
pub mod runner;
pub mod scenario;
pub mod session;
pub mod value;
pub mod verify;

#[cfg(test)]
mod fake;

pub use crate::config::{BulkConfig, ConnectionConfig};
pub use crate::error::{Error, MismatchError};
pub use crate::session::{PgSession, Session, connect};
