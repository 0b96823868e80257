// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Error types.
//!
//! Every error is terminal for a run. Nothing in this crate catches, retries,
//! or downgrades an [`Error`]; it propagates up to the binary, which prints it
//! and exits.

use std::fmt;

use chrono::{DateTime, Duration, Utc};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to connect to {host}:{port}: {source:#}")]
    Connection {
        host: String,
        port: u16,
        source: anyhow::Error,
    },
    #[error("executing {sql:?}: {source:#}")]
    Statement { sql: String, source: anyhow::Error },
    #[error("submitting batch {batch}: {source:#}")]
    Batch { batch: usize, source: anyhow::Error },
    #[error(transparent)]
    Mismatch(#[from] MismatchError),
    #[error("unexpected result from {sql:?}: expected {expected}, got {actual}")]
    UnexpectedResult {
        sql: String,
        expected: String,
        actual: String,
    },
}

impl Error {
    pub fn statement(sql: impl Into<String>, source: impl Into<anyhow::Error>) -> Error {
        Error::Statement {
            sql: sql.into(),
            source: source.into(),
        }
    }

    pub fn unexpected(
        sql: impl Into<String>,
        expected: impl fmt::Display,
        actual: impl fmt::Display,
    ) -> Error {
        Error::UnexpectedResult {
            sql: sql.into(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }
}

/// A value read back from the database diverged from the value written.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error(
    "inserted ts doesn't match read ts: written {written}, read {read}, \
     tolerance {}ms",
    .tolerance.num_milliseconds()
)]
pub struct MismatchError {
    pub written: DateTime<Utc>,
    pub read: DateTime<Utc>,
    pub tolerance: Duration,
}

/// Converts a client library error, keeping the SQLSTATE and the server's
/// message, detail, and hint when the server sent an error response.
pub(crate) fn pg_error(error: tokio_postgres::Error) -> anyhow::Error {
    let Some(db) = error.as_db_error() else {
        return anyhow::Error::new(error);
    };
    let mut message = format!("{} {}: {}", db.severity(), db.code().code(), db.message());
    for (label, field) in [("detail", db.detail()), ("hint", db.hint())] {
        if let Some(field) = field {
            message.push_str(&format!("\n  {}: {}", label, field));
        }
    }
    anyhow::anyhow!(message)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn mismatch_display_carries_both_values() {
        let written = Utc.with_ymd_and_hms(2021, 1, 13, 14, 37, 17).unwrap();
        let read = written + Duration::seconds(3);
        let err = Error::from(MismatchError {
            written,
            read,
            tolerance: Duration::seconds(1),
        });
        let msg = err.to_string();
        assert!(msg.contains("2021-01-13 14:37:17 UTC"), "{msg}");
        assert!(msg.contains("2021-01-13 14:37:20 UTC"), "{msg}");
        assert!(msg.contains("1000ms"), "{msg}");
    }

    #[test]
    fn statement_error_names_the_sql() {
        let err = Error::statement("refresh table t1", anyhow::anyhow!("boom"));
        assert_eq!(err.to_string(), r#"executing "refresh table t1": boom"#);
    }
}
