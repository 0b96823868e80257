// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Run configuration.

/// The default PostgreSQL wire protocol port.
pub const DEFAULT_PORT: u16 = 5432;
/// CrateDB's default schema, which is what the wire protocol calls a database.
pub const DEFAULT_DATABASE: &str = "doc";
/// CrateDB's built-in superuser.
pub const DEFAULT_USER: &str = "crate";

/// Where and as whom to connect. Built once from the command line and never
/// modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub application_name: String,
}

impl ConnectionConfig {
    pub fn new(host: impl Into<String>, port: u16) -> ConnectionConfig {
        ConnectionConfig {
            host: host.into(),
            port,
            database: DEFAULT_DATABASE.into(),
            user: DEFAULT_USER.into(),
            application_name: "client-tests".into(),
        }
    }

    /// Renders the configuration as a client library config.
    pub fn pg_config(&self) -> tokio_postgres::Config {
        let mut config = tokio_postgres::Config::new();
        config
            .host(&self.host)
            .port(self.port)
            .dbname(&self.database)
            .user(&self.user)
            .application_name(&self.application_name);
        config
    }
}

/// Shape of a bulk load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BulkConfig {
    pub batch_count: usize,
    pub rows_per_batch: usize,
    /// Seed for the random row values. `None` seeds from the OS.
    pub seed: Option<u64>,
}

impl Default for BulkConfig {
    fn default() -> BulkConfig {
        BulkConfig {
            batch_count: 20,
            rows_per_batch: 500,
            seed: None,
        }
    }
}

impl BulkConfig {
    pub fn total_rows(&self) -> usize {
        self.batch_count * self.rows_per_batch
    }
}

#[cfg(test)]
mod tests {
    use tokio_postgres::config::Host;

    use super::*;

    #[test]
    fn pg_config_uses_cratedb_defaults() {
        let config = ConnectionConfig::new("db1.example.com", 5433).pg_config();
        assert_eq!(
            config.get_hosts(),
            &[Host::Tcp("db1.example.com".into())]
        );
        assert_eq!(config.get_ports(), &[5433]);
        assert_eq!(config.get_dbname(), Some("doc"));
        assert_eq!(config.get_user(), Some("crate"));
    }

    #[test]
    fn default_bulk_load_is_ten_thousand_rows() {
        assert_eq!(BulkConfig::default().total_rows(), 10_000);
    }
}
