// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Runs the client smoke tests against a CrateDB node.

use std::process;

use chrono::Utc;
use clap::{Parser, Subcommand};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::info;
use tracing_subscriber::EnvFilter;

use client_tests::batch::UserRows;
use client_tests::config::{DEFAULT_DATABASE, DEFAULT_PORT, DEFAULT_USER};
use client_tests::{BulkConfig, ConnectionConfig, Error, PgSession, scenario};

static ENV_FILTER: &str = "client_tests=info";

#[derive(Parser, Debug)]
#[clap(
    name = "client-tests",
    about = "Smoke tests a CrateDB node over the PostgreSQL wire protocol."
)]
struct Args {
    /// CrateDB hostname.
    #[clap(long, env = "CRATEDB_HOST", default_value = "localhost", global = true)]
    hosts: String,
    /// CrateDB postgres port.
    #[clap(long, env = "CRATEDB_PORT", default_value_t = DEFAULT_PORT, global = true)]
    port: u16,
    /// The schema to connect to.
    #[clap(long, default_value = DEFAULT_DATABASE, global = true)]
    database: String,
    /// The user to connect as.
    #[clap(long, default_value = DEFAULT_USER, global = true)]
    user: String,
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create, insert, update, and delete a row in `t1`.
    BasicQueries,
    /// Bulk load `users` in pipelined batches.
    BulkOperations(BulkArgs),
    /// Insert into `tbl` with literals and a prepared statement.
    PreparedStatements,
    /// Read `sys.summits` through a portal with a fetch size of 2.
    FetchSize,
    /// Insert `log_entries` in one statement and update with `returning *`.
    MultiValueInsert,
    /// Run every scenario.
    All(BulkArgs),
}

#[derive(clap::Args, Debug)]
struct BulkArgs {
    /// Number of batches to submit.
    #[clap(long, default_value_t = 20)]
    batches: usize,
    /// Rows per batch.
    #[clap(long, default_value_t = 500)]
    batch_size: usize,
    /// Seed for the random row values. Picked at random when absent.
    #[clap(long)]
    seed: Option<u64>,
}

impl From<&BulkArgs> for BulkConfig {
    fn from(args: &BulkArgs) -> BulkConfig {
        BulkConfig {
            batch_count: args.batches,
            rows_per_batch: args.batch_size,
            seed: args.seed,
        }
    }
}

impl Args {
    fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig {
            database: self.database.clone(),
            user: self.user.clone(),
            ..ConnectionConfig::new(&self.hosts, self.port)
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(ENV_FILTER)),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(args).await {
        eprintln!("ERROR: {}", e);
        process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), Error> {
    let config = args.connection_config();
    let mut session = client_tests::connect(&config).await?;

    match &args.command {
        Command::BasicQueries => scenario::basic_queries(&mut session, Utc::now).await?,
        Command::BulkOperations(bulk) => bulk_operations(&mut session, bulk.into()).await?,
        Command::PreparedStatements => scenario::prepared_statements(&mut session).await?,
        Command::FetchSize => scenario::fetch_size(&mut session).await?,
        Command::MultiValueInsert => scenario::multi_value_insert(&mut session).await?,
        Command::All(bulk) => {
            scenario::basic_queries(&mut session, Utc::now).await?;
            bulk_operations(&mut session, bulk.into()).await?;
            scenario::prepared_statements(&mut session).await?;
            scenario::fetch_size(&mut session).await?;
            scenario::multi_value_insert(&mut session).await?;
        }
    }

    session.close().await.map_err(|source| Error::Connection {
        host: config.host.clone(),
        port: config.port,
        source,
    })?;
    info!("all statements succeeded");
    Ok(())
}

async fn bulk_operations(session: &mut PgSession, config: BulkConfig) -> Result<(), Error> {
    let seed = config.seed.unwrap_or_else(rand::random);
    info!(
        batches = config.batch_count,
        batch_size = config.rows_per_batch,
        seed,
        "starting bulk load"
    );
    let mut rows = UserRows::new(StdRng::seed_from_u64(seed));
    scenario::bulk_operations(session, &mut rows, &config).await?;
    Ok(())
}
