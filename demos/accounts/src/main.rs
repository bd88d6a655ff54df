//! Accounts Demo
//!
//! Dispatches two request kinds through the Courier mediator. Handlers are
//! discovered through `#[register_handler]`; nothing is registered by hand.
//!
//! # Usage
//!
//! ```bash
//! cargo run --package accounts -- create admin 123123
//! cargo run --package accounts -- list
//! cargo run --package accounts -- --config courier.toml demo
//! ```

mod features;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use courier::prelude::*;
use tracing::info;

use features::{AccountRepository, CreateAccount, ListItems};

#[derive(Parser)]
#[command(about = "Account and catalog requests through the Courier mediator")]
struct Cli {
    /// Configuration file; defaults to searching for `courier.toml`.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create an account.
    Create { username: String, password: String },
    /// List the catalog as JSON.
    List,
    /// Run both scenarios.
    Demo,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let repository = Arc::new(AccountRepository::default());
    let mut builder = Mediator::builder().provider(features::container(Arc::clone(&repository)));
    if let Some(path) = cli.config {
        builder = builder.config_file(path);
    }
    let mediator = builder.build().context("failed to start the mediator")?;

    info!(bindings = mediator.registry().len(), "Mediator started");

    match cli.command {
        Command::Create { username, password } => {
            let message = mediator.send(CreateAccount { username, password }).await?;
            println!("{message}");
        }
        Command::List => {
            let items = mediator.send(ListItems).await?;
            println!("{}", serde_json::to_string_pretty(&items)?);
        }
        Command::Demo => {
            let message = mediator
                .send(CreateAccount {
                    username: "admin".into(),
                    password: "123123".into(),
                })
                .await?;
            println!("{message}");

            let items = mediator.send(ListItems).await?;
            println!("{}", serde_json::to_string(&items)?);
        }
    }

    info!(accounts = repository.count(), "Done");
    Ok(())
}
