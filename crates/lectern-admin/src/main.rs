//! lectern-admin binary.
//!
//! Reads `lectern.toml` (or the path given with `--config`), opens the SQLite
//! store it names, and runs one catalogue command as the operator.
//!
//! ```text
//! lectern-admin subject add "Mathematics"
//! LECTERN_STORE_PATH=~/lectern.db lectern-admin course list --search rust
//! ```

use std::path::PathBuf;

use anyhow::Context as _;
use clap::Parser;
use lectern_admin::{AdminConfig, Command};
use lectern_core::{Gateway, Superuser};
use lectern_store_sqlite::SqliteStore;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "lectern catalogue administration")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "lectern.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  let cfg = AdminConfig::load(&cli.config)?;

  let store = SqliteStore::open(&cfg.store_path)
    .await
    .with_context(|| format!("failed to open store at {:?}", cfg.store_path))?;
  let gateway = Gateway::new(store, Superuser);

  for line in lectern_admin::run(&gateway, cli.command).await? {
    println!("{line}");
  }
  Ok(())
}
