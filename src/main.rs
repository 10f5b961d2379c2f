use std::{process::ExitCode, sync::Arc};

use clap::Parser;
use tracing_subscriber::EnvFilter;

use bankdb::{
    config::{CliArgs, Config},
    directory::AccountDirectory,
    shell::Shell,
    sqlite_storage::SqliteStore,
    storage::LedgerStore,
    teller::Teller,
};

fn main() -> ExitCode {
    let cli = CliArgs::parse();
    let config = Config::load(&cli);

    init_tracing(&config);

    match run(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(config: &Config) -> anyhow::Result<()> {
    let store: Arc<dyn LedgerStore> = Arc::new(SqliteStore::new(&config.storage.path)?);
    let directory = AccountDirectory::new(store.clone(), config.account_policy());
    let teller = Teller::new(store);
    let mut shell = Shell::new(directory, teller);
    shell.run()
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.clone()));
    // Logs go to stderr so they never interleave with the menu.
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if config.logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}
