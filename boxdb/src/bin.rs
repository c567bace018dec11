// Thin process entry point. A real deployment would sit a fiber
// scheduler and a network listener in front of `boxdb::Engine`; neither
// is this crate's job, so this binary only does enough to prove the
// engine boots: parse a config path, build the object spaces it
// declares, and report readiness.

use std::env;
use std::fs;
use std::process::ExitCode;

use boxdb_admin::{init_tracing, Config};
use boxdb_wal::ChannelWal;
use tracing::{error, info};

fn main() -> ExitCode {
    init_tracing();

    let path = match env::args().nth(1) {
        Some(p) => p,
        None => {
            error!("usage: boxdb <config-file>");
            return ExitCode::FAILURE;
        }
    };

    let bytes = match fs::read(&path) {
        Ok(b) => b,
        Err(e) => {
            error!("could not read {}: {}", path, e);
            return ExitCode::FAILURE;
        }
    };

    let config: Config = match rmp_serde::from_slice(&bytes) {
        Ok(c) => c,
        Err(e) => {
            error!("could not parse {}: {}", path, e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = config.validate() {
        error!("invalid config: {}", e);
        return ExitCode::FAILURE;
    }

    let mut engine = boxdb::Engine::new(Box::new(ChannelWal::spawn()));
    for table in &config.tables {
        if let Err(e) = engine.create_table(table) {
            error!("could not create table {}: {}", table.id, e);
            return ExitCode::FAILURE;
        }
    }

    info!("boxdb ready: {} table(s) loaded from {}", config.tables.len(), path);
    ExitCode::SUCCESS
}
