mod config;
mod logging;
mod stats;

pub use config::{Config, FieldType, IndexConf, TableConf};
pub use logging::init_tracing;
pub use stats::Stats;
