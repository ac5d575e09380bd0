pub mod config;
pub mod errors;
pub mod gate_config;
pub mod guardian;
pub mod health;
pub mod init;
pub mod journal;
pub mod observability;
pub mod pipeline;
pub mod rescue;
pub mod retention;
pub mod runner;
pub mod smart;
pub mod stage;
pub mod store;
pub mod telemetry;
pub mod ui;
pub mod util;
