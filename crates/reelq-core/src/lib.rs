pub mod config;
pub mod logging;

pub mod classify;
pub mod engine;
pub mod error;
pub mod filename;
pub mod item_db;
pub mod orchestrator;
pub mod process;
pub mod progress;
pub mod resolver;
pub mod scheduler;
pub mod settings;
pub mod state;
pub mod worker;
