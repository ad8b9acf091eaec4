pub mod auth;
pub mod client;
pub mod config;
pub mod formatter;
pub mod history;
pub mod logging;
pub mod models;
pub mod notifier;
pub mod orchestrator;
pub mod parser;
pub mod process;
