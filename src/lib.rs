pub mod app;
pub mod backend;
pub mod cli;
pub mod coalesce;
pub mod config;
pub mod fmt;
pub mod logging;
pub mod state;
pub mod utils;
pub mod web;
