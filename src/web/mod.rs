//! HTTP API module for the gateway.

pub mod activities;
pub mod auth;
pub mod college_list;
pub mod entitlement;
pub mod error;
pub mod essays;
pub mod extract;
pub mod generation;
pub mod middleware;
pub mod profile;
pub mod routes;
pub mod session;
pub mod status;
pub mod subscription;
pub mod upstream;

pub use routes::*;
