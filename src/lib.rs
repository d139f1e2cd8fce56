pub mod app;
pub mod auth;
pub mod cli;
pub mod clock;
pub mod config;
pub mod database;
pub mod email;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod policy;
pub mod services;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
