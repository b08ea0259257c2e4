pub mod auth;
pub mod cli;
pub mod config;
pub mod database;
pub mod engines;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod services;

#[cfg(test)]
pub mod testing;
