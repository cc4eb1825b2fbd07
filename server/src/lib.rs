pub extern crate actix_web;

pub mod config;
pub mod connection;
mod connection_tx_storage;
pub mod frame;
pub mod handlers;
pub mod ingest;
pub mod provider;
pub mod server;
mod server_state;
mod session;
