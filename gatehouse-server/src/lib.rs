//! Gatehouse verification server.

pub mod app;
pub mod cli;
pub mod config;
pub mod discord;
pub mod dump;
pub mod routes;
pub mod store;
pub mod verify;
