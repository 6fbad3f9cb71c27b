//! Gatehouse Discord integration.

pub mod commands;
pub mod config;
pub mod dispatch;
pub mod notice;
