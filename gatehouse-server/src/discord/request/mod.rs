//! Discord requests.
//!
//! Each request is a builder that is sent by `.await`ing it.

pub mod guild;
pub mod oauth;
pub mod user;
