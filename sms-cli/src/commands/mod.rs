//! CLI command implementations.

pub mod decrypt;
pub mod devices;
pub mod encrypt;
pub mod health;
pub mod messages;
pub mod register;
pub mod send;
