//! lobbywatch - reports tracked players sighted in a live matchmaking feed
//!
//! This library crate exposes internal modules for integration testing.

pub mod config;
pub mod data;
pub mod error;
pub mod integrations;
pub mod scheduler;
pub mod search;
pub mod session;
pub mod tracking;
pub mod util;
