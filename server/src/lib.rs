//! Pong server library.
//!
//! This module exposes the server components for use in tests and binaries.

pub mod broadcast;
pub mod config;
pub mod error;
pub mod game_loop;
pub mod matchmaker;
pub mod physics;
pub mod registry;
pub mod room;
pub mod ws;
