//! Types shared between the pong server and its browser client.
//!
//! `cargo test -p pong-shared` also writes the TypeScript bindings to `shared/bindings/`.

pub mod config;
pub mod protocol;

pub use config::GameConfig;
