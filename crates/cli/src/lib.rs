//! Library half of the `thresher` binary: exposes the config, transport,
//! chain-adapter wiring, and session-factory modules so `main.rs` and the
//! end-to-end scenario tests under `tests/` share one implementation.

pub mod chain_setup;
pub mod commands;
pub mod config;
pub mod configdir;
pub mod error;
pub mod factory;
pub mod transport;
