//! The persistent wallet object: threshold, roster, stored key material,
//! public address, and the chain-bound operations built on top of it.
//!
//! Grounded in `wallet/avmwallet/avmwallet.go` (UTXO shape) and
//! `wallet/ethwallet/ethwallet.go` (account shape), generalized behind
//! `thresher_chain::ChainAdapter` rather than one struct per chain, plus
//! `config.go`'s `AppConfig.Wallets` map for [`WalletStore`].

mod error;
mod store;
mod wallet;

pub use error::WalletError;
pub use store::WalletStore;
pub use wallet::{Wallet, WalletRecord};
