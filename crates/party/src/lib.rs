//! Identity and party-id mapping.
//!
//! A participant's identity public key is the one stable "who is this"
//! token used across transport, roster, and protocol layers. Everything
//! else (nickname, chain address) is display metadata.

mod error;
mod participant;
mod party_id;

pub use error::PartyError;
pub use participant::{Me, Participant};
pub use party_id::{derive_party_id, PartyId};
