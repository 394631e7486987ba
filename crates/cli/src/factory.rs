//! Wires the Room's transport-level `SessionFactory` hook to real `cggmp24`
//! handlers, closing the boundary `thresher-room` deliberately leaves open
//! (its own doc comment: "the Room deliberately does not depend on
//! `cggmp24` itself").

use std::sync::Arc;

use async_trait::async_trait;
use rand::rngs::OsRng;

use thresher_party::PartyId;
use thresher_room::{SessionFactory, SessionPayload};
use thresher_session::{CmpHandler, Handler, ProtocolError};
use thresher_wallet::WalletStore;

pub struct CmpSessionFactory {
    wallets: Arc<WalletStore>,
}

impl CmpSessionFactory {
    pub fn new(wallets: Arc<WalletStore>) -> Self {
        Self { wallets }
    }
}

#[async_trait]
impl SessionFactory for CmpSessionFactory {
    async fn build(
        &self,
        wallet: &str,
        self_id: PartyId,
        party_ids: &[PartyId],
        payload: SessionPayload,
    ) -> Result<Box<dyn Handler>, ProtocolError> {
        let execution_id = wallet.as_bytes().to_vec();

        match payload {
            SessionPayload::Keygen { threshold } => {
                let primes = cggmp24::PregeneratedPrimes::generate(&mut OsRng);
                let handler = CmpHandler::start_keygen(self_id, party_ids, threshold, primes, execution_id)?;
                Ok(Box::new(handler) as Box<dyn Handler>)
            }
            SessionPayload::Sign { message_hash } => {
                let handle = self
                    .wallets
                    .get(wallet)
                    .await
                    .ok_or_else(|| ProtocolError::StateMachine(format!("no such wallet '{wallet}'")))?;
                let guard = handle.lock().await;

                let key_data = guard
                    .record()
                    .key_data
                    .clone()
                    .ok_or_else(|| ProtocolError::StateMachine(format!("wallet '{wallet}' has not completed keygen")))?;

                // `party_ids` here is the signer subset, already sorted; its
                // positions in the *full* roster (the order keygen ran in)
                // are what `start_signing` needs to index into the key
                // share, since a signing quorum is a subset of the signers
                // keygen produced shares for.
                let full_roster = guard.party_ids();
                let mut signer_keygen_indices = Vec::with_capacity(party_ids.len());
                for id in party_ids {
                    let pos = full_roster
                        .iter()
                        .position(|p| p == id)
                        .ok_or_else(|| ProtocolError::UnknownSender(id.to_string()))?;
                    signer_keygen_indices.push(pos as u16);
                }
                drop(guard);

                let handler = CmpHandler::start_signing(self_id, party_ids, &signer_keygen_indices, &key_data, &message_hash, execution_id)?;
                Ok(Box::new(handler) as Box<dyn Handler>)
            }
        }
    }
}
