//! Repurposed from `commands/bootstrap.go`'s libp2p relay server (out of
//! scope here — no real gossip transport, spec §1) into a self-contained,
//! in-process simulation of a full keygen + sign cycle over
//! [`LocalBus`]/[`LocalTransport`], useful to prove the wiring between
//! `Room`, `CmpSessionFactory`, and `WalletStore` without a second process.

use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use ed25519_dalek::SigningKey;
use tokio::sync::mpsc;

use thresher_party::{Me, Participant};
use thresher_room::{Room, RoomEvent};
use thresher_session::HandlerResult;
use thresher_wallet::{Wallet, WalletStore};

use crate::chain_setup::{build_adapter_with_rpc, FakeFundedRpc};
use crate::error::AppError;
use crate::factory::CmpSessionFactory;
use crate::transport::LocalBus;

#[derive(Args)]
pub struct BootstrapArgs {
    /// Number of simulated participants
    #[arg(long, default_value_t = 2)]
    pub parties: u16,
    /// Signing threshold
    #[arg(long, default_value_t = 2)]
    pub threshold: u16,
}

pub async fn run(args: BootstrapArgs) -> Result<(), AppError> {
    let bus = LocalBus::new();
    let topic = "bootstrap-sim";

    let mut identities = Vec::new();
    for i in 0..args.parties {
        let signing_key = SigningKey::generate(&mut rand::rngs::OsRng);
        let nick = format!("sim-{i}");
        let participant = Participant::new(&nick, "sim-address", signing_key.verifying_key());
        identities.push(Me { participant, ident_priv_key: signing_key });
    }
    let roster: Vec<Participant> = identities.iter().map(|m| m.participant.clone()).collect();

    let mut rooms = Vec::new();
    let mut event_rxs = Vec::new();
    for me in &identities {
        let wallets = Arc::new(WalletStore::new());
        let rpc = Arc::new(FakeFundedRpc { utxos: vec![] });
        let chain = build_adapter_with_rpc(&simulated_config(), rpc);
        let others: Vec<Participant> = roster.iter().filter(|p| *p != &me.participant).cloned().collect();
        wallets
            .insert(Wallet::new_empty(chain, "sim-wallet", args.threshold, me.participant.clone(), others, "2026-01-01T00:00:00Z"))
            .await;

        let transport = bus.join(topic, me.participant.nick.clone()).await;
        let factory = Arc::new(CmpSessionFactory::new(wallets.clone()));
        let (events_tx, events_rx) = mpsc::channel(64);
        let room = Room::join(Arc::new(transport), topic, me.clone(), factory, events_tx);
        rooms.push((room, wallets));
        event_rxs.push(events_rx);
    }

    println!("started {} simulated participants, threshold {}", args.parties, args.threshold);

    // Every participant's own Room spawns its own side of the keygen as
    // soon as it learns of the StartKeygen envelope; the initiator also
    // spawns locally via `initiate_keygen` without waiting for the
    // round trip (same asymmetry the Room uses for real rooms).
    rooms[0].0.initiate_keygen("sim-wallet", args.threshold, roster.clone()).await;
    for (room, _) in rooms.iter().skip(1) {
        room.confirm_keygen("sim-wallet".to_string(), args.threshold, roster.clone()).await;
    }

    let mut key_shares = Vec::new();
    for events_rx in &mut event_rxs {
        let blob = wait_for_keyshare(events_rx).await?;
        key_shares.push(blob);
    }

    for ((_, wallets), blob) in rooms.iter().zip(key_shares.into_iter()) {
        let public_key = thresher_session::extract_public_key(&blob)?;
        let handle = wallets.get("sim-wallet").await.expect("wallet present");
        handle.lock().await.install_keygen_result(blob, public_key)?;
    }
    println!("keygen complete for all {} participants", args.parties);

    let message_hash = [7u8; 32];
    rooms[0].0.initiate_sign("sim-wallet", message_hash, roster.clone()).await;
    for (room, _) in rooms.iter().skip(1) {
        room.confirm_sign("sim-wallet".to_string(), message_hash, roster.clone()).await;
    }

    for events_rx in &mut event_rxs {
        let (r, s) = wait_for_signature(events_rx).await?;
        println!("received signature r={} s={}", hex::encode(r), hex::encode(s));
    }

    for (room, _) in &rooms {
        room.shutdown().await;
    }
    Ok(())
}

async fn wait_for_keyshare(events_rx: &mut mpsc::Receiver<RoomEvent>) -> Result<Vec<u8>, AppError> {
    let deadline = tokio::time::sleep(Duration::from_secs(120));
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            _ = &mut deadline => return Err(AppError::Other("timed out waiting for keygen to complete".into())),
            event = events_rx.recv() => {
                match event {
                    Some(RoomEvent::SessionCompleted { result: HandlerResult::KeyShare(blob), .. }) => return Ok(blob),
                    Some(RoomEvent::SessionFailed { error, .. }) => return Err(AppError::Other(format!("keygen failed: {error}"))),
                    Some(_) => continue,
                    None => return Err(AppError::Other("event channel closed before keygen completed".into())),
                }
            }
        }
    }
}

async fn wait_for_signature(events_rx: &mut mpsc::Receiver<RoomEvent>) -> Result<([u8; 32], [u8; 32]), AppError> {
    let deadline = tokio::time::sleep(Duration::from_secs(120));
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            _ = &mut deadline => return Err(AppError::Other("timed out waiting for signing to complete".into())),
            event = events_rx.recv() => {
                match event {
                    Some(RoomEvent::SessionCompleted { result: HandlerResult::Signature { r, s }, .. }) => return Ok((r, s)),
                    Some(RoomEvent::SessionFailed { error, .. }) => return Err(AppError::Other(format!("signing failed: {error}"))),
                    Some(_) => continue,
                    None => return Err(AppError::Other("event channel closed before signing completed".into())),
                }
            }
        }
    }
}

fn simulated_config() -> crate::config::AppConfig {
    crate::config::AppConfig::new("avalanche", "fuji", "sim", "sim", "X-fuji1sim").expect("hardcoded config is valid")
}
