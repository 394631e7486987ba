//! Grounded in `commands/wallet.go`'s `runChatCmd` and `network/chat/ui.go`'s
//! event dispatch, ported from a libp2p/tview UI to the in-process
//! `LocalTransport` plus a minimal line-oriented front end (spec §1: a real
//! gossip transport and a full TUI are both out of scope).

use std::sync::Arc;

use clap::Args;
use sha2::{Digest, Sha256};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::info;

use thresher_party::Participant;
use thresher_room::{Room, RoomEvent};
use thresher_wallet::{Wallet, WalletStore};

use crate::chain_setup::build_adapter;
use crate::config::AppConfig;
use crate::error::AppError;
use crate::factory::CmpSessionFactory;
use crate::transport::LocalBus;

#[derive(Args)]
pub struct WalletArgs {}

/// A keygen or sign request named us, awaiting a `/confirm` from the local
/// operator. `ui.go`'s `confirm()` modal dialog, ported to a line prompt.
enum Pending {
    Keygen { wallet: String, threshold: u16, signers: Vec<Participant> },
    Sign { wallet: String, message_hash: [u8; 32], signers: Vec<Participant> },
}

/// Drive a wallet session until stdin closes (EOF). Lines starting with
/// `/` are commands; anything else is broadcast as chat, mirroring the
/// original UI's single text input.
pub async fn run(_args: WalletArgs, cfg: AppConfig) -> Result<(), AppError> {
    let wallets = Arc::new(WalletStore::new());
    let chain = build_adapter(&cfg);
    for record in cfg.wallets.values() {
        let wallet = Wallet::from_record(record.clone(), chain.clone())?;
        wallets.insert(wallet).await;
    }

    let bus = LocalBus::new();
    let transport = bus.join(&cfg.project, cfg.me.participant.nick.clone()).await;
    let factory = Arc::new(CmpSessionFactory::new(wallets.clone()));
    let (events_tx, mut events_rx) = mpsc::channel(32);

    let room = Room::join(Arc::new(transport), cfg.project.clone(), cfg.me.clone(), factory, events_tx);

    println!("Joined project '{}' as '{}'. Type a message, or /help.", cfg.project, cfg.me.participant.nick);

    let mut pending: Option<Pending> = None;
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            event = events_rx.recv() => {
                let Some(event) = event else { break };
                handle_event(event, &mut pending);
            }
            line = stdin.next_line() => {
                match line {
                    Ok(Some(line)) => handle_line(&room, &cfg.me.participant, &line, &mut pending).await,
                    Ok(None) => break,
                    Err(e) => {
                        info!(error = %e, "stdin read failed");
                        break;
                    }
                }
            }
        }
    }

    room.shutdown().await;
    Ok(())
}

async fn handle_line(room: &Arc<Room>, me: &Participant, line: &str, pending: &mut Option<Pending>) {
    let line = line.trim();
    if line.is_empty() {
        return;
    }

    if let Some(rest) = line.strip_prefix('/') {
        let mut parts = rest.split_whitespace();
        match parts.next() {
            Some("quit") | Some("exit") => std::process::exit(0),
            Some("help") => println!(
                "commands: /keygen <wallet> <threshold> <nick1,nick2,...>  /signmsg <wallet> <text>  /confirm  /quit"
            ),
            Some("keygen") => {
                let Some(wallet) = parts.next() else { return usage("/keygen <wallet> <threshold> <nick1,nick2,...>") };
                let Some(threshold) = parts.next().and_then(|s| s.parse::<u16>().ok()) else {
                    return usage("/keygen <wallet> <threshold> <nick1,nick2,...>");
                };
                let nicks: Vec<&str> = parts.next().map(|s| s.split(',').collect()).unwrap_or_default();

                let mut signers = vec![me.clone()];
                for entry in room.roster().snapshot().await {
                    if nicks.contains(&entry.nick.as_str()) {
                        signers.push(entry);
                    }
                }
                println!("proposing {}-of-{} wallet '{wallet}' with signers {:?}", threshold, signers.len(), signers.iter().map(|p| &p.nick).collect::<Vec<_>>());
                room.initiate_keygen(wallet.to_string(), threshold, signers).await;
            }
            Some("signmsg") => {
                let Some(wallet) = parts.next() else { return usage("/signmsg <wallet> <text>") };
                let text: String = parts.collect::<Vec<_>>().join(" ");
                if text.is_empty() {
                    return usage("/signmsg <wallet> <text>");
                }
                let message_hash = digest_message(&text);
                let mut signers = vec![me.clone()];
                signers.extend(room.roster().snapshot().await);
                println!("proposing to sign '{text}' with wallet '{wallet}'");
                room.initiate_sign(wallet.to_string(), message_hash, signers).await;
            }
            Some("confirm") => match pending.take() {
                Some(Pending::Keygen { wallet, threshold, signers }) => room.confirm_keygen(wallet, threshold, signers).await,
                Some(Pending::Sign { wallet, message_hash, signers }) => room.confirm_sign(wallet, message_hash, signers).await,
                None => println!("nothing pending to confirm"),
            },
            Some(other) => println!("unknown command: /{other}"),
            None => {}
        }
        return;
    }

    room.send_chat(line.to_string()).await;
}

fn usage(msg: &str) {
    println!("usage: {msg}");
}

/// `utils.DigestAvaMsg`-equivalent: SHA-256 of the UTF-8 text, the
/// simplest stand-in for a chain-specific message-digest convention.
fn digest_message(text: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hasher.finalize().into()
}

fn handle_event(event: RoomEvent, pending: &mut Option<Pending>) {
    match event {
        RoomEvent::Log { message, .. } => info!("{message}"),
        RoomEvent::ChatMessage { sender_nick, text, .. } => println!("<{sender_nick}> {text}"),
        RoomEvent::ParticipantJoined { participant } => println!("* {} joined", participant.nick),
        RoomEvent::ParticipantLeft { participant } => println!("* {} left", participant.nick),
        RoomEvent::KeygenRequested { wallet, threshold, signers } => {
            println!("* a {threshold}-of-{} wallet '{wallet}' was proposed; type /confirm to join", signers.len());
            *pending = Some(Pending::Keygen { wallet, threshold, signers });
        }
        RoomEvent::SignRequested { wallet, message_hash, signers } => {
            println!("* signing was requested for wallet '{wallet}'; type /confirm to join");
            *pending = Some(Pending::Sign { wallet, message_hash, signers });
        }
        RoomEvent::SendTxRequested { wallet, amount, dest_addr, .. } => {
            println!("* send-tx requested for wallet '{wallet}': {amount} to {dest_addr} (not yet actionable from this front end)");
        }
        RoomEvent::SessionCompleted { wallet, kind, .. } => println!("* {kind:?} session for '{wallet}' completed"),
        RoomEvent::SessionFailed { wallet, kind, error } => println!("* {kind:?} session for '{wallet}' failed: {error}"),
    }
}
