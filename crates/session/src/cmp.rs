//! Concrete CMP protocol handler, wired to the `cggmp24` state-machine
//! family. Grounded in the teacher crate's `sign.rs` type-erasure pattern:
//! a `Box<dyn DynCmpSM>` hides the unnameable concrete `StateMachine` type
//! the `cggmp24` builders return, driven by `proceed()`/`received_msg()`.
//!
//! Two protocols are wrapped: keygen (a two-phase `aux_info_gen` then
//! `keygen` pipeline, chained internally so the outer `Handler` contract
//! sees one continuous run) and signing (single phase). Both are 'static
//! by construction; the inputs each builder needs by reference are leaked
//! onto the heap and reclaimed deterministically on drop, the same trick
//! `sign.rs` uses to escape the borrow of short-lived call parameters — we
//! keep it because sessions here live far longer than a single WASM call,
//! across many real network round trips.

use std::fmt;

use rand::rngs::OsRng;
use round_based::state_machine::{wrap_protocol, ProceedResult, StateMachine};
use round_based::{Incoming, MessageDestination, MessageType};
use serde::{de::DeserializeOwned, Serialize};

use cggmp24::security_level::SecurityLevel128;
use cggmp24::signing::PrehashedDataToSign;
use cggmp24::supported_curves::Secp256k1;
use generic_ec::Scalar;

use thresher_party::PartyId;

use crate::error::ProtocolError;
use crate::handler::{Handler, HandlerResult};
use crate::message::ProtocolMessage;

/// A heap allocation leaked for `'static` lifetime, reclaimed on drop.
struct Leaked<T>(*mut T);

impl<T> Leaked<T> {
    fn new(value: T) -> (Self, &'static T) {
        let ptr = Box::into_raw(Box::new(value));
        (Self(ptr), unsafe { &*ptr })
    }

    fn new_mut(value: T) -> (Self, &'static mut T) {
        let ptr = Box::into_raw(Box::new(value));
        (Self(ptr), unsafe { &mut *ptr })
    }
}

impl<T> Drop for Leaked<T> {
    fn drop(&mut self) {
        unsafe { drop(Box::from_raw(self.0)) };
    }
}

unsafe impl<T: Send> Send for Leaked<T> {}

// ---------------------------------------------------------------------------
// Type-erased state machine
// ---------------------------------------------------------------------------

enum PhaseOutput {
    Aux(cggmp24::key_share::AuxInfo<SecurityLevel128>),
    Keygen(cggmp24::IncompleteKeyShare<Secp256k1>),
    Sign(cggmp24::signing::Signature<Secp256k1>),
}

enum RawDrive {
    SendMsg { payload: Vec<u8>, recipient: Option<u16> },
    NeedsInput,
    Finished(Result<PhaseOutput, String>),
    Yielded,
}

/// Object-safe wrapper over an unnameable concrete `StateMachine` type.
trait DynCmpSM: Send {
    fn drive_one(&mut self) -> RawDrive;
    fn receive_msg(&mut self, sender_pos: u16, msg_type: u8, payload: &[u8]) -> Result<(), String>;
}

struct SmWrapper<SM> {
    sm: SM,
}

fn send_msg_of<Msg: Serialize>(
    outgoing: round_based::Outgoing<Msg>,
) -> Result<(Vec<u8>, Option<u16>), String> {
    let payload = serde_json::to_vec(&outgoing.msg).map_err(|e| format!("serialize outgoing msg: {e}"))?;
    let recipient = match outgoing.recipient {
        MessageDestination::AllParties => None,
        MessageDestination::OneParty(p) => Some(p),
    };
    Ok((payload, recipient))
}

fn receive_msg_of<Msg: DeserializeOwned>(
    sender_pos: u16,
    msg_type: u8,
    payload: &[u8],
) -> Result<Incoming<Msg>, String> {
    let msg: Msg = serde_json::from_slice(payload).map_err(|e| format!("deserialize incoming msg: {e}"))?;
    Ok(Incoming {
        id: 0,
        sender: sender_pos,
        msg_type: if msg_type == 0 { MessageType::Broadcast } else { MessageType::P2P },
        msg,
    })
}

macro_rules! impl_dyn_cmp_sm {
    ($success:ty, $variant:ident) => {
        impl<SM, E> DynCmpSM for SmWrapper<SM>
        where
            SM: StateMachine<Output = Result<$success, E>> + Send,
            SM::Msg: Serialize + DeserializeOwned + Clone,
            E: fmt::Debug,
        {
            fn drive_one(&mut self) -> RawDrive {
                match self.sm.proceed() {
                    ProceedResult::SendMsg(outgoing) => match send_msg_of(outgoing) {
                        Ok((payload, recipient)) => RawDrive::SendMsg { payload, recipient },
                        Err(e) => RawDrive::Finished(Err(e)),
                    },
                    ProceedResult::NeedsOneMoreMessage => RawDrive::NeedsInput,
                    ProceedResult::Output(result) => {
                        RawDrive::Finished(result.map(PhaseOutput::$variant).map_err(|e| format!("{e:?}")))
                    }
                    ProceedResult::Yielded => RawDrive::Yielded,
                    ProceedResult::Error(e) => RawDrive::Finished(Err(format!("protocol error: {e}"))),
                }
            }

            fn receive_msg(&mut self, sender_pos: u16, msg_type: u8, payload: &[u8]) -> Result<(), String> {
                let incoming = receive_msg_of::<SM::Msg>(sender_pos, msg_type, payload)?;
                self.sm
                    .received_msg(incoming)
                    .map_err(|_| "failed to deliver message to state machine".to_string())
            }
        }
    };
}

impl_dyn_cmp_sm!(cggmp24::key_share::AuxInfo<SecurityLevel128>, Aux);
impl_dyn_cmp_sm!(cggmp24::IncompleteKeyShare<Secp256k1>, Keygen);
impl_dyn_cmp_sm!(cggmp24::signing::Signature<Secp256k1>, Sign);

// ---------------------------------------------------------------------------
// Stage bookkeeping
// ---------------------------------------------------------------------------

/// What the running state machine currently is, plus whatever it needs kept
/// alive with a `'static` lifetime.
///
/// No custom `Drop` here: struct/enum fields drop in declaration order, and
/// `sm` is declared first in every variant that has one, so the state
/// machine (which may hold `&'static` references into the `Leaked` guards
/// below it) is always gone before the memory it borrowed is freed.
enum Stage {
    /// Phase A of keygen: Paillier aux-info generation.
    Aux {
        sm: Box<dyn DynCmpSM>,
        _eid: Leaked<Vec<u8>>,
        n: u16,
        threshold: u16,
    },
    /// Phase B of keygen, entered once phase A's `AuxInfo` is available.
    Keygen {
        sm: Box<dyn DynCmpSM>,
        _eid: Leaked<Vec<u8>>,
        aux_info: cggmp24::key_share::AuxInfo<SecurityLevel128>,
    },
    /// Interactive signing.
    Sign {
        sm: Box<dyn DynCmpSM>,
        _eid: Leaked<Vec<u8>>,
        _parties: Leaked<Vec<u16>>,
        _key_share: Leaked<cggmp24::KeyShare<Secp256k1, SecurityLevel128>>,
        _prehashed: Leaked<PrehashedDataToSign<Secp256k1>>,
        _rng: Leaked<OsRng>,
    },
    Done(Result<HandlerResult, ProtocolError>),
}

/// Concrete [`Handler`] implementation driving `cggmp24` keygen or signing.
pub struct CmpHandler {
    stage: Stage,
    /// Position (0-based, within the *current* stage's group) -> party id.
    group: Vec<PartyId>,
    /// This handler's own position within `group`, fixed at construction.
    self_pos: u16,
}

impl CmpHandler {
    /// Start a two-phase DKG. `parties` is the canonical, lexicographically
    /// sorted set of participating party ids; `self_id` must be a member.
    pub fn start_keygen(
        self_id: PartyId,
        parties: &[PartyId],
        threshold: u16,
        primes: cggmp24::PregeneratedPrimes<SecurityLevel128>,
        execution_id: Vec<u8>,
    ) -> Result<Self, ProtocolError> {
        let n = parties.len() as u16;
        let self_pos = parties
            .iter()
            .position(|p| *p == self_id)
            .ok_or_else(|| ProtocolError::UnknownSender(self_id.to_string()))? as u16;

        let (eid_guard, eid_static) = Leaked::new(execution_id);
        let eid = cggmp24::ExecutionId::new(eid_static);

        let sm = wrap_protocol(move |party| async move {
            let mut rng = OsRng;
            cggmp24::aux_info_gen(eid, self_pos, n, primes).start(&mut rng, party).await
        });

        Ok(Self {
            stage: Stage::Aux {
                sm: Box::new(SmWrapper { sm }),
                _eid: eid_guard,
                n,
                threshold,
            },
            group: parties.to_vec(),
            self_pos,
        })
    }

    /// Start interactive signing. `signer_keygen_indices` gives, for every
    /// member of `signers` in the same order, that member's position in the
    /// full roster at keygen time (needed to index into `key_share`).
    pub fn start_signing(
        self_id: PartyId,
        signers: &[PartyId],
        signer_keygen_indices: &[u16],
        key_share_bytes: &[u8],
        message_hash: &[u8; 32],
        execution_id: Vec<u8>,
    ) -> Result<Self, ProtocolError> {
        if signers.len() != signer_keygen_indices.len() {
            return Err(ProtocolError::StateMachine(
                "signer set and keygen-index list must be the same length".into(),
            ));
        }
        let self_pos = signers
            .iter()
            .position(|p| *p == self_id)
            .ok_or_else(|| ProtocolError::UnknownSender(self_id.to_string()))? as u16;

        let key_share: cggmp24::KeyShare<Secp256k1, SecurityLevel128> = serde_json::from_slice(key_share_bytes)
            .map_err(|e| ProtocolError::Decode(format!("key share: {e}")))?;

        let (eid_guard, eid_static) = Leaked::new(execution_id);
        let eid = cggmp24::ExecutionId::new(eid_static);

        let (parties_guard, parties_static) = Leaked::new(signer_keygen_indices.to_vec());
        let (key_share_guard, key_share_static) = Leaked::new(key_share);

        let scalar = Scalar::<Secp256k1>::from_be_bytes_mod_order(message_hash);
        let (prehashed_guard, prehashed_static) = Leaked::new(PrehashedDataToSign::from_scalar(scalar));

        let (rng_guard, rng_static) = Leaked::new_mut(OsRng);

        let sm = cggmp24::signing(eid, self_pos, parties_static, key_share_static)
            .enforce_reliable_broadcast(true)
            .sign_sync(rng_static, prehashed_static);

        Ok(Self {
            stage: Stage::Sign {
                sm: Box::new(SmWrapper { sm }),
                _eid: eid_guard,
                _parties: parties_guard,
                _key_share: key_share_guard,
                _prehashed: prehashed_guard,
                _rng: rng_guard,
            },
            group: signers.to_vec(),
            self_pos,
        })
    }

    fn position_of(&self, id: PartyId) -> Result<u16, ProtocolError> {
        self.group
            .iter()
            .position(|p| *p == id)
            .map(|p| p as u16)
            .ok_or_else(|| ProtocolError::UnknownSender(id.to_string()))
    }

    fn advance_to_keygen(&mut self, aux_info: cggmp24::key_share::AuxInfo<SecurityLevel128>) {
        let self_pos = self.self_pos;
        let (n, threshold, eid_guard) = match std::mem::replace(&mut self.stage, Stage::Done(Ok(HandlerResult::KeyShare(Vec::new())))) {
            Stage::Aux { n, threshold, _eid, .. } => (n, threshold, _eid),
            other => {
                self.stage = other;
                return;
            }
        };

        // Build a fresh execution id for phase B: the protocol derives
        // independent transcripts per phase, so reusing the same bytes
        // (rather than leaking a second copy) keeps the two phases bound
        // to the same ceremony.
        let eid_bytes = {
            // Recover the bytes behind the phase-A leak before dropping it.
            let ptr = &*eid_guard as *const Vec<u8>;
            unsafe { (*ptr).clone() }
        };
        drop(eid_guard);

        let (new_eid_guard, eid_static) = Leaked::new(eid_bytes);
        let eid = cggmp24::ExecutionId::new(eid_static);

        let sm = wrap_protocol(move |party| async move {
            let mut rng = OsRng;
            cggmp24::keygen::<Secp256k1>(eid, self_pos, n)
                .set_threshold(threshold)
                .start(&mut rng, party)
                .await
        });

        self.stage = Stage::Keygen {
            sm: Box::new(SmWrapper { sm }),
            _eid: new_eid_guard,
            aux_info,
        };
    }

    fn finish_keygen(&mut self, core_share: cggmp24::IncompleteKeyShare<Secp256k1>) -> Result<HandlerResult, ProtocolError> {
        let aux_info = match &self.stage {
            Stage::Keygen { aux_info, .. } => aux_info.clone(),
            _ => return Err(ProtocolError::StateMachine("keygen finished outside the keygen stage".into())),
        };
        let key_share = cggmp24::KeyShare::from_parts((core_share, aux_info))
            .map_err(|e| ProtocolError::Failed(format!("combine key share: {e}")))?;
        let blob = serde_json::to_vec(&key_share).map_err(|e| ProtocolError::Failed(format!("serialize key share: {e}")))?;
        Ok(HandlerResult::KeyShare(blob))
    }
}

impl Handler for CmpHandler {
    fn drive(&mut self) -> Result<Vec<ProtocolMessage>, ProtocolError> {
        let mut out = Vec::new();
        loop {
            if matches!(self.stage, Stage::Done(_)) {
                break;
            }

            let sm: &mut Box<dyn DynCmpSM> = match &mut self.stage {
                Stage::Aux { sm, .. } | Stage::Keygen { sm, .. } | Stage::Sign { sm, .. } => sm,
                Stage::Done(_) => unreachable!(),
            };

            match sm.drive_one() {
                RawDrive::SendMsg { payload, recipient } => {
                    let recipient = recipient.map(|pos| self.group[pos as usize]);
                    let sender = self.group[self.self_pos as usize];
                    out.push(ProtocolMessage { sender, recipient, payload });
                }
                RawDrive::NeedsInput => break,
                RawDrive::Yielded => continue,
                RawDrive::Finished(Ok(PhaseOutput::Aux(aux_info))) => {
                    self.advance_to_keygen(aux_info);
                }
                RawDrive::Finished(Ok(PhaseOutput::Keygen(core_share))) => {
                    let result = self.finish_keygen(core_share);
                    self.stage = Stage::Done(result);
                    break;
                }
                RawDrive::Finished(Ok(PhaseOutput::Sign(sig))) => {
                    let sig = sig.normalize_s();
                    let mut bytes = vec![0u8; cggmp24::signing::Signature::<Secp256k1>::serialized_len()];
                    sig.write_to_slice(&mut bytes);
                    let mut r = [0u8; 32];
                    let mut s = [0u8; 32];
                    r.copy_from_slice(&bytes[..32]);
                    s.copy_from_slice(&bytes[32..]);
                    self.stage = Stage::Done(Ok(HandlerResult::Signature { r, s }));
                    break;
                }
                RawDrive::Finished(Err(e)) => {
                    self.stage = Stage::Done(Err(ProtocolError::Failed(e)));
                    break;
                }
            }
        }
        Ok(out)
    }

    fn accept(&mut self, msg: ProtocolMessage) -> Result<(), ProtocolError> {
        let sender_pos = self.position_of(msg.sender)?;
        let msg_type: u8 = if msg.recipient.is_none() { 0 } else { 1 };

        let sm: &mut Box<dyn DynCmpSM> = match &mut self.stage {
            Stage::Aux { sm, .. } | Stage::Keygen { sm, .. } | Stage::Sign { sm, .. } => sm,
            Stage::Done(_) => return Ok(()),
        };
        sm.receive_msg(sender_pos, msg_type, &msg.payload)
            .map_err(ProtocolError::StateMachine)
    }

    fn result(&self) -> Option<Result<HandlerResult, ProtocolError>> {
        match &self.stage {
            Stage::Done(r) => Some(clone_result(r)),
            _ => None,
        }
    }
}

fn clone_result(r: &Result<HandlerResult, ProtocolError>) -> Result<HandlerResult, ProtocolError> {
    match r {
        Ok(v) => Ok(v.clone()),
        Err(e) => Err(ProtocolError::Failed(e.to_string())),
    }
}

/// Recover the wallet's shared public key from a completed keygen's key
/// share blob. The blob itself is opaque to every crate above this one;
/// only here, where `cggmp24::KeyShare` is nameable, can it be parsed back
/// out. Grounded in the teacher crate's `extract_public_key`.
pub fn extract_public_key(key_share_blob: &[u8]) -> Result<k256::ecdsa::VerifyingKey, ProtocolError> {
    let key_share: cggmp24::KeyShare<Secp256k1, SecurityLevel128> =
        serde_json::from_slice(key_share_blob).map_err(|e| ProtocolError::Decode(format!("key share: {e}")))?;
    let point = key_share.shared_public_key();
    let encoded = point.to_bytes(true);
    k256::ecdsa::VerifyingKey::from_sec1_bytes(encoded.as_bytes()).map_err(|e| ProtocolError::Decode(format!("shared public key: {e}")))
}
