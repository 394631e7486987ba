//! Signature codec for turning threshold-ECDSA output into a recoverable,
//! chain-submittable signature.
//!
//! Converts the CMP protocol's `(R, S)` scalar pair into the 65-byte
//! `r || s || v` recoverable signature layout blockchains expect, including
//! mandatory low-S canonicalization and the bounded recovery-id search.
//!
//! Grounded in `wallet/avmwallet/avmwallet.go`'s `MpsSigToAvaSig` (same
//! algorithm: negate `s` over half order, brute-force `v`, discard on no
//! match) and in the teacher crate's `sign.rs` use of `Signature::normalize_s()`.

use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use thiserror::Error;

/// The CMP library's raw output: big-endian encodings of `R.x` and `S`.
#[derive(Clone, Copy, Debug)]
pub struct RawSignature {
    pub r: [u8; 32],
    pub s: [u8; 32],
}

#[derive(Debug, Error)]
pub enum SigCodecError {
    #[error("malformed (R, S) pair: {0}")]
    MalformedScalars(k256::ecdsa::Error),

    /// A fatal sign of a bug in earlier rounds — never submit a signature
    /// when this is returned.
    #[error("recovered public key does not match wallet public key")]
    RecoveryMismatch,
}

/// 65-byte recoverable signature in the chain-agnostic `{0,1,2,3}` form.
/// Chain adapters remap `v` further (EIP-155, `{27,28}`) downstream.
pub struct RecoverableSignature(pub [u8; 65]);

impl RecoverableSignature {
    pub fn r(&self) -> &[u8] {
        &self.0[0..32]
    }
    pub fn s(&self) -> &[u8] {
        &self.0[32..64]
    }
    pub fn v(&self) -> u8 {
        self.0[64]
    }
}

/// Convert a CMP `(R, S)` pair into a chain-native recoverable signature.
///
/// Algorithm:
/// 1. Build a signature from the raw `r`/`s` big-endian scalars.
/// 2. Canonicalize to low-S (mandatory for modern chains to reject
///    malleable high-S signatures).
/// 3. Brute-force `v in {0, 1, 2, 3}`, recovering the public key for each
///    candidate and comparing by equality (never by signature validity
///    alone — two different `v` can each produce a publick key that
///    verifies).
///
/// Returns an error (never a 65-byte output) if no candidate `v` recovers
/// `expected_public_key`.
pub fn convert(
    message_hash: &[u8; 32],
    expected_public_key: &VerifyingKey,
    raw: RawSignature,
) -> Result<RecoverableSignature, SigCodecError> {
    let sig = Signature::from_scalars(raw.r, raw.s).map_err(SigCodecError::MalformedScalars)?;
    // Low-S canonicalization: defeats malleability, required for interop
    // since the CMP library may output either parity.
    let sig = sig.normalize_s().unwrap_or(sig);

    let mut out = [0u8; 65];
    let bytes = sig.to_bytes();
    out[0..64].copy_from_slice(&bytes);

    for v in 0u8..=3 {
        let Some(recovery_id) = RecoveryId::from_byte(v) else {
            continue;
        };
        if let Ok(recovered) = VerifyingKey::recover_from_prehash(message_hash, &sig, recovery_id) {
            if &recovered == expected_public_key {
                out[64] = v;
                return Ok(RecoverableSignature(out));
            }
        }
    }

    Err(SigCodecError::RecoveryMismatch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use k256::ecdsa::{signature::hazmat::PrehashSigner, SigningKey};
    use rand::rngs::OsRng;

    fn sign_prehash(signing_key: &SigningKey, hash: &[u8; 32]) -> RawSignature {
        let sig: Signature = signing_key.sign_prehash(hash).unwrap();
        let bytes = sig.to_bytes();
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[0..32]);
        s.copy_from_slice(&bytes[32..64]);
        RawSignature { r, s }
    }

    #[test]
    fn round_trips_and_recovers_expected_key() {
        let signing_key = SigningKey::random(&mut OsRng);
        let verifying_key = *signing_key.verifying_key();
        let hash = [7u8; 32];

        let raw = sign_prehash(&signing_key, &hash);
        let sig = convert(&hash, &verifying_key, raw).expect("conversion should succeed");

        assert_eq!(sig.0.len(), 65);
        let recovery_id = RecoveryId::from_byte(sig.v()).unwrap();
        let k256_sig = Signature::from_scalars(
            <[u8; 32]>::try_from(sig.r()).unwrap(),
            <[u8; 32]>::try_from(sig.s()).unwrap(),
        )
        .unwrap();
        let recovered = VerifyingKey::recover_from_prehash(&hash, &k256_sig, recovery_id).unwrap();
        assert_eq!(recovered, verifying_key);
    }

    // secp256k1 order n, floor(n/2), as big-endian 32-byte constants.
    const HALF_ORDER: [u8; 32] = [
        0x7f, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
        0xff, 0x5d, 0x57, 0x6e, 0x73, 0x57, 0xa4, 0x50, 0x1d, 0xdf, 0xe9, 0x2f, 0x46, 0x68, 0x1b,
        0x20, 0xa0,
    ];
    const ORDER: [u8; 32] = [
        0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
        0xfe, 0xba, 0xae, 0xdc, 0xe6, 0xaf, 0x48, 0xa0, 0x3b, 0xbf, 0xd2, 0x5e, 0x8c, 0xd0, 0x36,
        0x41, 0x41,
    ];

    fn negate_mod_n(s: &[u8; 32]) -> [u8; 32] {
        let mut borrow: i32 = 0;
        let mut out = [0u8; 32];
        for i in (0..32).rev() {
            let mut diff = ORDER[i] as i32 - s[i] as i32 - borrow;
            if diff < 0 {
                diff += 256;
                borrow = 1;
            } else {
                borrow = 0;
            }
            out[i] = diff as u8;
        }
        out
    }

    #[test]
    fn output_s_is_always_low() {
        let signing_key = SigningKey::random(&mut OsRng);
        let verifying_key = *signing_key.verifying_key();
        let hash = [42u8; 32];

        let raw = sign_prehash(&signing_key, &hash);
        let sig = convert(&hash, &verifying_key, raw).unwrap();

        assert!(sig.s() <= HALF_ORDER.as_slice());
    }

    #[test]
    fn flips_a_high_s_input_to_low_s() {
        let signing_key = SigningKey::random(&mut OsRng);
        let verifying_key = *signing_key.verifying_key();
        let hash = [9u8; 32];

        let mut raw = sign_prehash(&signing_key, &hash);
        // Negate s to force a high-S input and exercise the flip path.
        raw.s = negate_mod_n(&raw.s);

        let sig = convert(&hash, &verifying_key, raw).expect("should still recover");
        let recovery_id = RecoveryId::from_byte(sig.v()).unwrap();
        let k256_sig = Signature::from_scalars(
            <[u8; 32]>::try_from(sig.r()).unwrap(),
            <[u8; 32]>::try_from(sig.s()).unwrap(),
        )
        .unwrap();
        let recovered = VerifyingKey::recover_from_prehash(&hash, &k256_sig, recovery_id).unwrap();
        assert_eq!(recovered, verifying_key);
        assert!(sig.s() <= HALF_ORDER.as_slice());
    }

    #[test]
    fn mismatched_public_key_is_rejected() {
        let signing_key = SigningKey::random(&mut OsRng);
        let other_key = *SigningKey::random(&mut OsRng).verifying_key();
        let hash = [1u8; 32];

        let raw = sign_prehash(&signing_key, &hash);
        let err = convert(&hash, &other_key, raw).unwrap_err();
        assert!(matches!(err, SigCodecError::RecoveryMismatch));
    }
}
