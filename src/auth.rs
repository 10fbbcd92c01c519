// ============================================================================
// Quote and Permit Authentication
// ============================================================================
//
// Makers authenticate quotes with HMAC-SHA256 under a per-maker key held by
// the factory registry; permit pulls use the same scheme under the owner's
// key. Replay protection is a consumed-signature set keyed by the SHA-256
// of the full signed payload, owned per vault. Domain tags bind a payload
// to its kind and, through the encoded vault address, to one vault.

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::product::MintTerms;
use crate::types::{Address, Anchors};

type HmacSha256 = Hmac<Sha256>;

const QUOTE_DOMAIN: &[u8] = b"strata.maker-quote.v1";
const PERMIT_DOMAIN: &[u8] = b"strata.pull-permit.v1";

/// Pre-authorized pull of the minter leg: the owner signs off on a single
/// transfer of `amount` before the deadline. Idempotent through the same
/// consumed set as maker quotes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullPermit {
    pub owner: Address,
    pub amount: u128,
    pub nonce: u64,
    pub deadline: u64,
    pub signature: Vec<u8>,
}

fn push_anchors(out: &mut Vec<u8>, anchors: &Anchors) {
    out.push(anchors.count() as u8);
    match *anchors {
        Anchors::One(k) => out.extend_from_slice(&k.to_be_bytes()),
        Anchors::Two(k1, k2) => {
            out.extend_from_slice(&k1.to_be_bytes());
            out.extend_from_slice(&k2.to_be_bytes());
        }
    }
}

/// Canonical byte encoding of a maker quote. Covers every negotiated field
/// plus the vault and minter identities; the signature field itself is not
/// part of the message.
pub fn quote_message(vault: &Address, minter: &Address, total_collateral: u128, terms: &MintTerms) -> Vec<u8> {
    let mut out = Vec::with_capacity(192);
    out.extend_from_slice(QUOTE_DOMAIN);
    out.extend_from_slice(&vault.0);
    out.extend_from_slice(&minter.0);
    out.extend_from_slice(&total_collateral.to_be_bytes());
    out.extend_from_slice(&terms.expiry.to_be_bytes());
    push_anchors(&mut out, &terms.anchors);
    out.extend_from_slice(&terms.collateral_at_risk.to_be_bytes());
    out.extend_from_slice(&terms.maker_collateral.to_be_bytes());
    match terms.maker_balance_threshold {
        None => out.push(0),
        Some(t) => {
            out.push(1);
            out.extend_from_slice(&t.to_be_bytes());
        }
    }
    out.extend_from_slice(&terms.deadline.to_be_bytes());
    out.extend_from_slice(&terms.maker.0);
    out
}

/// Canonical byte encoding of a pull permit.
pub fn permit_message(vault: &Address, permit: &PullPermit) -> Vec<u8> {
    let mut out = Vec::with_capacity(104);
    out.extend_from_slice(PERMIT_DOMAIN);
    out.extend_from_slice(&vault.0);
    out.extend_from_slice(&permit.owner.0);
    out.extend_from_slice(&permit.amount.to_be_bytes());
    out.extend_from_slice(&permit.nonce.to_be_bytes());
    out.extend_from_slice(&permit.deadline.to_be_bytes());
    out
}

/// Consumed-set key: SHA-256 of the full signed payload.
pub fn payload_hash(message: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(message);
    hasher.finalize().into()
}

/// Produce a signature over `message` under `key`. Host-side and test-side
/// counterpart of [`verify`].
pub fn sign(key: &[u8], message: &[u8]) -> Vec<u8> {
    // new_from_slice accepts keys of any length; the error arm is dead.
    let mut mac = match HmacSha256::new_from_slice(key) {
        Ok(mac) => mac,
        Err(_) => return Vec::new(),
    };
    mac.update(message);
    mac.finalize().into_bytes().to_vec()
}

/// Constant-time verification of `signature` over `message` under `key`.
pub fn verify(key: &[u8], message: &[u8], signature: &[u8]) -> Result<()> {
    let mut mac = HmacSha256::new_from_slice(key).map_err(|_| Error::InvalidSignature)?;
    mac.update(message);
    mac.verify_slice(signature).map_err(|_| Error::InvalidSignature)
}
