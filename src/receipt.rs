//! Receipt integrity: deterministic proof-of-inclusion digests for votes.
//!
//! The digest is an HMAC-SHA256 over a canonical serialisation of the vote's
//! identity, keyed by the server-side `hmac_secret`. Holding the hash lets a
//! voter prove their vote exists without revealing the candidate; nobody can
//! forge a valid hash without the secret.

use data_encoding::HEXLOWER;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::config::Config;
use crate::model::db::vote::Vote;

type HmacSha256 = Hmac<Sha256>;

/// Canonical byte serialisation of the fields covered by the receipt:
/// `{vote_id, voter_id, post_id, candidate_id, cast_at}`.
fn canonical_bytes(vote: &Vote) -> Vec<u8> {
    let mut msg = Vec::with_capacity(4 * 12 + 8);
    msg.extend(vote.id.to_bytes());
    msg.extend(vote.voter_id.to_bytes());
    msg.extend(vote.post_id.to_bytes());
    msg.extend(vote.candidate_id.to_bytes());
    msg.extend(vote.cast_at.timestamp_millis().to_le_bytes());
    msg
}

/// Compute the receipt hash for the given vote.
pub fn compute_receipt(vote: &Vote, config: &Config) -> String {
    let mut mac = HmacSha256::new_from_slice(config.hmac_secret())
        .expect("HMAC accepts keys of any length");
    mac.update(&canonical_bytes(vote));
    HEXLOWER.encode(&mac.finalize().into_bytes())
}

/// Check that the vote's stored receipt hash matches a recomputation over its
/// current fields. A mismatch means the record was tampered with (or the
/// secret changed) and the vote must not be marked verified.
pub fn receipt_matches(vote: &Vote, config: &Config) -> bool {
    let mut mac = HmacSha256::new_from_slice(config.hmac_secret())
        .expect("HMAC accepts keys of any length");
    mac.update(&canonical_bytes(vote));
    match HEXLOWER.decode(vote.receipt_hash.as_bytes()) {
        // Constant-time comparison via the Mac trait.
        Ok(stored) => mac.verify_slice(&stored).is_ok(),
        Err(_) => false,
    }
}
